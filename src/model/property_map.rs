//! PropertyMap — the key-value store on nodes and relationships.

use std::collections::HashMap;
use super::Value;

/// Property name → value. Keys are the Cypher property names
/// (`name`, `hut_id`, `distance_km`, ...).
pub type PropertyMap = HashMap<String, Value>;
