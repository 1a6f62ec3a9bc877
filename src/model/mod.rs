//! # Property Graph Model
//!
//! Clean DTOs for the hut network: the generic property-graph types
//! (`Node`, `Relationship`, `Value`) and the typed views on top of them
//! (`Hut`, `LinkAttributes`).
//!
//! This module is pure data — no I/O, no state, no async.

pub mod node;
pub mod relationship;
pub mod value;
pub mod property_map;
pub mod hut;
pub mod link;

pub use node::{Node, NodeId};
pub use relationship::{Relationship, RelId};
pub use value::Value;
pub use property_map::PropertyMap;
pub use hut::{Hut, HUT_LABEL};
pub use link::{LinkAttributes, LINK_TYPE, MAX_LINK_DISTANCE_KM};
