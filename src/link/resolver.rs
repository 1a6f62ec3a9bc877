//! Hut lookup by name or id.

use tracing::debug;

use crate::model::{Node, Value, HUT_LABEL};
use crate::storage::StorageBackend;
use crate::{Error, Result};

/// Find the single `:Hut` whose `name` equals `name`.
///
/// Zero matches is `Error::NotFound`; more than one is
/// `Error::AmbiguousMatch`, since the store does not enforce unique names.
pub async fn resolve_hut<B: StorageBackend>(backend: &B, tx: &B::Tx, name: &str) -> Result<Node> {
    let matches = backend
        .nodes_by_property(tx, HUT_LABEL, "name", &Value::from(name))
        .await?;
    exactly_one(matches, name)
}

/// Find the single `:Hut` whose `hut_id` equals `hut_id`.
pub async fn resolve_hut_by_id<B: StorageBackend>(backend: &B, tx: &B::Tx, hut_id: i64) -> Result<Node> {
    let matches = backend
        .nodes_by_property(tx, HUT_LABEL, "hut_id", &Value::Int(hut_id))
        .await?;
    exactly_one(matches, &format!("hut_id {hut_id}"))
}

fn exactly_one(mut matches: Vec<Node>, key: &str) -> Result<Node> {
    match matches.len() {
        0 => Err(Error::NotFound { name: key.to_string() }),
        1 => {
            let node = matches.remove(0);
            debug!(hut = key, node = %node.id, "hut resolved");
            Ok(node)
        }
        count => Err(Error::AmbiguousMatch { name: key.to_string(), count }),
    }
}
