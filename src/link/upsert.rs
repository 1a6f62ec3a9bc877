//! Merge-and-set of a single directed `LINK`.

use tracing::{debug, warn};

use crate::model::link::GEOMETRY_POLYLINE;
use crate::model::{LinkAttributes, NodeId, RelId, Relationship, Value, LINK_TYPE};
use crate::storage::StorageBackend;
use crate::Result;

/// One directed edge after an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkWrite {
    pub rel_id: RelId,
    /// True if the edge was created, false if an existing one was overwritten.
    pub created: bool,
}

/// Ensure exactly one `src -[:LINK]-> dst` carries `attrs`.
///
/// Creates the edge when absent; otherwise overwrites `distance_km`,
/// `dplus_m`, `dminus_m`, and the polyline (cleared when `attrs` has none).
pub async fn upsert_link<B: StorageBackend>(
    backend: &B,
    tx: &mut B::Tx,
    src: NodeId,
    dst: NodeId,
    attrs: &LinkAttributes,
) -> Result<LinkWrite> {
    let mut props = attrs.to_properties();
    props.entry(GEOMETRY_POLYLINE.to_string()).or_insert(Value::Null);

    let outcome = backend.merge_relationship(tx, src, dst, LINK_TYPE, props).await?;
    if outcome.duplicates > 0 {
        warn!(
            src = %src, dst = %dst, rel = %outcome.id, duplicates = outcome.duplicates,
            "several LINK edges between the same huts; updated the oldest"
        );
    }
    debug!(src = %src, dst = %dst, rel = %outcome.id, created = outcome.created, "LINK merged");

    Ok(LinkWrite { rel_id: outcome.id, created: outcome.created })
}

/// All `src -[:LINK]-> dst` edges, oldest first.
pub async fn find_links<B: StorageBackend>(
    backend: &B,
    tx: &B::Tx,
    src: NodeId,
    dst: NodeId,
) -> Result<Vec<Relationship>> {
    let mut rels: Vec<Relationship> = backend
        .outgoing_relationships(tx, src, Some(LINK_TYPE))
        .await?
        .into_iter()
        .filter(|r| r.connects(src, dst, LINK_TYPE))
        .collect();
    rels.sort_by_key(|r| r.id);
    Ok(rels)
}
