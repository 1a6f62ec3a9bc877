//! # LINK upserts
//!
//! The write path of the hut network, expressed against a
//! `StorageBackend` and an open transaction:
//!
//! - [`resolver`] looks huts up by name or `hut_id`
//! - [`upsert`] merges one directed `LINK` and sets its attributes
//!
//! Hut writes (`merge_hut`, `import_hut`) live here too since the link
//! operations address huts by what they store.
//!
//! `HutGraph` wraps these in a transaction and a retry loop; the functions
//! here never commit or roll back themselves.

pub mod resolver;
pub mod upsert;

use tracing::debug;

use crate::model::{Hut, LinkAttributes, NodeId, Value, HUT_LABEL};
use crate::storage::StorageBackend;
use crate::Result;

pub use resolver::{resolve_hut, resolve_hut_by_id};
pub use upsert::{upsert_link, LinkWrite};

/// Both directions of one segment after a bidirectional upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BidirectionalLink {
    pub from: NodeId,
    pub to: NodeId,
    pub forward: LinkWrite,
    pub backward: LinkWrite,
}

/// Result of an id-keyed link creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkReport {
    pub from_hut_id: i64,
    pub to_hut_id: i64,
    pub forward: LinkWrite,
    /// `None` unless the link was requested bidirectional.
    pub backward: Option<LinkWrite>,
}

/// Resolve `a` and `b`, then upsert `a -> b` with `attrs` and `b -> a`
/// with `attrs.reversed()`.
///
/// Nothing is written until both names resolve.
pub async fn upsert_bidirectional<B: StorageBackend>(
    backend: &B,
    tx: &mut B::Tx,
    a: &str,
    b: &str,
    attrs: &LinkAttributes,
) -> Result<BidirectionalLink> {
    let from = resolve_hut(backend, &*tx, a).await?;
    let to = resolve_hut(backend, &*tx, b).await?;
    debug!(from = a, to = b, from_id = %from.id, to_id = %to.id, "huts resolved");

    let forward = upsert_link(backend, tx, from.id, to.id, attrs).await?;
    let backward = upsert_link(backend, tx, to.id, from.id, &attrs.reversed()).await?;

    Ok(BidirectionalLink { from: from.id, to: to.id, forward, backward })
}

/// Resolve both huts by `hut_id` and upsert `from -> to`, plus the
/// mirrored `to -> from` when `bidirectional`.
pub async fn create_link_by_id<B: StorageBackend>(
    backend: &B,
    tx: &mut B::Tx,
    from_hut_id: i64,
    to_hut_id: i64,
    attrs: &LinkAttributes,
    bidirectional: bool,
) -> Result<LinkReport> {
    let from = resolve_hut_by_id(backend, &*tx, from_hut_id).await?;
    let to = resolve_hut_by_id(backend, &*tx, to_hut_id).await?;

    let forward = upsert_link(backend, tx, from.id, to.id, attrs).await?;
    let backward = if bidirectional {
        Some(upsert_link(backend, tx, to.id, from.id, &attrs.reversed()).await?)
    } else {
        None
    };

    Ok(LinkReport { from_hut_id, to_hut_id, forward, backward })
}

/// Read the attributes of the `a -> b` edge.
pub async fn read_link<B: StorageBackend>(
    backend: &B,
    tx: &B::Tx,
    a: &str,
    b: &str,
) -> Result<Option<LinkAttributes>> {
    let from = resolve_hut(backend, tx, a).await?;
    let to = resolve_hut(backend, tx, b).await?;
    let rel = upsert::find_links(backend, tx, from.id, to.id).await?.into_iter().next();
    Ok(rel.as_ref().and_then(LinkAttributes::from_relationship))
}

/// Create the hut if its name is unused, otherwise overwrite the stored
/// attributes of the single hut carrying that name.
pub async fn merge_hut<B: StorageBackend>(
    backend: &B,
    tx: &mut B::Tx,
    hut: &Hut,
) -> Result<(NodeId, bool)> {
    match resolve_hut(backend, &*tx, &hut.name).await {
        Ok(node) => {
            for (key, val) in hut.to_properties() {
                backend.set_node_property(tx, node.id, &key, val).await?;
            }
            Ok((node.id, false))
        }
        Err(crate::Error::NotFound { .. }) => {
            let id = backend.create_node(tx, &[HUT_LABEL], hut.to_properties()).await?;
            Ok((id, true))
        }
        Err(e) => Err(e),
    }
}

/// One past the largest `hut_id` in the store, 1 when no hut has one.
pub async fn next_hut_id<B: StorageBackend>(backend: &B, tx: &B::Tx) -> Result<i64> {
    let max = backend
        .nodes_by_label(tx, HUT_LABEL)
        .await?
        .iter()
        .filter_map(|n| n.get("hut_id").and_then(Value::as_int))
        .max()
        .unwrap_or(0);
    Ok(max + 1)
}

/// Store `hut` under the next free `hut_id`, ignoring any id it carries.
/// Returns the hut as stored.
pub async fn import_hut<B: StorageBackend>(backend: &B, tx: &mut B::Tx, hut: &Hut) -> Result<Hut> {
    let hut = hut.clone().with_id(next_hut_id(backend, &*tx).await?);
    backend.create_node(tx, &[HUT_LABEL], hut.to_properties()).await?;
    Ok(hut)
}
