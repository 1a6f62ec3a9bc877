//! In-memory storage backend.
//!
//! This is the reference implementation of `StorageBackend`.
//! It uses hash maps protected by `RwLock`, one lock per collection.
//!
//! ## Transactions
//!
//! Writes are applied immediately and recorded in the transaction's undo
//! log. `rollback_tx()` replays the log backwards; `commit_tx()` discards
//! it. A `MemoryTx` dropped without commit or rollback is rolled back, so
//! an early return can never leave half an operation behind.
//!
//! ## Limitations
//!
//! - **No isolation**: concurrent transactions see each other's
//!   uncommitted writes. Last writer wins.
//! - **Index registry only**: `create_index()` records the definition;
//!   lookups still scan the label index.
//!
//! ## Fault injection
//!
//! `set_available(false)` makes every call fail with
//! `Error::StoreUnavailable`; `fail_after_writes(n)` lets `n` more writes
//! through and then fails the next one. Both exist so callers can exercise
//! their retry and rollback paths without a real database.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use hashbrown::HashMap;
use parking_lot::{Mutex, RwLock};
use smallvec::SmallVec;
use tracing::warn;

use super::StorageBackend;
use crate::index::IndexSpec;
use crate::model::*;
use crate::tx::{Transaction, TxId, TxMode};
use crate::{Error, Result};

// ============================================================================
// MemoryBackend
// ============================================================================

/// In-memory property graph storage.
#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    nodes: RwLock<HashMap<NodeId, Node>>,
    relationships: RwLock<HashMap<RelId, Relationship>>,
    /// node_id → relationship IDs touching it (either end)
    adjacency: RwLock<HashMap<NodeId, SmallVec<[RelId; 4]>>>,
    /// label → node IDs
    label_index: RwLock<HashMap<String, Vec<NodeId>>>,
    indexes: RwLock<Vec<IndexSpec>>,
    next_node_id: AtomicU64,
    next_rel_id: AtomicU64,
    next_tx_id: AtomicU64,
    available: AtomicBool,
    closed: AtomicBool,
    /// Remaining writes before an injected failure. `None` = unlimited.
    write_budget: Mutex<Option<usize>>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                nodes: RwLock::new(HashMap::new()),
                relationships: RwLock::new(HashMap::new()),
                adjacency: RwLock::new(HashMap::new()),
                label_index: RwLock::new(HashMap::new()),
                indexes: RwLock::new(Vec::new()),
                next_node_id: AtomicU64::new(1),
                next_rel_id: AtomicU64::new(1),
                next_tx_id: AtomicU64::new(1),
                available: AtomicBool::new(true),
                closed: AtomicBool::new(false),
                write_budget: Mutex::new(None),
            }),
        }
    }

    /// Simulate the store going away (`false`) or coming back (`true`).
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    /// Allow `n` more writes, then fail every write with `StoreUnavailable`
    /// until `clear_write_failures()` is called.
    pub fn fail_after_writes(&self, n: usize) {
        *self.inner.write_budget.lock() = Some(n);
    }

    pub fn clear_write_failures(&self) {
        *self.inner.write_budget.lock() = None;
    }

    fn begin_write(&self, tx: &MemoryTx) -> Result<()> {
        self.inner.check_available()?;
        if !tx.is_writable() {
            return Err(Error::TxError(format!("{} is read-only", tx.id)));
        }
        let mut budget = self.inner.write_budget.lock();
        match budget.as_mut() {
            Some(0) => Err(Error::StoreUnavailable("connection lost during write".into())),
            Some(n) => {
                *n -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl MemoryInner {
    fn check_available(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::StoreUnavailable("store has been shut down".into()));
        }
        if !self.available.load(Ordering::SeqCst) {
            return Err(Error::StoreUnavailable("memory store marked unavailable".into()));
        }
        Ok(())
    }

    fn insert_node(&self, node: Node) {
        let id = node.id;
        {
            let mut idx = self.label_index.write();
            for label in &node.labels {
                idx.entry(label.clone()).or_default().push(id);
            }
        }
        self.nodes.write().insert(id, node);
        self.adjacency.write().entry(id).or_default();
    }

    fn remove_node(&self, id: NodeId) {
        let removed = self.nodes.write().remove(&id);
        self.adjacency.write().remove(&id);
        if let Some(node) = removed {
            let mut idx = self.label_index.write();
            for label in &node.labels {
                if let Some(ids) = idx.get_mut(label) {
                    ids.retain(|nid| *nid != id);
                }
            }
        }
    }

    fn insert_relationship(&self, rel: Relationship) {
        let (id, src, dst) = (rel.id, rel.src, rel.dst);
        self.relationships.write().insert(id, rel);
        let mut adj = self.adjacency.write();
        adj.entry(src).or_default().push(id);
        if src != dst {
            adj.entry(dst).or_default().push(id);
        }
    }

    fn remove_relationship(&self, id: RelId) {
        let Some(removed) = self.relationships.write().remove(&id) else {
            return;
        };
        let mut adj = self.adjacency.write();
        for end in [removed.src, removed.dst] {
            if let Some(rels) = adj.get_mut(&end) {
                rels.retain(|rid| *rid != id);
            }
        }
    }

    /// Returns the previous value, `None` if the key was absent.
    fn set_node_property(&self, id: NodeId, key: &str, val: Option<Value>) -> Result<Option<Value>> {
        let mut nodes = self.nodes.write();
        let node = nodes.get_mut(&id).ok_or_else(|| Error::StorageError(format!("node {id} does not exist")))?;
        Ok(match val {
            Some(v) => node.properties.insert(key.to_string(), v),
            None => node.properties.remove(key),
        })
    }

    fn set_relationship_property(&self, id: RelId, key: &str, val: Option<Value>) -> Result<Option<Value>> {
        let mut rels = self.relationships.write();
        let rel = rels
            .get_mut(&id)
            .ok_or_else(|| Error::StorageError(format!("relationship {id} does not exist")))?;
        Ok(match val {
            Some(v) => rel.properties.insert(key.to_string(), v),
            None => rel.properties.remove(key),
        })
    }
}

// ============================================================================
// MemoryTx
// ============================================================================

/// One step of the undo log.
enum Undo {
    NodeCreated(NodeId),
    NodePropertySet { id: NodeId, key: String, prev: Option<Value> },
    RelationshipCreated(RelId),
    RelationshipPropertySet { id: RelId, key: String, prev: Option<Value> },
}

/// In-memory transaction carrying its undo log.
pub struct MemoryTx {
    id: TxId,
    mode: TxMode,
    inner: Arc<MemoryInner>,
    undo: Vec<Undo>,
    finished: bool,
}

impl MemoryTx {
    /// Number of writes recorded so far.
    pub fn pending_writes(&self) -> usize {
        self.undo.len()
    }

    fn revert(&mut self) {
        while let Some(step) = self.undo.pop() {
            match step {
                Undo::NodeCreated(id) => self.inner.remove_node(id),
                Undo::NodePropertySet { id, key, prev } => {
                    if let Err(e) = self.inner.set_node_property(id, &key, prev) {
                        warn!(tx = %self.id, node = %id, key = %key, error = %e, "undo step failed");
                    }
                }
                Undo::RelationshipCreated(id) => self.inner.remove_relationship(id),
                Undo::RelationshipPropertySet { id, key, prev } => {
                    if let Err(e) = self.inner.set_relationship_property(id, &key, prev) {
                        warn!(tx = %self.id, rel = %id, key = %key, error = %e, "undo step failed");
                    }
                }
            }
        }
    }
}

impl Transaction for MemoryTx {
    fn mode(&self) -> TxMode { self.mode }
    fn id(&self) -> TxId { self.id }
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        if !self.finished && !self.undo.is_empty() {
            warn!(tx = %self.id, writes = self.undo.len(), "transaction dropped without commit, rolling back");
            self.revert();
        }
    }
}

// ============================================================================
// StorageBackend impl
// ============================================================================

#[async_trait]
impl StorageBackend for MemoryBackend {
    type Tx = MemoryTx;

    async fn ping(&self) -> Result<()> {
        self.inner.check_available()
    }

    async fn shutdown(&self) -> Result<()> {
        self.inner.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn begin_tx(&self, mode: TxMode) -> Result<MemoryTx> {
        self.inner.check_available()?;
        let id = TxId(self.inner.next_tx_id.fetch_add(1, Ordering::Relaxed));
        Ok(MemoryTx {
            id,
            mode,
            inner: Arc::clone(&self.inner),
            undo: Vec::new(),
            finished: false,
        })
    }

    async fn commit_tx(&self, mut tx: MemoryTx) -> Result<()> {
        tx.undo.clear();
        tx.finished = true;
        Ok(())
    }

    async fn rollback_tx(&self, mut tx: MemoryTx) -> Result<()> {
        tx.revert();
        tx.finished = true;
        Ok(())
    }

    // ========================================================================
    // Node CRUD
    // ========================================================================

    async fn create_node(
        &self,
        tx: &mut MemoryTx,
        labels: &[&str],
        props: PropertyMap,
    ) -> Result<NodeId> {
        self.begin_write(tx)?;
        let id = NodeId(self.inner.next_node_id.fetch_add(1, Ordering::Relaxed));
        let node = Node {
            id,
            labels: labels.iter().map(|l| l.to_string()).collect(),
            properties: props,
        };
        self.inner.insert_node(node);
        tx.undo.push(Undo::NodeCreated(id));
        Ok(id)
    }

    async fn get_node(&self, _tx: &MemoryTx, id: NodeId) -> Result<Option<Node>> {
        self.inner.check_available()?;
        Ok(self.inner.nodes.read().get(&id).cloned())
    }

    async fn set_node_property(
        &self,
        tx: &mut MemoryTx,
        id: NodeId,
        key: &str,
        val: Value,
    ) -> Result<()> {
        self.begin_write(tx)?;
        let val = (!val.is_null()).then_some(val);
        let prev = self.inner.set_node_property(id, key, val)?;
        tx.undo.push(Undo::NodePropertySet { id, key: key.to_string(), prev });
        Ok(())
    }

    // ========================================================================
    // Relationship CRUD
    // ========================================================================

    async fn create_relationship(
        &self,
        tx: &mut MemoryTx,
        src: NodeId,
        dst: NodeId,
        rel_type: &str,
        props: PropertyMap,
    ) -> Result<RelId> {
        self.begin_write(tx)?;
        {
            let nodes = self.inner.nodes.read();
            if !nodes.contains_key(&src) {
                return Err(Error::StorageError(format!("source node {src} does not exist")));
            }
            if !nodes.contains_key(&dst) {
                return Err(Error::StorageError(format!("target node {dst} does not exist")));
            }
        }

        let id = RelId(self.inner.next_rel_id.fetch_add(1, Ordering::Relaxed));
        self.inner.insert_relationship(Relationship {
            id,
            src,
            dst,
            rel_type: rel_type.to_string(),
            properties: props,
        });
        tx.undo.push(Undo::RelationshipCreated(id));
        Ok(id)
    }

    async fn get_relationship(&self, _tx: &MemoryTx, id: RelId) -> Result<Option<Relationship>> {
        self.inner.check_available()?;
        Ok(self.inner.relationships.read().get(&id).cloned())
    }

    async fn set_relationship_property(
        &self,
        tx: &mut MemoryTx,
        id: RelId,
        key: &str,
        val: Value,
    ) -> Result<()> {
        self.begin_write(tx)?;
        let val = (!val.is_null()).then_some(val);
        let prev = self.inner.set_relationship_property(id, key, val)?;
        tx.undo.push(Undo::RelationshipPropertySet { id, key: key.to_string(), prev });
        Ok(())
    }

    async fn outgoing_relationships(
        &self,
        _tx: &MemoryTx,
        node: NodeId,
        rel_type: Option<&str>,
    ) -> Result<Vec<Relationship>> {
        self.inner.check_available()?;
        let adj = self.inner.adjacency.read();
        let rels = self.inner.relationships.read();

        let Some(rel_ids) = adj.get(&node) else {
            return Ok(Vec::new());
        };

        Ok(rel_ids
            .iter()
            .filter_map(|rid| rels.get(rid))
            .filter(|rel| rel.src == node)
            .filter(|rel| rel_type.is_none_or(|t| rel.rel_type == t))
            .cloned()
            .collect())
    }

    // ========================================================================
    // Index (registry only — lookups always scan)
    // ========================================================================

    async fn create_index(&self, spec: &IndexSpec) -> Result<()> {
        self.inner.check_available()?;
        let mut indexes = self.inner.indexes.write();
        if !indexes.iter().any(|i| i.name == spec.name) {
            indexes.push(spec.clone());
        }
        Ok(())
    }

    async fn indexes(&self) -> Result<Vec<IndexSpec>> {
        self.inner.check_available()?;
        Ok(self.inner.indexes.read().clone())
    }

    // ========================================================================
    // Counts & scans
    // ========================================================================

    async fn node_count(&self, _tx: &MemoryTx) -> Result<u64> {
        self.inner.check_available()?;
        Ok(self.inner.nodes.read().len() as u64)
    }

    async fn relationship_count(&self, _tx: &MemoryTx) -> Result<u64> {
        self.inner.check_available()?;
        Ok(self.inner.relationships.read().len() as u64)
    }

    async fn nodes_by_label(&self, _tx: &MemoryTx, label: &str) -> Result<Vec<Node>> {
        self.inner.check_available()?;
        let idx = self.inner.label_index.read();
        let nodes = self.inner.nodes.read();

        let Some(ids) = idx.get(label) else {
            return Ok(Vec::new());
        };
        Ok(ids.iter().filter_map(|id| nodes.get(id).cloned()).collect())
    }

    async fn nodes_by_property(
        &self,
        _tx: &MemoryTx,
        label: &str,
        key: &str,
        value: &Value,
    ) -> Result<Vec<Node>> {
        self.inner.check_available()?;
        let idx = self.inner.label_index.read();
        let nodes = self.inner.nodes.read();

        let Some(ids) = idx.get(label) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .iter()
            .filter_map(|id| nodes.get(id))
            .filter(|n| n.get(key).is_some_and(|v| v.lookup_eq(value)))
            .cloned()
            .collect())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn hut(name: &str) -> PropertyMap {
        let mut props = PropertyMap::new();
        props.insert("name".into(), Value::from(name));
        props
    }

    #[tokio::test]
    async fn test_create_and_get_node() {
        let db = MemoryBackend::new();
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();

        let id = db.create_node(&mut tx, &["Hut"], hut("Kebnekaise")).await.unwrap();
        let node = db.get_node(&tx, id).await.unwrap().unwrap();

        assert!(node.has_label("Hut"));
        assert_eq!(node.get("name"), Some(&Value::from("Kebnekaise")));
        db.commit_tx(tx).await.unwrap();
    }

    #[tokio::test]
    async fn test_nodes_by_property() {
        let db = MemoryBackend::new();
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();

        db.create_node(&mut tx, &["Hut"], hut("Sälka")).await.unwrap();
        db.create_node(&mut tx, &["Hut"], hut("Singi")).await.unwrap();
        db.create_node(&mut tx, &["Shelter"], hut("Sälka")).await.unwrap();

        let found = db.nodes_by_property(&tx, "Hut", "name", &Value::from("Sälka")).await.unwrap();
        assert_eq!(found.len(), 1);
        let none = db.nodes_by_property(&tx, "Hut", "name", &Value::from("Nallo")).await.unwrap();
        assert!(none.is_empty());
        db.commit_tx(tx).await.unwrap();
    }

    #[tokio::test]
    async fn test_merge_relationship_creates_then_updates() {
        let db = MemoryBackend::new();
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        let a = db.create_node(&mut tx, &["Hut"], hut("A")).await.unwrap();
        let b = db.create_node(&mut tx, &["Hut"], hut("B")).await.unwrap();

        let mut props = PropertyMap::new();
        props.insert("distance_km".into(), Value::Float(10.0));
        props.insert("note".into(), Value::Null);
        let first = db.merge_relationship(&mut tx, a, b, "LINK", props).await.unwrap();
        assert!(first.created);
        let rel = db.get_relationship(&tx, first.id).await.unwrap().unwrap();
        assert!(!rel.properties.contains_key("note"));

        let mut props = PropertyMap::new();
        props.insert("distance_km".into(), Value::Float(12.0));
        let second = db.merge_relationship(&mut tx, a, b, "LINK", props).await.unwrap();
        assert!(!second.created);
        assert_eq!(second.id, first.id);
        assert_eq!(db.relationship_count(&tx).await.unwrap(), 1);

        let rel = db.get_relationship(&tx, first.id).await.unwrap().unwrap();
        assert_eq!(rel.get("distance_km"), Some(&Value::Float(12.0)));
        db.commit_tx(tx).await.unwrap();
    }

    #[tokio::test]
    async fn test_rollback_undoes_writes() {
        let db = MemoryBackend::new();
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        let a = db.create_node(&mut tx, &["Hut"], hut("A")).await.unwrap();
        let b = db.create_node(&mut tx, &["Hut"], hut("B")).await.unwrap();
        let rel = db.create_relationship(&mut tx, a, b, "LINK", PropertyMap::new()).await.unwrap();
        db.set_relationship_property(&mut tx, rel, "distance_km", Value::Float(5.0)).await.unwrap();
        db.commit_tx(tx).await.unwrap();

        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        db.set_relationship_property(&mut tx, rel, "distance_km", Value::Float(99.0)).await.unwrap();
        db.create_relationship(&mut tx, b, a, "LINK", PropertyMap::new()).await.unwrap();
        db.set_relationship_property(&mut tx, rel, "geometry_polyline", Value::from("_p~i")).await.unwrap();
        assert_eq!(tx.pending_writes(), 3);
        db.rollback_tx(tx).await.unwrap();

        let tx = db.begin_tx(TxMode::ReadOnly).await.unwrap();
        assert_eq!(db.relationship_count(&tx).await.unwrap(), 1);
        let restored = db.get_relationship(&tx, rel).await.unwrap().unwrap();
        assert_eq!(restored.get("distance_km"), Some(&Value::Float(5.0)));
        assert!(restored.get("geometry_polyline").is_none());
        assert!(db.outgoing_relationships(&tx, b, Some("LINK")).await.unwrap().is_empty());
        assert_eq!(db.outgoing_relationships(&tx, a, Some("LINK")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rollback_survives_undo_of_vanished_edge() {
        let db = MemoryBackend::new();
        let mut setup = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        let a = db.create_node(&mut setup, &["Hut"], hut("A")).await.unwrap();
        let b = db.create_node(&mut setup, &["Hut"], hut("B")).await.unwrap();
        db.commit_tx(setup).await.unwrap();

        let mut first = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        let rel = db.create_relationship(&mut first, a, b, "LINK", PropertyMap::new()).await.unwrap();
        let mut second = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        db.set_relationship_property(&mut second, rel, "distance_km", Value::Float(4.0)).await.unwrap();

        // The edge `second` wrote to is gone by the time it rolls back.
        db.rollback_tx(first).await.unwrap();
        db.rollback_tx(second).await.unwrap();

        let tx = db.begin_tx(TxMode::ReadOnly).await.unwrap();
        assert_eq!(db.relationship_count(&tx).await.unwrap(), 0);
        assert_eq!(db.node_count(&tx).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_drop_without_commit_rolls_back() {
        let db = MemoryBackend::new();
        {
            let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();
            db.create_node(&mut tx, &["Hut"], hut("Ephemeral")).await.unwrap();
        }
        let tx = db.begin_tx(TxMode::ReadOnly).await.unwrap();
        assert_eq!(db.node_count(&tx).await.unwrap(), 0);
        assert!(db.nodes_by_label(&tx, "Hut").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_read_only_tx_rejects_writes() {
        let db = MemoryBackend::new();
        let mut tx = db.begin_tx(TxMode::ReadOnly).await.unwrap();
        let err = db.create_node(&mut tx, &["Hut"], hut("A")).await.unwrap_err();
        assert!(matches!(err, Error::TxError(_)));
    }

    #[tokio::test]
    async fn test_unavailable_store() {
        let db = MemoryBackend::new();
        db.set_available(false);
        assert!(matches!(db.ping().await, Err(Error::StoreUnavailable(_))));
        assert!(matches!(db.begin_tx(TxMode::ReadOnly).await, Err(Error::StoreUnavailable(_))));

        db.set_available(true);
        db.ping().await.unwrap();

        db.shutdown().await.unwrap();
        assert!(matches!(db.ping().await, Err(Error::StoreUnavailable(_))));
    }

    #[tokio::test]
    async fn test_fail_after_writes() {
        let db = MemoryBackend::new();
        db.fail_after_writes(1);
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        db.create_node(&mut tx, &["Hut"], hut("A")).await.unwrap();
        let err = db.create_node(&mut tx, &["Hut"], hut("B")).await.unwrap_err();
        assert!(err.is_transient());
        db.rollback_tx(tx).await.unwrap();

        db.clear_write_failures();
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        db.create_node(&mut tx, &["Hut"], hut("B")).await.unwrap();
        db.commit_tx(tx).await.unwrap();
    }

    #[tokio::test]
    async fn test_create_index_is_idempotent() {
        let db = MemoryBackend::new();
        for spec in crate::index::hut_indexes() {
            db.create_index(&spec).await.unwrap();
            db.create_index(&spec).await.unwrap();
        }
        assert_eq!(db.indexes().await.unwrap().len(), 3);
    }
}
