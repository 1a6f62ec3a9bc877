//! # Storage Backend Trait
//!
//! The contract between the hut-network operations and the graph store.
//! Every operation the link loader needs from a store is defined here:
//! node lookup by property equality, relationship CRUD, and the
//! merge-and-set primitive the upserter is built on.
//!
//! ## Implementations
//!
//! | Backend | Module | Description |
//! |---------|--------|-------------|
//! | `MemoryBackend` | `memory` | In-memory store with undo-log transactions |

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::index::IndexSpec;
use crate::model::*;
use crate::tx::{Transaction, TxMode};
use crate::{Error, Result};

pub use memory::MemoryBackend;

// ============================================================================
// Backend Configuration
// ============================================================================

/// Which storage backend to open.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendConfig {
    /// In-memory (no persistence)
    #[default]
    Memory,
}

impl std::str::FromStr for BackendConfig {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(BackendConfig::Memory),
            other => Err(Error::Config(format!("unknown backend '{other}' (expected 'memory')"))),
        }
    }
}

// ============================================================================
// Merge outcome
// ============================================================================

/// What `merge_relationship` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOutcome {
    /// The relationship that now carries the merged properties.
    pub id: RelId,
    /// True if the relationship did not exist before the call.
    pub created: bool,
    /// Extra matching relationships found besides `id` (left untouched).
    pub duplicates: usize,
}

// ============================================================================
// StorageBackend Trait
// ============================================================================

/// The universal storage contract.
///
/// Write operations take `&mut Self::Tx` so a backend can record what it
/// must undo if the transaction is rolled back.
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// The transaction type for this backend.
    type Tx: Transaction;

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Check that the store is reachable.
    ///
    /// Returns `Error::StoreUnavailable` when it is not.
    async fn ping(&self) -> Result<()>;

    /// Shut down the backend, flushing any pending writes.
    async fn shutdown(&self) -> Result<()>;

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Begin a new transaction.
    async fn begin_tx(&self, mode: TxMode) -> Result<Self::Tx>;

    /// Commit a transaction.
    async fn commit_tx(&self, tx: Self::Tx) -> Result<()>;

    /// Roll back a transaction, undoing every write made through it.
    async fn rollback_tx(&self, tx: Self::Tx) -> Result<()>;

    // ========================================================================
    // Node CRUD
    // ========================================================================

    /// Create a node with the given labels and properties.
    async fn create_node(
        &self,
        tx: &mut Self::Tx,
        labels: &[&str],
        props: PropertyMap,
    ) -> Result<NodeId>;

    /// Get a node by ID. Returns None if not found.
    async fn get_node(&self, tx: &Self::Tx, id: NodeId) -> Result<Option<Node>>;

    /// Set a property on a node (upsert). `Value::Null` removes it.
    async fn set_node_property(
        &self,
        tx: &mut Self::Tx,
        id: NodeId,
        key: &str,
        val: Value,
    ) -> Result<()>;

    // ========================================================================
    // Relationship CRUD
    // ========================================================================

    /// Create a relationship between two existing nodes.
    async fn create_relationship(
        &self,
        tx: &mut Self::Tx,
        src: NodeId,
        dst: NodeId,
        rel_type: &str,
        props: PropertyMap,
    ) -> Result<RelId>;

    /// Get a relationship by ID.
    async fn get_relationship(&self, tx: &Self::Tx, id: RelId) -> Result<Option<Relationship>>;

    /// Set a property on a relationship (upsert). `Value::Null` removes it.
    async fn set_relationship_property(
        &self,
        tx: &mut Self::Tx,
        id: RelId,
        key: &str,
        val: Value,
    ) -> Result<()>;

    /// Relationships leaving `node`, optionally filtered by type.
    async fn outgoing_relationships(
        &self,
        tx: &Self::Tx,
        node: NodeId,
        rel_type: Option<&str>,
    ) -> Result<Vec<Relationship>>;

    /// Ensure a `src -[rel_type]-> dst` relationship exists and SET `props` on it.
    ///
    /// Neo4j: `MERGE (a)-[r:TYPE]->(b) SET r += $props`. A `Value::Null`
    /// in `props` removes that key. When several matching relationships
    /// exist the lowest id is updated.
    ///
    /// Default: scan the outgoing relationships of `src`, then create or
    /// set property by property.
    async fn merge_relationship(
        &self,
        tx: &mut Self::Tx,
        src: NodeId,
        dst: NodeId,
        rel_type: &str,
        props: PropertyMap,
    ) -> Result<MergeOutcome> {
        let mut existing: Vec<RelId> = self
            .outgoing_relationships(tx, src, Some(rel_type))
            .await?
            .into_iter()
            .filter(|r| r.dst == dst)
            .map(|r| r.id)
            .collect();
        existing.sort();

        match existing.first() {
            None => {
                let props = props.into_iter().filter(|(_, v)| !v.is_null()).collect();
                let id = self.create_relationship(tx, src, dst, rel_type, props).await?;
                Ok(MergeOutcome { id, created: true, duplicates: 0 })
            }
            Some(&id) => {
                for (key, val) in props {
                    self.set_relationship_property(tx, id, &key, val).await?;
                }
                Ok(MergeOutcome { id, created: false, duplicates: existing.len() - 1 })
            }
        }
    }

    // ========================================================================
    // Index
    // ========================================================================

    /// Register an index. Creating an index that already exists is a no-op
    /// (`CREATE INDEX ... IF NOT EXISTS`).
    async fn create_index(&self, spec: &IndexSpec) -> Result<()>;

    /// All registered indexes.
    async fn indexes(&self) -> Result<Vec<IndexSpec>>;

    // ========================================================================
    // Counts & scans
    // ========================================================================

    /// Total number of nodes.
    async fn node_count(&self, tx: &Self::Tx) -> Result<u64>;

    /// Total number of relationships.
    async fn relationship_count(&self, tx: &Self::Tx) -> Result<u64>;

    /// Find all nodes with a given label.
    async fn nodes_by_label(&self, tx: &Self::Tx, label: &str) -> Result<Vec<Node>>;

    /// Find nodes by label + property equality.
    async fn nodes_by_property(
        &self,
        tx: &Self::Tx,
        label: &str,
        key: &str,
        value: &Value,
    ) -> Result<Vec<Node>>;

    /// Find all relationships of a given type.
    ///
    /// Default: scans every node carrying `label` and collects its outgoing
    /// relationships of that type.
    async fn relationships_by_type(
        &self,
        tx: &Self::Tx,
        label: &str,
        rel_type: &str,
    ) -> Result<Vec<Relationship>> {
        let mut result = Vec::new();
        for node in self.nodes_by_label(tx, label).await? {
            result.extend(self.outgoing_relationships(tx, node.id, Some(rel_type)).await?);
        }
        result.sort_by_key(|r| r.id);
        Ok(result)
    }
}
