//! # hutlink — Hut Network Link Loader
//!
//! Loads path segments between hiking huts into a property graph. Huts are
//! `:Hut` nodes keyed by name; segments are directed `:LINK` relationships
//! carrying distance, ascent (`dplus_m`) and descent (`dminus_m`).
//!
//! The central operation is an idempotent bidirectional upsert: both
//! directions of a segment are written in one transaction, with ascent and
//! descent swapped on the way back.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hutlink::{HutGraph, Hut, LinkAttributes};
//!
//! # async fn example() -> hutlink::Result<()> {
//! let graph = HutGraph::open_memory().await?;
//! graph.add_hut(&Hut::new("Unna Allakas Fjällstuga")).await?;
//! graph.add_hut(&Hut::new("Hotell Riksgränsen")).await?;
//!
//! graph.upsert_bidirectional_link(
//!     "Unna Allakas Fjällstuga",
//!     "Hotell Riksgränsen",
//!     LinkAttributes::new(30.0, 556.0, 757.0),
//! ).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Storage Backends
//!
//! | Backend | Config | Description |
//! |---------|--------|-------------|
//! | Memory | `memory` (default) | In-memory graph with undo-log transactions |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod storage;
pub mod tx;
pub mod index;
pub mod link;
pub mod retry;
pub mod config;
pub mod fixture;
pub mod export;

// ============================================================================
// Re-exports
// ============================================================================

pub use model::{
    Node, Relationship, Value, PropertyMap, NodeId, RelId,
    Hut, LinkAttributes, HUT_LABEL, LINK_TYPE,
};
pub use storage::{StorageBackend, BackendConfig, MemoryBackend, MergeOutcome};
pub use tx::{Transaction, TxMode, TxId};
pub use link::{BidirectionalLink, LinkReport, LinkWrite};
pub use retry::RetryPolicy;
pub use config::Settings;
pub use fixture::{Fixture, LinkFixture, LoadReport};

use tracing::{debug, info, warn};

// ============================================================================
// Top-level graph handle
// ============================================================================

/// The primary entry point. A `HutGraph` wraps a storage backend and the
/// settings that govern writes to it.
pub struct HutGraph<B: StorageBackend> {
    backend: B,
    settings: Settings,
}

impl<B: StorageBackend> HutGraph<B> {
    /// Create a graph over the given backend.
    pub fn with_backend(backend: B, settings: Settings) -> Self {
        Self { backend, settings }
    }

    /// Access the underlying backend (for advanced use).
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Check that the store answers.
    pub async fn verify_connection(&self) -> Result<()> {
        self.backend.ping().await
    }

    /// Register the hut indexes (id, name, location). Safe to repeat.
    pub async fn ensure_indexes(&self) -> Result<()> {
        for spec in index::hut_indexes() {
            self.backend.create_index(&spec).await?;
            debug!(index = %spec.name, "index ensured");
        }
        Ok(())
    }

    /// Shut the store down. Further calls fail with `StoreUnavailable`.
    pub async fn close(&self) -> Result<()> {
        info!("closing hut graph store");
        self.backend.shutdown().await
    }

    // ========================================================================
    // Huts
    // ========================================================================

    /// Store a new hut. Names are not checked for uniqueness.
    pub async fn add_hut(&self, hut: &Hut) -> Result<NodeId> {
        hut.validate()?;
        let mut tx = self.backend.begin_tx(TxMode::ReadWrite).await?;
        let result = self.backend.create_node(&mut tx, &[HUT_LABEL], hut.to_properties()).await;
        self.finish(tx, result).await
    }

    /// Create the hut if no hut has its name, otherwise overwrite the
    /// stored attributes. Returns the node and whether it was created.
    pub async fn merge_hut(&self, hut: &Hut) -> Result<(NodeId, bool)> {
        hut.validate()?;
        let mut tx = self.backend.begin_tx(TxMode::ReadWrite).await?;
        let result = link::merge_hut(&self.backend, &mut tx, hut).await;
        self.finish(tx, result).await
    }

    /// Import a hut under a freshly assigned `hut_id` (max + 1, or 1 in an
    /// empty store), so it can be addressed by `create_link`. Coordinates
    /// are required. Any `hut_id` on `hut` is ignored.
    pub async fn import_hut(&self, hut: &Hut) -> Result<Hut> {
        if hut.latitude.is_none() || hut.longitude.is_none() {
            return Err(Error::InvalidHut(format!("{}: import needs latitude and longitude", hut.name)));
        }
        hut.validate()?;
        let imported = retry::retry(&self.settings.retry, "import_hut", move || async move {
            let mut tx = self.backend.begin_tx(TxMode::ReadWrite).await?;
            let result = link::import_hut(&self.backend, &mut tx, hut).await;
            self.finish(tx, result).await
        })
        .await?;

        info!(name = %imported.name, hut_id = ?imported.hut_id, osm_id = ?imported.osm_id, "hut imported");
        Ok(imported)
    }

    /// All huts, ordered by name.
    pub async fn huts(&self) -> Result<Vec<Hut>> {
        let tx = self.backend.begin_tx(TxMode::ReadOnly).await?;
        let result = self.backend.nodes_by_label(&tx, HUT_LABEL).await;
        let nodes = self.finish(tx, result).await?;
        let mut huts: Vec<Hut> = nodes.iter().filter_map(Hut::from_node).collect();
        huts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(huts)
    }

    // ========================================================================
    // Links
    // ========================================================================

    /// Write `a -> b` with `attrs` and `b -> a` with ascent and descent
    /// swapped, creating either edge if absent and overwriting it otherwise.
    ///
    /// Both huts are resolved before anything is written; a missing or
    /// ambiguous name aborts with no mutation. The two writes share one
    /// transaction, so either both edges are written or neither is.
    /// Transient store failures are retried per the configured policy.
    pub async fn upsert_bidirectional_link(
        &self,
        a: &str,
        b: &str,
        attrs: LinkAttributes,
    ) -> Result<BidirectionalLink> {
        attrs.validate(self.settings.max_distance_km)?;
        if a == b {
            return Err(Error::InvalidLink(format!("'{a}' cannot link to itself")));
        }
        let attrs = &attrs;
        let outcome = retry::retry(&self.settings.retry, "upsert_bidirectional_link", move || {
            self.try_upsert_bidirectional(a, b, attrs)
        })
        .await?;

        info!(
            from = a, to = b,
            distance_km = attrs.distance_km, dplus_m = attrs.dplus_m, dminus_m = attrs.dminus_m,
            forward_created = outcome.forward.created, backward_created = outcome.backward.created,
            "LINK upserted both ways"
        );
        Ok(outcome)
    }

    async fn try_upsert_bidirectional(
        &self,
        a: &str,
        b: &str,
        attrs: &LinkAttributes,
    ) -> Result<BidirectionalLink> {
        let mut tx = self.backend.begin_tx(TxMode::ReadWrite).await?;
        let result = link::upsert_bidirectional(&self.backend, &mut tx, a, b, attrs).await;
        self.finish(tx, result).await
    }

    /// Id-keyed variant used by the admin surface: always writes
    /// `from -> to`, and `to -> from` (mirrored) when `bidirectional`.
    pub async fn create_link(
        &self,
        from_hut_id: i64,
        to_hut_id: i64,
        attrs: LinkAttributes,
        bidirectional: bool,
    ) -> Result<LinkReport> {
        attrs.validate(self.settings.max_distance_km)?;
        if from_hut_id == to_hut_id {
            return Err(Error::InvalidLink(format!("hut {from_hut_id} cannot link to itself")));
        }
        let attrs = &attrs;
        let report = retry::retry(&self.settings.retry, "create_link", move || async move {
            let mut tx = self.backend.begin_tx(TxMode::ReadWrite).await?;
            let result =
                link::create_link_by_id(&self.backend, &mut tx, from_hut_id, to_hut_id, attrs, bidirectional).await;
            self.finish(tx, result).await
        })
        .await?;

        info!(
            from_hut_id, to_hut_id, bidirectional,
            forward_created = report.forward.created,
            backward_written = report.backward.is_some(),
            "LINK created"
        );
        Ok(report)
    }

    /// The attributes of the `a -> b` edge, if there is one.
    pub async fn link_between(&self, a: &str, b: &str) -> Result<Option<LinkAttributes>> {
        let tx = self.backend.begin_tx(TxMode::ReadOnly).await?;
        let result = link::read_link(&self.backend, &tx, a, b).await;
        self.finish(tx, result).await
    }

    /// Number of `LINK` edges in the store.
    pub async fn link_count(&self) -> Result<usize> {
        let tx = self.backend.begin_tx(TxMode::ReadOnly).await?;
        let result = self
            .backend
            .relationships_by_type(&tx, HUT_LABEL, LINK_TYPE)
            .await
            .map(|rels| rels.len());
        self.finish(tx, result).await
    }

    /// Commit on success, roll back on failure. The operation's own error
    /// wins over a rollback error.
    async fn finish<T>(&self, tx: B::Tx, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                self.backend.commit_tx(tx).await?;
                Ok(value)
            }
            Err(e) => {
                let tx_id = tx.id();
                if let Err(rollback_err) = self.backend.rollback_tx(tx).await {
                    warn!(tx = %tx_id, error = %rollback_err, "rollback failed");
                }
                Err(e)
            }
        }
    }
}

/// In-memory graph for testing and embedding.
impl HutGraph<MemoryBackend> {
    pub async fn open_memory() -> Result<Self> {
        Self::open(Settings::default()).await
    }

    /// Open the backend named in `settings`.
    pub async fn open(settings: Settings) -> Result<Self> {
        let backend = match settings.backend {
            BackendConfig::Memory => MemoryBackend::new(),
        };
        info!(backend = ?settings.backend, "hut graph store opened");
        Ok(Self::with_backend(backend, settings))
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Hut not found: '{name}'")]
    NotFound { name: String },

    #[error("Ambiguous hut name '{name}': {count} huts match")]
    AmbiguousMatch { name: String, count: usize },

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Invalid link: {0}")]
    InvalidLink(String),

    #[error("Invalid hut: {0}")]
    InvalidHut(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Transaction error: {0}")]
    TxError(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Fixture error: {0}")]
    Fixture(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Worth retrying: the store may answer on a later attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::StoreUnavailable(_))
    }

    /// The hut name the error refers to, when there is one.
    pub fn hut_name(&self) -> Option<&str> {
        match self {
            Error::NotFound { name } | Error::AmbiguousMatch { name, .. } => Some(name),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
