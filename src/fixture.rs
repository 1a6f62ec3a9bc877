//! JSON fixtures: a batch of huts and links applied in one go.
//!
//! ```json
//! {
//!   "huts":  [{"name": "Unna Allakas Fjällstuga"}, {"name": "Hotell Riksgränsen"}],
//!   "links": [{"from": "Unna Allakas Fjällstuga", "to": "Hotell Riksgränsen",
//!              "distance_km": 30, "dplus_m": 556, "dminus_m": 757}]
//! }
//! ```
//!
//! Each link is one bidirectional upsert, attributes given in the
//! `from -> to` direction.

use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::model::{Hut, LinkAttributes};
use crate::storage::StorageBackend;
use crate::{Error, HutGraph, Result};

/// A batch of huts to seed and links to upsert.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub huts: Vec<Hut>,
    #[serde(default)]
    pub links: Vec<LinkFixture>,
}

/// One segment, measured from `from` to `to`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkFixture {
    pub from: String,
    pub to: String,
    #[serde(flatten)]
    pub attrs: LinkAttributes,
}

/// Counts of what applying a fixture changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub huts_created: usize,
    pub huts_updated: usize,
    /// Directed edges created (two per new segment).
    pub links_created: usize,
    /// Directed edges overwritten.
    pub links_updated: usize,
}

impl Fixture {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_reader(reader: impl Read) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .map_err(|e| Error::Fixture(format!("cannot open {}: {e}", path.display())))?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Seed the huts (merged by name), then upsert every link both ways.
    ///
    /// Stops at the first failing link; links applied before it stay.
    pub async fn apply<B: StorageBackend>(&self, graph: &HutGraph<B>) -> Result<LoadReport> {
        let mut report = LoadReport::default();

        for hut in &self.huts {
            let (_, created) = graph.merge_hut(hut).await?;
            if created {
                report.huts_created += 1;
            } else {
                report.huts_updated += 1;
            }
        }

        for link in &self.links {
            let outcome = graph
                .upsert_bidirectional_link(&link.from, &link.to, link.attrs.clone())
                .await?;
            for write in [outcome.forward, outcome.backward] {
                if write.created {
                    report.links_created += 1;
                } else {
                    report.links_updated += 1;
                }
            }
        }

        info!(
            huts_created = report.huts_created, huts_updated = report.huts_updated,
            links_created = report.links_created, links_updated = report.links_updated,
            "fixture applied"
        );
        Ok(report)
    }
}
