//! Index management.

use serde::{Deserialize, Serialize};

use crate::model::HUT_LABEL;

/// A property index on one label.
///
/// A spec with several properties is a composite index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexSpec {
    pub name: String,
    pub label: String,
    pub properties: Vec<String>,
}

impl IndexSpec {
    pub fn new(
        name: impl Into<String>,
        label: impl Into<String>,
        properties: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            properties: properties.into_iter().map(Into::into).collect(),
        }
    }

    /// Cypher DDL for this index.
    pub fn to_cypher(&self) -> String {
        let props: Vec<String> = self.properties.iter().map(|p| format!("n.{p}")).collect();
        format!(
            "CREATE INDEX {} IF NOT EXISTS FOR (n:{}) ON ({})",
            self.name,
            self.label,
            props.join(", ")
        )
    }
}

/// Indexes the hut network expects: id, name, and location.
pub fn hut_indexes() -> Vec<IndexSpec> {
    vec![
        IndexSpec::new("hut_id_index", HUT_LABEL, ["hut_id"]),
        IndexSpec::new("hut_name_index", HUT_LABEL, ["name"]),
        IndexSpec::new("hut_location_index", HUT_LABEL, ["latitude", "longitude"]),
    ]
}
