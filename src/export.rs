//! Cypher export — serialize the hut network as a merge-and-set script.
//!
//! Every statement is a `MERGE ... SET`, so the script is idempotent: it
//! can be replayed into Neo4j (or Aura) any number of times.
//!
//! ```text
//! MERGE (h:Hut {name: 'Hotell Riksgränsen'}) SET h.hut_id = 2;
//! MATCH (a:Hut {name: 'Hotell Riksgränsen'}), (b:Hut {name: 'Unna Allakas Fjällstuga'})
//! MERGE (a)-[r:LINK]->(b)
//! SET r.distance_km = 30.0, r.dplus_m = 757.0, r.dminus_m = 556.0;
//! ```

use std::collections::HashMap;
use std::io::Write;

use crate::model::*;
use crate::model::link::{DISTANCE_KM, DMINUS_M, DPLUS_M};
use crate::storage::StorageBackend;
use crate::tx::TxMode;
use crate::Result;

/// Counts reported in the script header and returned to the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub huts: usize,
    pub links: usize,
}

/// Write all huts and `LINK` edges as a Cypher script.
///
/// Huts are ordered by name, links by (from, to) name. Links whose
/// endpoints have no name are skipped since they cannot be matched on
/// replay.
pub async fn export_cypher_script<B: StorageBackend>(
    backend: &B,
    writer: &mut dyn Write,
) -> Result<ExportSummary> {
    let tx = backend.begin_tx(TxMode::ReadOnly).await?;
    let nodes = backend.nodes_by_label(&tx, HUT_LABEL).await?;
    let rels = backend.relationships_by_type(&tx, HUT_LABEL, LINK_TYPE).await?;
    backend.commit_tx(tx).await?;

    let names: HashMap<NodeId, &str> = nodes
        .iter()
        .filter_map(|n| Some((n.id, n.get("name")?.as_str()?)))
        .collect();

    let mut huts: Vec<&Node> = nodes.iter().filter(|n| names.contains_key(&n.id)).collect();
    huts.sort_by_key(|n| (names[&n.id], n.id));

    let mut links: Vec<(&str, &str, &Relationship)> = rels
        .iter()
        .filter_map(|r| Some((*names.get(&r.src)?, *names.get(&r.dst)?, r)))
        .collect();
    links.sort_by_key(|(from, to, r)| (*from, *to, r.id));

    writeln!(writer, "// hutlink Cypher export")?;
    writeln!(writer, "// Generated: {}", chrono::Utc::now().to_rfc3339())?;
    writeln!(writer, "// Huts: {}", huts.len())?;
    writeln!(writer, "// Links: {}", links.len())?;
    writeln!(writer)?;

    for node in &huts {
        let name = Value::from(names[&node.id]).to_cypher();
        let set = format_set("h", &node.properties, &["name"]);
        if set.is_empty() {
            writeln!(writer, "MERGE (h:{HUT_LABEL} {{name: {name}}});")?;
        } else {
            writeln!(writer, "MERGE (h:{HUT_LABEL} {{name: {name}}}) SET {set};")?;
        }
    }

    writeln!(writer)?;
    for (from, to, rel) in &links {
        writeln!(
            writer,
            "MATCH (a:{HUT_LABEL} {{name: {}}}), (b:{HUT_LABEL} {{name: {}}})",
            Value::from(*from).to_cypher(),
            Value::from(*to).to_cypher(),
        )?;
        let set = format_set("r", &rel.properties, &[]);
        if set.is_empty() {
            writeln!(writer, "MERGE (a)-[r:{LINK_TYPE}]->(b);")?;
        } else {
            writeln!(writer, "MERGE (a)-[r:{LINK_TYPE}]->(b)")?;
            writeln!(writer, "SET {set};")?;
        }
    }

    Ok(ExportSummary { huts: huts.len(), links: links.len() })
}

/// `var.key = literal` pairs for a SET clause. The link measures come
/// first in their usual order, then the rest alphabetically.
fn format_set(var: &str, props: &PropertyMap, skip: &[&str]) -> String {
    const LEADING: [&str; 3] = [DISTANCE_KM, DPLUS_M, DMINUS_M];
    let rank = |k: &str| LEADING.iter().position(|l| *l == k).unwrap_or(LEADING.len());

    let mut keys: Vec<&String> = props.keys().filter(|k| !skip.contains(&k.as_str())).collect();
    keys.sort_by(|a, b| (rank(a.as_str()), a.as_str()).cmp(&(rank(b.as_str()), b.as_str())));
    keys.iter()
        .map(|k| format!("{var}.{k} = {}", props[*k].to_cypher()))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_set_orders_link_measures_first() {
        let props = LinkAttributes::new(30.0, 556.0, 757.0).with_polyline("o}w").to_properties();
        assert_eq!(
            format_set("r", &props, &[]),
            "r.distance_km = 30.0, r.dplus_m = 556.0, r.dminus_m = 757.0, r.geometry_polyline = 'o}w'"
        );
    }

    #[test]
    fn test_format_set_skips_keys() {
        let props = Hut::new("Sälka").with_id(4).to_properties();
        assert_eq!(format_set("h", &props, &["name"]), "h.hut_id = 4");
    }
}
