//! End-to-end tests for fixture loading and the Cypher export.

use hutlink::export::export_cypher_script;
use hutlink::{Error, Fixture, HutGraph, LinkAttributes, LoadReport};
use pretty_assertions::assert_eq;

const ABISKO_TRAIL: &str = r#"{
    "huts": [
        {"name": "Abiskojaure", "hut_id": 1, "latitude": 68.29, "longitude": 18.58, "country_code": "SE"},
        {"name": "Alesjaure", "hut_id": 2},
        {"name": "Tjäktja", "hut_id": 3}
    ],
    "links": [
        {"from": "Abiskojaure", "to": "Alesjaure", "distance_km": 20, "dplus_m": 420, "dminus_m": 130},
        {"from": "Alesjaure", "to": "Tjäktja", "distance_km": 13, "dplus_m": 310, "dminus_m": 95,
         "geometry_polyline": "o`ryK_rpnB"}
    ]
}"#;

#[tokio::test]
async fn test_fixture_loads_both_directions() {
    let graph = HutGraph::open_memory().await.unwrap();
    let report = Fixture::from_json(ABISKO_TRAIL).unwrap().apply(&graph).await.unwrap();

    assert_eq!(report, LoadReport { huts_created: 3, huts_updated: 0, links_created: 4, links_updated: 0 });
    assert_eq!(graph.link_count().await.unwrap(), 4);
    assert_eq!(
        graph.link_between("Tjäktja", "Alesjaure").await.unwrap(),
        Some(LinkAttributes::new(13.0, 95.0, 310.0).with_polyline("o`ryK_rpnB"))
    );
}

#[tokio::test]
async fn test_fixture_with_unknown_hut_fails() {
    let graph = HutGraph::open_memory().await.unwrap();
    let fixture = Fixture::from_json(
        r#"{"huts": [{"name": "Sälka"}],
            "links": [{"from": "Sälka", "to": "Singi", "distance_km": 12, "dplus_m": 50, "dminus_m": 80}]}"#,
    )
    .unwrap();

    let err = fixture.apply(&graph).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { ref name } if name == "Singi"));
    assert_eq!(graph.link_count().await.unwrap(), 0);
    assert_eq!(graph.huts().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_fixture_from_missing_file() {
    let err = Fixture::from_path("/nonexistent/huts.json").unwrap_err();
    assert!(matches!(err, Error::Fixture(_)));
}

#[tokio::test]
async fn test_export_writes_merge_script() {
    let graph = HutGraph::open_memory().await.unwrap();
    Fixture::from_json(ABISKO_TRAIL).unwrap().apply(&graph).await.unwrap();

    let mut out = Vec::new();
    let summary = export_cypher_script(graph.backend(), &mut out).await.unwrap();
    let script = String::from_utf8(out).unwrap();

    assert_eq!(summary.huts, 3);
    assert_eq!(summary.links, 4);
    assert_eq!(script.matches("MERGE (a)-[r:LINK]->(b)").count(), 4);
    assert!(script.contains(
        "MERGE (h:Hut {name: 'Abiskojaure'}) SET h.country_code = 'SE', h.hut_id = 1, h.latitude = 68.29, h.longitude = 18.58;"
    ));
    assert!(script.contains(
        "MATCH (a:Hut {name: 'Alesjaure'}), (b:Hut {name: 'Abiskojaure'})\nMERGE (a)-[r:LINK]->(b)\nSET r.distance_km = 20.0, r.dplus_m = 130.0, r.dminus_m = 420.0;"
    ));
    assert!(script.contains("r.geometry_polyline = 'o`ryK_rpnB'"));

    let abisko = script.find("{name: 'Abiskojaure'}) SET").unwrap();
    let tjaktja = script.find("{name: 'Tjäktja'}) SET").unwrap();
    assert!(abisko < tjaktja);
}
