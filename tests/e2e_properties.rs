//! Property tests: symmetry and idempotence of bidirectional upserts.

use std::time::Duration;

use hutlink::{Hut, HutGraph, LinkAttributes, RetryPolicy, Settings};
use proptest::prelude::*;

fn attrs_strategy() -> impl Strategy<Value = LinkAttributes> {
    (0.0f64..=100.0, 0.0f64..3000.0, 0.0f64..3000.0)
        .prop_map(|(d, up, down)| LinkAttributes::new(d, up, down))
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap()
}

async fn two_huts() -> HutGraph<hutlink::MemoryBackend> {
    let settings = Settings::default().with_retry(RetryPolicy { max_attempts: 1, base_delay: Duration::ZERO });
    let graph = HutGraph::open(settings).await.unwrap();
    graph.add_hut(&Hut::new("A")).await.unwrap();
    graph.add_hut(&Hut::new("B")).await.unwrap();
    graph
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_reverse_edge_mirrors_forward(attrs in attrs_strategy()) {
        let (forward, backward) = runtime().block_on(async {
            let graph = two_huts().await;
            graph.upsert_bidirectional_link("A", "B", attrs.clone()).await.unwrap();
            (
                graph.link_between("A", "B").await.unwrap().unwrap(),
                graph.link_between("B", "A").await.unwrap().unwrap(),
            )
        });
        prop_assert_eq!(&forward, &attrs);
        prop_assert_eq!(forward.distance_km, backward.distance_km);
        prop_assert_eq!(forward.dplus_m, backward.dminus_m);
        prop_assert_eq!(forward.dminus_m, backward.dplus_m);
    }

    #[test]
    fn prop_last_write_wins_without_duplicates(
        writes in proptest::collection::vec(attrs_strategy(), 1..6),
    ) {
        let (count, forward) = runtime().block_on(async {
            let graph = two_huts().await;
            for attrs in &writes {
                graph.upsert_bidirectional_link("A", "B", attrs.clone()).await.unwrap();
            }
            (
                graph.link_count().await.unwrap(),
                graph.link_between("A", "B").await.unwrap().unwrap(),
            )
        });
        prop_assert_eq!(count, 2);
        prop_assert_eq!(&forward, writes.last().unwrap());
    }
}
