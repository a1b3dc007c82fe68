//! Prometheus gauges mirroring catalog snapshots
//!
//! The catalog never updates these on its own. The telemetry path takes a
//! [`CatalogStats`] snapshot and hands it to [`record_catalog_stats`].
//! Gauges are registered lazily on first access using once_cell::Lazy.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use prometheus::core::Collector;
use prometheus::{register_int_gauge, register_int_gauge_vec, IntGauge, IntGaugeVec};

use crate::stats::CatalogStats;

/// Number of collections loaded on this node
pub static CATALOG_COLLECTIONS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "qnode_catalog_collections",
        "Number of collections loaded on this node"
    )
    .expect("Failed to register catalog collections gauge")
});

/// Number of partitions loaded on this node
pub static CATALOG_PARTITIONS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "qnode_catalog_partitions",
        "Number of partitions loaded on this node"
    )
    .expect("Failed to register catalog partitions gauge")
});

/// Number of segments loaded on this node
pub static CATALOG_SEGMENTS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "qnode_catalog_segments",
        "Number of segments loaded on this node"
    )
    .expect("Failed to register catalog segments gauge")
});

/// Segments per loaded collection
pub static COLLECTION_SEGMENTS: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "qnode_collection_segments",
        "Number of segments loaded per collection",
        &["collection_id", "collection_name"]
    )
    .expect("Failed to register per-collection segments gauge")
});

fn to_gauge(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Label values of every per-collection series currently exported.
fn published_collection_labels() -> Vec<(String, String)> {
    COLLECTION_SEGMENTS
        .collect()
        .iter()
        .flat_map(|family| family.get_metric())
        .map(|metric| {
            let mut id = String::new();
            let mut name = String::new();
            for pair in metric.get_label() {
                match pair.get_name() {
                    "collection_id" => id = pair.get_value().to_string(),
                    "collection_name" => name = pair.get_value().to_string(),
                    _ => {}
                }
            }
            (id, name)
        })
        .collect()
}

/// Publishes a snapshot. Per-collection series of released collections are
/// dropped; series still present are updated in place.
pub fn record_catalog_stats(stats: &CatalogStats) {
    CATALOG_COLLECTIONS.set(to_gauge(stats.collection_num));
    CATALOG_PARTITIONS.set(to_gauge(stats.partition_num));
    CATALOG_SEGMENTS.set(to_gauge(stats.segment_num));

    let mut live = HashSet::with_capacity(stats.collections.len());
    for collection in &stats.collections {
        let id = collection.collection_id.to_string();
        COLLECTION_SEGMENTS
            .with_label_values(&[id.as_str(), collection.name.as_str()])
            .set(to_gauge(collection.segment_num));
        live.insert((id, collection.name.clone()));
    }

    for (id, name) in published_collection_labels() {
        if !live.contains(&(id.clone(), name.clone())) {
            // Already gone if a concurrent publisher removed it first.
            let _ = COLLECTION_SEGMENTS.remove_label_values(&[id.as_str(), name.as_str()]);
        }
    }
}
