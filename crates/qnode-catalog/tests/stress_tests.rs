//! Concurrency tests for the catalog facade
//!
//! Request handlers, segment loaders and release paths all share one
//! `Replica`. These tests hammer it from many tasks at once and then check
//! that no update was lost and that the registries still agree.
//!
//! The large variants are ignored by default.
//! Run with: cargo test --test stress_tests -- --ignored

use qnode_catalog::Replica;
use qnode_core::{CollectionId, CollectionMeta, CollectionSchema, DataType, FieldSchema, SegmentId};
use std::sync::Arc;

const COLLECTION: CollectionId = CollectionId::new(0);
const TAG: &str = "default";

fn replica_with_partition() -> Replica {
    let schema = CollectionSchema::new(
        "collection0",
        vec![FieldSchema::new("vec", DataType::VectorFloat).with_type_param("dim", "16")],
    );
    let replica = Replica::new();
    replica
        .add_collection(CollectionMeta::new(COLLECTION, schema, 0), "blob")
        .expect("collection should load");
    replica
        .add_partition(COLLECTION, TAG)
        .expect("partition should load");
    replica
}

async fn concurrent_add_segments(num_tasks: u64) {
    let replica = replica_with_partition();

    let handles: Vec<_> = (0..num_tasks)
        .map(|i| {
            let replica = replica.clone();
            tokio::spawn(async move {
                replica
                    .add_segment(SegmentId::new(i), TAG, COLLECTION)
                    .expect("Distinct segment ids should all load")
            })
        })
        .collect();

    for handle in handles {
        handle.await.expect("Task should not panic");
    }

    assert_eq!(replica.get_segment_num(), num_tasks as usize);
    for i in 0..num_tasks {
        assert!(replica.get_segment_by_id(SegmentId::new(i)).is_ok());
    }
    let partition = replica.get_partition_by_tag(COLLECTION, TAG).unwrap();
    assert_eq!(partition.segment_num(), num_tasks as usize);
    replica.check_invariants().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_add_segment_no_lost_updates() {
    concurrent_add_segments(64).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
#[ignore]
async fn stress_concurrent_add_segment_1000() {
    concurrent_add_segments(1000).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_duplicate_segment_loads_exactly_one_wins() {
    const NUM_TASKS: usize = 32;
    let replica = replica_with_partition();

    let handles: Vec<_> = (0..NUM_TASKS)
        .map(|_| {
            let replica = replica.clone();
            tokio::spawn(async move { replica.add_segment(SegmentId::new(5), TAG, COLLECTION) })
        })
        .collect();

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.expect("Task should not panic") {
            Ok(()) => succeeded += 1,
            Err(err) => assert!(err.is_already_exists(), "unexpected error: {err}"),
        }
    }

    assert_eq!(succeeded, 1);
    assert_eq!(replica.get_segment_num(), 1);
}

/// Readers never observe a segment whose partition or collection is gone.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_see_consistent_cascades() {
    const ROUNDS: u64 = 50;
    const SEGMENTS_PER_ROUND: u64 = 8;

    let replica = replica_with_partition();
    let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let replica = replica.clone();
            let stop = stop.clone();
            tokio::spawn(async move {
                let mut checks = 0u64;
                while !stop.load(std::sync::atomic::Ordering::Relaxed) {
                    replica
                        .check_invariants()
                        .expect("Catalog should be consistent at every observation");
                    let stats = replica.stats().expect("stats snapshot");
                    let per_collection: usize =
                        stats.collections.iter().map(|c| c.segment_num).sum();
                    assert_eq!(per_collection, stats.segment_num);
                    checks += 1;
                    tokio::task::yield_now().await;
                }
                checks
            })
        })
        .collect();

    let writer = {
        let replica = replica.clone();
        tokio::spawn(async move {
            for round in 0..ROUNDS {
                let base = round * SEGMENTS_PER_ROUND;
                for offset in 0..SEGMENTS_PER_ROUND {
                    replica
                        .add_segment(SegmentId::new(base + offset), TAG, COLLECTION)
                        .expect("segment should load");
                }
                replica.remove_partition(COLLECTION, TAG).expect("partition release");
                replica.add_partition(COLLECTION, TAG).expect("partition reload");
                tokio::task::yield_now().await;
            }
        })
    };

    writer.await.expect("Writer should not panic");
    stop.store(true, std::sync::atomic::Ordering::Relaxed);
    for reader in readers {
        reader.await.expect("Reader should not panic");
    }

    assert_eq!(replica.get_segment_num(), 0);
    assert!(replica.has_partition(COLLECTION, TAG));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_collection_load_and_release() {
    const NUM_COLLECTIONS: u64 = 32;
    let replica = Replica::new();

    let handles: Vec<_> = (0..NUM_COLLECTIONS)
        .map(|i| {
            let replica = replica.clone();
            tokio::spawn(async move {
                let id = CollectionId::new(i);
                let schema = CollectionSchema::new(format!("collection{i}"), Vec::new());
                replica.add_collection(CollectionMeta::new(id, schema, 0), "blob")?;
                replica.add_partition(id, TAG)?;
                // Segment ids are node-wide, so offset them per collection.
                for s in 0..4 {
                    replica.add_segment(SegmentId::new(i * 100 + s), TAG, id)?;
                }
                if i % 2 == 0 {
                    replica.remove_collection(id)?;
                }
                Ok::<_, qnode_core::CoreError>(())
            })
        })
        .collect();

    for handle in handles {
        handle
            .await
            .expect("Task should not panic")
            .expect("Operations on distinct collections should succeed");
    }

    assert_eq!(replica.get_collection_num(), (NUM_COLLECTIONS / 2) as usize);
    assert_eq!(replica.get_segment_num(), (NUM_COLLECTIONS / 2 * 4) as usize);
    replica.check_invariants().unwrap();
}
