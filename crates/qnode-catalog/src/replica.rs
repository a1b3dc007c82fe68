//! The `Replica` facade: all three registries behind one reader/writer lock.
//!
//! Every public method is one critical section. Reads take the shared lock;
//! every `add_*`/`remove_*` takes the exclusive lock and checks containment
//! before it mutates anything, so a failed call leaves the catalog untouched.
//! Cascading removals always drop segments first, then partitions, then the
//! collection itself.
//!
//! Values handed out are owned copies; nothing returned aliases the live maps.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use parking_lot::RwLock;
use qnode_core::{
    CatalogConfig, CollectionId, CollectionMeta, CoreError, CoreResult, QueryNodeConfig,
    SegmentId,
};
use tracing::{debug, error, info};

use crate::collection::{Collection, CollectionRegistry};
use crate::partition::{partition_key, Partition, PartitionRegistry};
use crate::segment::{Segment, SegmentRegistry};
use crate::stats::{CatalogStats, CollectionStats};

/// The verified contents of one collection, ready to be dropped.
#[derive(Debug)]
struct CollectionRelease {
    collection_id: CollectionId,
    tags: Vec<String>,
    segment_ids: Vec<SegmentId>,
}

/// What a cascading removal dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Released {
    partitions: usize,
    segments: usize,
}

#[derive(Debug)]
struct CatalogState {
    collections: CollectionRegistry,
    partitions: PartitionRegistry,
    segments: SegmentRegistry,
}

impl CatalogState {
    fn new(config: &CatalogConfig) -> Self {
        Self {
            collections: CollectionRegistry::with_capacity(config.collection_capacity),
            partitions: PartitionRegistry::with_capacity(config.collection_capacity),
            segments: SegmentRegistry::with_capacity(config.segment_capacity),
        }
    }

    fn add_collection(&mut self, meta: CollectionMeta, meta_blob: Bytes) -> CoreResult<()> {
        let collection_id = meta.id;
        if self.collections.contains(collection_id) {
            return Err(CoreError::already_exists("collection", collection_id));
        }

        self.partitions.register_collection(collection_id)?;
        self.collections.insert(Collection::new(meta, meta_blob))
    }

    /// Collects and verifies everything a collection release would drop.
    fn plan_collection_release(
        &self,
        collection_id: CollectionId,
    ) -> CoreResult<CollectionRelease> {
        self.collections.get(collection_id)?;

        let mut tags = Vec::new();
        let mut segment_ids = Vec::new();
        for partition in self.partitions.of_collection(collection_id)? {
            segment_ids.extend(self.owned_segments(partition)?);
            tags.push(partition.tag().to_string());
        }

        Ok(CollectionRelease {
            collection_id,
            tags,
            segment_ids,
        })
    }

    /// Applies a release produced by `plan_collection_release` against the
    /// same unmodified state.
    fn apply_collection_release(&mut self, release: &CollectionRelease) -> CoreResult<Released> {
        let collection_id = release.collection_id;
        for segment_id in &release.segment_ids {
            self.segments.remove(*segment_id)?;
        }
        for tag in &release.tags {
            self.partitions.remove(collection_id, tag)?;
        }
        self.partitions.unregister_collection(collection_id)?;
        self.collections.remove(collection_id)?;

        Ok(Released {
            partitions: release.tags.len(),
            segments: release.segment_ids.len(),
        })
    }

    fn remove_collection(&mut self, collection_id: CollectionId) -> CoreResult<Released> {
        let release = self.plan_collection_release(collection_id)?;
        self.apply_collection_release(&release)
    }

    /// Releases every collection, or none of them if any release fails to
    /// verify.
    fn remove_all(&mut self) -> CoreResult<usize> {
        let releases = self
            .collections
            .ids()
            .into_iter()
            .map(|id| self.plan_collection_release(id))
            .collect::<CoreResult<Vec<_>>>()?;

        for release in &releases {
            self.apply_collection_release(release)?;
        }
        Ok(releases.len())
    }

    fn add_partition(&mut self, collection_id: CollectionId, tag: &str) -> CoreResult<()> {
        self.collections.get(collection_id)?;
        self.partitions.insert(collection_id, tag)
    }

    fn remove_partition(&mut self, collection_id: CollectionId, tag: &str) -> CoreResult<Released> {
        let partition = self.partitions.get(collection_id, tag)?;
        let segment_ids = self.owned_segments(partition)?;

        for segment_id in &segment_ids {
            self.segments.remove(*segment_id)?;
        }
        self.partitions.remove(collection_id, tag)?;

        Ok(Released {
            partitions: 1,
            segments: segment_ids.len(),
        })
    }

    fn add_segment(
        &mut self,
        segment_id: SegmentId,
        partition_tag: &str,
        collection_id: CollectionId,
    ) -> CoreResult<()> {
        self.collections.get(collection_id)?;
        let partition = self.partitions.get_mut(collection_id, partition_tag)?;
        if self.segments.contains(segment_id) {
            return Err(CoreError::already_exists("segment", segment_id));
        }
        if partition.contains_segment(segment_id) {
            return Err(CoreError::invariant_violation(format!(
                "partition {} lists segment {segment_id} which is not loaded",
                partition_key(collection_id, partition_tag)
            )));
        }

        self.segments
            .insert(Segment::new(segment_id, collection_id, partition_tag))?;
        partition.attach_segment(segment_id);
        Ok(())
    }

    fn remove_segment(&mut self, segment_id: SegmentId) -> CoreResult<()> {
        let segment = self.segments.get(segment_id)?;
        let collection_id = segment.collection_id();
        let tag = segment.partition_tag().to_string();

        let partition = self
            .partitions
            .get_mut(collection_id, &tag)
            .ok()
            .filter(|p| p.contains_segment(segment_id))
            .ok_or_else(|| {
                CoreError::invariant_violation(format!(
                    "segment {segment_id} is not listed by its partition {}",
                    partition_key(collection_id, &tag)
                ))
            })?;

        partition.detach_segment(segment_id);
        self.segments.remove(segment_id)?;
        Ok(())
    }

    /// Segment ids of a partition, after confirming each one is loaded and
    /// points back at that partition.
    fn owned_segments(&self, partition: &Partition) -> CoreResult<Vec<SegmentId>> {
        let key = || partition_key(partition.collection_id(), partition.tag());
        partition
            .segment_ids()
            .into_iter()
            .map(|segment_id| match self.segments.get(segment_id) {
                Ok(segment) if segment.belongs_to(partition.collection_id(), partition.tag()) => {
                    Ok(segment_id)
                }
                Ok(segment) => Err(CoreError::invariant_violation(format!(
                    "partition {} lists segment {segment_id} owned by {}",
                    key(),
                    partition_key(segment.collection_id(), segment.partition_tag())
                ))),
                Err(_) => Err(CoreError::invariant_violation(format!(
                    "partition {} lists segment {segment_id} which is not loaded",
                    key()
                ))),
            })
            .collect()
    }

    fn collection_segment_ids(&self, collection_id: CollectionId) -> CoreResult<Vec<SegmentId>> {
        self.collections.get(collection_id)?;
        let mut ids: Vec<_> = self
            .partitions
            .of_collection(collection_id)?
            .into_iter()
            .flat_map(Partition::segment_ids)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    fn stats(&self, node_id: u64) -> CoreResult<CatalogStats> {
        let mut collections = Vec::with_capacity(self.collections.len());
        for collection in self.collections.iter() {
            let partitions = self.partitions.of_collection(collection.id())?;
            collections.push(CollectionStats {
                collection_id: collection.id(),
                name: collection.name().to_string(),
                partition_num: partitions.len(),
                segment_num: partitions.iter().map(|p| p.segment_num()).sum(),
            });
        }
        collections.sort_unstable_by_key(|c| c.collection_id);

        Ok(CatalogStats {
            node_id,
            collection_num: self.collections.len(),
            partition_num: self.partitions.len(),
            segment_num: self.segments.len(),
            collections,
            captured_at: Utc::now(),
        })
    }

    fn check_invariants(&self) -> CoreResult<()> {
        self.collections.check_name_index()?;

        for collection_id in self.partitions.collection_ids() {
            if !self.collections.contains(collection_id) {
                return Err(CoreError::invariant_violation(format!(
                    "partition set exists for unloaded collection {collection_id}"
                )));
            }
        }
        for collection in self.collections.iter() {
            self.partitions.tags_of_collection(collection.id())?;
        }

        let mut listed = 0;
        for partition in self.partitions.iter() {
            listed += self.owned_segments(partition)?.len();
        }

        for segment in self.segments.iter() {
            let listed_by_owner = self
                .partitions
                .get(segment.collection_id(), segment.partition_tag())
                .is_ok_and(|p| p.contains_segment(segment.segment_id()));
            if !listed_by_owner {
                return Err(CoreError::invariant_violation(format!(
                    "segment {} is orphaned",
                    segment.segment_id()
                )));
            }
        }

        if listed != self.segments.len() {
            return Err(CoreError::invariant_violation(format!(
                "partitions list {listed} segments but {} are loaded",
                self.segments.len()
            )));
        }
        Ok(())
    }
}

fn trace_failure(operation: &'static str, err: &CoreError) {
    if matches!(err, CoreError::InvariantViolation { .. }) {
        error!(operation, error = %err, "catalog invariant violated");
    } else {
        debug!(operation, error = %err, "catalog mutation rejected");
    }
}

/// This node's catalog of loaded collections, partitions and segments.
///
/// Cloning is cheap and yields another handle to the same catalog; construct
/// one per node and hand clones to every collaborator.
#[derive(Clone)]
pub struct Replica {
    node_id: u64,
    state: Arc<RwLock<CatalogState>>,
}

impl Default for Replica {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Replica {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Replica")
            .field("node_id", &self.node_id)
            .field("collections", &self.get_collection_num())
            .field("segments", &self.get_segment_num())
            .finish()
    }
}

impl Replica {
    /// Creates an empty catalog with default sizing.
    pub fn new() -> Self {
        Self::with_config(&QueryNodeConfig::default())
    }

    /// Creates an empty catalog sized and labelled from node configuration.
    pub fn with_config(config: &QueryNodeConfig) -> Self {
        Self {
            node_id: config.node_id,
            state: Arc::new(RwLock::new(CatalogState::new(&config.catalog))),
        }
    }

    pub fn node_id(&self) -> u64 {
        self.node_id
    }

    // ---- collections ----

    /// Registers a collection together with an empty partition set.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` if a collection with `meta.id` is already loaded.
    pub fn add_collection(
        &self,
        meta: CollectionMeta,
        meta_blob: impl Into<Bytes>,
    ) -> CoreResult<()> {
        let collection_id = meta.id;
        let name = meta.name().to_string();

        let result = self.state.write().add_collection(meta, meta_blob.into());
        match &result {
            Ok(()) => info!(%collection_id, %name, "collection loaded"),
            Err(err) => trace_failure("add_collection", err),
        }
        result
    }

    /// Releases a collection with all of its partitions and segments.
    ///
    /// # Errors
    ///
    /// `NotFound` if the collection is not loaded; `InvariantViolation` if the
    /// registries disagree, in which case nothing is removed.
    pub fn remove_collection(&self, collection_id: CollectionId) -> CoreResult<()> {
        let result = self.state.write().remove_collection(collection_id);
        match &result {
            Ok(released) => info!(
                %collection_id,
                partitions = released.partitions,
                segments = released.segments,
                "collection released"
            ),
            Err(err) => trace_failure("remove_collection", err),
        }
        result.map(|_| ())
    }

    pub fn get_collection_by_id(&self, collection_id: CollectionId) -> CoreResult<Collection> {
        self.state.read().collections.get(collection_id).cloned()
    }

    pub fn get_collection_by_name(&self, name: &str) -> CoreResult<Collection> {
        self.state.read().collections.get_by_name(name).cloned()
    }

    pub fn has_collection(&self, collection_id: CollectionId) -> bool {
        self.state.read().collections.contains(collection_id)
    }

    /// Number of loaded collections at the time of the call.
    pub fn get_collection_num(&self) -> usize {
        self.state.read().collections.len()
    }

    /// Loaded collection ids in ascending order.
    pub fn collection_ids(&self) -> Vec<CollectionId> {
        self.state.read().collections.ids()
    }

    // ---- partitions ----

    /// # Errors
    ///
    /// `NotFound` if the collection is not loaded; `AlreadyExists` if the tag
    /// is already present in it.
    pub fn add_partition(&self, collection_id: CollectionId, tag: &str) -> CoreResult<()> {
        let result = self.state.write().add_partition(collection_id, tag);
        match &result {
            Ok(()) => debug!(%collection_id, tag, "partition loaded"),
            Err(err) => trace_failure("add_partition", err),
        }
        result
    }

    /// Releases a partition and every segment assigned to it.
    pub fn remove_partition(&self, collection_id: CollectionId, tag: &str) -> CoreResult<()> {
        let result = self.state.write().remove_partition(collection_id, tag);
        match &result {
            Ok(released) => debug!(
                %collection_id,
                tag,
                segments = released.segments,
                "partition released"
            ),
            Err(err) => trace_failure("remove_partition", err),
        }
        result.map(|_| ())
    }

    pub fn get_partition_by_tag(
        &self,
        collection_id: CollectionId,
        tag: &str,
    ) -> CoreResult<Partition> {
        self.state.read().partitions.get(collection_id, tag).cloned()
    }

    pub fn has_partition(&self, collection_id: CollectionId, tag: &str) -> bool {
        self.state.read().partitions.contains(collection_id, tag)
    }

    pub fn get_partition_num(&self, collection_id: CollectionId) -> CoreResult<usize> {
        let state = self.state.read();
        state.collections.get(collection_id)?;
        Ok(state.partitions.of_collection(collection_id)?.len())
    }

    /// Segment ids assigned to one partition, ascending.
    pub fn partition_segment_ids(
        &self,
        collection_id: CollectionId,
        tag: &str,
    ) -> CoreResult<Vec<SegmentId>> {
        self.state
            .read()
            .partitions
            .get(collection_id, tag)
            .map(Partition::segment_ids)
    }

    /// Segment ids across every partition of a collection, ascending.
    pub fn collection_segment_ids(
        &self,
        collection_id: CollectionId,
    ) -> CoreResult<Vec<SegmentId>> {
        self.state.read().collection_segment_ids(collection_id)
    }

    // ---- segments ----

    /// Registers a fully resident segment under a live partition.
    ///
    /// # Errors
    ///
    /// `NotFound` if `(collection_id, partition_tag)` is not loaded;
    /// `AlreadyExists` if `segment_id` is loaded anywhere on this node.
    pub fn add_segment(
        &self,
        segment_id: SegmentId,
        partition_tag: &str,
        collection_id: CollectionId,
    ) -> CoreResult<()> {
        let result = self
            .state
            .write()
            .add_segment(segment_id, partition_tag, collection_id);
        match &result {
            Ok(()) => debug!(%segment_id, %collection_id, partition_tag, "segment loaded"),
            Err(err) => trace_failure("add_segment", err),
        }
        result
    }

    pub fn remove_segment(&self, segment_id: SegmentId) -> CoreResult<()> {
        let result = self.state.write().remove_segment(segment_id);
        match &result {
            Ok(()) => debug!(%segment_id, "segment released"),
            Err(err) => trace_failure("remove_segment", err),
        }
        result
    }

    pub fn get_segment_by_id(&self, segment_id: SegmentId) -> CoreResult<Segment> {
        self.state.read().segments.get(segment_id).cloned()
    }

    /// Probe used on the search path. Never fails.
    pub fn has_segment(&self, segment_id: SegmentId) -> bool {
        self.state.read().segments.contains(segment_id)
    }

    /// Number of segments loaded on this node.
    pub fn get_segment_num(&self) -> usize {
        self.state.read().segments.len()
    }

    /// Keeps the candidates that are loaded here, in their original order.
    pub fn filter_loaded_segments(&self, candidates: &[SegmentId]) -> Vec<SegmentId> {
        let state = self.state.read();
        candidates
            .iter()
            .copied()
            .filter(|id| state.segments.contains(*id))
            .collect()
    }

    // ---- whole catalog ----

    /// Releases every collection in one critical section. Returns how many
    /// collections were released.
    ///
    /// # Errors
    ///
    /// `InvariantViolation` if any collection fails to verify, in which case
    /// nothing is removed.
    pub fn free_all(&self) -> CoreResult<usize> {
        let result = self.state.write().remove_all();
        match &result {
            Ok(released) => info!(collections = *released, "catalog cleared"),
            Err(err) => trace_failure("free_all", err),
        }
        result
    }

    /// Consistent snapshot of catalog counts.
    pub fn stats(&self) -> CoreResult<CatalogStats> {
        self.state.read().stats(self.node_id)
    }

    /// Full cross-registry consistency scan. Intended for tests and debug
    /// endpoints; it walks every entry under the read lock.
    pub fn check_invariants(&self) -> CoreResult<()> {
        let result = self.state.read().check_invariants();
        if let Err(err) = &result {
            trace_failure("check_invariants", err);
        }
        result
    }
}
