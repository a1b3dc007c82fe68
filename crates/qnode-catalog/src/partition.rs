//! Partition registry, grouped per owning collection.

use std::collections::{BTreeMap, HashMap};

use qnode_core::{CollectionId, CoreError, CoreResult, SegmentId};
use roaring::RoaringTreemap;

/// A partition of a loaded collection and the segments assigned to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    collection_id: CollectionId,
    tag: String,
    segment_ids: RoaringTreemap,
}

impl Partition {
    pub(crate) fn new(collection_id: CollectionId, tag: impl Into<String>) -> Self {
        Self {
            collection_id,
            tag: tag.into(),
            segment_ids: RoaringTreemap::new(),
        }
    }

    #[must_use]
    pub fn collection_id(&self) -> CollectionId {
        self.collection_id
    }

    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Segment ids in ascending order.
    #[must_use]
    pub fn segment_ids(&self) -> Vec<SegmentId> {
        self.segment_ids.iter().map(SegmentId::new).collect()
    }

    #[must_use]
    pub fn segment_num(&self) -> usize {
        usize::try_from(self.segment_ids.len()).unwrap_or(usize::MAX)
    }

    #[must_use]
    pub fn contains_segment(&self, segment_id: SegmentId) -> bool {
        self.segment_ids.contains(segment_id.as_u64())
    }

    pub(crate) fn attach_segment(&mut self, segment_id: SegmentId) -> bool {
        self.segment_ids.insert(segment_id.as_u64())
    }

    pub(crate) fn detach_segment(&mut self, segment_id: SegmentId) -> bool {
        self.segment_ids.remove(segment_id.as_u64())
    }
}

pub(crate) fn partition_key(collection_id: CollectionId, tag: &str) -> String {
    format!("{collection_id}/{tag}")
}

/// Partitions keyed by collection, then by tag.
///
/// Every loaded collection owns an entry here, possibly empty. The entry is
/// created and dropped together with the collection.
#[derive(Debug, Default)]
pub(crate) struct PartitionRegistry {
    by_collection: HashMap<CollectionId, BTreeMap<String, Partition>>,
}

impl PartitionRegistry {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            by_collection: HashMap::with_capacity(capacity),
        }
    }

    pub(crate) fn register_collection(&mut self, collection_id: CollectionId) -> CoreResult<()> {
        if self.by_collection.contains_key(&collection_id) {
            return Err(CoreError::invariant_violation(format!(
                "partition set for collection {collection_id} outlived its collection"
            )));
        }
        self.by_collection.insert(collection_id, BTreeMap::new());
        Ok(())
    }

    /// Drops the (already emptied) partition set of a collection.
    pub(crate) fn unregister_collection(&mut self, collection_id: CollectionId) -> CoreResult<()> {
        match self.by_collection.get(&collection_id) {
            None => Err(missing_partition_set(collection_id)),
            Some(set) if !set.is_empty() => Err(CoreError::invariant_violation(format!(
                "collection {collection_id} still owns {} partitions",
                set.len()
            ))),
            Some(_) => {
                self.by_collection.remove(&collection_id);
                Ok(())
            }
        }
    }

    pub(crate) fn insert(&mut self, collection_id: CollectionId, tag: &str) -> CoreResult<()> {
        let partitions = self
            .by_collection
            .get_mut(&collection_id)
            .ok_or_else(|| CoreError::not_found("collection", collection_id))?;

        if partitions.contains_key(tag) {
            return Err(CoreError::already_exists(
                "partition",
                partition_key(collection_id, tag),
            ));
        }

        partitions.insert(tag.to_string(), Partition::new(collection_id, tag));
        Ok(())
    }

    pub(crate) fn remove(
        &mut self,
        collection_id: CollectionId,
        tag: &str,
    ) -> CoreResult<Partition> {
        self.by_collection
            .get_mut(&collection_id)
            .and_then(|partitions| partitions.remove(tag))
            .ok_or_else(|| CoreError::not_found("partition", partition_key(collection_id, tag)))
    }

    pub(crate) fn get(&self, collection_id: CollectionId, tag: &str) -> CoreResult<&Partition> {
        self.by_collection
            .get(&collection_id)
            .and_then(|partitions| partitions.get(tag))
            .ok_or_else(|| CoreError::not_found("partition", partition_key(collection_id, tag)))
    }

    pub(crate) fn get_mut(
        &mut self,
        collection_id: CollectionId,
        tag: &str,
    ) -> CoreResult<&mut Partition> {
        self.by_collection
            .get_mut(&collection_id)
            .and_then(|partitions| partitions.get_mut(tag))
            .ok_or_else(|| CoreError::not_found("partition", partition_key(collection_id, tag)))
    }

    pub(crate) fn contains(&self, collection_id: CollectionId, tag: &str) -> bool {
        self.by_collection
            .get(&collection_id)
            .is_some_and(|partitions| partitions.contains_key(tag))
    }

    /// Partitions of a collection, ordered by tag.
    pub(crate) fn of_collection(
        &self,
        collection_id: CollectionId,
    ) -> CoreResult<Vec<&Partition>> {
        self.by_collection
            .get(&collection_id)
            .map(|partitions| partitions.values().collect())
            .ok_or_else(|| missing_partition_set(collection_id))
    }

    pub(crate) fn tags_of_collection(
        &self,
        collection_id: CollectionId,
    ) -> CoreResult<Vec<String>> {
        self.by_collection
            .get(&collection_id)
            .map(|partitions| partitions.keys().cloned().collect())
            .ok_or_else(|| missing_partition_set(collection_id))
    }

    pub(crate) fn collection_ids(&self) -> impl Iterator<Item = CollectionId> + '_ {
        self.by_collection.keys().copied()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Partition> {
        self.by_collection.values().flat_map(BTreeMap::values)
    }

    pub(crate) fn len(&self) -> usize {
        self.by_collection.values().map(BTreeMap::len).sum()
    }
}

fn missing_partition_set(collection_id: CollectionId) -> CoreError {
    CoreError::invariant_violation(format!(
        "collection {collection_id} has no partition set"
    ))
}
