//! Flat segment registry. Segment ids are unique across the whole node.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use qnode_core::{CollectionId, CoreError, CoreResult, SegmentId};

/// A segment whose data is resident on this node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    segment_id: SegmentId,
    collection_id: CollectionId,
    partition_tag: String,
    loaded_at: DateTime<Utc>,
}

impl Segment {
    pub(crate) fn new(
        segment_id: SegmentId,
        collection_id: CollectionId,
        partition_tag: impl Into<String>,
    ) -> Self {
        Self {
            segment_id,
            collection_id,
            partition_tag: partition_tag.into(),
            loaded_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn segment_id(&self) -> SegmentId {
        self.segment_id
    }

    #[must_use]
    pub fn collection_id(&self) -> CollectionId {
        self.collection_id
    }

    #[must_use]
    pub fn partition_tag(&self) -> &str {
        &self.partition_tag
    }

    #[must_use]
    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Returns true if this segment claims the given partition as its owner.
    pub(crate) fn belongs_to(&self, collection_id: CollectionId, tag: &str) -> bool {
        self.collection_id == collection_id && self.partition_tag == tag
    }
}

#[derive(Debug, Default)]
pub(crate) struct SegmentRegistry {
    segments: HashMap<SegmentId, Segment>,
}

impl SegmentRegistry {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            segments: HashMap::with_capacity(capacity),
        }
    }

    pub(crate) fn insert(&mut self, segment: Segment) -> CoreResult<()> {
        let id = segment.segment_id();
        if self.segments.contains_key(&id) {
            return Err(CoreError::already_exists("segment", id));
        }
        self.segments.insert(id, segment);
        Ok(())
    }

    pub(crate) fn remove(&mut self, segment_id: SegmentId) -> CoreResult<Segment> {
        self.segments
            .remove(&segment_id)
            .ok_or_else(|| CoreError::not_found("segment", segment_id))
    }

    pub(crate) fn get(&self, segment_id: SegmentId) -> CoreResult<&Segment> {
        self.segments
            .get(&segment_id)
            .ok_or_else(|| CoreError::not_found("segment", segment_id))
    }

    pub(crate) fn contains(&self, segment_id: SegmentId) -> bool {
        self.segments.contains_key(&segment_id)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.segments.values()
    }

    pub(crate) fn len(&self) -> usize {
        self.segments.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_ids_are_node_wide() {
        let mut registry = SegmentRegistry::default();
        registry
            .insert(Segment::new(SegmentId::new(5), CollectionId::new(0), "default"))
            .unwrap();

        let err = registry
            .insert(Segment::new(SegmentId::new(5), CollectionId::new(1), "other"))
            .unwrap_err();
        assert!(err.is_already_exists());

        let stored = registry.get(SegmentId::new(5)).unwrap();
        assert!(stored.belongs_to(CollectionId::new(0), "default"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_and_probe() {
        let mut registry = SegmentRegistry::default();
        registry
            .insert(Segment::new(SegmentId::new(1), CollectionId::new(0), "default"))
            .unwrap();
        assert!(registry.contains(SegmentId::new(1)));

        registry.remove(SegmentId::new(1)).unwrap();
        assert!(!registry.contains(SegmentId::new(1)));
        assert!(registry.get(SegmentId::new(1)).unwrap_err().is_not_found());
        assert!(registry.remove(SegmentId::new(1)).unwrap_err().is_not_found());
    }
}
