//! Point-in-time catalog counts for the telemetry collaborator.

use chrono::{DateTime, Utc};
use qnode_core::{CollectionId, CoreResult};
use serde::Serialize;

/// Counts for a single loaded collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionStats {
    pub collection_id: CollectionId,
    pub name: String,
    pub partition_num: usize,
    pub segment_num: usize,
}

/// Snapshot of the whole catalog, taken under a single read lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    pub node_id: u64,
    pub collection_num: usize,
    pub partition_num: usize,
    pub segment_num: usize,
    /// Ordered by collection id.
    pub collections: Vec<CollectionStats>,
    pub captured_at: DateTime<Utc>,
}

impl CatalogStats {
    /// Looks up the counts of one collection.
    #[must_use]
    pub fn collection(&self, collection_id: CollectionId) -> Option<&CollectionStats> {
        self.collections
            .iter()
            .find(|c| c.collection_id == collection_id)
    }

    /// Renders the snapshot as JSON.
    pub fn to_json(&self) -> CoreResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}
