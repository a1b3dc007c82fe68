//! Collection registry: primary map keyed by id plus a secondary name index.

use std::collections::HashMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use qnode_core::{CollectionId, CollectionMeta, CollectionSchema, CoreError, CoreResult, Timestamp};

/// A collection loaded on this node.
#[derive(Debug, Clone)]
pub struct Collection {
    meta: CollectionMeta,
    meta_blob: Bytes,
    loaded_at: DateTime<Utc>,
}

impl Collection {
    pub(crate) fn new(meta: CollectionMeta, meta_blob: Bytes) -> Self {
        Self {
            meta,
            meta_blob,
            loaded_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn id(&self) -> CollectionId {
        self.meta.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.meta.name()
    }

    #[must_use]
    pub fn schema(&self) -> &CollectionSchema {
        &self.meta.schema
    }

    #[must_use]
    pub fn meta(&self) -> &CollectionMeta {
        &self.meta
    }

    /// The metadata exactly as delivered by the load instruction.
    #[must_use]
    pub fn meta_blob(&self) -> &Bytes {
        &self.meta_blob
    }

    #[must_use]
    pub fn create_time(&self) -> Timestamp {
        self.meta.create_time
    }

    /// Partition tags the coordinator declared at load time.
    #[must_use]
    pub fn declared_partition_tags(&self) -> &[String] {
        &self.meta.partition_tags
    }

    /// Wall-clock time at which this node registered the collection.
    #[must_use]
    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}

#[derive(Debug, Default)]
pub(crate) struct CollectionRegistry {
    by_id: HashMap<CollectionId, Collection>,
    by_name: HashMap<String, CollectionId>,
}

impl CollectionRegistry {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            by_id: HashMap::with_capacity(capacity),
            by_name: HashMap::with_capacity(capacity),
        }
    }

    /// Inserts a collection. A name already in use is re-pointed at the new
    /// collection; the previous holder stays reachable by id.
    pub(crate) fn insert(&mut self, collection: Collection) -> CoreResult<()> {
        let id = collection.id();
        if self.by_id.contains_key(&id) {
            return Err(CoreError::already_exists("collection", id));
        }

        self.by_name.insert(collection.name().to_string(), id);
        self.by_id.insert(id, collection);
        Ok(())
    }

    pub(crate) fn remove(&mut self, id: CollectionId) -> CoreResult<Collection> {
        let collection = self
            .by_id
            .remove(&id)
            .ok_or_else(|| CoreError::not_found("collection", id))?;

        let name = collection.name();
        if self.by_name.get(name) == Some(&id) {
            // Fall back to another live collection carrying the same name.
            match self
                .by_id
                .values()
                .filter(|c| c.name() == name)
                .map(Collection::id)
                .max()
            {
                Some(other) => {
                    self.by_name.insert(name.to_string(), other);
                }
                None => {
                    self.by_name.remove(name);
                }
            }
        }

        Ok(collection)
    }

    pub(crate) fn get(&self, id: CollectionId) -> CoreResult<&Collection> {
        self.by_id
            .get(&id)
            .ok_or_else(|| CoreError::not_found("collection", id))
    }

    pub(crate) fn get_by_name(&self, name: &str) -> CoreResult<&Collection> {
        let id = self
            .by_name
            .get(name)
            .ok_or_else(|| CoreError::not_found("collection", name))?;
        self.by_id.get(id).ok_or_else(|| {
            CoreError::invariant_violation(format!(
                "name index maps `{name}` to collection {id} which is not loaded"
            ))
        })
    }

    pub(crate) fn contains(&self, id: CollectionId) -> bool {
        self.by_id.contains_key(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.by_id.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Collection> {
        self.by_id.values()
    }

    pub(crate) fn ids(&self) -> Vec<CollectionId> {
        let mut ids: Vec<_> = self.by_id.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Checks that the name index and the primary map agree.
    pub(crate) fn check_name_index(&self) -> CoreResult<()> {
        for (name, id) in &self.by_name {
            match self.by_id.get(id) {
                Some(c) if c.name() == name.as_str() => {}
                _ => {
                    return Err(CoreError::invariant_violation(format!(
                        "name index entry `{name}` -> {id} is stale"
                    )))
                }
            }
        }
        for collection in self.by_id.values() {
            if !self.by_name.contains_key(collection.name()) {
                return Err(CoreError::invariant_violation(format!(
                    "collection {} is missing from the name index",
                    collection.id()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qnode_core::{DataType, FieldSchema};

    fn collection(id: u64, name: &str) -> Collection {
        let schema = CollectionSchema::new(
            name,
            vec![FieldSchema::new("vec", DataType::VectorFloat).with_type_param("dim", "16")],
        );
        Collection::new(
            CollectionMeta::new(CollectionId::new(id), schema, 0),
            Bytes::from_static(b"blob"),
        )
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut registry = CollectionRegistry::default();
        registry.insert(collection(1, "books")).unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(CollectionId::new(1)).unwrap().name(), "books");
        assert_eq!(registry.get_by_name("books").unwrap().id(), CollectionId::new(1));
        assert_eq!(
            registry.get(CollectionId::new(1)).unwrap().meta_blob().to_vec(),
            b"blob".to_vec()
        );
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut registry = CollectionRegistry::default();
        registry.insert(collection(1, "books")).unwrap();

        let err = registry.insert(collection(1, "films")).unwrap_err();
        assert!(err.is_already_exists());
        assert_eq!(registry.len(), 1);
        assert!(registry.get_by_name("films").unwrap_err().is_not_found());
        registry.check_name_index().unwrap();
    }

    #[test]
    fn test_remove_clears_both_indexes() {
        let mut registry = CollectionRegistry::default();
        registry.insert(collection(1, "books")).unwrap();

        registry.remove(CollectionId::new(1)).unwrap();
        assert!(registry.get(CollectionId::new(1)).unwrap_err().is_not_found());
        assert!(registry.get_by_name("books").unwrap_err().is_not_found());
        assert!(registry.remove(CollectionId::new(1)).unwrap_err().is_not_found());
    }

    #[test]
    fn test_shared_name_falls_back_on_remove() {
        let mut registry = CollectionRegistry::default();
        registry.insert(collection(1, "books")).unwrap();
        registry.insert(collection(2, "books")).unwrap();
        assert_eq!(registry.get_by_name("books").unwrap().id(), CollectionId::new(2));

        registry.remove(CollectionId::new(2)).unwrap();
        assert_eq!(registry.get_by_name("books").unwrap().id(), CollectionId::new(1));

        registry.insert(collection(3, "books")).unwrap();
        registry.remove(CollectionId::new(1)).unwrap();
        assert_eq!(registry.get_by_name("books").unwrap().id(), CollectionId::new(3));
        registry.check_name_index().unwrap();
    }
}
