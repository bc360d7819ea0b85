// src/records/memory.rs
//! In-process record store

use crate::records::{NewUserRecord, RecordError, RecordStore, UserRecord};
use crate::utils::time::{format_record_timestamp, SystemTimeProvider, TimeProvider};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

pub struct InMemoryRecordStore {
    collections: RwLock<HashMap<String, Vec<UserRecord>>>,
    clock: Arc<dyn TimeProvider>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemTimeProvider))
    }

    pub fn with_clock(clock: Arc<dyn TimeProvider>) -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            clock,
        }
    }

    fn check_collection(collection: &str) -> Result<(), RecordError> {
        if collection.trim().is_empty() {
            Err(RecordError::InvalidCollection(collection.to_string()))
        } else {
            Ok(())
        }
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn create(&self, collection: &str, record: NewUserRecord) -> Result<UserRecord, RecordError> {
        Self::check_collection(collection)?;
        record.validate()?;

        let stored = UserRecord {
            id: Uuid::new_v4(),
            age: record.age,
            height: record.height,
            weight: record.weight,
            timestamp: format_record_timestamp(&self.clock.now_local()),
        };

        debug!(collection, id = %stored.id, "record created");
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .push(stored.clone());
        Ok(stored)
    }

    async fn list(&self, collection: &str) -> Result<Vec<UserRecord>, RecordError> {
        Self::check_collection(collection)?;
        Ok(self
            .collections
            .read()
            .get(collection)
            .cloned()
            .unwrap_or_default())
    }

    async fn clear(&self, collection: &str) -> Result<usize, RecordError> {
        Self::check_collection(collection)?;
        let removed = self
            .collections
            .write()
            .remove(collection)
            .map(|records| records.len())
            .unwrap_or(0);
        debug!(collection, removed, "collection cleared");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::time::MockTimeProvider;
    use chrono::{Local, TimeZone};

    fn store_at(minute: u32) -> InMemoryRecordStore {
        let time = Local.with_ymd_and_hms(2024, 5, 1, 9, minute, 0).unwrap();
        InMemoryRecordStore::with_clock(Arc::new(MockTimeProvider::at_local(time)))
    }

    #[tokio::test]
    async fn test_create_assigns_id_and_timestamp() {
        let store = store_at(30);
        let record = store
            .create("UserInfo", NewUserRecord::new("30", "180", "75"))
            .await
            .unwrap();

        assert_eq!(record.timestamp, "2024-05-01 09:30");
        assert_eq!(record.age, "30");

        let other = store
            .create("UserInfo", NewUserRecord::new("31", "170", "65"))
            .await
            .unwrap();
        assert_ne!(record.id, other.id);
    }

    #[tokio::test]
    async fn test_list_preserves_insertion_order() {
        let store = store_at(0);
        for age in ["20", "40", "30"] {
            store
                .create("UserInfo", NewUserRecord::new(age, "170", "70"))
                .await
                .unwrap();
        }

        let ages: Vec<_> = store
            .list("UserInfo")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.age)
            .collect();
        assert_eq!(ages, vec!["20", "40", "30"]);
        assert!(store.list("Other").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clear_only_touches_named_collection() {
        let store = store_at(0);
        store.create("A", NewUserRecord::new("1", "2", "3")).await.unwrap();
        store.create("A", NewUserRecord::new("1", "2", "3")).await.unwrap();
        store.create("B", NewUserRecord::new("1", "2", "3")).await.unwrap();

        assert_eq!(store.clear("A").await.unwrap(), 2);
        assert!(store.list("A").await.unwrap().is_empty());
        assert_eq!(store.list("B").await.unwrap().len(), 1);
        assert_eq!(store.clear("A").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rejected_records_are_not_stored() {
        let store = store_at(0);
        let result = store.create("UserInfo", NewUserRecord::new("30", "", "75")).await;
        assert_eq!(result, Err(RecordError::MissingField("height")));
        assert!(store.list("UserInfo").await.unwrap().is_empty());

        let result = store.create(" ", NewUserRecord::new("30", "180", "75")).await;
        assert!(matches!(result, Err(RecordError::InvalidCollection(_))));
    }
}
