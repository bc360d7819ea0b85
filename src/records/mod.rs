// src/records/mod.rs
//! Anthropometric record store interface
//!
//! Records are independent of the capture pipeline and share no state with it.
//! Values are kept as entered; only emptiness is checked.

pub mod memory;

pub use memory::InMemoryRecordStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Stored anthropometric entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub age: String,
    pub height: String,
    pub weight: String,
    /// Local time, `yyyy-MM-dd HH:mm`
    pub timestamp: String,
}

/// Entry as submitted, before id and timestamp are assigned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUserRecord {
    pub age: String,
    pub height: String,
    pub weight: String,
}

impl NewUserRecord {
    pub fn new(age: impl Into<String>, height: impl Into<String>, weight: impl Into<String>) -> Self {
        Self {
            age: age.into(),
            height: height.into(),
            weight: weight.into(),
        }
    }

    pub fn validate(&self) -> Result<(), RecordError> {
        for (field, value) in [("age", &self.age), ("height", &self.height), ("weight", &self.weight)] {
            if value.trim().is_empty() {
                return Err(RecordError::MissingField(field));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("record field '{0}' is empty")]
    MissingField(&'static str),

    #[error("invalid collection name '{0}'")]
    InvalidCollection(String),
}

/// Append-only record collection store
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Append a record, assigning its id and timestamp
    async fn create(&self, collection: &str, record: NewUserRecord) -> Result<UserRecord, RecordError>;

    /// All records of the collection in insertion order
    async fn list(&self, collection: &str) -> Result<Vec<UserRecord>, RecordError>;

    /// Delete the whole collection, returning how many records were removed
    async fn clear(&self, collection: &str) -> Result<usize, RecordError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields() {
        assert!(NewUserRecord::new("30", "180", "75").validate().is_ok());
        assert_eq!(
            NewUserRecord::new("", "180", "75").validate(),
            Err(RecordError::MissingField("age"))
        );
        assert_eq!(
            NewUserRecord::new("30", "180", "  ").validate(),
            Err(RecordError::MissingField("weight"))
        );
    }

    #[test]
    fn test_values_kept_as_entered() {
        // Non-numeric input is not rejected
        assert!(NewUserRecord::new("thirty", "6ft", "75kg").validate().is_ok());
    }
}
