//! A process-local [`PostStore`], used when no database is configured.
//!
//! Records are lost when the process exits.

use async_trait::async_trait;
use crosspost_common::{
    model::{id::RecordId, post::PostRecord},
    remote::{PostStore, RemoteError},
};
use std::sync::{PoisonError, RwLock};
use tracing::debug;

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<Vec<PostRecord>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn append(&self, record: &PostRecord) -> Result<(), RemoteError> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);

        match records.iter_mut().find(|existing| existing.id == record.id) {
            Some(existing) => {
                let created_at = existing.created_at;
                *existing = PostRecord {
                    created_at,
                    ..record.clone()
                };
            }
            None => records.push(record.clone()),
        }

        debug!(record_id = %record.id, "Stored post record in memory");
        Ok(())
    }

    async fn fetch_all(&self) -> Result<Vec<PostRecord>, RemoteError> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        Ok(records.iter().rev().cloned().collect())
    }

    async fn delete(&self, id: &RecordId) -> Result<bool, RemoteError> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let before = records.len();
        records.retain(|record| &record.id != id);
        Ok(records.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use crate::memory::MemoryStore;
    use crosspost_common::{
        model::{
            id::{BaseId, RecordId},
            platform::Platform,
            post::{PostRecord, PostStatus},
        },
        remote::PostStore,
    };
    use time::{UtcDateTime, macros::utc_datetime};

    fn record(base: &str, content: &str, at: UtcDateTime) -> PostRecord {
        PostRecord {
            id: RecordId::new(&BaseId::new(base.to_owned()), Platform::Line),
            content: content.to_owned(),
            platform: Platform::Line,
            images: Vec::new(),
            scheduled_at: None,
            status: PostStatus::Pending,
            created_at: at,
            updated_at: at,
        }
    }

    #[tokio::test]
    async fn append_replaces_records_with_the_same_id() {
        let store = MemoryStore::new();
        let created = utc_datetime!(2024-05-01 00:00);
        let edited = utc_datetime!(2024-05-02 00:00);

        store.append(&record("1", "first", created)).await.unwrap();
        store.append(&record("2", "other", created)).await.unwrap();
        store.append(&record("1", "second", edited)).await.unwrap();

        let records = store.fetch_all().await.unwrap();
        assert_eq!(records.len(), 2);

        let first = records.iter().find(|record| record.id.get() == "1_line").unwrap();
        assert_eq!(first.content, "second");
        assert_eq!(first.created_at, created);
        assert_eq!(first.updated_at, edited);
    }

    #[tokio::test]
    async fn delete_reports_whether_anything_was_removed() {
        let store = MemoryStore::new();
        let at = utc_datetime!(2024-05-01 00:00);
        store.append(&record("1", "hello", at)).await.unwrap();

        let id = RecordId::from_raw("1_line".to_owned());
        assert!(store.delete(&id).await.unwrap());
        assert!(!store.delete(&id).await.unwrap());
        assert!(store.fetch_all().await.unwrap().is_empty());
    }
}
