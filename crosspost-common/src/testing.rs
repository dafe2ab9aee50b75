use crate::{
    model::{id::RecordId, platform::Platform, post::PostRecord},
    remote::{PostStore, RemoteError},
};
use async_trait::async_trait;
use std::{
    collections::BTreeSet,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

/// A store that keeps appended records in memory and counts every write.
#[derive(Debug, Default)]
pub struct RecordingStore {
    records: Mutex<Vec<PostRecord>>,
    failing: BTreeSet<Platform>,
    writes: AtomicUsize,
}

impl RecordingStore {
    pub fn failing_on(platforms: impl IntoIterator<Item = Platform>) -> Self {
        Self {
            failing: platforms.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn with_records(records: Vec<PostRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            ..Self::default()
        }
    }

    pub fn records(&self) -> Vec<PostRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PostStore for RecordingStore {
    async fn append(&self, record: &PostRecord) -> Result<(), RemoteError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&record.platform) {
            return Err(RemoteError::new("test store", "append rejected"));
        }

        let mut records = self.records.lock().unwrap();
        records.retain(|existing| existing.id != record.id);
        records.push(record.clone());
        Ok(())
    }

    async fn fetch_all(&self) -> Result<Vec<PostRecord>, RemoteError> {
        Ok(self.records())
    }

    async fn delete(&self, id: &RecordId) -> Result<bool, RemoteError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|existing| &existing.id != id);
        Ok(records.len() != before)
    }
}
