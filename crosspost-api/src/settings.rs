//! User preferences and the in-memory log, owned by one service instance.
//!
//! Preferences are read from disk when the service is created and written
//! back on every update and on shutdown. Writes go through `tokio::fs` and
//! are serialized, so the file always holds the latest preferences.

use serde::{Deserialize, Serialize};
use std::{
    collections::VecDeque,
    fmt::Debug,
    io::ErrorKind,
    path::PathBuf,
    sync::{Arc, Mutex, PoisonError, RwLock},
};
use thiserror::Error;
use time::UtcDateTime;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{
    Event, Subscriber,
    field::{Field, Visit},
};
use tracing_subscriber::{Layer, layer::Context};

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Reading preferences from {path} failed: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Writing preferences to {path} failed: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Preferences file is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontSize {
    Small,
    #[default]
    Medium,
    Large,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub onboarding_seen: bool,
    pub font_size: FontSize,
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct LogEntry {
    #[serde(with = "crosspost_common::schedule::rfc3339")]
    pub at: UtcDateTime,
    pub level: String,
    pub target: String,
    pub message: String,
}

#[derive(Debug)]
struct Ring {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

/// A bounded buffer of the most recent log events.
#[derive(Clone, Debug)]
pub struct LogBuffer {
    ring: Arc<Mutex<Ring>>,
}

impl LogBuffer {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: Arc::new(Mutex::new(Ring {
                entries: VecDeque::with_capacity(capacity),
                capacity,
            })),
        }
    }

    /// Changes the capacity, dropping the oldest entries that no longer fit.
    pub fn resize(&self, capacity: usize) {
        let mut ring = self.ring.lock().unwrap_or_else(PoisonError::into_inner);
        ring.capacity = capacity;
        let excess = ring.entries.len().saturating_sub(capacity);
        ring.entries.drain(..excess);
    }

    pub fn push(&self, entry: LogEntry) {
        let mut ring = self.ring.lock().unwrap_or_else(PoisonError::into_inner);
        if ring.capacity == 0 {
            return;
        }

        if ring.entries.len() >= ring.capacity {
            ring.entries.pop_front();
        }
        ring.entries.push_back(entry);
    }

    /// Oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<LogEntry> {
        let ring = self.ring.lock().unwrap_or_else(PoisonError::into_inner);
        ring.entries.iter().cloned().collect()
    }
}

/// Feeds every tracing event into a [`LogBuffer`].
pub struct LogBufferLayer {
    buffer: LogBuffer,
}

impl LogBufferLayer {
    #[must_use]
    pub fn new(buffer: LogBuffer) -> Self {
        Self { buffer }
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: Vec<String>,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            value.clone_into(&mut self.message);
        } else {
            self.fields.push(format!("{}={value}", field.name()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields.push(format!("{}={value:?}", field.name()));
        }
    }
}

impl<S> Layer<S> for LogBufferLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let mut message = visitor.message;
        for field in visitor.fields {
            message.push(' ');
            message.push_str(&field);
        }

        self.buffer.push(LogEntry {
            at: UtcDateTime::now(),
            level: event.metadata().level().to_string(),
            target: event.metadata().target().to_owned(),
            message,
        });
    }
}

#[derive(Debug)]
pub struct SettingsService {
    path: PathBuf,
    preferences: RwLock<Preferences>,
    /// Held for the duration of a file write.
    writing: AsyncMutex<()>,
    logs: LogBuffer,
}

impl SettingsService {
    /// Loads preferences from `path`. A missing file yields the defaults.
    pub fn load(path: PathBuf, logs: LogBuffer) -> Result<Self, SettingsError> {
        let preferences = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == ErrorKind::NotFound => Preferences::default(),
            Err(source) => return Err(SettingsError::Read { path, source }),
        };

        Ok(Self {
            path,
            preferences: RwLock::new(preferences),
            writing: AsyncMutex::new(()),
            logs,
        })
    }

    #[must_use]
    pub fn preferences(&self) -> Preferences {
        *self
            .preferences
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub async fn update(&self, preferences: Preferences) -> Result<(), SettingsError> {
        *self
            .preferences
            .write()
            .unwrap_or_else(PoisonError::into_inner) = preferences;
        self.flush().await
    }

    pub async fn flush(&self) -> Result<(), SettingsError> {
        let _writing = self.writing.lock().await;
        // Read under the lock, so the last write carries the latest preferences.
        let json = serde_json::to_vec_pretty(&self.preferences())?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|source| SettingsError::Write {
                path: self.path.clone(),
                source,
            })
    }

    #[must_use]
    pub fn logs(&self) -> &LogBuffer {
        &self.logs
    }
}

#[cfg(test)]
mod tests {
    use crate::settings::{
        FontSize, LogBuffer, LogEntry, Preferences, SettingsError, SettingsService,
    };
    use time::macros::utc_datetime;

    fn entry(message: &str) -> LogEntry {
        LogEntry {
            at: utc_datetime!(2024-05-01 00:00),
            level: "INFO".to_owned(),
            target: "test".to_owned(),
            message: message.to_owned(),
        }
    }

    #[test]
    fn log_buffer_drops_oldest_entries() {
        let buffer = LogBuffer::new(2);
        buffer.push(entry("one"));
        buffer.push(entry("two"));
        buffer.push(entry("three"));

        let messages = buffer
            .entries()
            .into_iter()
            .map(|entry| entry.message)
            .collect::<Vec<_>>();
        assert_eq!(messages, ["two", "three"]);

        buffer.resize(1);
        assert_eq!(buffer.entries().len(), 1);
        assert_eq!(buffer.entries()[0].message, "three");
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let service =
            SettingsService::load(dir.path().join("preferences.json"), LogBuffer::new(4)).unwrap();

        assert_eq!(service.preferences(), Preferences::default());
    }

    #[tokio::test]
    async fn preferences_survive_a_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");

        let service = SettingsService::load(path.clone(), LogBuffer::new(4)).unwrap();
        service
            .update(Preferences {
                onboarding_seen: true,
                font_size: FontSize::Large,
            })
            .await
            .unwrap();
        drop(service);

        let reloaded = SettingsService::load(path, LogBuffer::new(4)).unwrap();
        assert!(reloaded.preferences().onboarding_seen);
        assert_eq!(reloaded.preferences().font_size, FontSize::Large);
    }

    #[tokio::test]
    async fn concurrent_updates_leave_the_last_one_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        let service = SettingsService::load(path.clone(), LogBuffer::new(4)).unwrap();

        let small = Preferences {
            onboarding_seen: false,
            font_size: FontSize::Small,
        };
        let large = Preferences {
            onboarding_seen: true,
            font_size: FontSize::Large,
        };
        let (first, second) = tokio::join!(service.update(small), service.update(large));
        first.unwrap();
        second.unwrap();

        let reloaded = SettingsService::load(path, LogBuffer::new(4)).unwrap();
        assert_eq!(reloaded.preferences(), service.preferences());
    }

    #[tokio::test]
    async fn unwritable_path_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let service =
            SettingsService::load(dir.path().join("missing/preferences.json"), LogBuffer::new(4))
                .unwrap();

        let err = service.flush().await.unwrap_err();
        assert!(matches!(err, SettingsError::Write { .. }));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(SettingsService::load(path, LogBuffer::new(4)).is_err());
    }
}
