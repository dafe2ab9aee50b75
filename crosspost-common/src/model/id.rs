//! Identifiers for posts and their per-platform records.
//!
//! A logical post is identified by a [`BaseId`]. Each platform it fans out to
//! gets a [`RecordId`] of the form `{base}_{platform}`.

use crate::model::platform::Platform;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use time::UtcDateTime;

pub const RECORD_ID_SEPARATOR: char = '_';

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BaseId(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl BaseId {
    #[must_use]
    pub fn new(id: String) -> Self {
        Self(id)
    }

    /// Strips a trailing platform suffix.
    ///
    /// Everything after the first separator is dropped, so
    /// `"1700000000000_x"` becomes `"1700000000000"`. An id without a
    /// separator is already a base id.
    #[must_use]
    pub fn from_record_id(id: &str) -> Self {
        let base = id
            .split_once(RECORD_ID_SEPARATOR)
            .map_or(id, |(base, _)| base);
        Self(base.to_owned())
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl RecordId {
    #[must_use]
    pub fn new(base_id: &BaseId, platform: Platform) -> Self {
        Self(format!("{base_id}{RECORD_ID_SEPARATOR}{platform}"))
    }

    /// Wraps an id as received from the datastore, without checking its shape.
    #[must_use]
    pub fn from_raw(id: String) -> Self {
        Self(id)
    }

    #[must_use]
    pub fn base_id(&self) -> BaseId {
        BaseId::from_record_id(&self.0)
    }

    #[must_use]
    pub fn platform(&self) -> Option<Platform> {
        self.0
            .split_once(RECORD_ID_SEPARATOR)
            .and_then(|(_, platform)| platform.parse().ok())
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for BaseId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Issues base ids derived from the current Unix time in milliseconds.
///
/// Ids are strictly increasing for one generator: a request within the same
/// millisecond as the previous one gets the previous value plus one. Two
/// generators in different processes can still collide.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct BaseIdGenerator {
    last_millis: i128,
}

impl BaseIdGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generate_at(&mut self, time: UtcDateTime) -> BaseId {
        let millis = (time - UtcDateTime::UNIX_EPOCH).whole_milliseconds();
        let next = millis.max(self.last_millis + 1);
        self.last_millis = next;

        BaseId(next.to_string())
    }

    pub fn generate(&mut self) -> BaseId {
        self.generate_at(UtcDateTime::now())
    }
}
