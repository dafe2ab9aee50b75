use crate::{
    model::{ModelValidationError, id::RecordId, platform::Platform},
    schedule::{self, OutOfRangeError, ScheduleInput},
};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::{Display, Formatter},
    str::FromStr,
};
use time::UtcDateTime;

#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    #[default]
    Draft,
    Pending,
    Sent,
    Failed,
}

/// A post as composed by the user, before it is split per platform.
#[derive(Clone, Eq, PartialEq, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Post {
    pub content: String,
    pub platforms: BTreeSet<Platform>,
    pub content_overrides: BTreeMap<Platform, String>,
    pub images: Vec<String>,
    pub image_overrides: BTreeMap<Platform, Vec<String>>,
    pub schedule: ScheduleInput,
    pub schedule_overrides: BTreeMap<Platform, ScheduleInput>,
    /// Picks the submit mode when the caller names none.
    pub status: PostStatus,
}

/// One persisted record of a post, targeting a single platform.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: RecordId,
    pub content: String,
    pub platform: Platform,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default, with = "schedule::rfc3339::option")]
    pub scheduled_at: Option<UtcDateTime>,
    pub status: PostStatus,
    #[serde(with = "schedule::rfc3339")]
    pub created_at: UtcDateTime,
    #[serde(with = "schedule::rfc3339")]
    pub updated_at: UtcDateTime,
}

impl PostStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Pending => "pending",
            PostStatus::Sent => "sent",
            PostStatus::Failed => "failed",
        }
    }
}

impl Display for PostStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostStatus {
    type Err = ModelValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(PostStatus::Draft),
            "pending" => Ok(PostStatus::Pending),
            "sent" => Ok(PostStatus::Sent),
            "failed" => Ok(PostStatus::Failed),
            other => Err(ModelValidationError::UnknownStatus(other.to_owned())),
        }
    }
}

impl Post {
    #[must_use]
    pub fn effective_content(&self, platform: Platform) -> &str {
        self.content_overrides
            .get(&platform)
            .map_or(self.content.as_str(), String::as_str)
    }

    #[must_use]
    pub fn effective_images(&self, platform: Platform) -> &[String] {
        self.image_overrides
            .get(&platform)
            .map_or(self.images.as_slice(), Vec::as_slice)
    }

    pub fn effective_schedule(
        &self,
        platform: Platform,
    ) -> Result<Option<UtcDateTime>, OutOfRangeError> {
        schedule::resolve_schedule(
            self.schedule,
            self.schedule_overrides.get(&platform).copied(),
        )
    }
}
