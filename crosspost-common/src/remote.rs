//! Contracts of the remote services the composer talks to.

use crate::model::{
    id::RecordId,
    platform::{Platform, PlatformSpec},
    post::PostRecord,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    error::Error as StdError,
    fmt::{Display, Formatter},
    str::FromStr,
};
use thiserror::Error;

pub type DraftMap = BTreeMap<Platform, String>;

#[derive(Debug, Error)]
#[error("{service} request failed: {source}")]
pub struct RemoteError {
    pub service: &'static str,
    #[source]
    pub source: Box<dyn StdError + Send + Sync>,
}

impl RemoteError {
    pub fn new(service: &'static str, source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self {
            service,
            source: source.into(),
        }
    }
}

/// The datastore holding post records.
#[async_trait]
pub trait PostStore: Send + Sync {
    /// Stores a record. A record with the same id is replaced.
    async fn append(&self, record: &PostRecord) -> Result<(), RemoteError>;

    async fn fetch_all(&self) -> Result<Vec<PostRecord>, RemoteError>;

    /// Returns whether a record was deleted.
    async fn delete(&self, id: &RecordId) -> Result<bool, RemoteError>;
}

/// Language model providers a draft can be requested from.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    #[default]
    OpenAi,
    Anthropic,
    Gemini,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Unknown AI provider: {0}")]
pub struct UnknownProviderError(pub String);

impl AiProvider {
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            AiProvider::OpenAi => "openai",
            AiProvider::Anthropic => "anthropic",
            AiProvider::Gemini => "gemini",
        }
    }

    #[must_use]
    pub fn default_model(self) -> &'static str {
        match self {
            AiProvider::OpenAi => "gpt-4o-mini",
            AiProvider::Anthropic => "claude-3-5-haiku-latest",
            AiProvider::Gemini => "gemini-1.5-flash",
        }
    }
}

impl Display for AiProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for AiProvider {
    type Err = UnknownProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [AiProvider::OpenAi, AiProvider::Anthropic, AiProvider::Gemini]
            .into_iter()
            .find(|provider| provider.id() == s)
            .ok_or_else(|| UnknownProviderError(s.to_owned()))
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct DraftRequest {
    pub content: String,
    pub instructions: String,
    pub platforms: BTreeSet<Platform>,
    pub provider: AiProvider,
    pub model: &'static str,
    /// Limits of the requested platforms, so the generator can respect them.
    pub limits: BTreeMap<Platform, PlatformSpec>,
}

impl DraftRequest {
    #[must_use]
    pub fn new(
        content: String,
        instructions: String,
        platforms: BTreeSet<Platform>,
        provider: AiProvider,
    ) -> Self {
        let limits = platforms
            .iter()
            .map(|&platform| (platform, platform.spec()))
            .collect();

        Self {
            content,
            instructions,
            platforms,
            provider,
            model: provider.default_model(),
            limits,
        }
    }
}

/// Drafts platform-specific copy from a base text.
#[async_trait]
pub trait DraftGenerator: Send + Sync {
    async fn generate(&self, request: &DraftRequest) -> Result<DraftMap, RemoteError>;
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct DispatchRequest {
    pub label: String,
    pub params: BTreeMap<String, String>,
}

/// Signals the external automation that new work is ready.
#[async_trait]
pub trait DispatchTrigger: Send + Sync {
    async fn trigger(&self, request: &DispatchRequest) -> Result<(), RemoteError>;
}
