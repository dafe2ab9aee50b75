//! The in-progress post and the operations run on it.

use crate::{
    fanout::{self, SubmissionReport, SubmitError, SubmitMode, SubmitPlan},
    model::{
        id::{BaseIdGenerator, RecordId},
        platform::Platform,
        post::Post,
    },
    remote::{AiProvider, DraftGenerator, DraftMap, DraftRequest, PostStore, RemoteError},
    request::{AlreadyInFlightError, RequestState},
    validation::{self, Violations},
};
use std::{
    collections::BTreeSet,
    sync::{Mutex, PoisonError},
};
use thiserror::Error;
use time::UtcDateTime;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ComposerError {
    #[error("The platforms of a post being edited cannot be changed")]
    PlatformsLocked,
    #[error("Drafts need content and at least one platform")]
    MissingDraftInput,
    #[error(transparent)]
    AlreadyInFlight(#[from] AlreadyInFlightError),
    #[error(transparent)]
    Submit(#[from] SubmitError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

#[derive(Debug)]
pub struct Composer {
    post: Post,
    editing: Option<RecordId>,
    violations: Violations,
    generation: RequestState<DraftMap, String>,
    submission: RequestState<SubmissionReport, String>,
}

impl Composer {
    #[must_use]
    pub fn new(post: Post) -> Self {
        let mut composer = Self {
            post,
            editing: None,
            violations: Violations::new(),
            generation: RequestState::Idle,
            submission: RequestState::Idle,
        };
        composer.revalidate();
        composer
    }

    /// Opens an existing post for editing.
    ///
    /// The platforms are the ones the post's records were already created
    /// for; whatever `post` carries is replaced.
    #[must_use]
    pub fn edit(record_id: RecordId, assigned: BTreeSet<Platform>, mut post: Post) -> Self {
        post.platforms = assigned;
        let mut composer = Self::new(post);
        composer.editing = Some(record_id);
        composer
    }

    #[must_use]
    pub fn post(&self) -> &Post {
        &self.post
    }

    #[must_use]
    pub fn editing(&self) -> Option<&RecordId> {
        self.editing.as_ref()
    }

    #[must_use]
    pub fn violations(&self) -> &Violations {
        &self.violations
    }

    #[must_use]
    pub fn generation(&self) -> &RequestState<DraftMap, String> {
        &self.generation
    }

    #[must_use]
    pub fn submission(&self) -> &RequestState<SubmissionReport, String> {
        &self.submission
    }

    pub fn set_content(&mut self, content: String) {
        self.post.content = content;
        self.revalidate();
    }

    /// Sets or clears the content override of one platform.
    pub fn set_override(&mut self, platform: Platform, content: Option<String>) {
        match content {
            Some(content) => self.post.content_overrides.insert(platform, content),
            None => self.post.content_overrides.remove(&platform),
        };
        self.revalidate();
    }

    pub fn toggle_platform(&mut self, platform: Platform) -> Result<(), ComposerError> {
        if self.editing.is_some() {
            return Err(ComposerError::PlatformsLocked);
        }

        if !self.post.platforms.remove(&platform) {
            self.post.platforms.insert(platform);
        }
        self.revalidate();
        Ok(())
    }

    fn revalidate(&mut self) {
        self.violations = validation::validate(
            &self.post.content,
            &self.post.content_overrides,
            self.post.platforms.iter().copied(),
        );
    }

    /// Requests platform-specific drafts and stores them as overrides.
    ///
    /// Drafts for platforms that are not selected are dropped.
    pub async fn generate_drafts(
        &mut self,
        generator: &dyn DraftGenerator,
        instructions: String,
        provider: AiProvider,
    ) -> Result<DraftMap, ComposerError> {
        if self.post.content.trim().is_empty() || self.post.platforms.is_empty() {
            return Err(ComposerError::MissingDraftInput);
        }
        self.generation.start()?;

        let request = DraftRequest::new(
            self.post.content.clone(),
            instructions,
            self.post.platforms.clone(),
            provider,
        );

        match generator.generate(&request).await {
            Ok(mut drafts) => {
                drafts.retain(|platform, _| self.post.platforms.contains(platform));
                debug!(count = drafts.len(), %provider, "Received drafts");

                self.post
                    .content_overrides
                    .extend(drafts.iter().map(|(&platform, text)| (platform, text.clone())));
                self.revalidate();
                self.generation.succeed(drafts.clone());
                Ok(drafts)
            }
            Err(err) => {
                warn!(error = %err, %provider, "Draft generation failed");
                self.generation.fail(err.to_string());
                Err(err.into())
            }
        }
    }

    /// Fans the post out to the store.
    ///
    /// An edited post keeps the base id of the record it was opened from; a
    /// new post gets a fresh one from `ids`.
    pub async fn submit(
        &mut self,
        store: &dyn PostStore,
        ids: &Mutex<BaseIdGenerator>,
        mode: SubmitMode,
        now: UtcDateTime,
    ) -> Result<SubmissionReport, ComposerError> {
        self.submission.start()?;

        let base_id = match &self.editing {
            Some(record_id) => record_id.base_id(),
            None => ids
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .generate_at(now),
        };
        let plan = SubmitPlan { base_id, mode };

        match fanout::submit(store, &self.post, &plan, now).await {
            Ok(report) => {
                self.submission.succeed(report.clone());
                Ok(report)
            }
            Err(err) => {
                self.submission.fail(err.to_string());
                Err(err.into())
            }
        }
    }
}
