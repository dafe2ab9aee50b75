//! Splitting one composed post into one stored record per platform.

use crate::{
    model::{
        id::{BaseId, RecordId},
        platform::Platform,
        post::{Post, PostRecord, PostStatus},
    },
    remote::PostStore,
    validation::{self, Violations},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::UtcDateTime;
use tracing::{debug, info, warn};

#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SubmitMode {
    /// Saved without length checks, not meant for dispatch yet.
    Draft,
    #[default]
    Confirmed,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct SubmitPlan {
    pub base_id: BaseId,
    pub mode: SubmitMode,
}

/// Reasons a submission is refused before anything is stored.
#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum SubmitError {
    #[error("No platform was selected")]
    NoPlatforms,
    #[error("The post has no content")]
    EmptyContent,
    #[error("Scheduling is switched on but the date or time is missing")]
    IncompleteSchedule,
    #[error("The schedule for {} is out of range", .0.display_name())]
    InvalidSchedule(Platform),
    #[error("Content is too long for {} platform(s)", .0.len())]
    LimitExceeded(Violations),
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct PlatformOutcome {
    pub platform: Platform,
    pub record_id: RecordId,
    /// `None` when the record was stored.
    pub error: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct SubmissionReport {
    pub base_id: BaseId,
    pub mode: SubmitMode,
    pub outcomes: Vec<PlatformOutcome>,
}

impl SubmitMode {
    /// A draft post is saved as a draft. Any other status means the user
    /// confirmed it.
    #[must_use]
    pub fn for_status(status: PostStatus) -> Self {
        match status {
            PostStatus::Draft => SubmitMode::Draft,
            PostStatus::Pending | PostStatus::Sent | PostStatus::Failed => SubmitMode::Confirmed,
        }
    }

    #[must_use]
    pub fn record_status(self) -> PostStatus {
        match self {
            SubmitMode::Draft => PostStatus::Draft,
            SubmitMode::Confirmed => PostStatus::Pending,
        }
    }
}

impl SubmissionReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &PlatformOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.error.is_none())
    }

    pub fn failed(&self) -> impl Iterator<Item = &PlatformOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.error.is_some())
    }

    #[must_use]
    pub fn is_complete_success(&self) -> bool {
        self.failed().next().is_none()
    }

    #[must_use]
    pub fn summary(&self) -> String {
        let stored = self.succeeded().count();
        let total = self.outcomes.len();
        let failed = self
            .failed()
            .map(|outcome| outcome.platform.display_name())
            .collect::<Vec<_>>();

        if failed.is_empty() {
            format!("Saved {stored} of {total} post(s).")
        } else {
            format!(
                "Saved {stored} of {total} post(s). Failed: {}.",
                failed.join(", ")
            )
        }
    }
}

/// Checks a post before a confirmed submission.
///
/// Drafts skip this entirely.
pub fn check_confirmed(post: &Post) -> Result<(), SubmitError> {
    if post.platforms.is_empty() {
        return Err(SubmitError::NoPlatforms);
    }
    if post
        .platforms
        .iter()
        .any(|&platform| post.effective_content(platform).trim().is_empty())
    {
        return Err(SubmitError::EmptyContent);
    }
    if post.schedule.is_incomplete() {
        return Err(SubmitError::IncompleteSchedule);
    }

    let violations = validation::validate(
        &post.content,
        &post.content_overrides,
        post.platforms.iter().copied(),
    );
    if !violations.is_empty() {
        return Err(SubmitError::LimitExceeded(violations));
    }

    Ok(())
}

/// Builds the record for one platform of a post.
pub fn build_record(
    post: &Post,
    base_id: &BaseId,
    platform: Platform,
    status: PostStatus,
    now: UtcDateTime,
) -> Result<PostRecord, SubmitError> {
    let scheduled_at = post.effective_schedule(platform).map_err(|err| {
        debug!(%platform, error = %err, "Rejecting schedule");
        SubmitError::InvalidSchedule(platform)
    })?;

    Ok(PostRecord {
        id: RecordId::new(base_id, platform),
        content: post.effective_content(platform).to_owned(),
        platform,
        images: post.effective_images(platform).to_vec(),
        scheduled_at,
        status,
        created_at: now,
        updated_at: now,
    })
}

/// Stores one record per selected platform.
///
/// Platforms are handled one after another. A failing platform is reported
/// in the returned [`SubmissionReport`] and does not stop the others; nothing
/// is retried or rolled back. Every record is built before the first write, so
/// a schedule out of range stores nothing, drafts included.
pub async fn submit(
    store: &dyn PostStore,
    post: &Post,
    plan: &SubmitPlan,
    now: UtcDateTime,
) -> Result<SubmissionReport, SubmitError> {
    match plan.mode {
        SubmitMode::Confirmed => check_confirmed(post)?,
        SubmitMode::Draft => debug!(base_id = %plan.base_id, "Skipping checks for draft"),
    }

    let status = plan.mode.record_status();
    let records = post
        .platforms
        .iter()
        .map(|&platform| build_record(post, &plan.base_id, platform, status, now))
        .collect::<Result<Vec<_>, _>>()?;
    let mut outcomes = Vec::with_capacity(records.len());

    for record in records {
        let error = match store.append(&record).await {
            Ok(()) => {
                debug!(record_id = %record.id, "Stored post record");
                None
            }
            Err(err) => {
                warn!(record_id = %record.id, error = %err, "Storing post record failed");
                Some(err.to_string())
            }
        };

        outcomes.push(PlatformOutcome {
            platform: record.platform,
            record_id: record.id,
            error,
        });
    }

    let report = SubmissionReport {
        base_id: plan.base_id.clone(),
        mode: plan.mode,
        outcomes,
    };
    info!(base_id = %report.base_id, summary = %report.summary(), "Submission finished");

    Ok(report)
}

#[cfg(test)]
mod tests {
    use crate::{
        fanout::{SubmitError, SubmitMode, SubmitPlan, submit},
        model::{
            id::BaseId,
            platform::Platform,
            post::{Post, PostStatus},
        },
        schedule::{LocalSchedule, ScheduleInput},
        testing::RecordingStore,
    };
    use std::collections::BTreeSet;
    use time::{
        Date, Month,
        macros::{date, time, utc_datetime},
    };

    fn post(content: &str, platforms: impl IntoIterator<Item = Platform>) -> Post {
        Post {
            content: content.to_owned(),
            platforms: platforms.into_iter().collect(),
            ..Post::default()
        }
    }

    fn plan(base: &str, mode: SubmitMode) -> SubmitPlan {
        SubmitPlan {
            base_id: BaseId::new(base.to_owned()),
            mode,
        }
    }

    #[tokio::test]
    async fn one_record_per_platform_with_shared_base() {
        let store = RecordingStore::default();
        let post = post("hello", [Platform::X, Platform::Line, Platform::Blog]);

        let report = submit(
            &store,
            &post,
            &plan("1700000000000", SubmitMode::Confirmed),
            utc_datetime!(2024-05-01 00:00),
        )
        .await
        .unwrap();

        let records = store.records();
        assert_eq!(records.len(), 3);
        assert_eq!(report.outcomes.len(), 3);
        assert!(report.is_complete_success());

        let platforms = records.iter().map(|record| record.platform).collect::<BTreeSet<_>>();
        assert_eq!(platforms, post.platforms);
        for record in &records {
            assert_eq!(record.id.base_id().get(), "1700000000000");
            assert_eq!(record.id.get(), format!("1700000000000_{}", record.platform));
            assert_eq!(record.status, PostStatus::Pending);
            assert_eq!(record.content, "hello");
        }
    }

    #[tokio::test]
    async fn over_limit_blocks_confirmed_submission() {
        let store = RecordingStore::default();
        let post = post(&"a".repeat(281), [Platform::X, Platform::Discord]);

        let result = submit(
            &store,
            &post,
            &plan("1", SubmitMode::Confirmed),
            utc_datetime!(2024-05-01 00:00),
        )
        .await;

        match result {
            Err(SubmitError::LimitExceeded(violations)) => {
                assert!(violations.contains_key(&Platform::X));
                assert!(!violations.contains_key(&Platform::Discord));
            }
            other => panic!("expected limit error, got {other:?}"),
        }
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn drafts_skip_the_limit_check() {
        let store = RecordingStore::default();
        let post = post(&"a".repeat(281), [Platform::X, Platform::Discord]);

        let report = submit(
            &store,
            &post,
            &plan("1", SubmitMode::Draft),
            utc_datetime!(2024-05-01 00:00),
        )
        .await
        .unwrap();

        assert_eq!(store.writes(), 2);
        assert!(report.is_complete_success());
        assert!(store
            .records()
            .iter()
            .all(|record| record.status == PostStatus::Draft));
    }

    #[tokio::test]
    async fn failing_platform_does_not_stop_the_others() {
        let store = RecordingStore::failing_on([Platform::Instagram]);
        let post = post("hello", [Platform::X, Platform::Instagram, Platform::Discord]);

        let report = submit(
            &store,
            &post,
            &plan("1", SubmitMode::Confirmed),
            utc_datetime!(2024-05-01 00:00),
        )
        .await
        .unwrap();

        assert_eq!(store.writes(), 3);
        assert_eq!(store.records().len(), 2);

        let failed = report.failed().map(|outcome| outcome.platform).collect::<Vec<_>>();
        assert_eq!(failed, [Platform::Instagram]);
        assert_eq!(report.succeeded().count(), 2);
        assert!(report.summary().contains("Instagram"));
    }

    #[tokio::test]
    async fn schedule_is_stored_in_utc() {
        let store = RecordingStore::default();
        let mut post = post("hello", [Platform::X, Platform::Blog]);
        post.schedule = ScheduleInput::at(LocalSchedule::new(date!(2024-05-01), time!(10:00)));
        post.schedule_overrides.insert(
            Platform::Blog,
            ScheduleInput::at(LocalSchedule::new(date!(2024-05-03), time!(18:30))),
        );

        submit(
            &store,
            &post,
            &plan("1", SubmitMode::Confirmed),
            utc_datetime!(2024-04-30 00:00),
        )
        .await
        .unwrap();

        let records = store.records();
        let x = records.iter().find(|record| record.platform == Platform::X).unwrap();
        let blog = records.iter().find(|record| record.platform == Platform::Blog).unwrap();
        assert_eq!(x.scheduled_at, Some(utc_datetime!(2024-05-01 01:00)));
        assert_eq!(blog.scheduled_at, Some(utc_datetime!(2024-05-03 09:30)));
    }

    #[tokio::test]
    async fn incomplete_shared_schedule_is_rejected() {
        let store = RecordingStore::default();
        let mut post = post("hello", [Platform::X]);
        post.schedule = ScheduleInput {
            enabled: true,
            date: Some(date!(2024-05-01)),
            time: None,
        };

        let result = submit(
            &store,
            &post,
            &plan("1", SubmitMode::Confirmed),
            utc_datetime!(2024-04-30 00:00),
        )
        .await;

        assert_eq!(result.unwrap_err(), SubmitError::IncompleteSchedule);
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn confirmed_submission_needs_platforms_and_content() {
        let store = RecordingStore::default();
        let now = utc_datetime!(2024-04-30 00:00);

        let no_platforms = post("hello", []);
        let result = submit(&store, &no_platforms, &plan("1", SubmitMode::Confirmed), now).await;
        assert_eq!(result.unwrap_err(), SubmitError::NoPlatforms);

        let empty = post("  ", [Platform::X]);
        let result = submit(&store, &empty, &plan("1", SubmitMode::Confirmed), now).await;
        assert_eq!(result.unwrap_err(), SubmitError::EmptyContent);

        assert_eq!(store.writes(), 0);
    }

    #[test]
    fn mode_follows_post_status() {
        assert_eq!(SubmitMode::for_status(PostStatus::Draft), SubmitMode::Draft);
        assert_eq!(SubmitMode::for_status(PostStatus::Pending), SubmitMode::Confirmed);
        assert_eq!(SubmitMode::for_status(Post::default().status), SubmitMode::Draft);
    }

    #[tokio::test]
    async fn out_of_range_schedule_stores_nothing() {
        let year_zero = Date::from_calendar_date(0, Month::January, 1).unwrap();
        let now = utc_datetime!(2024-04-30 00:00);

        for mode in [SubmitMode::Confirmed, SubmitMode::Draft] {
            let store = RecordingStore::default();
            let mut post = post("hello", [Platform::X, Platform::Blog]);
            post.schedule_overrides.insert(
                Platform::Blog,
                ScheduleInput::at(LocalSchedule::new(year_zero, time!(00:00))),
            );

            let result = submit(&store, &post, &plan("1", mode), now).await;

            assert_eq!(result.unwrap_err(), SubmitError::InvalidSchedule(Platform::Blog));
            assert_eq!(store.writes(), 0);
        }
    }
}
