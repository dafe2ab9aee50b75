//! Display-only correction of stale pending records.
//!
//! The automation that publishes scheduled posts does not always report back.
//! A record still pending well after its scheduled time is shown as failed.
//! The stored status is left alone: the result of this module is never meant
//! to be written back to the store.

use crate::model::post::{PostRecord, PostStatus};
use serde::Serialize;
use std::time::Duration as StdDuration;
use time::{Duration, UtcDateTime};

/// How long a pending record may stay past its schedule before it is shown
/// as failed.
pub const RECONCILE_GRACE: Duration = Duration::minutes(5);

/// How often the overlay is recomputed.
pub const RECONCILE_INTERVAL: StdDuration = StdDuration::from_secs(60);

/// A record together with the status it should be shown with.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize)]
pub struct ReconciledPost<'a> {
    pub record: &'a PostRecord,
    pub display_status: PostStatus,
}

#[must_use]
pub fn display_status(record: &PostRecord, now: UtcDateTime) -> PostStatus {
    match (record.status, record.scheduled_at) {
        (PostStatus::Pending, Some(scheduled_at)) if now - scheduled_at > RECONCILE_GRACE => {
            PostStatus::Failed
        }
        (status, _) => status,
    }
}

#[must_use]
pub fn reconcile(records: &[PostRecord], now: UtcDateTime) -> Vec<ReconciledPost<'_>> {
    records
        .iter()
        .map(|record| ReconciledPost {
            record,
            display_status: display_status(record, now),
        })
        .collect()
}
