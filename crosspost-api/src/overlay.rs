//! Periodic status overlay over the stored records.
//!
//! The snapshot is only ever served read-only; nothing here writes to the
//! store.

use crosspost_common::{
    model::{id::RecordId, platform::Platform, post::PostStatus},
    reconcile::{self, RECONCILE_INTERVAL},
    remote::PostStore,
    request::RequestState,
    schedule,
};
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};
use time::UtcDateTime;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct OverlayEntry {
    pub record_id: RecordId,
    pub platform: Platform,
    pub stored_status: PostStatus,
    pub display_status: PostStatus,
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct OverlaySnapshot {
    #[serde(with = "schedule::rfc3339")]
    pub computed_at: UtcDateTime,
    pub entries: Vec<OverlayEntry>,
}

/// What `GET /posts/status` serves.
#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct OverlayView {
    pub refreshing: bool,
    pub last_error: Option<String>,
    pub snapshot: Option<OverlaySnapshot>,
}

#[derive(Debug)]
struct OverlayState {
    refresh: RequestState<UtcDateTime, String>,
    latest: Option<OverlaySnapshot>,
}

/// Held while a refresh runs. Dropping it before the refresh finished, e.g.
/// because the refreshing future was dropped, lets the next one start.
struct RefreshGuard<'a>(&'a RwLock<OverlayState>);

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .refresh
            .abandon();
    }
}

pub struct StatusOverlay {
    store: Arc<dyn PostStore>,
    state: RwLock<OverlayState>,
}

impl StatusOverlay {
    #[must_use]
    pub fn new(store: Arc<dyn PostStore>) -> Self {
        Self {
            store,
            state: RwLock::new(OverlayState {
                refresh: RequestState::Idle,
                latest: None,
            }),
        }
    }

    /// Recomputes the snapshot. A refresh that is already running is not
    /// started twice. A failed refresh keeps the previous snapshot.
    pub async fn refresh(&self, now: UtcDateTime) {
        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            if state.refresh.start().is_err() {
                debug!("Status overlay refresh already running");
                return;
            }
        }
        let _guard = RefreshGuard(&self.state);

        let result = self.store.fetch_all().await;

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        match result {
            Ok(records) => {
                let entries = reconcile::reconcile(&records, now)
                    .into_iter()
                    .map(|post| OverlayEntry {
                        record_id: post.record.id.clone(),
                        platform: post.record.platform,
                        stored_status: post.record.status,
                        display_status: post.display_status,
                    })
                    .collect::<Vec<_>>();
                debug!(count = entries.len(), "Status overlay refreshed");

                state.latest = Some(OverlaySnapshot {
                    computed_at: now,
                    entries,
                });
                state.refresh.succeed(now);
            }
            Err(err) => {
                warn!(error = %err, "Status overlay refresh failed");
                state.refresh.fail(err.to_string());
            }
        }
    }

    #[must_use]
    pub fn view(&self) -> OverlayView {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        OverlayView {
            refreshing: state.refresh.is_in_flight(),
            last_error: state.refresh.error().cloned(),
            snapshot: state.latest.clone(),
        }
    }

    /// Refreshes right away and then once per [`RECONCILE_INTERVAL`] until
    /// `cancel` fires.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(RECONCILE_INTERVAL);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("Status overlay stopped");
                    break;
                }
                _ = interval.tick() => self.refresh(UtcDateTime::now()).await,
            }
        }
    }
}
