use crate::{
    overlay::{OverlayView, StatusOverlay},
    server::{
        DispatchClient, Result, ServerError, ServerRouter,
        auth::Authorized,
        json::{Json, Reply},
    },
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use crosspost_common::{
    composer::Composer,
    fanout::{SubmissionReport, SubmitMode},
    model::{
        id::{BaseIdGenerator, RecordId},
        post::{Post, PostRecord, PostStatus},
    },
    reconcile,
    remote::{DispatchRequest, DispatchTrigger, PostStore},
    schedule, validation,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Arc, Mutex},
};
use time::UtcDateTime;
use tracing::{info, warn};

const DISPATCH_LABEL: &str = "post_submitted";

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(list_posts)
        .typed_post(create_post)
        .typed_post(validate_post)
        .typed_get(post_status)
        .typed_put(edit_post)
        .typed_delete(delete_post)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts", rejection(ServerError))]
struct PostsPath();

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/validate", rejection(ServerError))]
struct ValidatePath();

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/status", rejection(ServerError))]
struct StatusPath();

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}", rejection(ServerError))]
struct PostPath {
    id: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
struct SubmitBody {
    post: Post,
    /// Falls back to the status of `post`.
    mode: Option<SubmitMode>,
}

impl SubmitBody {
    fn mode(&self) -> SubmitMode {
        self.mode
            .unwrap_or_else(|| SubmitMode::for_status(self.post.status))
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
struct SubmitResponse {
    summary: String,
    report: SubmissionReport,
    /// Set when the records were stored but the automation could not be
    /// triggered.
    #[serde(skip_serializing_if = "Option::is_none")]
    dispatch_notice: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
struct ValidateBody {
    content: String,
    #[serde(default)]
    overrides: BTreeMap<String, String>,
    platforms: Vec<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
struct ValidateResponse {
    valid: bool,
    violations: BTreeMap<String, Vec<String>>,
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
struct PostView {
    #[serde(flatten)]
    record: PostRecord,
    display_status: PostStatus,
    /// The schedule on the local wall clock.
    local_schedule: Option<String>,
}

async fn list_posts(
    PostsPath(): PostsPath,
    _: Authorized,
    State(store): State<Arc<dyn PostStore>>,
) -> Result<Json<Vec<PostView>>> {
    let records = store.fetch_all().await?;
    let now = UtcDateTime::now();

    let views = records
        .into_iter()
        .map(|record| PostView {
            display_status: reconcile::display_status(&record, now),
            local_schedule: record.scheduled_at.map(schedule::format_local),
            record,
        })
        .collect();

    Ok(Json(views))
}

async fn validate_post(
    ValidatePath(): ValidatePath,
    _: Authorized,
    Json(body): Json<ValidateBody>,
) -> Json<ValidateResponse> {
    let violations = validation::validate_ids(&body.content, &body.overrides, &body.platforms);

    Json(ValidateResponse {
        valid: violations.is_empty(),
        violations,
    })
}

async fn post_status(
    StatusPath(): StatusPath,
    _: Authorized,
    State(overlay): State<Arc<StatusOverlay>>,
) -> Json<OverlayView> {
    Json(overlay.view())
}

async fn create_post(
    PostsPath(): PostsPath,
    _: Authorized,
    State(store): State<Arc<dyn PostStore>>,
    State(ids): State<Arc<Mutex<BaseIdGenerator>>>,
    State(dispatch): State<DispatchClient>,
    Json(body): Json<SubmitBody>,
) -> Result<Reply<SubmitResponse>> {
    let mode = body.mode();
    let mut composer = Composer::new(body.post);

    submit(&mut composer, store.as_ref(), &ids, dispatch.as_deref(), mode).await
}

/// Resubmits a post under the base id of `id`. The post keeps the platforms
/// its records were created for.
async fn edit_post(
    PostPath { id }: PostPath,
    _: Authorized,
    State(store): State<Arc<dyn PostStore>>,
    State(ids): State<Arc<Mutex<BaseIdGenerator>>>,
    State(dispatch): State<DispatchClient>,
    Json(body): Json<SubmitBody>,
) -> Result<Reply<SubmitResponse>> {
    let record_id = RecordId::from_raw(id);
    let base_id = record_id.base_id();

    let assigned = store
        .fetch_all()
        .await?
        .into_iter()
        .filter(|record| record.id.base_id() == base_id)
        .map(|record| record.platform)
        .collect::<BTreeSet<_>>();
    if assigned.is_empty() {
        return Err(ServerError::PostNotFound(base_id));
    }

    let mode = body.mode();
    let mut composer = Composer::edit(record_id, assigned, body.post);

    submit(&mut composer, store.as_ref(), &ids, dispatch.as_deref(), mode).await
}

async fn delete_post(
    PostPath { id }: PostPath,
    _: Authorized,
    State(store): State<Arc<dyn PostStore>>,
) -> Result<StatusCode> {
    let record_id = RecordId::from_raw(id);

    if !store.delete(&record_id).await? {
        return Err(ServerError::RecordNotFound(record_id.into_inner()));
    }

    info!(%record_id, "Deleted post record");
    Ok(StatusCode::NO_CONTENT)
}

async fn submit(
    composer: &mut Composer,
    store: &dyn PostStore,
    ids: &Mutex<BaseIdGenerator>,
    dispatch: Option<&dyn DispatchTrigger>,
    mode: SubmitMode,
) -> Result<Reply<SubmitResponse>> {
    let report = composer
        .submit(store, ids, mode, UtcDateTime::now())
        .await?;

    let dispatch_notice = match (dispatch, mode) {
        (Some(dispatch), SubmitMode::Confirmed) => trigger_dispatch(dispatch, &report).await,
        _ => None,
    };

    Ok(Reply::new(
        submission_status(&report),
        SubmitResponse {
            summary: report.summary(),
            report,
            dispatch_notice,
        },
    ))
}

/// `207` when only some platforms were stored, `502` when none were.
fn submission_status(report: &SubmissionReport) -> StatusCode {
    if report.is_complete_success() {
        StatusCode::OK
    } else if report.succeeded().next().is_some() {
        StatusCode::MULTI_STATUS
    } else {
        StatusCode::BAD_GATEWAY
    }
}

/// Signals the automation that records are ready. A failure is returned as a
/// notice; the records stay stored either way.
async fn trigger_dispatch(
    dispatch: &dyn DispatchTrigger,
    report: &SubmissionReport,
) -> Option<String> {
    let count = report.succeeded().count();
    if count == 0 {
        return None;
    }

    let request = DispatchRequest {
        label: DISPATCH_LABEL.to_owned(),
        params: BTreeMap::from([
            ("base_id".to_owned(), report.base_id.to_string()),
            ("count".to_owned(), count.to_string()),
        ]),
    };

    match dispatch.trigger(&request).await {
        Ok(()) => {
            info!(base_id = %report.base_id, count, "Triggered dispatch");
            None
        }
        Err(err) => {
            warn!(base_id = %report.base_id, error = %err, "Triggering dispatch failed");
            Some(format!(
                "The posts were saved, but the automation could not be triggered: {err}"
            ))
        }
    }
}
