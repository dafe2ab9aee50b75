use crate::{
    overlay::StatusOverlay,
    settings::{SettingsError, SettingsService},
};
use axum::{
    Router,
    extract::{
        FromRef, Request,
        rejection::{JsonRejection, PathRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use axum_extra::typed_header::TypedHeaderRejection;
use crosspost_common::{
    composer::ComposerError,
    fanout::SubmitError,
    model::id::{BaseId, BaseIdGenerator},
    remote::{AiProvider, DispatchTrigger, DraftGenerator, PostStore, RemoteError},
    validation::Violations,
};
use json::Reply;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::error;

pub use auth::ApiToken;

mod auth;
mod json;
mod routes;

pub type ServerRouter = Router<ServerState>;

pub type DraftClient = Option<Arc<dyn DraftGenerator>>;
pub type DispatchClient = Option<Arc<dyn DispatchTrigger>>;

#[derive(Clone, FromRef)]
pub struct ServerState {
    pub store: Arc<dyn PostStore>,
    pub ids: Arc<Mutex<BaseIdGenerator>>,
    pub drafts: DraftClient,
    pub dispatch: DispatchClient,
    pub overlay: Arc<StatusOverlay>,
    pub settings: Arc<SettingsService>,
    pub api_token: ApiToken,
    pub ai_provider: AiProvider,
}

pub fn routes() -> ServerRouter {
    routes::routes().fallback(fallback)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("Authorization header was missing or invalid: {0}")]
    InvalidAuthorizationHeader(TypedHeaderRejection),
    #[error("Provided token was invalid")]
    InvalidToken,
    #[error(transparent)]
    Composer(#[from] ComposerError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("Post with id {0} was not found.")]
    PostNotFound(BaseId),
    #[error("Record with id {0} was not found.")]
    RecordNotFound(String),
    #[error("No draft generator is configured")]
    DraftsUnavailable,
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::PostNotFound(_)
            | ServerError::RecordNotFound(_) => StatusCode::NOT_FOUND,
            ServerError::InvalidAuthorizationHeader(rejection) if rejection.is_missing() => {
                StatusCode::UNAUTHORIZED
            }
            ServerError::InvalidToken => StatusCode::UNAUTHORIZED,
            ServerError::JsonRejection(_)
            | ServerError::InvalidAuthorizationHeader(_)
            | ServerError::Composer(ComposerError::MissingDraftInput) => StatusCode::BAD_REQUEST,
            ServerError::Composer(ComposerError::Submit(SubmitError::LimitExceeded(_))) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ServerError::Composer(ComposerError::Submit(_)) => StatusCode::BAD_REQUEST,
            ServerError::Composer(
                ComposerError::PlatformsLocked | ComposerError::AlreadyInFlight(_),
            ) => StatusCode::CONFLICT,
            ServerError::Composer(ComposerError::Remote(_)) | ServerError::Remote(_) => {
                StatusCode::BAD_GATEWAY
            }
            ServerError::DraftsUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::JsonResponse(_) | ServerError::Settings(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn violations(&self) -> Option<&Violations> {
        match self {
            ServerError::Composer(ComposerError::Submit(SubmitError::LimitExceeded(
                violations,
            ))) => Some(violations),
            _ => None,
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
struct ErrorResponse<'a> {
    status: u16,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    violations: Option<&'a Violations>,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        error!(error = %self, %status, "Replying with error");

        let error_response = ErrorResponse {
            status: status.as_u16(),
            message: self.to_string(),
            violations: self.violations(),
        };
        Reply::new(status, error_response).into_response()
    }
}


#[cfg(test)]
mod tests {
    use crate::server::{ApiToken, routes, testing};
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = testing::state(&dir);
        let app = routes().with_state(state);

        let response = app
            .oneshot(Request::get("/nowhere").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["status"], 404);
        assert!(body.get("violations").is_none());
    }

    #[tokio::test]
    async fn token_is_enforced_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        let (mut state, _) = testing::state(&dir);
        state.api_token = ApiToken::new(Some("secret".to_owned()));
        let app = routes().with_state(state);

        let missing = app
            .clone()
            .oneshot(Request::get("/platforms").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let wrong = app
            .clone()
            .oneshot(
                Request::get("/platforms")
                    .header(header::AUTHORIZATION, "Bearer nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

        let right = app
            .oneshot(
                Request::get("/platforms")
                    .header(header::AUTHORIZATION, "Bearer secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(right.status(), StatusCode::OK);
    }
}
