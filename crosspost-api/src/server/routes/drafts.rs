use crate::server::{DraftClient, Result, ServerError, ServerRouter, auth::Authorized, json::Json};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use crosspost_common::{
    composer::Composer,
    model::post::Post,
    remote::{AiProvider, DraftMap},
    validation::Violations,
};
use serde::{Deserialize, Serialize};

pub fn routes() -> ServerRouter {
    ServerRouter::new().typed_post(generate_drafts)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/drafts", rejection(ServerError))]
struct DraftsPath();

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
struct DraftBody {
    post: Post,
    #[serde(default)]
    instructions: String,
    /// Falls back to the configured provider.
    provider: Option<AiProvider>,
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
struct DraftResponse {
    drafts: DraftMap,
    post: Post,
    violations: Violations,
}

async fn generate_drafts(
    DraftsPath(): DraftsPath,
    _: Authorized,
    State(generator): State<DraftClient>,
    State(default_provider): State<AiProvider>,
    Json(body): Json<DraftBody>,
) -> Result<Json<DraftResponse>> {
    let generator = generator.ok_or(ServerError::DraftsUnavailable)?;
    let provider = body.provider.unwrap_or(default_provider);

    let mut composer = Composer::new(body.post);
    let drafts = composer
        .generate_drafts(generator.as_ref(), body.instructions, provider)
        .await?;

    Ok(Json(DraftResponse {
        drafts,
        post: composer.post().clone(),
        violations: composer.violations().clone(),
    }))
}

#[cfg(test)]
mod tests {
    use crate::server::{routes, testing};
    use async_trait::async_trait;
    use axum::http::{Method, StatusCode};
    use crosspost_common::remote::{
        AiProvider, DraftGenerator, DraftMap, DraftRequest, RemoteError,
    };
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct EchoDrafts {
        providers: Mutex<Vec<AiProvider>>,
    }

    #[async_trait]
    impl DraftGenerator for EchoDrafts {
        async fn generate(&self, request: &DraftRequest) -> Result<DraftMap, RemoteError> {
            self.providers.lock().unwrap().push(request.provider);
            Ok(request
                .platforms
                .iter()
                .map(|&platform| (platform, "x".repeat(platform.max_length() + 1)))
                .collect())
        }
    }

    #[tokio::test]
    async fn drafts_are_merged_and_revalidated() {
        let dir = tempfile::tempdir().unwrap();
        let (mut state, _) = testing::state(&dir);
        let generator = Arc::new(EchoDrafts::default());
        state.drafts = Some(generator.clone());
        state.ai_provider = AiProvider::Anthropic;
        let app = routes().with_state(state);

        let body = json!({
            "post": { "content": "base", "platforms": ["x"] },
            "instructions": "punchy",
        });
        let (status, body) =
            testing::send(app, testing::json_request(Method::POST, "/drafts", &body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["drafts"]["x"].as_str().unwrap().chars().count(), 281);
        assert_eq!(body["post"]["content_overrides"]["x"], body["drafts"]["x"]);
        assert!(body["violations"].get("x").is_some());
        assert_eq!(*generator.providers.lock().unwrap(), [AiProvider::Anthropic]);
    }

    #[tokio::test]
    async fn request_may_pick_the_provider() {
        let dir = tempfile::tempdir().unwrap();
        let (mut state, _) = testing::state(&dir);
        let generator = Arc::new(EchoDrafts::default());
        state.drafts = Some(generator.clone());
        let app = routes().with_state(state);

        let body = json!({
            "post": { "content": "base", "platforms": ["blog"] },
            "provider": "gemini",
        });
        let (status, _) =
            testing::send(app, testing::json_request(Method::POST, "/drafts", &body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(*generator.providers.lock().unwrap(), [AiProvider::Gemini]);
    }

    #[tokio::test]
    async fn missing_generator_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = testing::state(&dir);
        let app = routes().with_state(state);

        let body = json!({ "post": { "content": "base", "platforms": ["x"] } });
        let (status, _) =
            testing::send(app, testing::json_request(Method::POST, "/drafts", &body)).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn empty_content_is_a_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let (mut state, _) = testing::state(&dir);
        state.drafts = Some(Arc::new(EchoDrafts::default()));
        let app = routes().with_state(state);

        let body = json!({ "post": { "content": "", "platforms": ["x"] } });
        let (status, _) =
            testing::send(app, testing::json_request(Method::POST, "/drafts", &body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
