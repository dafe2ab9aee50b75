use crate::server::{ServerError, ServerRouter, auth::Authorized, json::Json};
use axum_extra::routing::{RouterExt, TypedPath};
use crosspost_common::model::platform::{Platform, PlatformSpec};
use serde::Deserialize;

pub fn routes() -> ServerRouter {
    ServerRouter::new().typed_get(list_platforms)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/platforms", rejection(ServerError))]
struct PlatformsPath();

async fn list_platforms(PlatformsPath(): PlatformsPath, _: Authorized) -> Json<Vec<PlatformSpec>> {
    Json(Platform::ALL.map(Platform::spec).to_vec())
}

#[cfg(test)]
mod tests {
    use crate::server::{routes, testing};
    use axum::http::{Method, StatusCode};

    #[tokio::test]
    async fn lists_every_platform_with_its_limit() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = testing::state(&dir);
        let app = routes().with_state(state);

        let (status, body) =
            testing::send(app, testing::empty_request(Method::GET, "/platforms")).await;

        assert_eq!(status, StatusCode::OK);
        let platforms = body.as_array().unwrap();
        assert_eq!(platforms.len(), 6);
        assert_eq!(platforms[0]["id"], "x");
        assert_eq!(platforms[0]["display_name"], "X (Twitter)");
        assert_eq!(platforms[0]["max_length"], 280);
    }
}
