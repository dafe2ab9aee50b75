use crate::{
    server::{Result, ServerError, ServerRouter, auth::Authorized, json::Json},
    settings::{LogEntry, Preferences, SettingsService},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(get_preferences)
        .typed_put(update_preferences)
        .typed_get(get_logs)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/preferences", rejection(ServerError))]
struct PreferencesPath();

#[derive(TypedPath, Deserialize)]
#[typed_path("/logs", rejection(ServerError))]
struct LogsPath();

async fn get_preferences(
    PreferencesPath(): PreferencesPath,
    _: Authorized,
    State(settings): State<Arc<SettingsService>>,
) -> Json<Preferences> {
    Json(settings.preferences())
}

async fn update_preferences(
    PreferencesPath(): PreferencesPath,
    _: Authorized,
    State(settings): State<Arc<SettingsService>>,
    Json(preferences): Json<Preferences>,
) -> Result<Json<Preferences>> {
    settings.update(preferences).await?;
    info!(?preferences, "Updated preferences");

    Ok(Json(settings.preferences()))
}

async fn get_logs(
    LogsPath(): LogsPath,
    _: Authorized,
    State(settings): State<Arc<SettingsService>>,
) -> Json<Vec<LogEntry>> {
    Json(settings.logs().entries())
}
