use crate::{
    clients::{dispatch::WebhookDispatchTrigger, draft::HttpDraftGenerator},
    overlay::StatusOverlay,
    server::{ApiToken, DispatchClient, DraftClient, ServerState},
    settings::{LogBuffer, LogBufferLayer, SettingsError, SettingsService},
};
use crosspost_common::{
    model::id::BaseIdGenerator,
    remote::{AiProvider, DispatchTrigger, DraftGenerator, PostStore},
};
use crosspost_db::{
    client::{DbClient, DbError},
    memory::MemoryStore,
};
use serde::Deserialize;
use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    sync::{Arc, Mutex},
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod clients;
mod overlay;
mod server;
mod settings;

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
    #[error("Error setting up the database: {0}")]
    Db(#[from] DbError),
    #[error("Error loading settings: {0}")]
    Settings(#[from] SettingsError),
}

fn default_preferences_path() -> PathBuf {
    PathBuf::from("preferences.json")
}

fn default_log_buffer_capacity() -> usize {
    200
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct Env {
    server_address: IpAddr,
    server_port: u16,
    /// Without it, records are kept in memory only.
    database_url: Option<String>,
    api_token: Option<String>,
    draft_endpoint: Option<String>,
    #[serde(default)]
    ai_provider: AiProvider,
    dispatch_webhook_url: Option<String>,
    #[serde(default = "default_preferences_path")]
    preferences_path: PathBuf,
    #[serde(default = "default_log_buffer_capacity")]
    log_buffer_capacity: usize,
}

fn install_tracing(logs: LogBuffer) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "crosspost_api=debug,\
                crosspost_common=debug,\
                crosspost_db=debug,\
                tower_http=debug,axum::rejection=trace,sqlx=warn"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(LogBufferLayer::new(logs))
        .init();
}

fn get_env() -> Result<Env, InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .dotenv file found");
        } else {
            return Err(e.into());
        }
    }

    envy::from_env().map_err(InitError::from)
}

async fn connect_store(database_url: Option<&str>) -> Result<Arc<dyn PostStore>, InitError> {
    let Some(database_url) = database_url else {
        warn!("DATABASE_URL is not set, post records are kept in memory only");
        return Ok(Arc::new(MemoryStore::new()));
    };

    let db = DbClient::connect(database_url).await?;
    db.migrate().await?;
    info!("Connected to database");

    Ok(Arc::new(db))
}

async fn shutdown_signal(cancel: CancellationToken) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "Listening for ctrl-c failed, shutting down");
    }
    info!("Shutting down");
    cancel.cancel();
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    // Tracing is installed before the env is read, so the buffer is resized afterwards.
    let logs = LogBuffer::new(default_log_buffer_capacity());
    install_tracing(logs.clone());
    let env = get_env()?;
    logs.resize(env.log_buffer_capacity);

    let store = connect_store(env.database_url.as_deref()).await?;
    let settings = Arc::new(SettingsService::load(env.preferences_path.clone(), logs)?);

    let drafts: DraftClient = env
        .draft_endpoint
        .clone()
        .map(|endpoint| {
            Arc::new(HttpDraftGenerator::new(endpoint)) as Arc<dyn DraftGenerator>
        });
    let dispatch: DispatchClient = env
        .dispatch_webhook_url
        .clone()
        .map(|url| Arc::new(WebhookDispatchTrigger::new(url)) as Arc<dyn DispatchTrigger>);
    if drafts.is_none() {
        debug!("DRAFT_ENDPOINT is not set, draft generation is disabled");
    }
    if dispatch.is_none() {
        debug!("DISPATCH_WEBHOOK_URL is not set, submissions are not dispatched");
    }

    let overlay = Arc::new(StatusOverlay::new(Arc::clone(&store)));
    let cancel = CancellationToken::new();
    let overlay_task = tokio::spawn(Arc::clone(&overlay).run(cancel.clone()));

    let state = ServerState {
        store,
        ids: Arc::new(Mutex::new(BaseIdGenerator::new())),
        drafts,
        dispatch,
        overlay,
        settings: Arc::clone(&settings),
        api_token: ApiToken::new(env.api_token.clone()),
        ai_provider: env.ai_provider,
    };

    let tracing_layer = TraceLayer::new_for_http();
    let app = server::routes().layer(tracing_layer).with_state(state);

    let server_address = SocketAddr::new(env.server_address, env.server_port);
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(%server_address, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await
        .map_err(InitError::TcpServe)?;

    cancel.cancel();
    if let Err(err) = overlay_task.await {
        warn!(error = %err, "Status overlay task ended abnormally");
    }
    settings.flush().await?;

    Ok(())
}
