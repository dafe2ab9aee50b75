use crate::server::ServerRouter;
use axum::Router;

mod drafts;
mod platforms;
mod posts;
mod preferences;

pub fn routes() -> ServerRouter {
    Router::new()
        .merge(platforms::routes())
        .merge(posts::routes())
        .merge(drafts::routes())
        .merge(preferences::routes())
}
