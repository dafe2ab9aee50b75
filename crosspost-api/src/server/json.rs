//! JSON bodies in and out of the service.
//!
//! Malformed request bodies and unserializable replies both end up as a
//! [`ServerError`], so every response the service sends is JSON.

use crate::server::ServerError;
use axum::{
    Json as AxumJson,
    extract::FromRequest,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::TypedHeader;
use headers::ContentType;
use serde::Serialize;

#[derive(FromRequest, Debug, Clone, Copy, Default)]
#[from_request(via(AxumJson), rejection(ServerError))]
pub struct Json<T>(pub T);

/// A JSON reply whose status depends on what the handler did.
///
/// Used for error bodies and for submissions, where some platforms may have
/// been stored while others failed.
#[derive(Debug, Clone, Copy)]
pub struct Reply<T> {
    pub status: StatusCode,
    pub body: T,
}

impl<T> Reply<T> {
    #[must_use]
    pub fn new(status: StatusCode, body: T) -> Self {
        Self { status, body }
    }
}

fn encode<T: Serialize>(status: StatusCode, body: &T) -> Response {
    match serde_json::to_vec(body) {
        Ok(json) => (status, TypedHeader(ContentType::json()), json).into_response(),
        // The status of the failed reply is dropped, the error picks its own.
        Err(err) => ServerError::JsonResponse(err).into_response(),
    }
}

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        encode(StatusCode::OK, &self.0)
    }
}

impl<T: Serialize> IntoResponse for Reply<T> {
    fn into_response(self) -> Response {
        encode(self.status, &self.body)
    }
}
