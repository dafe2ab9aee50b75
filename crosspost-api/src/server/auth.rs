use crate::server::ServerError;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use std::sync::Arc;

type AuthorizationHeader = TypedHeader<Authorization<Bearer>>;

/// The bearer token every request has to present. `None` leaves the API open.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct ApiToken(Option<Arc<str>>);

impl ApiToken {
    #[must_use]
    pub fn new(token: Option<String>) -> Self {
        Self(token.filter(|token| !token.is_empty()).map(Arc::from))
    }
}

/// Proof that the request carried the configured [`ApiToken`].
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct Authorized;

impl<S> FromRequestParts<S> for Authorized
where
    ApiToken: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let ApiToken(Some(expected)) = ApiToken::from_ref(state) else {
            return Ok(Self);
        };

        let header = AuthorizationHeader::from_request_parts(parts, state)
            .await
            .map_err(ServerError::InvalidAuthorizationHeader)?;

        if header.token() != &*expected {
            return Err(ServerError::InvalidToken);
        }

        Ok(Self)
    }
}
