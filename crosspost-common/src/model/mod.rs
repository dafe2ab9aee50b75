pub mod id;
pub mod platform;
pub mod post;

use crate::model::platform::UnknownPlatformError;
use thiserror::Error;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum ModelValidationError {
    #[error(transparent)]
    UnknownPlatform(#[from] UnknownPlatformError),
    #[error("Unknown post status: {0}")]
    UnknownStatus(String),
    #[error("Schedule literal could not be parsed: {0}")]
    InvalidSchedule(String),
}
