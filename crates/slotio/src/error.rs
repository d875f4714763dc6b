use thiserror::Error;

use crate::handle::RequestHandle;

/// Errors returned across the registry boundary.
///
/// I/O outcomes are not errors here: a missing file or a failed fetch is
/// recorded in the slot and observed through `status`/`error_status`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("invalid request handle {0}")]
    InvalidHandle(RequestHandle),

    #[error("resource identifier must not be empty")]
    EmptyResource,

    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("no async runtime available: {0}")]
    Runtime(String),
}

pub type Result<T> = std::result::Result<T, RegistryError>;
