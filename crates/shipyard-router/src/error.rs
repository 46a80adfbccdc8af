//! Routing registry errors.

use thiserror::Error;

/// Closed set of failures reported by routing backends.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    #[error("Backend already exists")]
    BackendExists,

    #[error("Backend not found")]
    BackendNotFound,

    #[error("Backend was swapped and cannot be removed")]
    BackendSwapped,

    #[error("Route already exists")]
    RouteExists,

    #[error("Route not found")]
    RouteNotFound,

    #[error("CName already exists")]
    CNameExists,

    #[error("CName not found")]
    CNameNotFound,

    #[error("CName as router subdomain not allowed")]
    CNameNotAllowed,

    /// Injected failure for an address (test harness only).
    #[error("Forced failure for {0}")]
    ForcedFailure(String),

    #[error("router unhealthy: {0}")]
    Unhealthy(String),

    #[error("name registry error: {0}")]
    Names(String),
}

impl From<shipyard_state::StateError> for RouterError {
    fn from(err: shipyard_state::StateError) -> Self {
        RouterError::Names(err.to_string())
    }
}

pub type RouterResult<T> = Result<T, RouterError>;
