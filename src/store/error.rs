use axum::http::StatusCode;
use thiserror::Error;
use tracing::error;

/// Error taxonomy surfaced by the persistence port.
///
/// `NotFound` and `AccessDenied` stay separate variants even though some
/// endpoints collapse them into one status, so callers that need the
/// distinction (offer update/delete) still have it.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already in use")]
    DuplicateEmail,

    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error("access denied")]
    AccessDenied,

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl StoreError {
    pub fn user_not_found() -> Self {
        Self::NotFound { entity: "User" }
    }

    pub fn offer_not_found() -> Self {
        Self::NotFound { entity: "Offer" }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Map to the `(status, message)` pair handlers return. Internal causes
    /// are logged here and never leak into the response body.
    pub fn response(self) -> (StatusCode, String) {
        match self {
            Self::DuplicateEmail => (
                StatusCode::CONFLICT,
                "This email is already in use".to_string(),
            ),
            Self::NotFound { entity } => (StatusCode::NOT_FOUND, format!("{entity} not found")),
            Self::AccessDenied => (StatusCode::FORBIDDEN, "Access denied".to_string()),
            Self::Validation(message) => (StatusCode::BAD_REQUEST, message),
            Self::Internal(err) => {
                error!(error = %err, "storage failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.into())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(err.into())
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Internal(err.into())
    }
}
