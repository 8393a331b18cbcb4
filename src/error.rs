//! Failure taxonomy shared by repositories, the identity provider and the
//! HTTP handlers.

use axum::http::StatusCode;
use thiserror::Error;

use crate::model::Role;

#[derive(Debug, Error)]
pub enum PortalError {
    /// Bad credentials or an identity provider refusal.
    #[error("{0}")]
    Auth(String),

    /// The signed-in identity does not hold the role it asked for.
    #[error("You are not registered as a {0}.")]
    RoleMismatch(Role),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    /// A write attempted by a role the storage rules do not allow.
    #[error("permission denied: {0}")]
    Permission(String),

    /// Transient I/O failure talking to a collaborator.
    #[error("network failure: {0}")]
    Network(String),

    /// An upstream service answered with something we could not read.
    #[error("unexpected upstream response: {0}")]
    Upstream(String),

    /// Form input failed its schema checks.
    #[error("{message}")]
    Validation { field: &'static str, message: String },

    /// Compare-and-retry ran out of attempts.
    #[error("registration is busy, gave up after {attempts} attempts")]
    Conflict { attempts: u32 },

    #[error("storage failure: {0}")]
    Storage(#[source] sqlx::Error),

    #[error("session failure: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("attachment failure: {0}")]
    Blob(#[from] std::io::Error),

    #[error("corrupt document: {0}")]
    Corrupt(String),

    /// The password hasher failed or a stored hash could not be parsed.
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

impl PortalError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { kind, id: id.into() }
    }

    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation { field, message: message.into() }
    }

    /// Failures worth retrying later rather than treating as final.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Auth(_) | Self::RoleMismatch(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Permission(_) => StatusCode::FORBIDDEN,
            Self::Network(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Storage(_) | Self::Session(_) | Self::Blob(_) | Self::Corrupt(_) | Self::Hashing(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
        }
    }
}

impl From<sqlx::Error> for PortalError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                Self::Network(err.to_string())
            },
            err => Self::Storage(err),
        }
    }
}

impl From<reqwest::Error> for PortalError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Upstream(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for PortalError {
    fn from(err: serde_json::Error) -> Self {
        Self::Corrupt(err.to_string())
    }
}
