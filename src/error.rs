use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Message returned when a request carries no credentials at all.
pub const CREDENTIALS_NOT_PROVIDED: &str = "Authentication credentials were not provided.";

/// Challenge advertised on every 401 so clients know which scheme to retry with.
const AUTHENTICATE_CHALLENGE: &str = "JWT realm=\"api\"";

/// ErrorBody
///
/// The uniform wire shape of every error response: `{"detail": "<message>"}`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ErrorBody {
    pub detail: String,
}

/// ApiError
///
/// The request-level failure taxonomy. Every handler returns `Result<_, ApiError>` and the
/// `IntoResponse` impl below is the only place statuses and bodies are decided.
///
/// Row-scoped authorization failures are never represented as `Forbidden`: the resource
/// controllers turn them into `NotFound` so existence is not leaked.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// No credentials, or credentials that failed to resolve to an active user (401).
    #[error("{0}")]
    Unauthenticated(String),
    /// Authenticated, but the action class is denied (403).
    #[error("You do not have permission to perform this action.")]
    Forbidden,
    /// The row is absent from the caller's visible set (404).
    #[error("Not found.")]
    NotFound,
    /// Malformed, missing or conflicting input (400).
    #[error("{0}")]
    ValidationFailed(String),
    /// Anything the client cannot fix. Details are logged, never returned.
    #[error("A server error occurred.")]
    Internal,
}

impl ApiError {
    /// The 401 raised when no credentials were presented.
    pub fn unauthenticated() -> Self {
        ApiError::Unauthenticated(CREDENTIALS_NOT_PROVIDED.to_string())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::ValidationFailed(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            detail: self.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut response = (status, Json(self.body())).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static(AUTHENTICATE_CHALLENGE),
            );
        }

        response
    }
}

/// RepositoryError
///
/// Failures surfaced by the persistence layer. Constraint violations are split out so that
/// create/update can report them to the client as a 400 instead of a 500.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// A uniqueness or reference constraint rejected the write. The message is client-safe.
    #[error("{0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(message) => ApiError::ValidationFailed(message),
            RepositoryError::Database(e) => {
                tracing::error!("repository failure: {:?}", e);
                ApiError::Internal
            }
        }
    }
}
