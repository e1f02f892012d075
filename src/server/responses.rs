//! Mapping of domain errors to HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, warn};

use crate::conversation::ConversationError;
use crate::matching::MatchError;
use crate::profile::ProfileSourceError;

use super::metrics::record_error;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: &'a str,
}

impl ApiError {
    pub fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        ApiError {
            status,
            kind,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    fn storage(err: anyhow::Error) -> Self {
        error!("Storage failure: {:#}", err);
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "storage",
            "Internal server error",
        )
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::storage(err)
    }
}

impl From<MatchError> for ApiError {
    fn from(err: MatchError) -> Self {
        let message = err.to_string();
        let (status, kind) = match err {
            MatchError::NoCandidatesAvailable => {
                (StatusCode::NO_CONTENT, "no_candidates_available")
            }
            MatchError::IllegalTransition { .. } => (StatusCode::CONFLICT, "illegal_transition"),
            MatchError::ConstraintViolation { .. } => {
                (StatusCode::CONFLICT, "constraint_violation")
            }
            MatchError::MatchNotFound { .. } => (StatusCode::NOT_FOUND, "match_not_found"),
            MatchError::Contention { .. } => (StatusCode::SERVICE_UNAVAILABLE, "contention"),
            MatchError::Storage(inner) => return ApiError::storage(inner),
        };
        ApiError::new(status, kind, message)
    }
}

impl From<ConversationError> for ApiError {
    fn from(err: ConversationError) -> Self {
        let message = err.to_string();
        let (status, kind) = match err {
            ConversationError::NotMatched { .. } => (StatusCode::FORBIDDEN, "not_matched"),
            ConversationError::EmptyMessage => (StatusCode::BAD_REQUEST, "empty_message"),
            ConversationError::MessageTooLong { .. } => {
                (StatusCode::BAD_REQUEST, "message_too_long")
            }
            ConversationError::Storage(inner) => return ApiError::storage(inner),
        };
        ApiError::new(status, kind, message)
    }
}

impl From<ProfileSourceError> for ApiError {
    fn from(err: ProfileSourceError) -> Self {
        ApiError::new(StatusCode::BAD_GATEWAY, "upstream_unavailable", err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // An empty candidate queue is a normal state.
        if self.status == StatusCode::NO_CONTENT {
            return StatusCode::NO_CONTENT.into_response();
        }

        if self.status.is_client_error() {
            warn!("{} ({}): {}", self.kind, self.status, self.message);
        } else {
            error!("{} ({}): {}", self.kind, self.status, self.message);
        }
        record_error(self.kind, self.status.as_u16());

        let body = ErrorBody {
            error: self.kind,
            message: &self.message,
        };
        (self.status, Json(body)).into_response()
    }
}
