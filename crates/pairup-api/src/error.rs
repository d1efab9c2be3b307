//! HTTP mapping for engine errors.
//!
//! Every error body has the shape `{ "error": { "code", "message", "refresh" } }`.
//! `refresh` tells the client its view is stale and should be reloaded.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use pairup_engine::{Conflict, EngineError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("invalid request: {0}")]
    BadRequest(String),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String, bool) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone(), false),
            ApiError::Engine(err) => match err {
                EngineError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION", msg.clone(), false),
                EngineError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string(), true),
                EngineError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone(), false),
                EngineError::Conflict(c) => conflict_parts(*c),
                EngineError::Store(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "storage is temporarily unavailable".to_string(),
                    false,
                ),
            },
        }
    }
}

fn conflict_parts(conflict: Conflict) -> (StatusCode, &'static str, String, bool) {
    (StatusCode::CONFLICT, conflict.code(), conflict.to_string(), conflict.refresh())
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, refresh) = self.parts();

        if status.is_server_error() {
            error!("request failed: {}", self);
        } else if status == StatusCode::CONFLICT {
            warn!("request conflicted: {}", code);
        }

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
                "refresh": refresh,
            }
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pairup_engine::StoreError;

    fn status_of(err: EngineError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn engine_errors_map_to_statuses() {
        assert_eq!(status_of(EngineError::validation("bad")), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(EngineError::NotFound("group")), StatusCode::NOT_FOUND);
        assert_eq!(status_of(EngineError::forbidden("nope")), StatusCode::FORBIDDEN);
        assert_eq!(status_of(Conflict::AlreadyMatched.into()), StatusCode::CONFLICT);
        assert_eq!(
            status_of(StoreError::Backend("disk".into()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn conflicts_carry_code_and_refresh_hint() {
        let (_, code, _, refresh) = ApiError::from(EngineError::from(Conflict::InvitationResolved)).parts();
        assert_eq!(code, "INVITATION_RESOLVED");
        assert!(refresh);

        let (_, code, _, refresh) = ApiError::from(EngineError::from(Conflict::DuplicateVote)).parts();
        assert_eq!(code, "DUPLICATE_VOTE");
        assert!(!refresh);
    }

    #[test]
    fn store_details_are_not_leaked() {
        let (_, _, message, _) = ApiError::from(EngineError::from(StoreError::Backend("secret path".into()))).parts();
        assert!(!message.contains("secret"));
    }
}
