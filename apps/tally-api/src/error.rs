//! HTTP error mapping.
//!
//! Every error leaving the API has the same JSON shape:
//!
//! ```json
//! { "error": { "kind": "insufficient_stock", "message": "..." } }
//! ```
//!
//! ## Status Mapping
//! ```text
//! insufficient_stock   → 409 Conflict
//! invalid_state        → 409 Conflict
//! conflict             → 409 Conflict   (retry budget exhausted)
//! not_found            → 404 Not Found
//! validation           → 422 Unprocessable Entity
//! audit_write_failure  → 500 Internal Server Error
//! internal             → 500 Internal Server Error (details logged, not leaked)
//! ```

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use tally_core::CoreError;
use tally_db::{DbError, ServiceError};

/// An API-level error: a machine-readable kind plus a human message.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub kind: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::NOT_FOUND,
            kind: "not_found",
            message: message.into(),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Core(core) => core_to_api(core),
            ServiceError::Db(db) => db_to_api(db),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        db_to_api(err)
    }
}

fn core_to_api(err: CoreError) -> ApiError {
    let (status, kind) = match &err {
        CoreError::InsufficientStock { .. } => (StatusCode::CONFLICT, "insufficient_stock"),
        CoreError::InvalidState { .. } => (StatusCode::CONFLICT, "invalid_state"),
        CoreError::ConcurrencyConflict { .. } => (StatusCode::CONFLICT, "conflict"),
        CoreError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
        CoreError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation"),
        CoreError::AuditWriteFailure { .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, "audit_write_failure")
        }
    };

    ApiError {
        status,
        kind,
        message: err.to_string(),
    }
}

fn db_to_api(err: DbError) -> ApiError {
    match &err {
        DbError::NotFound { .. } => ApiError {
            status: StatusCode::NOT_FOUND,
            kind: "not_found",
            message: err.to_string(),
        },
        DbError::UniqueViolation { .. } => ApiError {
            status: StatusCode::CONFLICT,
            kind: "conflict",
            message: err.to_string(),
        },
        // Infrastructure detail stays in the logs
        _ => {
            error!(error = %err, "Database error surfaced to API");
            ApiError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                kind: "internal",
                message: "Internal server error".to_string(),
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "error": {
                "kind": self.kind,
                "message": self.message,
            }
        }));
        (self.status, body).into_response()
    }
}

/// Handler result alias.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::ValidationError;

    #[test]
    fn test_core_error_mapping() {
        let err: ApiError = ServiceError::Core(CoreError::InsufficientStock {
            product_id: "p1".to_string(),
            branch_id: "b1".to_string(),
            available: 1,
            requested: 2,
        })
        .into();
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.kind, "insufficient_stock");

        let err: ApiError = ServiceError::Core(CoreError::Validation(ValidationError::Required {
            field: "reason".to_string(),
        }))
        .into();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.kind, "validation");

        let err: ApiError = ServiceError::Core(CoreError::not_found("Product", "p9")).into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_internal_details_not_leaked() {
        let err: ApiError =
            ServiceError::Db(DbError::QueryFailed("secret table detail".to_string())).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "Internal server error");
    }
}
