//! API error types with structured JSON responses.

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::accounts::AccountError;
use crate::authorization::AccessDenied;
use crate::core_state::CoreError;
use crate::crypto::CryptoError;
use crate::db::DatabaseError;
use crate::prescriptions::PrescriptionError;
use crate::storage::StorageError;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthorized,
    #[error("Token expired")]
    TokenExpired,
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),
    #[error("Rate limit exceeded")]
    RateLimited { retry_after: u64 },
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "AUTH_REQUIRED",
                "Authentication required".to_string(),
            ),
            ApiError::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                "TOKEN_EXPIRED",
                "Token expired, refresh or log in again".to_string(),
            ),
            ApiError::Forbidden(detail) => (StatusCode::FORBIDDEN, "FORBIDDEN", detail.clone()),
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, "NOT_FOUND", detail.clone()),
            ApiError::Conflict(detail) => (StatusCode::CONFLICT, "CONFLICT", detail.clone()),
            ApiError::PayloadTooLarge(detail) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "PAYLOAD_TOO_LARGE",
                detail.clone(),
            ),
            ApiError::RateLimited { retry_after } => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMITED",
                format!("Rate limit exceeded. Retry after {retry_after}s"),
            ),
            ApiError::BadRequest(detail) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail.clone())
            }
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };

        let mut response = (status, Json(body)).into_response();
        if let ApiError::RateLimited { retry_after } = &self {
            if let Ok(val) = HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert("Retry-After", val);
            }
        }
        response
    }
}

// ═══════════════════════════════════════════════════════════
// Domain error mapping
// ═══════════════════════════════════════════════════════════

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(err: rusqlite::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound { entity_type, .. } => {
                ApiError::NotFound(format!("{entity_type} not found"))
            }
            DatabaseError::ConstraintViolation(detail) => ApiError::Conflict(detail),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<AccessDenied> for ApiError {
    fn from(err: AccessDenied) -> Self {
        ApiError::Forbidden(err.0)
    }
}

impl From<CryptoError> for ApiError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::TokenExpired => ApiError::TokenExpired,
            CryptoError::InvalidToken(_) => ApiError::Unauthorized,
            CryptoError::WeakPassword(reason) => ApiError::BadRequest(reason),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Empty => ApiError::BadRequest(err.to_string()),
            StorageError::TooLarge { .. } => ApiError::PayloadTooLarge(err.to_string()),
            StorageError::Missing(_) => ApiError::NotFound("Stored file not found".into()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::InvalidEmail
            | AccountError::InvalidField(_)
            | AccountError::WeakPassword(_) => ApiError::BadRequest(err.to_string()),
            AccountError::EmailTaken => ApiError::Conflict(err.to_string()),
            AccountError::InvalidCredentials | AccountError::SessionRevoked => {
                ApiError::Unauthorized
            }
            AccountError::NotFound => ApiError::NotFound(err.to_string()),
            AccountError::Crypto(e) => e.into(),
            AccountError::Database(e) => e.into(),
        }
    }
}

impl From<PrescriptionError> for ApiError {
    fn from(err: PrescriptionError) -> Self {
        match err {
            PrescriptionError::InvalidRange { .. }
            | PrescriptionError::RangeTooLong { .. }
            | PrescriptionError::InvalidField(_)
            | PrescriptionError::FutureDay(_)
            | PrescriptionError::NothingToReview => ApiError::BadRequest(err.to_string()),
            PrescriptionError::NotFound(_) => ApiError::NotFound(err.to_string()),
            PrescriptionError::UploadedDayOutOfRange(_) => ApiError::Conflict(err.to_string()),
            PrescriptionError::AccessDenied(e) => e.into(),
            PrescriptionError::Storage(e) => e.into(),
            PrescriptionError::Database(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use chrono::NaiveDate;

    async fn body_json(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), 4096).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn unauthorized_returns_401() {
        let response = ApiError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "AUTH_REQUIRED");
    }

    #[tokio::test]
    async fn rate_limited_returns_429_with_retry_after() {
        let response = ApiError::RateLimited { retry_after: 60 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("Retry-After").unwrap(), "60");
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "RATE_LIMITED");
    }

    #[tokio::test]
    async fn internal_hides_details() {
        let response = ApiError::Internal("disk on fire".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["error"]["message"], "An internal error occurred");
    }

    #[tokio::test]
    async fn expired_token_has_its_own_code() {
        let api: ApiError = CryptoError::TokenExpired.into();
        let response = api.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "TOKEN_EXPIRED");
    }

    #[test]
    fn account_errors_map_to_statuses() {
        let status = |e: AccountError| ApiError::from(e).into_response().status();
        assert_eq!(status(AccountError::EmailTaken), StatusCode::CONFLICT);
        assert_eq!(status(AccountError::InvalidCredentials), StatusCode::UNAUTHORIZED);
        assert_eq!(status(AccountError::SessionRevoked), StatusCode::UNAUTHORIZED);
        assert_eq!(status(AccountError::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status(AccountError::InvalidEmail), StatusCode::BAD_REQUEST);
        assert_eq!(
            status(AccountError::WeakPassword("too short".into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn prescription_errors_map_to_statuses() {
        let status = |e: PrescriptionError| ApiError::from(e).into_response().status();
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(
            status(PrescriptionError::UploadedDayOutOfRange(day)),
            StatusCode::CONFLICT
        );
        assert_eq!(status(PrescriptionError::FutureDay(day)), StatusCode::BAD_REQUEST);
        assert_eq!(status(PrescriptionError::NothingToReview), StatusCode::BAD_REQUEST);
        assert_eq!(
            status(PrescriptionError::NotFound("prescription")),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(PrescriptionError::AccessDenied(AccessDenied("no".into()))),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status(PrescriptionError::Storage(StorageError::TooLarge { limit: 10 })),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }

    #[test]
    fn database_constraint_is_conflict() {
        let api: ApiError = DatabaseError::ConstraintViolation("UNIQUE".into()).into();
        assert_eq!(api.into_response().status(), StatusCode::CONFLICT);
    }
}
