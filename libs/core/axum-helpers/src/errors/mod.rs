pub mod codes;
pub mod handlers;
pub mod responses;

pub use codes::ErrorCode;

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use mongodb::bson::oid::Error as ObjectIdError;
use mongodb::error::{ErrorKind, WriteFailure};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;
use validator::ValidationErrors;

/// MongoDB server error code for unique index violations.
pub const DUPLICATE_KEY_CODE: i32 = 11000;

/// Standard error response structure.
///
/// Every error response carries:
/// - `status`: the HTTP status code, repeated for clients that only see the body
/// - `code`: Integer error code for logging/monitoring (e.g., 1008)
/// - `error`: Machine-readable error identifier (e.g., "CONFLICT")
/// - `message`: Human-readable error message
/// - `details`: Optional additional error details (e.g., validation errors)
///
/// # JSON Example
///
/// ```json
/// {
///   "status": 409,
///   "code": 1008,
///   "error": "CONFLICT",
///   "message": "Email already in use"
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// HTTP status code
    pub status: u16,
    /// Integer error code for logging and monitoring
    pub code: i32,
    /// Machine-readable error identifier for programmatic handling
    pub error: String,
    /// Human-readable error message
    pub message: String,
    /// Optional structured error details (e.g., validation field errors)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(status: StatusCode, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status: status.as_u16(),
            code: code.code(),
            error: code.as_str().to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Application error type that can be converted to HTTP responses.
///
/// Domain crates convert their own errors into this type so that every
/// failure renders the same [`ErrorResponse`] body.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppError {
    #[error("JSON parsing error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON extraction error: {0}")]
    JsonExtractorRejection(#[from] JsonRejection),

    #[error("Validation error: {0}")]
    ValidationError(#[from] ValidationErrors),

    #[error("Invalid ObjectId: {0}")]
    InvalidObjectId(#[from] ObjectIdError),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal Server Error: {0}")]
    InternalServerError(String),

    #[error("Service Unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AppError {
    /// Status, code, client message and optional details for this error.
    ///
    /// Logs at a level that matches the severity.
    fn into_parts(self) -> (StatusCode, ErrorCode, String, Option<serde_json::Value>) {
        match self {
            AppError::SerdeJson(e) => {
                tracing::error!(
                    error_code = ErrorCode::SerdeJsonError.code(),
                    "JSON parsing error: {:?}",
                    e
                );
                default_parts(StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::SerdeJsonError)
            }
            AppError::Database(e) => map_mongo_error(&e),
            AppError::Io(e) => {
                tracing::error!(error_code = ErrorCode::IoError.code(), "I/O error: {:?}", e);
                default_parts(StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::IoError)
            }
            AppError::JsonExtractorRejection(e) => {
                tracing::warn!(
                    error_code = ErrorCode::JsonExtraction.code(),
                    "JSON extraction error: {:?}",
                    e
                );
                (e.status(), ErrorCode::JsonExtraction, e.body_text(), None)
            }
            AppError::ValidationError(e) => {
                tracing::info!(
                    error_code = ErrorCode::ValidationError.code(),
                    "Validation error: {:?}",
                    e
                );
                (
                    StatusCode::BAD_REQUEST,
                    ErrorCode::ValidationError,
                    ErrorCode::ValidationError.default_message().to_string(),
                    Some(validation_details(&e)),
                )
            }
            AppError::InvalidObjectId(e) => {
                tracing::warn!(
                    error_code = ErrorCode::InvalidObjectId.code(),
                    "ObjectId error: {:?}",
                    e
                );
                default_parts(StatusCode::BAD_REQUEST, ErrorCode::InvalidObjectId)
            }
            AppError::BadRequest(msg) => {
                tracing::info!("Bad request: {}", msg);
                (StatusCode::BAD_REQUEST, ErrorCode::BadRequest, msg, None)
            }
            AppError::NotFound(msg) => {
                tracing::info!(
                    error_code = ErrorCode::NotFound.code(),
                    "Not found: {}",
                    msg
                );
                (StatusCode::NOT_FOUND, ErrorCode::NotFound, msg, None)
            }
            AppError::Conflict(msg) => {
                tracing::info!("Conflict: {}", msg);
                (StatusCode::CONFLICT, ErrorCode::Conflict, msg, None)
            }
            AppError::InternalServerError(msg) => {
                tracing::error!(
                    error_code = ErrorCode::InternalError.code(),
                    "Internal server error: {}",
                    msg
                );
                default_parts(StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::InternalError)
            }
            AppError::ServiceUnavailable(msg) => {
                tracing::warn!("Service unavailable: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorCode::ServiceUnavailable,
                    msg,
                    None,
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = self.into_parts();

        let mut body = ErrorResponse::new(status, code, message);
        body.details = details;

        (status, Json(body)).into_response()
    }
}

fn default_parts(
    status: StatusCode,
    code: ErrorCode,
) -> (StatusCode, ErrorCode, String, Option<serde_json::Value>) {
    (status, code, code.default_message().to_string(), None)
}

/// `true` when the server rejected a write because of a unique index.
pub fn is_duplicate_key(error: &mongodb::error::Error) -> bool {
    match error.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY_CODE,
        ErrorKind::Command(e) => e.code == DUPLICATE_KEY_CODE,
        _ => false,
    }
}

/// Maps a MongoDB driver error to HTTP response components.
fn map_mongo_error(
    error: &mongodb::error::Error,
) -> (StatusCode, ErrorCode, String, Option<serde_json::Value>) {
    if is_duplicate_key(error) {
        tracing::info!(
            error_code = ErrorCode::DuplicateKey.code(),
            "Duplicate key: {}",
            error
        );
        return default_parts(StatusCode::CONFLICT, ErrorCode::DuplicateKey);
    }

    match error.kind.as_ref() {
        ErrorKind::ServerSelection { .. }
        | ErrorKind::Io(_)
        | ErrorKind::ConnectionPoolCleared { .. } => {
            tracing::error!(
                error_code = ErrorCode::DatabaseUnavailable.code(),
                "Database unavailable: {}",
                error
            );
            default_parts(StatusCode::SERVICE_UNAVAILABLE, ErrorCode::DatabaseUnavailable)
        }
        ErrorKind::BsonDeserialization(e) => {
            tracing::error!(
                error_code = ErrorCode::DatabaseDecode.code(),
                "Failed to decode document: {:?}",
                e
            );
            default_parts(StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::DatabaseDecode)
        }
        ErrorKind::BsonSerialization(e) => {
            tracing::error!(
                error_code = ErrorCode::DatabaseEncode.code(),
                "Failed to encode document: {:?}",
                e
            );
            default_parts(StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::DatabaseEncode)
        }
        ErrorKind::Write(_) | ErrorKind::Command(_) => {
            tracing::error!(
                error_code = ErrorCode::DatabaseError.code(),
                "Database error: {}",
                error
            );
            default_parts(StatusCode::BAD_GATEWAY, ErrorCode::DatabaseError)
        }
        _ => {
            tracing::error!(
                error_code = ErrorCode::DatabaseUnhandled.code(),
                "Unhandled database error: {:?}",
                error
            );
            default_parts(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorCode::DatabaseUnhandled,
            )
        }
    }
}

/// Field errors as `{ field: [{ code, message, params }] }`.
pub fn validation_details(errors: &ValidationErrors) -> serde_json::Value {
    let details = errors
        .field_errors()
        .iter()
        .map(|(field, errors)| {
            let error_messages: Vec<serde_json::Value> = errors
                .iter()
                .map(|err| {
                    serde_json::json!({
                        "code": err.code,
                        "message": err.message,
                        "params": err.params,
                    })
                })
                .collect();
            (field.to_string(), serde_json::json!(error_messages))
        })
        .collect::<serde_json::Map<_, _>>();

    serde_json::Value::Object(details)
}
