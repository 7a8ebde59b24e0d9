use axum::response::{IntoResponse, Response};
use axum_helpers::AppError;
use mongodb::bson::oid::ObjectId;
use thiserror::Error;

/// Client-facing message when an insert fails for a non-validation reason
pub const CREATE_FAILED_MESSAGE: &str = "You can't create a user now, try later";

#[derive(Debug, Error)]
pub enum UserError {
    #[error("User not found: {0}")]
    NotFound(ObjectId),

    #[error("Email '{0}' is already in use")]
    DuplicateEmail(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Failed to create user: {0}")]
    CreateFailed(String),

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type UserResult<T> = Result<T, UserError>;

/// Convert UserError to AppError for standardized error responses
impl From<UserError> for AppError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::NotFound(id) => AppError::NotFound(format!("User {} not found", id)),
            UserError::DuplicateEmail(email) => {
                AppError::Conflict(format!("Email '{}' is already in use", email))
            }
            UserError::Validation(msg) => AppError::BadRequest(msg),
            UserError::CreateFailed(cause) => {
                tracing::error!(%cause, "User insert failed");
                AppError::ServiceUnavailable(CREATE_FAILED_MESSAGE.to_string())
            }
            UserError::PasswordHash(msg) => AppError::InternalServerError(msg),
            UserError::Database(err) => AppError::Database(err),
            UserError::Internal(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl IntoResponse for UserError {
    fn into_response(self) -> Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}

impl From<mongodb::bson::ser::Error> for UserError {
    fn from(err: mongodb::bson::ser::Error) -> Self {
        UserError::Internal(err.to_string())
    }
}
