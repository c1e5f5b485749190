use std::borrow::Cow;
use std::fmt;

use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse
};
use jsonwebtoken::errors::{ErrorKind, Error as JwtError};
use derive_more::Display;
use serde::Serialize;
use validator::ValidationErrors;

#[derive(Debug)]
pub enum AppError {
    ValidationError(Vec<FieldError>),
    NotFound(String),
    Conflict(String),
    UnauthorizedAccess,
    ForbiddenAccess,
    PayloadTooLarge(String),
    ServiceUnavailable(String),
    InternalError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::ValidationError(errors) => {
                let messages = errors.iter()
                    .map(|e| format!("{}:{}", e.field, e.message))
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "validation error: {}", messages)
            }
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::UnauthorizedAccess => write!(f, "Unauthorized access"),
            AppError::ForbiddenAccess => write!(f, "Forbidden access"),
            AppError::PayloadTooLarge(msg) => write!(f, "Payload too large: {}", msg),
            AppError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal server error: {}", msg)
        }
    }
}

impl std::error::Error for AppError {}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let body = match self {
            AppError::ValidationError(errors) => {
                serde_json::json!({
                    "error": "Validation failed",
                    "details": errors
                })
            }
            _ => {
                serde_json::json!({"error": self.to_string()})
            }
        };
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .json(body)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::UnauthorizedAccess => StatusCode::UNAUTHORIZED,
            AppError::ForbiddenAccess => StatusCode::FORBIDDEN,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::ValidationError(collect_field_errors("", &errors))
    }
}

/// Flattens nested validator output into `parent.field` entries.
fn collect_field_errors(prefix: &str, errors: &ValidationErrors) -> Vec<FieldError> {
    use validator::ValidationErrorsKind;

    errors
        .errors()
        .iter()
        .flat_map(|(field, kind)| {
            let path = if prefix.is_empty() {
                field.to_string()
            } else {
                format!("{}.{}", prefix, field)
            };
            match kind {
                ValidationErrorsKind::Field(errs) => errs
                    .iter()
                    .map(|e| FieldError {
                        field: path.clone(),
                        message: e
                            .message
                            .as_ref()
                            .map(|s| s.to_string())
                            .unwrap_or_else(|| "Invalid value".to_string()),
                    })
                    .collect::<Vec<_>>(),
                ValidationErrorsKind::Struct(inner) => collect_field_errors(&path, inner),
                ValidationErrorsKind::List(items) => items
                    .iter()
                    .flat_map(|(idx, inner)| collect_field_errors(&format!("{}[{}]", path, idx), inner))
                    .collect(),
            }
        })
        .collect()
}

impl AppError {
    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        AppError::ValidationError(vec![FieldError {
            field: field.to_string(),
            message: message.into(),
        }])
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(e) if e.code() == Some(Cow::Borrowed("23505")) => {
                AppError::Conflict("Database conflict occurred".into())
            }
            sqlx::Error::Database(e) if e.code() == Some(Cow::Borrowed("23503")) => {
                AppError::Conflict("Foreign key violation".into())
            }
            _ => AppError::InternalError(format!("Database error: {}", err))
        }
    }
}

impl From<PasswordError> for AppError {
    fn from(err: PasswordError) -> Self {
        AppError::InternalError(err.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(path) => AppError::NotFound(format!("Stored file {} is missing", path)),
            StorageError::InvalidPath(path) => AppError::InternalError(format!("Invalid storage path: {}", path)),
            StorageError::Io(msg) => AppError::InternalError(format!("Storage error: {}", msg)),
        }
    }
}

impl From<actix_multipart::MultipartError> for AppError {
    fn from(err: actix_multipart::MultipartError) -> Self {
        match err {
            actix_multipart::MultipartError::ContentTypeIncompatible
            | actix_multipart::MultipartError::ContentTypeMissing => {
                AppError::invalid_field("file", "Request must be multipart/form-data.")
            }
            other => AppError::invalid_field("file", format!("Malformed upload: {}", other)),
        }
    }
}

impl From<QueueError> for AppError {
    fn from(err: QueueError) -> Self {
        AppError::ServiceUnavailable(err.to_string())
    }
}

#[derive(Debug, Display)]
pub enum AuthError {
    #[display("Invalid token")]
    InvalidToken,

    #[display("Wrong credentials")]
    WrongCredentials,

    #[display("Token creation error")]
    TokenCreation,

    #[display("Token expired")]
    TokenExpired,

    #[display("Missing credentials")]
    MissingCredentials,

    #[display("Missing JWT service")]
    MissingJwtService,

    #[display("Invalid user ID")]
    InvalidUserId,

    #[display("Authentication failed")]
    AuthenticationFailed,

    #[display("Username already exists")]
    UsernameTaken,

    #[display("Validation failed: {_0}")]
    InvalidRequest(String),

    #[display("Internal error: {_0}")]
    Internal(String),
}

impl std::error::Error for AuthError {}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err.status_code() {
            StatusCode::UNAUTHORIZED => AppError::UnauthorizedAccess,
            StatusCode::CONFLICT => AppError::Conflict(err.to_string()),
            StatusCode::BAD_REQUEST => AppError::invalid_field("request", err.to_string()),
            _ => AppError::InternalError(err.to_string()),
        }
    }
}

impl ResponseError for AuthError {
    fn error_response(&self) -> HttpResponse {
        let error_message = match self {
            AuthError::TokenExpired => "Token has expired".to_string(),
            _ => self.to_string(),
        };
        HttpResponse::build(self.status_code())
            .json(serde_json::json!({"error": error_message}))
    }
    fn status_code(&self) -> StatusCode {
        match *self {
            AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthError::WrongCredentials => StatusCode::UNAUTHORIZED,
            AuthError::TokenCreation => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::TokenExpired => StatusCode::UNAUTHORIZED,
            AuthError::MissingCredentials => StatusCode::UNAUTHORIZED,
            AuthError::MissingJwtService => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::InvalidUserId => StatusCode::UNAUTHORIZED,
            AuthError::AuthenticationFailed => StatusCode::UNAUTHORIZED,
            AuthError::UsernameTaken => StatusCode::CONFLICT,
            AuthError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JwtError> for AuthError {
    fn from(e: JwtError) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        }
    }
}

impl From<PasswordError> for AuthError {
    fn from(err: PasswordError) -> Self {
        tracing::warn!("Password processing failed: {}", err);
        AuthError::AuthenticationFailed
    }
}

impl From<ValidationErrors> for AuthError {
    fn from(errors: ValidationErrors) -> Self {
        AuthError::InvalidRequest(AppError::from(errors).to_string())
    }
}

#[derive(Debug, Display)]
pub enum PasswordError {
    #[display("Invalid password parameters: {_0}")]
    InvalidParameters(String),

    #[display("Password hashing failed: {_0}")]
    HashingError(String),

    #[display("Invalid password hash format: {_0}")]
    InvalidHashFormat(String),

    #[display("Password verification failed: {_0}")]
    VerificationError(String),
}

impl std::error::Error for PasswordError {}

/// The single failure kind of the image codec. Every decode, bounds and encode
/// problem ends up here with a message describing what went wrong.
#[derive(Debug, Clone, PartialEq, Display)]
#[display("transformation failed: {_0}")]
pub struct TransformError(pub String);

impl TransformError {
    pub fn new(message: impl Into<String>) -> Self {
        TransformError(message.into())
    }
}

impl std::error::Error for TransformError {}

#[derive(Debug, Display)]
pub enum StorageError {
    #[display("Blob not found: {_0}")]
    NotFound(String),

    #[display("Invalid blob path: {_0}")]
    InvalidPath(String),

    #[display("Blob I/O error: {_0}")]
    Io(String),
}

impl std::error::Error for StorageError {}

#[derive(Debug, Display)]
pub enum QueueError {
    #[display("Queue connection failed: {_0}")]
    Connection(String),

    #[display("Queue operation failed: {_0}")]
    Operation(String),

    #[display("Queue message could not be encoded: {_0}")]
    Serialization(String),

    #[display("Malformed queue message dropped: {_0}")]
    Malformed(String),
}

impl std::error::Error for QueueError {}

#[derive(Debug, Display)]
pub enum WorkerError {
    #[display("{_0}")]
    Transform(TransformError),

    #[display("{_0}")]
    Storage(StorageError),

    #[display("Job exceeded its {_0}s time budget")]
    TimedOut(u64),

    #[display("Codec task aborted: {_0}")]
    Aborted(String),
}

impl std::error::Error for WorkerError {}

impl From<TransformError> for WorkerError {
    fn from(err: TransformError) -> Self {
        WorkerError::Transform(err)
    }
}

impl From<StorageError> for WorkerError {
    fn from(err: StorageError) -> Self {
        WorkerError::Storage(err)
    }
}

#[derive(Debug, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_taxonomy() {
        assert_eq!(AppError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::invalid_field("f", "bad").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::from(QueueError::Connection("down".into())).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(AuthError::MissingCredentials.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::UsernameTaken.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn transform_error_carries_message() {
        let err = TransformError::new("crop rectangle exceeds image bounds");
        assert_eq!(err.to_string(), "transformation failed: crop rectangle exceeds image bounds");
        let worker_err = WorkerError::from(err.clone());
        assert_eq!(worker_err.to_string(), err.to_string());
    }
}
