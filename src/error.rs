//! Structured error types for board operations.

use axum::http::StatusCode;
use serde::Serialize;
use std::fmt;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Caller identity and access
    Unauthenticated,
    AuthorizationError,

    // Malformed input
    ValidationError,

    // Not found errors
    UserNotFound,
    ProjectNotFound,
    TaskNotFound,

    // Conflict errors
    AlreadyExists,

    // Reasoning pipeline
    GatewayUnavailable,
    GatewayError,
    ResponseInvalid,
    UpdateFailed,

    // Internal errors
    DatabaseError,
    InternalError,
}

impl ErrorCode {
    /// HTTP status this code is reported with.
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorCode::AuthorizationError => StatusCode::FORBIDDEN,
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::UserNotFound | ErrorCode::ProjectNotFound | ErrorCode::TaskNotFound => {
                StatusCode::NOT_FOUND
            }
            ErrorCode::AlreadyExists => StatusCode::CONFLICT,
            ErrorCode::GatewayUnavailable
            | ErrorCode::GatewayError
            | ErrorCode::ResponseInvalid
            | ErrorCode::UpdateFailed
            | ErrorCode::DatabaseError
            | ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Structured error returned from every board and pipeline entry point.
#[derive(Debug, Serialize)]
pub struct BoardError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl BoardError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field: None,
            details: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.code.status()
    }

    // Convenience constructors

    pub fn unauthenticated() -> Self {
        Self::new(ErrorCode::Unauthenticated, "Login required")
    }

    pub fn not_a_member(project_id: i64) -> Self {
        Self::new(
            ErrorCode::AuthorizationError,
            format!("You are not a member of project {}", project_id),
        )
    }

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::ValidationError,
            format!("{} is required", field),
        )
        .with_field(field)
    }

    pub fn invalid_value(field: &str, reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, reason).with_field(field)
    }

    pub fn user_not_found(user: impl fmt::Display) -> Self {
        Self::new(ErrorCode::UserNotFound, format!("User '{}' not found", user))
    }

    pub fn project_not_found(project_id: i64) -> Self {
        Self::new(
            ErrorCode::ProjectNotFound,
            format!("Project not found: {}", project_id),
        )
    }

    pub fn task_not_found(task_id: i64) -> Self {
        Self::new(
            ErrorCode::TaskNotFound,
            format!("Task not found: {}", task_id),
        )
    }

    pub fn already_exists(what: impl fmt::Display) -> Self {
        Self::new(ErrorCode::AlreadyExists, format!("{} already exists", what))
    }

    pub fn gateway_unavailable(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::GatewayUnavailable, reason)
    }

    pub fn gateway_error(detail: impl Into<String>) -> Self {
        Self::new(ErrorCode::GatewayError, "Reasoning gateway call failed").with_details(detail)
    }

    pub fn response_invalid(detail: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ResponseInvalid,
            "Gateway response failed validation",
        )
        .with_details(detail)
    }

    pub fn update_failed(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::UpdateFailed, "Priority update rolled back")
            .with_details(err.to_string())
    }

    pub fn database(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::DatabaseError, err.to_string())
    }

    pub fn internal(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::InternalError, err.to_string())
    }
}

impl fmt::Display for BoardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for BoardError {}

// Store functions return anyhow; recover a BoardError raised inside them.
impl From<anyhow::Error> for BoardError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<BoardError>() {
            Ok(board_err) => board_err,
            Err(err) => match err.downcast::<rusqlite::Error>() {
                Ok(sql_err) => BoardError::database(sql_err),
                Err(err) => BoardError::internal(err),
            },
        }
    }
}

/// Result type for board operations.
pub type BoardResult<T> = std::result::Result<T, BoardError>;
