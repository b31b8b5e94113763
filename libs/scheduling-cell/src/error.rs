use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_database::SupabaseError;
use shared_models::error::AppError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchedulingError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("No availability: {0}")]
    Unavailable(String),

    #[error("Session expired: {0}")]
    Session(String),

    #[error("Backend error: {0}")]
    Transient(String),

    #[error("Request timed out after {} seconds", .0.as_secs())]
    Timeout(Duration),

    #[error("Availability lookups are paused after repeated failures")]
    CircuitOpen,
}

/// The four buckets every failure resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Transient,
    Unavailable,
    Session,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeSeverity {
    Error,
    Warning,
    Info,
}

impl SchedulingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SchedulingError::Validation(_) => ErrorKind::Validation,
            SchedulingError::Unavailable(_) => ErrorKind::Unavailable,
            SchedulingError::Session(_) => ErrorKind::Session,
            SchedulingError::Transient(_)
            | SchedulingError::Timeout(_)
            | SchedulingError::CircuitOpen => ErrorKind::Transient,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    pub fn user_message(&self) -> String {
        match self {
            SchedulingError::Validation(msg) => format!("Please check your input: {}", msg),
            SchedulingError::Unavailable(_) => {
                "No staff are available for the selected date. Please choose another day.".to_string()
            }
            SchedulingError::Session(_) => {
                "Your session has expired. Please sign in again.".to_string()
            }
            SchedulingError::Transient(_) | SchedulingError::Timeout(_) => {
                "We couldn't load availability right now. Please try again shortly.".to_string()
            }
            SchedulingError::CircuitOpen => {
                "Availability is temporarily unavailable. Please try again in a moment.".to_string()
            }
        }
    }
}

impl ErrorKind {
    pub fn severity(&self) -> NoticeSeverity {
        match self {
            ErrorKind::Session => NoticeSeverity::Error,
            ErrorKind::Transient | ErrorKind::Validation => NoticeSeverity::Warning,
            ErrorKind::Unavailable => NoticeSeverity::Info,
        }
    }
}

/// What the booking UI shows for a failed lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorNotice {
    pub kind: ErrorKind,
    pub severity: NoticeSeverity,
    pub message: String,
    pub detail: String,
    /// Set when an identical notice was already raised while the circuit is open.
    pub suppressed: bool,
}

impl ErrorNotice {
    pub fn new(error: &SchedulingError, suppressed: bool) -> Self {
        let kind = error.kind();
        Self {
            kind,
            severity: kind.severity(),
            message: error.user_message(),
            detail: error.to_string(),
            suppressed,
        }
    }
}

impl From<SupabaseError> for SchedulingError {
    fn from(err: SupabaseError) -> Self {
        match err {
            SupabaseError::Auth(msg) => SchedulingError::Session(msg),
            SupabaseError::NotFound(msg) | SupabaseError::Conflict(msg) => SchedulingError::Unavailable(msg),
            SupabaseError::InvalidHeader(e) => SchedulingError::Session(format!("Invalid credentials: {}", e)),
            other => SchedulingError::Transient(other.to_string()),
        }
    }
}

impl From<SchedulingError> for AppError {
    fn from(err: SchedulingError) -> Self {
        let detail = err.to_string();
        match err {
            SchedulingError::Validation(msg) => AppError::ValidationError(msg),
            SchedulingError::Unavailable(msg) => AppError::NotFound(msg),
            SchedulingError::Session(msg) => AppError::Auth(msg),
            SchedulingError::CircuitOpen => AppError::ServiceUnavailable(detail),
            SchedulingError::Transient(_) | SchedulingError::Timeout(_) => {
                AppError::ExternalService(detail)
            }
        }
    }
}
