//! Error taxonomy for the orchestration engine
//!
//! Raw transport failures are classified exactly once, at the boundary, by
//! [`CloudError::from_service_error`] and [`CloudError::transport`]. Everything
//! downstream decides on [`ErrorKind`] alone.

use crate::work_request::{WorkRequestError, WorkRequestStatus};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Classified kind of a [`CloudError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The remote entity does not exist. Soft: clears identity.
    NotFound,
    /// Transient failure absorbed within the retry budget.
    Retryable,
    /// Rate limiting. Retryable, with mandatory backoff.
    Throttled,
    /// Validation, permission or conflict. Never retried.
    Terminal,
    /// A work request reached FAILED or CANCELED.
    AsyncOperationFailed,
    /// A deadline elapsed; the remote outcome is unknown.
    Timeout,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::NotFound => write!(f, "not-found"),
            ErrorKind::Retryable => write!(f, "retryable"),
            ErrorKind::Throttled => write!(f, "throttled"),
            ErrorKind::Terminal => write!(f, "terminal"),
            ErrorKind::AsyncOperationFailed => write!(f, "async-operation-failed"),
            ErrorKind::Timeout => write!(f, "timeout"),
        }
    }
}

/// An error response returned by the control-plane API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceError {
    /// HTTP-equivalent status code
    pub status: u16,

    /// Service-specific error code (e.g. "NotAuthorizedOrNotFound")
    pub code: String,

    /// Human readable message
    pub message: String,

    /// Request id assigned by the service, for support tickets
    pub request_id: Option<String>,

    /// Server-suggested delay before retrying
    pub retry_after: Option<Duration>,
}

impl ServiceError {
    pub fn new(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            request_id: None,
            retry_after: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.status, self.code, self.message)?;
        if let Some(request_id) = &self.request_id {
            write!(f, " (request id: {})", request_id)?;
        }
        Ok(())
    }
}

/// Errors surfaced by the orchestration engine
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Resource not found: {0}")]
    NotFound(ServiceError),

    #[error("Throttled: {0}")]
    Throttled(ServiceError),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(ServiceError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request rejected: {0}")]
    Rejected(ServiceError),

    #[error("Work request {work_request_id} {status}: {}", summarize(.errors))]
    AsyncOperationFailed {
        work_request_id: String,
        status: WorkRequestStatus,
        errors: Vec<WorkRequestError>,
    },

    #[error("{resource_type} reached unexpected lifecycle state {state} (expected one of {expected:?})")]
    UnexpectedState {
        resource_type: String,
        state: String,
        expected: Vec<String>,
    },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Configuration error: {0}")]
    Config(#[from] infralink_config::ConfigError),
}

fn summarize(errors: &[WorkRequestError]) -> String {
    if errors.is_empty() {
        return "no error details reported".to_string();
    }
    errors
        .iter()
        .map(|e| format!("[{}] {}", e.code, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl CloudError {
    /// Classify an API error response
    pub fn from_service_error(error: ServiceError) -> Self {
        match error.status {
            404 => CloudError::NotFound(error),
            429 => CloudError::Throttled(error),
            501 => CloudError::Rejected(error),
            500..=599 => CloudError::ServiceUnavailable(error),
            _ => CloudError::Rejected(error),
        }
    }

    /// Classify a network-level failure (connection reset, DNS, TLS...)
    pub fn transport(message: impl Into<String>) -> Self {
        CloudError::Transport(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CloudError::NotFound(_) => ErrorKind::NotFound,
            CloudError::Throttled(_) => ErrorKind::Throttled,
            CloudError::ServiceUnavailable(_) | CloudError::Transport(_) => ErrorKind::Retryable,
            CloudError::AsyncOperationFailed { .. } => ErrorKind::AsyncOperationFailed,
            CloudError::Timeout(_) => ErrorKind::Timeout,
            CloudError::Rejected(_)
            | CloudError::UnexpectedState { .. }
            | CloudError::MalformedResponse(_)
            | CloudError::InvalidConfig(_)
            | CloudError::Config(_) => ErrorKind::Terminal,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Server-suggested retry delay, if the service sent one
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            CloudError::Throttled(e) | CloudError::ServiceUnavailable(e) => e.retry_after,
            _ => None,
        }
    }

    /// Errors reported by a failed work request, in service order
    pub fn work_request_errors(&self) -> Option<&[WorkRequestError]> {
        match self {
            CloudError::AsyncOperationFailed { errors, .. } => Some(errors),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
