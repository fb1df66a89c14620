//! Work request types
//!
//! A work request is the control plane's handle to an asynchronous operation.

use crate::error::Result;
use crate::pagination::Page;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a work request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkRequestStatus {
    Accepted,
    InProgress,
    Succeeded,
    Failed,
    /// Cancellation requested but not yet complete
    Canceling,
    Canceled,
}

impl WorkRequestStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkRequestStatus::Succeeded | WorkRequestStatus::Failed | WorkRequestStatus::Canceled
        )
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, WorkRequestStatus::Failed | WorkRequestStatus::Canceled)
    }
}

impl std::fmt::Display for WorkRequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkRequestStatus::Accepted => write!(f, "ACCEPTED"),
            WorkRequestStatus::InProgress => write!(f, "IN_PROGRESS"),
            WorkRequestStatus::Succeeded => write!(f, "SUCCEEDED"),
            WorkRequestStatus::Failed => write!(f, "FAILED"),
            WorkRequestStatus::Canceling => write!(f, "CANCELING"),
            WorkRequestStatus::Canceled => write!(f, "CANCELED"),
        }
    }
}

/// One error reported by a work request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkRequestError {
    pub code: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl WorkRequestError {
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            timestamp,
        }
    }
}

/// What a work request did to an affected entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkRequestAction {
    Created,
    Updated,
    Deleted,
    InProgress,
    Related,
}

/// An entity touched by a work request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkRequestResource {
    /// Entity type as named by the service (e.g. "instance", "vcn")
    pub entity_type: String,
    pub action_type: WorkRequestAction,
    pub identifier: String,
}

/// Current view of a work request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkRequest {
    pub id: String,
    pub status: WorkRequestStatus,
    #[serde(default)]
    pub percent_complete: Option<f32>,
    #[serde(default)]
    pub resources: Vec<WorkRequestResource>,
}

impl WorkRequest {
    pub fn new(id: impl Into<String>, status: WorkRequestStatus) -> Self {
        Self {
            id: id.into(),
            status,
            percent_complete: None,
            resources: Vec::new(),
        }
    }

    pub fn with_resource(
        mut self,
        entity_type: impl Into<String>,
        action_type: WorkRequestAction,
        identifier: impl Into<String>,
    ) -> Self {
        self.resources.push(WorkRequestResource {
            entity_type: entity_type.into(),
            action_type,
            identifier: identifier.into(),
        });
        self
    }

    /// Identifier of the first affected entity of the given type and action
    ///
    /// Entity types are compared case-insensitively.
    pub fn identifier_for(&self, entity_type: &str, action: WorkRequestAction) -> Option<&str> {
        self.resources
            .iter()
            .find(|r| r.action_type == action && r.entity_type.eq_ignore_ascii_case(entity_type))
            .map(|r| r.identifier.as_str())
    }
}

/// Handle returned by a mutation that started an asynchronous operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkRequestHandle {
    pub id: String,
}

impl WorkRequestHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Remote operations needed to follow a work request
#[async_trait]
pub trait WorkRequestClient: Send + Sync {
    /// Fetch the current status of a work request
    async fn get_work_request(&self, id: &str) -> Result<WorkRequest>;

    /// Fetch one page of the errors reported by a work request
    async fn list_work_request_errors(
        &self,
        id: &str,
        page: Option<String>,
    ) -> Result<Page<WorkRequestError>>;
}
