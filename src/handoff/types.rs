//! Types for agent handoff
//!
//! Defines the request, response and record types that every other module
//! operates on, plus the lifecycle status enum.

use crate::{HandoffError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Open key/value bag used for request context and completion results
///
/// Values are a tagged union of string, number, bool, null, list and map.
/// BTreeMap keeps key order deterministic across serializations.
pub type Payload = BTreeMap<String, serde_json::Value>;

/// Lifecycle states for a handoff record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffStatus {
    #[default]
    Pending,
    Accepted,
    InProgress,
    Completed,
    Rejected,
    Failed,
}

impl HandoffStatus {
    /// Wire name of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
            Self::Failed => "failed",
        }
    }

    /// No transition is legal out of a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Rejected | Self::Failed)
    }

    /// Whether `next` is a single legal edge away from this status
    pub fn can_transition_to(&self, next: HandoffStatus) -> bool {
        use HandoffStatus::*;
        matches!(
            (self, next),
            (Pending, Accepted)
                | (Pending, Rejected)
                | (Accepted, InProgress)
                | (Accepted, Completed)
                | (Accepted, Failed)
                | (InProgress, Completed)
                | (InProgress, Failed)
        )
    }

    /// Get all statuses
    pub fn all() -> Vec<Self> {
        vec![
            Self::Pending,
            Self::Accepted,
            Self::InProgress,
            Self::Completed,
            Self::Rejected,
            Self::Failed,
        ]
    }
}

impl fmt::Display for HandoffStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HandoffStatus {
    type Err = HandoffError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "rejected" => Ok(Self::Rejected),
            "failed" => Ok(Self::Failed),
            _ => Err(HandoffError::Validation(format!(
                "Unknown handoff status: {}",
                s
            ))),
        }
    }
}

/// Handoff priority, 1 (lowest) to 10 (highest)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Priority(u8);

impl Priority {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;

    /// Create a priority, rejecting values outside 1..=10
    pub fn new(value: u8) -> Result<Self> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(HandoffError::Validation(format!(
                "priority must be between {} and {}, got {}",
                Self::MIN,
                Self::MAX,
                value
            )))
        }
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self(5)
    }
}

impl TryFrom<u8> for Priority {
    type Error = HandoffError;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Priority> for u8 {
    fn from(priority: Priority) -> Self {
        priority.0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A request to hand off a task from one agent to another
///
/// Immutable once attached to a record. An empty `to_agent` means the target
/// is unassigned and a router should pick one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoffRequest {
    pub from_agent: String,

    #[serde(default)]
    pub to_agent: String,

    pub task_description: String,

    #[serde(default)]
    pub context: Payload,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
}

impl HandoffRequest {
    /// Create a request with default priority and empty context
    ///
    /// Fails with a validation error when the source agent or the task
    /// description is blank.
    pub fn new(
        from_agent: impl Into<String>,
        to_agent: impl Into<String>,
        task_description: impl Into<String>,
    ) -> Result<Self> {
        let request = Self {
            from_agent: from_agent.into(),
            to_agent: to_agent.into(),
            task_description: task_description.into(),
            context: Payload::new(),
            priority: Priority::default(),
            deadline: None,
        };
        request.validate()?;
        Ok(request)
    }

    /// Set the priority (1..=10)
    pub fn with_priority(mut self, priority: u8) -> Result<Self> {
        self.priority = Priority::new(priority)?;
        Ok(self)
    }

    /// Attach context key/value pairs
    pub fn with_context(mut self, context: Payload) -> Self {
        self.context = context;
        self
    }

    /// Set a deadline
    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Route the request to a specific agent
    pub fn with_target(mut self, to_agent: impl Into<String>) -> Self {
        self.to_agent = to_agent.into();
        self
    }

    /// Whether no target agent was named
    pub fn is_unassigned(&self) -> bool {
        self.to_agent.trim().is_empty()
    }

    /// Check required fields
    pub fn validate(&self) -> Result<()> {
        if self.from_agent.trim().is_empty() {
            return Err(HandoffError::Validation(
                "from_agent must not be empty".to_string(),
            ));
        }
        if self.task_description.trim().is_empty() {
            return Err(HandoffError::Validation(
                "task_description must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// The receiving agent's verdict on a handoff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoffResponse {
    pub accepted: bool,

    #[serde(default)]
    pub reason: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_completion: Option<DateTime<Utc>>,
}

impl HandoffResponse {
    /// Positive acknowledgement
    pub fn accepted(reason: impl Into<String>) -> Self {
        Self {
            accepted: true,
            reason: reason.into(),
            estimated_completion: None,
        }
    }

    /// Negative verdict (rejection or failure)
    pub fn declined(reason: impl Into<String>) -> Self {
        Self {
            accepted: false,
            reason: reason.into(),
            estimated_completion: None,
        }
    }
}

/// Full lifecycle record of a handoff
///
/// Only the lifecycle managers mutate `response`, `status`, `result` and
/// `updated_at`; `record_id`, `request` and `created_at` never change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoffRecord {
    pub record_id: String,

    pub request: HandoffRequest,

    #[serde(default)]
    pub response: Option<HandoffResponse>,

    #[serde(default)]
    pub status: HandoffStatus,

    #[serde(default)]
    pub result: Payload,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl HandoffRecord {
    /// Build a fresh PENDING record with a new UUID
    pub fn new(request: HandoffRequest) -> Self {
        let now = Utc::now();
        Self {
            record_id: uuid::Uuid::new_v4().to_string(),
            request,
            response: None,
            status: HandoffStatus::Pending,
            result: Payload::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Time between creation and the latest transition
    pub fn duration(&self) -> chrono::Duration {
        self.updated_at - self.created_at
    }

    /// Short id for tabular output
    pub fn short_id(&self) -> &str {
        let end = self
            .record_id
            .char_indices()
            .nth(8)
            .map(|(i, _)| i)
            .unwrap_or(self.record_id.len());
        &self.record_id[..end]
    }
}
