//! Handoff state machine
//!
//! ```text
//! PENDING ──accept──▶ ACCEPTED ──start──▶ IN_PROGRESS ──complete──▶ COMPLETED
//!    │                   │  └──────complete──────────────────────────▲
//!    └─reject─▶ REJECTED └──fail──▶ FAILED ◀──fail── IN_PROGRESS
//! ```
//!
//! Both lifecycle managers funnel every mutation through [`Transition::apply`]
//! so the legal edges live in exactly one place.

use super::types::{HandoffRecord, HandoffResponse, HandoffStatus, Payload};
use crate::{HandoffError, Result};
use chrono::Utc;

/// Reason recorded on the response when a handoff is accepted
pub const ACCEPT_REASON: &str = "Accepted by receiving agent.";

/// A requested state change
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Accept,
    Reject { reason: String },
    Start,
    Complete { result: Payload },
    Fail { reason: String },
}

impl Transition {
    /// Verb used in error messages
    pub fn action(&self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Reject { .. } => "reject",
            Self::Start => "start",
            Self::Complete { .. } => "complete",
            Self::Fail { .. } => "fail",
        }
    }

    /// Statuses this transition may leave from
    pub fn allowed_from(&self) -> &'static [HandoffStatus] {
        match self {
            Self::Accept | Self::Reject { .. } => &[HandoffStatus::Pending],
            Self::Start => &[HandoffStatus::Accepted],
            Self::Complete { .. } | Self::Fail { .. } => {
                &[HandoffStatus::Accepted, HandoffStatus::InProgress]
            }
        }
    }

    /// Status the record lands in
    pub fn target(&self) -> HandoffStatus {
        match self {
            Self::Accept => HandoffStatus::Accepted,
            Self::Reject { .. } => HandoffStatus::Rejected,
            Self::Start => HandoffStatus::InProgress,
            Self::Complete { .. } => HandoffStatus::Completed,
            Self::Fail { .. } => HandoffStatus::Failed,
        }
    }

    /// Check legality against the record's current status without mutating
    pub fn check(&self, record: &HandoffRecord) -> Result<()> {
        if self.allowed_from().contains(&record.status) {
            Ok(())
        } else {
            Err(HandoffError::invalid_transition(self.action(), record.status))
        }
    }

    /// Apply the transition to `record`
    ///
    /// Field changes happen first and `updated_at` is refreshed last. On an
    /// illegal transition the record is left untouched.
    pub fn apply(self, record: &mut HandoffRecord) -> Result<()> {
        self.check(record)?;
        let target = self.target();

        match self {
            Self::Accept => {
                record.response = Some(HandoffResponse::accepted(ACCEPT_REASON));
            }
            Self::Reject { reason } | Self::Fail { reason } => {
                record.response = Some(HandoffResponse::declined(reason));
            }
            Self::Start => {}
            Self::Complete { result } => {
                record.result = result;
            }
        }
        record.status = target;
        touch(record);

        Ok(())
    }
}

/// Refresh `updated_at`, never moving it backwards or before `created_at`
fn touch(record: &mut HandoffRecord) {
    let now = Utc::now();
    record.updated_at = now.max(record.updated_at).max(record.created_at);
}
