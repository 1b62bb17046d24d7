use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::request::{EmployeeId, MeetingSchedule, RequestId, RequestRecord, RequestStatus};
use crate::domain::role::Role;
use crate::reconciliation::UnitSplit;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
    Return,
    Finalize,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Return => "return",
            Self::Finalize => "finalize",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "approve" | "confirm" => Some(Self::Approve),
            "reject" => Some(Self::Reject),
            "return" => Some(Self::Return),
            "finalize" => Some(Self::Finalize),
            _ => None,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who is acting, as supplied by the surrounding session layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub role: Role,
    pub display_name: String,
}

impl Actor {
    pub fn new(role: Role, display_name: impl Into<String>) -> Self {
        Self { role, display_name: display_name.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DecisionPayload {
    pub comment: Option<String>,
    pub reconciliation: Option<UnitSplit>,
    pub meeting: Option<MeetingSchedule>,
}

/// A fully-formed decision, built by the caller and handed to the engine
/// in one piece.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionCommand {
    pub request_id: RequestId,
    pub actor: Actor,
    pub decision: Decision,
    pub payload: DecisionPayload,
    pub decided_at: Option<DateTime<Utc>>,
}

impl DecisionCommand {
    pub fn new(request_id: RequestId, actor: Actor, decision: Decision) -> Self {
        Self { request_id, actor, decision, payload: DecisionPayload::default(), decided_at: None }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.payload.comment = Some(comment.into());
        self
    }

    pub fn with_reconciliation(mut self, paid_units: i64, unpaid_units: i64) -> Self {
        self.payload.reconciliation = Some(UnitSplit::new(paid_units, unpaid_units));
        self
    }

    pub fn with_meeting(mut self, meeting: MeetingSchedule) -> Self {
        self.payload.meeting = Some(meeting);
        self
    }

    pub fn at(mut self, decided_at: DateTime<Utc>) -> Self {
        self.decided_at = Some(decided_at);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Recipient {
    Subject(EmployeeId),
    Role(Role),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDecided {
    pub request_id: RequestId,
    pub new_status: RequestStatus,
    pub acting_role: Role,
    pub decision: Decision,
    pub next_role: Option<Role>,
    pub recipients: Vec<Recipient>,
    pub decided_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkflowEvent {
    Submitted { request_id: RequestId, first_role: Role, recipients: Vec<Recipient> },
    Decided(RequestDecided),
}

impl WorkflowEvent {
    pub fn request_id(&self) -> &RequestId {
        match self {
            Self::Submitted { request_id, .. } => request_id,
            Self::Decided(decided) => &decided.request_id,
        }
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Submitted { .. } => "workflow.request_submitted",
            Self::Decided(_) => "workflow.request_decided",
        }
    }
}

/// What presentation layers get back: the record plus the routing facts
/// they need to pick which actions to show.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSnapshot {
    pub record: RequestRecord,
    pub next_role: Option<Role>,
    pub missing_supporting_documents: bool,
}
