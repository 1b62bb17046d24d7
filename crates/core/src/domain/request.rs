use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::role::{Role, StaffLevel};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn generate() -> Self {
        Self(format!("REQ-{}", Uuid::new_v4()))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmployeeId(pub String);

impl fmt::Display for EmployeeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveCategory {
    Standard,
    Medical,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewCategory {
    Faculty,
    Hod,
}

/// Leave applications and performance-review (PAMS) submissions share one
/// record shape; the category picks the approval route.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum RequestCategory {
    Leave(LeaveCategory),
    Review(ReviewCategory),
}

impl RequestCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Leave(LeaveCategory::Standard) => "leave.standard",
            Self::Leave(LeaveCategory::Medical) => "leave.medical",
            Self::Review(ReviewCategory::Faculty) => "review.faculty",
            Self::Review(ReviewCategory::Hod) => "review.hod",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "leave.standard" | "standard" => Some(Self::Leave(LeaveCategory::Standard)),
            "leave.medical" | "medical" => Some(Self::Leave(LeaveCategory::Medical)),
            "review.faculty" => Some(Self::Review(ReviewCategory::Faculty)),
            "review.hod" => Some(Self::Review(ReviewCategory::Hod)),
            _ => None,
        }
    }

    pub fn is_review(&self) -> bool {
        matches!(self, Self::Review(_))
    }
}

impl fmt::Display for RequestCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<RequestCategory> for String {
    fn from(value: RequestCategory) -> Self {
        value.as_str().to_string()
    }
}

impl TryFrom<String> for RequestCategory {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
            .ok_or(DomainError::UnknownValue { kind: "request category", value })
    }
}

/// Date range of a request. `total_units` is the day count that a
/// reconciliation must partition exactly.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_units: i64,
}

impl Span {
    pub fn new(
        start_date: NaiveDate,
        end_date: NaiveDate,
        total_units: i64,
    ) -> Result<Self, DomainError> {
        if end_date < start_date {
            return Err(DomainError::InvalidSpan { start: start_date, end: end_date });
        }
        if total_units < 0 {
            return Err(DomainError::NegativeSpanUnits(total_units));
        }

        Ok(Self { start_date, end_date, total_units })
    }

    /// Calendar days from `start_date` to `end_date`, both ends included.
    pub fn inclusive(start_date: NaiveDate, end_date: NaiveDate) -> Result<Self, DomainError> {
        let days = (end_date - start_date).num_days() + 1;
        Self::new(start_date, end_date, days.max(0))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Forwarded,
    Approved,
    Rejected,
    /// Never written by the engine: a return re-opens the record as
    /// `Pending`. Decoded from stored data and treated as open.
    Returned,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 5] = [
        RequestStatus::Pending,
        RequestStatus::Forwarded,
        RequestStatus::Approved,
        RequestStatus::Rejected,
        RequestStatus::Returned,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Forwarded => "forwarded",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Returned => "returned",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "forwarded" => Some(Self::Forwarded),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "returned" => Some(Self::Returned),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Approved,
    Rejected,
    Returned,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Returned => "returned",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "returned" => Some(Self::Returned),
            _ => None,
        }
    }

    pub fn is_recorded(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingSchedule {
    pub scheduled_for: DateTime<Utc>,
    pub venue: Option<String>,
}

/// One role's slot in the approval chain. A pending step carries no actor
/// or date until the role decides.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainStep {
    pub role: Role,
    pub status: StepStatus,
    pub by: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub comment: Option<String>,
    pub meeting: Option<MeetingSchedule>,
}

impl ChainStep {
    pub fn pending(role: Role) -> Self {
        Self { role, status: StepStatus::Pending, by: None, date: None, comment: None, meeting: None }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub paid_units: i64,
    pub unpaid_units: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttachmentRef(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub id: RequestId,
    pub category: RequestCategory,
    pub subject_id: EmployeeId,
    pub subject_level: StaffLevel,
    pub span: Span,
    pub status: RequestStatus,
    pub approval_chain: Vec<ChainStep>,
    pub reconciliation: Option<Reconciliation>,
    pub reason: Option<String>,
    pub agenda: Option<String>,
    pub attachments: Vec<AttachmentRef>,
    pub revision: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RequestRecord {
    /// The step currently waiting on a role, if the chain is open.
    pub fn active_step(&self) -> Option<&ChainStep> {
        self.approval_chain.last().filter(|step| step.status == StepStatus::Pending)
    }

    pub fn has_decision(&self) -> bool {
        self.approval_chain.iter().any(|step| step.status.is_recorded())
    }

    pub fn is_open(&self) -> bool {
        !self.status.is_terminal()
    }

    pub fn amend_span(&mut self, span: Span) -> Result<(), DomainError> {
        if self.has_decision() {
            return Err(DomainError::RecordFrozen(self.id.clone()));
        }
        self.span = span;
        Ok(())
    }

    pub fn attach(&mut self, reference: AttachmentRef) -> Result<(), DomainError> {
        if !self.is_open() {
            return Err(DomainError::RecordClosed(self.id.clone()));
        }
        if !self.attachments.contains(&reference) {
            self.attachments.push(reference);
        }
        Ok(())
    }

    /// Medical leave is expected to carry supporting documents. Advisory
    /// only; decisions are never blocked on it.
    pub fn missing_supporting_documents(&self) -> bool {
        self.category == RequestCategory::Leave(LeaveCategory::Medical)
            && self.attachments.is_empty()
    }
}

/// Caller-built input for a new request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDraft {
    pub id: Option<RequestId>,
    pub category: RequestCategory,
    pub subject_id: EmployeeId,
    pub subject_level: StaffLevel,
    pub span: Span,
    pub reason: Option<String>,
    pub agenda: Option<String>,
    pub attachments: Vec<AttachmentRef>,
}

impl RequestDraft {
    pub fn new(
        category: RequestCategory,
        subject_id: impl Into<String>,
        subject_level: StaffLevel,
        span: Span,
    ) -> Self {
        Self {
            id: None,
            category,
            subject_id: EmployeeId(subject_id.into()),
            subject_level,
            span,
            reason: None,
            agenda: None,
            attachments: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(RequestId(id.into()));
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_agenda(mut self, agenda: impl Into<String>) -> Self {
        self.agenda = Some(agenda.into());
        self
    }

    pub fn with_attachment(mut self, reference: impl Into<String>) -> Self {
        self.attachments.push(AttachmentRef(reference.into()));
        self
    }

    /// Record with an empty chain. The engine seeds the first pending step.
    pub fn into_record(self, now: DateTime<Utc>) -> RequestRecord {
        RequestRecord {
            id: self.id.unwrap_or_else(RequestId::generate),
            category: self.category,
            subject_id: self.subject_id,
            subject_level: self.subject_level,
            span: self.span,
            status: RequestStatus::Pending,
            approval_chain: Vec::new(),
            reconciliation: None,
            reason: self.reason,
            agenda: self.agenda,
            attachments: self.attachments,
            revision: 0,
            created_at: now,
            updated_at: now,
        }
    }
}
