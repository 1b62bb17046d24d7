pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod notify;
pub mod reconciliation;
pub mod service;
pub mod store;

pub use audit::{AuditRow, AuditTrail, ExportOptions, StatusSummary};
pub use domain::request::{
    AttachmentRef, ChainStep, EmployeeId, MeetingSchedule, Reconciliation, RequestCategory,
    RequestDraft, RequestId, RequestRecord, RequestStatus, Span, StepStatus,
};
pub use domain::role::{Role, StaffLevel};
pub use errors::{DecisionError, DomainError};
pub use flows::{
    Actor, ChainRouter, Decision, DecisionCommand, DecisionEngine, RecordSnapshot, RequestDecided,
    RoutingTable, WorkflowEvent,
};
pub use notify::{InMemoryNotificationSink, NoopNotificationSink, NotificationSink};
pub use reconciliation::{ReconciliationError, ReconciliationValidator, UnitSplit};
pub use service::WorkflowService;
pub use store::{InMemoryRecordStore, RecordStore, StoreError};
