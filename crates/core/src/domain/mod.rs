pub mod request;
pub mod role;

pub use request::{
    AttachmentRef, ChainStep, EmployeeId, LeaveCategory, MeetingSchedule, Reconciliation,
    RequestCategory, RequestDraft, RequestId, RequestRecord, RequestStatus, ReviewCategory, Span,
    StepStatus,
};
pub use role::{Role, StaffLevel};
