use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::request::{RequestCategory, RequestId, RequestStatus};
use crate::domain::role::Role;
use crate::flows::router::RoutingError;
use crate::flows::states::Decision;
use crate::reconciliation::{ReconciliationError, UnitSplit};
use crate::store::StoreError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid span: end date {end} is before start date {start}")]
    InvalidSpan { start: NaiveDate, end: NaiveDate },
    #[error("invalid span: total units must not be negative (got {0})")]
    NegativeSpanUnits(i64),
    #[error("request `{0}` already has a recorded decision; span and category are frozen")]
    RecordFrozen(RequestId),
    #[error("request `{0}` is closed")]
    RecordClosed(RequestId),
    #[error("unknown {kind} `{value}`")]
    UnknownValue { kind: &'static str, value: String },
    #[error(transparent)]
    Routing(#[from] RoutingError),
}

/// Every way a decision can be refused. None of these are transient; the
/// caller corrects the input or re-reads the record.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DecisionError {
    #[error("request `{request_id}` was not found")]
    NotFound { request_id: RequestId },
    #[error("request `{request_id}` is already {status} and accepts no further decisions")]
    TerminalRequest { request_id: RequestId, status: RequestStatus },
    #[error("role `{acting_role}` may not act on request `{request_id}` now (expected {})", expected_label(.expected_role))]
    OutOfOrderActor { request_id: RequestId, acting_role: Role, expected_role: Option<Role> },
    /// `split` is `None` when the reconciling role approved without one.
    #[error("{}", mismatch_label(.total_units, .split))]
    ReconciliationMismatch { total_units: i64, split: Option<UnitSplit> },
    #[error("unit counts must not be negative (paid {paid_units}, unpaid {unpaid_units})")]
    NegativeUnits { paid_units: i64, unpaid_units: i64 },
    #[error("decision `{decision}` is not available to `{role}` on a {category} request")]
    DecisionNotAllowed { role: Role, decision: Decision, category: RequestCategory },
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("record store failure: {0}")]
    Store(StoreError),
}

fn mismatch_label(total_units: &i64, split: &Option<UnitSplit>) -> String {
    match split {
        Some(split) => format!(
            "paid {} + unpaid {} does not equal the request total of {total_units}",
            split.paid_units, split.unpaid_units
        ),
        None => format!("no paid/unpaid split was supplied for the request total of {total_units}"),
    }
}

fn expected_label(role: &Option<Role>) -> String {
    match role {
        Some(role) => format!("`{role}`"),
        None => "no further approver".to_string(),
    }
}

impl From<ReconciliationError> for DecisionError {
    fn from(value: ReconciliationError) -> Self {
        match value {
            ReconciliationError::NegativeUnits { paid_units, unpaid_units } => {
                Self::NegativeUnits { paid_units, unpaid_units }
            }
            ReconciliationError::Mismatch { total_units, paid_units, unpaid_units } => {
                Self::ReconciliationMismatch {
                    total_units,
                    split: Some(UnitSplit::new(paid_units, unpaid_units)),
                }
            }
        }
    }
}

impl From<StoreError> for DecisionError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(request_id) => Self::NotFound { request_id },
            other => Self::Store(other),
        }
    }
}

impl From<RoutingError> for DecisionError {
    fn from(value: RoutingError) -> Self {
        Self::Domain(DomainError::Routing(value))
    }
}

impl DecisionError {
    /// Stable identifier for transports and logs.
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::TerminalRequest { .. } => "terminal_request",
            Self::OutOfOrderActor { .. } => "out_of_order_actor",
            Self::ReconciliationMismatch { .. } => "reconciliation_mismatch",
            Self::NegativeUnits { .. } => "negative_units",
            Self::DecisionNotAllowed { .. } => "decision_not_allowed",
            Self::Domain(DomainError::RecordFrozen(_)) => "record_frozen",
            Self::Domain(DomainError::RecordClosed(_)) => "record_closed",
            Self::Domain(DomainError::InvalidSpan { .. } | DomainError::NegativeSpanUnits(_)) => {
                "invalid_span"
            }
            Self::Domain(_) => "domain_invariant",
            Self::Store(_) => "store_failure",
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "This request no longer exists. Refresh the list.",
            Self::TerminalRequest { .. } | Self::OutOfOrderActor { .. } => {
                "This request was already decided by someone else. Refresh to see its current state."
            }
            Self::ReconciliationMismatch { .. } => {
                "Paid and unpaid days must add up to the total days of the request."
            }
            Self::NegativeUnits { .. } => "Paid and unpaid days cannot be negative.",
            Self::DecisionNotAllowed { .. } => "That action is not available at this stage.",
            Self::Domain(DomainError::RecordFrozen(_)) => {
                "Dates can no longer change once an approver has acted."
            }
            Self::Domain(DomainError::RecordClosed(_)) => {
                "This request is closed and can no longer be changed."
            }
            Self::Domain(DomainError::InvalidSpan { .. } | DomainError::NegativeSpanUnits(_)) => {
                "The end date must not be before the start date."
            }
            Self::Domain(_) => "The request is in an inconsistent state. Contact HR.",
            Self::Store(_) => "The request could not be saved. Please retry shortly.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DecisionError, DomainError};
    use crate::domain::request::RequestId;
    use crate::domain::role::Role;
    use crate::reconciliation::ReconciliationError;
    use crate::store::StoreError;

    #[test]
    fn store_not_found_maps_to_decision_not_found() {
        let error = DecisionError::from(StoreError::NotFound(RequestId("REQ-9".to_string())));
        assert_eq!(error, DecisionError::NotFound { request_id: RequestId("REQ-9".to_string()) });
        assert_eq!(error.error_class(), "not_found");
    }

    #[test]
    fn reconciliation_failures_keep_their_own_kinds() {
        let mismatch = DecisionError::from(ReconciliationError::Mismatch {
            total_units: 5,
            paid_units: 3,
            unpaid_units: 1,
        });
        assert_eq!(mismatch.error_class(), "reconciliation_mismatch");

        let negative = DecisionError::from(ReconciliationError::NegativeUnits {
            paid_units: -1,
            unpaid_units: 6,
        });
        assert_eq!(negative.error_class(), "negative_units");
    }

    #[test]
    fn absent_split_reads_as_a_mismatch() {
        let error = DecisionError::ReconciliationMismatch { total_units: 5, split: None };
        assert_eq!(error.error_class(), "reconciliation_mismatch");
        assert_eq!(
            error.to_string(),
            "no paid/unpaid split was supplied for the request total of 5"
        );
    }

    #[test]
    fn out_of_order_message_names_expected_role() {
        let error = DecisionError::OutOfOrderActor {
            request_id: RequestId("REQ-1".to_string()),
            acting_role: Role::Vc,
            expected_role: Some(Role::Hod),
        };
        assert_eq!(
            error.to_string(),
            "role `vc` may not act on request `REQ-1` now (expected `hod`)"
        );
        assert!(error.user_message().contains("already decided"));
    }

    #[test]
    fn domain_errors_keep_amendment_classes_apart_from_invariants() {
        let span = DecisionError::from(DomainError::NegativeSpanUnits(-2));
        assert_eq!(span.error_class(), "invalid_span");

        let frozen = DecisionError::from(DomainError::RecordFrozen(RequestId("REQ-1".to_string())));
        assert_eq!(frozen.error_class(), "record_frozen");

        let corrupt = DecisionError::from(crate::flows::router::RoutingError::Unscheduled);
        assert_eq!(corrupt.error_class(), "domain_invariant");
    }
}
