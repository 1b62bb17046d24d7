use chrono::{DateTime, Utc};

use crate::domain::request::{
    ChainStep, Reconciliation, RequestDraft, RequestRecord, RequestStatus, Span, StepStatus,
};
use crate::domain::role::Role;
use crate::errors::DecisionError;
use crate::flows::router::{Advance, ChainRouter, RouteKey, RouteStage, RoutingError};
use crate::flows::states::{
    Decision, DecisionCommand, Recipient, RecordSnapshot, RequestDecided, WorkflowEvent,
};
use crate::reconciliation::ReconciliationValidator;

/// Applies decisions to request records. Holds no per-request state; the
/// caller supplies the record and persists the result.
#[derive(Clone, Debug, Default)]
pub struct DecisionEngine {
    router: ChainRouter,
    validator: ReconciliationValidator,
}

impl DecisionEngine {
    pub fn new(router: ChainRouter) -> Self {
        Self { router, validator: ReconciliationValidator }
    }

    pub fn router(&self) -> &ChainRouter {
        &self.router
    }

    /// Builds a `Pending` record with the route's first role scheduled.
    pub fn open(
        &self,
        draft: RequestDraft,
        now: DateTime<Utc>,
    ) -> Result<(RequestRecord, WorkflowEvent), DecisionError> {
        let span = Span::new(draft.span.start_date, draft.span.end_date, draft.span.total_units)?;
        let key = RouteKey::new(draft.category, draft.subject_level);
        let first_role = self
            .router
            .route(key)?
            .first_role()
            .ok_or(RoutingError::UnknownStage { key, stage_index: 0 })?;

        let mut record = RequestDraft { span, ..draft }.into_record(now);
        record.approval_chain.push(ChainStep::pending(first_role));

        let event = WorkflowEvent::Submitted {
            request_id: record.id.clone(),
            first_role,
            recipients: vec![Recipient::Role(first_role)],
        };
        Ok((record, event))
    }

    /// Applies one decision. Either the whole outcome lands on `record` or
    /// `record` is left exactly as it was.
    pub fn decide(
        &self,
        record: &mut RequestRecord,
        command: &DecisionCommand,
    ) -> Result<RequestDecided, DecisionError> {
        if command.request_id != record.id {
            return Err(DecisionError::NotFound { request_id: command.request_id.clone() });
        }
        if record.status.is_terminal() {
            return Err(DecisionError::TerminalRequest {
                request_id: record.id.clone(),
                status: record.status,
            });
        }

        let acting_role = command.actor.role;
        let (stage_index, stage) = match self.router.active_stage(record)? {
            Some(active) => active,
            None => {
                return Err(DecisionError::OutOfOrderActor {
                    request_id: record.id.clone(),
                    acting_role,
                    expected_role: None,
                })
            }
        };
        if acting_role != stage.role {
            return Err(DecisionError::OutOfOrderActor {
                request_id: record.id.clone(),
                acting_role,
                expected_role: Some(stage.role),
            });
        }
        if !stage.allows(command.decision) {
            return Err(DecisionError::DecisionNotAllowed {
                role: acting_role,
                decision: command.decision,
                category: record.category,
            });
        }

        let reconciliation = self.reconcile(record, stage, command)?;
        let key = RouteKey::for_record(record);
        let advance = self.router.advance(key, stage_index, command.decision)?;
        let decided_at = command.decided_at.unwrap_or_else(Utc::now);

        let mut next = record.clone();
        if let Some(step) = next.approval_chain.last_mut() {
            step.status = match advance {
                Advance::Reject => StepStatus::Rejected,
                Advance::Rewind { .. } => StepStatus::Returned,
                Advance::Forward { .. } | Advance::Complete => StepStatus::Approved,
            };
            step.by = Some(command.actor.display_name.clone());
            step.date = Some(decided_at);
            step.comment = command.payload.comment.clone();
            step.meeting = command.payload.meeting.clone();
        }

        let route = self.router.route(key)?;
        let role_at = |stage_index: usize| -> Result<Role, DecisionError> {
            route.stage(stage_index).map(|stage| stage.role).ok_or_else(|| {
                RoutingError::UnknownStage { key, stage_index }.into()
            })
        };

        let (new_status, next_role, recipients) = match advance {
            Advance::Forward { next_stage } => {
                let role = role_at(next_stage)?;
                next.approval_chain.push(ChainStep::pending(role));
                (RequestStatus::Forwarded, Some(role), vec![Recipient::Role(role)])
            }
            Advance::Rewind { to_stage } => {
                let role = role_at(to_stage)?;
                next.approval_chain.push(ChainStep::pending(role));
                (
                    RequestStatus::Pending,
                    Some(role),
                    vec![Recipient::Role(role), Recipient::Subject(next.subject_id.clone())],
                )
            }
            Advance::Complete => {
                (RequestStatus::Approved, None, vec![Recipient::Subject(next.subject_id.clone())])
            }
            Advance::Reject => {
                (RequestStatus::Rejected, None, vec![Recipient::Subject(next.subject_id.clone())])
            }
        };

        if reconciliation.is_some() {
            next.reconciliation = reconciliation;
        }
        next.status = new_status;
        next.revision = next.revision.saturating_add(1);
        next.updated_at = decided_at;

        *record = next;
        Ok(RequestDecided {
            request_id: record.id.clone(),
            new_status,
            acting_role,
            decision: command.decision,
            next_role,
            recipients,
            decided_at,
        })
    }

    /// Fails when the stored chain no longer matches its route, so a
    /// corrupt record is never shown as finished.
    pub fn snapshot(&self, record: RequestRecord) -> Result<RecordSnapshot, DecisionError> {
        let next_role = self.router.try_next_role(&record)?;
        let missing_supporting_documents = record.missing_supporting_documents();
        Ok(RecordSnapshot { record, next_role, missing_supporting_documents })
    }

    fn reconcile(
        &self,
        record: &RequestRecord,
        stage: &RouteStage,
        command: &DecisionCommand,
    ) -> Result<Option<Reconciliation>, DecisionError> {
        let approving = matches!(command.decision, Decision::Approve | Decision::Finalize);
        if !stage.reconciles || !approving {
            return Ok(None);
        }

        let split = command.payload.reconciliation.ok_or(DecisionError::ReconciliationMismatch {
            total_units: record.span.total_units,
            split: None,
        })?;
        Ok(Some(self.validator.validate_split(record.span.total_units, split)?))
    }
}
