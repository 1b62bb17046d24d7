use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

use hrflow_core::audit::{
    awaiting_role, history_of, oldest_first, rows_for, summarize, AuditRow, ExportOptions,
    StatusSummary,
};
use hrflow_core::domain::request::{
    AttachmentRef, ChainStep, RequestDraft, RequestId, RequestRecord, Span,
};
use hrflow_core::domain::role::Role;
use hrflow_core::errors::{DecisionError, DomainError};
use hrflow_core::flows::{DecisionCommand, DecisionEngine, RecordSnapshot, WorkflowEvent};
use hrflow_core::notify::NotificationSink;

use crate::repositories::{RepositoryError, RequestRepository};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Decision(#[from] DecisionError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("request `{request_id}` kept changing underneath {attempts} decision attempts")]
    Contention { request_id: RequestId, attempts: u32 },
}

impl WorkflowError {
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Decision(error) => error.error_class(),
            Self::Repository(RepositoryError::NotFound(_)) => "not_found",
            Self::Repository(RepositoryError::Duplicate(_)) => "duplicate_request",
            Self::Repository(RepositoryError::Conflict { .. }) | Self::Contention { .. } => {
                "contention"
            }
            Self::Repository(_) => "store_failure",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Decision(DecisionError::NotFound { .. })
                | Self::Repository(RepositoryError::NotFound(_))
        )
    }
}

/// Drives the decision engine against an async repository.
///
/// Each decision reads the record, decides on it in memory, and writes it
/// back with a revision check. A lost race re-reads and decides again, so
/// the loser sees the winner's outcome (usually `TerminalRequest` or
/// `OutOfOrderActor`) rather than overwriting it. Events are emitted only
/// after the write commits.
pub struct PersistentWorkflow<R, N> {
    engine: DecisionEngine,
    repository: R,
    sink: N,
    max_attempts: u32,
}

impl<R, N> PersistentWorkflow<R, N>
where
    R: RequestRepository,
    N: NotificationSink,
{
    pub fn new(repository: R, sink: N) -> Self {
        Self::with_engine(DecisionEngine::default(), repository, sink)
    }

    pub fn with_engine(engine: DecisionEngine, repository: R, sink: N) -> Self {
        Self { engine, repository, sink, max_attempts: DEFAULT_MAX_ATTEMPTS }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub async fn submit(&self, draft: RequestDraft) -> Result<RecordSnapshot, WorkflowError> {
        let (record, event) = self.engine.open(draft, Utc::now())?;
        self.repository.insert(record.clone()).await?;

        info!(
            event_name = event.event_name(),
            request_id = %record.id,
            category = record.category.as_str(),
            subject_id = %record.subject_id.0,
            total_units = record.span.total_units,
            "request submitted"
        );
        self.sink.emit(event);
        Ok(self.engine.snapshot(record)?)
    }

    pub async fn apply(&self, command: DecisionCommand) -> Result<RecordSnapshot, WorkflowError> {
        for attempt in 1..=self.max_attempts {
            let mut record = self.require(&command.request_id).await?;
            let expected_revision = record.revision;
            let decided = self.engine.decide(&mut record, &command)?;

            match self.repository.replace(record.clone(), expected_revision).await {
                Ok(()) => {
                    let event = WorkflowEvent::Decided(decided);
                    info!(
                        event_name = event.event_name(),
                        request_id = %record.id,
                        acting_role = %command.actor.role,
                        decision = %command.decision,
                        new_status = record.status.as_str(),
                        revision = record.revision,
                        "decision recorded"
                    );
                    self.sink.emit(event);
                    return Ok(self.engine.snapshot(record)?);
                }
                Err(RepositoryError::Conflict { .. }) => {
                    warn!(
                        event_name = "workflow.decision_conflict",
                        request_id = %command.request_id,
                        expected_revision,
                        attempt,
                        "request changed while deciding; re-reading"
                    );
                }
                Err(error) => return Err(error.into()),
            }
        }

        Err(WorkflowError::Contention {
            request_id: command.request_id,
            attempts: self.max_attempts,
        })
    }

    pub async fn load(&self, id: &RequestId) -> Result<RecordSnapshot, WorkflowError> {
        Ok(self.engine.snapshot(self.require(id).await?)?)
    }

    pub async fn attach(
        &self,
        id: &RequestId,
        reference: AttachmentRef,
    ) -> Result<RecordSnapshot, WorkflowError> {
        self.amend(id, "request.attachment_added", |record| record.attach(reference.clone())).await
    }

    pub async fn amend_span(&self, id: &RequestId, span: Span) -> Result<RecordSnapshot, WorkflowError> {
        self.amend(id, "request.span_amended", |record| record.amend_span(span.clone())).await
    }

    /// Same read, change, compare-and-swap loop as `apply`, for edits that
    /// are not decisions. No notification goes out.
    async fn amend<F>(
        &self,
        id: &RequestId,
        event_name: &'static str,
        change: F,
    ) -> Result<RecordSnapshot, WorkflowError>
    where
        F: Fn(&mut RequestRecord) -> Result<(), DomainError> + Send + Sync,
    {
        for attempt in 1..=self.max_attempts {
            let mut record = self.require(id).await?;
            let expected_revision = record.revision;
            change(&mut record).map_err(DecisionError::from)?;
            record.revision = record.revision.saturating_add(1);
            record.updated_at = Utc::now();

            match self.repository.replace(record.clone(), expected_revision).await {
                Ok(()) => {
                    info!(
                        event_name,
                        request_id = %record.id,
                        revision = record.revision,
                        "request amended"
                    );
                    return Ok(self.engine.snapshot(record)?);
                }
                Err(RepositoryError::Conflict { .. }) => {
                    warn!(
                        event_name = "workflow.amendment_conflict",
                        request_id = %id,
                        expected_revision,
                        attempt,
                        "request changed while amending; re-reading"
                    );
                }
                Err(error) => return Err(error.into()),
            }
        }

        Err(WorkflowError::Contention { request_id: id.clone(), attempts: self.max_attempts })
    }

    pub async fn history(&self, id: &RequestId) -> Result<Vec<ChainStep>, WorkflowError> {
        Ok(history_of(&self.require(id).await?))
    }

    /// Audit rows in the order of `ids`. An unknown id fails the whole export.
    pub async fn export(
        &self,
        ids: &[RequestId],
        options: ExportOptions,
    ) -> Result<Vec<AuditRow>, WorkflowError> {
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            records.push(self.require(id).await?);
        }
        Ok(rows_for(&records, self.engine.router(), options))
    }

    pub async fn export_all(&self, options: ExportOptions) -> Result<Vec<AuditRow>, WorkflowError> {
        let mut records = self.repository.list().await?;
        oldest_first(&mut records);
        Ok(rows_for(&records, self.engine.router(), options))
    }

    pub async fn awaiting(&self, role: Role) -> Result<Vec<RecordSnapshot>, WorkflowError> {
        let records = awaiting_role(self.repository.list().await?, role);
        Ok(records
            .into_iter()
            .map(|record| self.engine.snapshot(record))
            .collect::<Result<Vec<_>, _>>()?)
    }

    pub async fn summary(&self) -> Result<StatusSummary, WorkflowError> {
        Ok(summarize(&self.repository.list().await?))
    }

    async fn require(&self, id: &RequestId) -> Result<RequestRecord, WorkflowError> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| DecisionError::NotFound { request_id: id.clone() }.into())
    }
}
