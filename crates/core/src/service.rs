use chrono::Utc;

use crate::audit::AuditTrail;
use crate::domain::request::{AttachmentRef, RequestDraft, RequestId, RequestRecord, Span};
use crate::domain::role::Role;
use crate::errors::{DecisionError, DomainError};
use crate::flows::engine::DecisionEngine;
use crate::flows::states::{DecisionCommand, RecordSnapshot, WorkflowEvent};
use crate::notify::NotificationSink;
use crate::store::{RecordStore, StoreError};

/// Entry point for callers holding a synchronous record store. Each
/// decision is one atomic store update; the event goes out after commit.
pub struct WorkflowService<S, N> {
    engine: DecisionEngine,
    store: S,
    sink: N,
}

impl<S, N> WorkflowService<S, N>
where
    S: RecordStore,
    N: NotificationSink,
{
    pub fn new(store: S, sink: N) -> Self {
        Self::with_engine(DecisionEngine::default(), store, sink)
    }

    pub fn with_engine(engine: DecisionEngine, store: S, sink: N) -> Self {
        Self { engine, store, sink }
    }

    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn submit(&self, draft: RequestDraft) -> Result<RecordSnapshot, DecisionError> {
        let (record, event) = self.engine.open(draft, Utc::now())?;
        self.store.insert(record.clone())?;
        self.sink.emit(event);
        self.engine.snapshot(record)
    }

    pub fn apply(&self, command: DecisionCommand) -> Result<RecordSnapshot, DecisionError> {
        let (decided, record) =
            self.store.update(&command.request_id, |record| -> Result<_, DecisionError> {
                let decided = self.engine.decide(record, &command)?;
                Ok((decided, record.clone()))
            })?;

        self.sink.emit(WorkflowEvent::Decided(decided));
        self.engine.snapshot(record)
    }

    pub fn load(&self, id: &RequestId) -> Result<RecordSnapshot, DecisionError> {
        let record = self.store.load(id)?.ok_or_else(|| StoreError::NotFound(id.clone()))?;
        self.engine.snapshot(record)
    }

    /// Adds a supporting document while the request is open.
    pub fn attach(
        &self,
        id: &RequestId,
        reference: AttachmentRef,
    ) -> Result<RecordSnapshot, DecisionError> {
        self.amend(id, |record| record.attach(reference))
    }

    /// Replaces the span; refused once any approver has acted.
    pub fn amend_span(&self, id: &RequestId, span: Span) -> Result<RecordSnapshot, DecisionError> {
        self.amend(id, |record| record.amend_span(span))
    }

    fn amend<F>(&self, id: &RequestId, change: F) -> Result<RecordSnapshot, DecisionError>
    where
        F: FnOnce(&mut RequestRecord) -> Result<(), DomainError>,
    {
        let record = self.store.update(id, |record| -> Result<_, DecisionError> {
            change(record)?;
            record.revision = record.revision.saturating_add(1);
            record.updated_at = Utc::now();
            Ok(record.clone())
        })?;
        self.engine.snapshot(record)
    }

    pub fn next_role(&self, record: &RequestRecord) -> Option<Role> {
        self.engine.router().next_role(record)
    }

    pub fn is_valid_actor(&self, record: &RequestRecord, role: Role) -> bool {
        self.engine.router().is_valid_actor(record, role)
    }

    pub fn audit(&self) -> AuditTrail<'_, S> {
        AuditTrail::new(&self.store, self.engine.router())
    }
}
