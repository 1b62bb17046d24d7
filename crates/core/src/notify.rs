use std::sync::{Arc, Mutex};

use crate::flows::states::WorkflowEvent;

/// Receives workflow events after the decision has been committed.
/// Delivery is fire-and-forget: a sink cannot fail a decision.
pub trait NotificationSink: Send + Sync {
    fn emit(&self, event: WorkflowEvent);
}

#[derive(Clone, Default)]
pub struct InMemoryNotificationSink {
    events: Arc<Mutex<Vec<WorkflowEvent>>>,
}

impl InMemoryNotificationSink {
    pub fn events(&self) -> Vec<WorkflowEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl NotificationSink for InMemoryNotificationSink {
    fn emit(&self, event: WorkflowEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopNotificationSink;

impl NotificationSink for NoopNotificationSink {
    fn emit(&self, _event: WorkflowEvent) {}
}

impl<T: NotificationSink + ?Sized> NotificationSink for Arc<T> {
    fn emit(&self, event: WorkflowEvent) {
        (**self).emit(event);
    }
}
