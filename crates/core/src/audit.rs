use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::request::{ChainStep, RequestId, RequestRecord, StepStatus};
use crate::domain::role::Role;
use crate::flows::router::{ChainRouter, RouteKey};
use crate::store::{RecordStore, StoreError};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportOptions {
    /// Also emit the step still waiting on a role.
    pub include_pending: bool,
}

/// One chain step flattened for the CSV collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRow {
    pub request_id: RequestId,
    pub category: String,
    pub subject_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_units: i64,
    pub request_status: String,
    pub sequence: usize,
    pub role: Role,
    pub step_status: StepStatus,
    pub decided_by: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub comment: Option<String>,
    pub paid_units: Option<i64>,
    pub unpaid_units: Option<i64>,
}

impl AuditRow {
    pub const HEADERS: [&'static str; 15] = [
        "request_id",
        "category",
        "subject_id",
        "start_date",
        "end_date",
        "total_units",
        "request_status",
        "sequence",
        "role",
        "step_status",
        "decided_by",
        "decided_at",
        "comment",
        "paid_units",
        "unpaid_units",
    ];

    /// Cells in `HEADERS` order. Absent values are empty strings.
    pub fn cells(&self) -> Vec<String> {
        let optional = |value: Option<String>| value.unwrap_or_default();
        vec![
            self.request_id.to_string(),
            self.category.clone(),
            self.subject_id.clone(),
            self.start_date.to_string(),
            self.end_date.to_string(),
            self.total_units.to_string(),
            self.request_status.clone(),
            self.sequence.to_string(),
            self.role.to_string(),
            self.step_status.as_str().to_string(),
            optional(self.decided_by.clone()),
            optional(self.decided_at.map(|at| at.to_rfc3339())),
            optional(self.comment.clone()),
            optional(self.paid_units.map(|units| units.to_string())),
            optional(self.unpaid_units.map(|units| units.to_string())),
        ]
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
    pub by_category: BTreeMap<String, usize>,
    pub awaiting_by_role: BTreeMap<String, usize>,
}

pub fn history_of(record: &RequestRecord) -> Vec<ChainStep> {
    record.approval_chain.clone()
}

/// Flattens chains into rows. The paid/unpaid columns are filled only on
/// the approval recorded by the route's reconciling role.
pub fn rows_for<'a>(
    records: impl IntoIterator<Item = &'a RequestRecord>,
    router: &ChainRouter,
    options: ExportOptions,
) -> Vec<AuditRow> {
    records
        .into_iter()
        .flat_map(|record| {
            let reconciling_role = router.reconciliation_role(RouteKey::for_record(record));
            record
                .approval_chain
                .iter()
                .enumerate()
                .filter(move |(_, step)| options.include_pending || step.status.is_recorded())
                .map(move |(sequence, step)| {
                    let reconciled = step.status == StepStatus::Approved
                        && reconciling_role == Some(step.role);
                    row(record, sequence + 1, step, reconciled)
                })
        })
        .collect()
}

fn row(record: &RequestRecord, sequence: usize, step: &ChainStep, reconciled: bool) -> AuditRow {
    let reconciliation = record.reconciliation.filter(|_| reconciled);
    AuditRow {
        request_id: record.id.clone(),
        category: record.category.as_str().to_string(),
        subject_id: record.subject_id.0.clone(),
        start_date: record.span.start_date,
        end_date: record.span.end_date,
        total_units: record.span.total_units,
        request_status: record.status.as_str().to_string(),
        sequence,
        role: step.role,
        step_status: step.status,
        decided_by: step.by.clone(),
        decided_at: step.date,
        comment: step.comment.clone(),
        paid_units: reconciliation.map(|split| split.paid_units),
        unpaid_units: reconciliation.map(|split| split.unpaid_units),
    }
}

pub fn summarize<'a>(records: impl IntoIterator<Item = &'a RequestRecord>) -> StatusSummary {
    let mut summary = StatusSummary::default();
    for record in records {
        summary.total += 1;
        *summary.by_status.entry(record.status.as_str().to_string()).or_default() += 1;
        *summary.by_category.entry(record.category.as_str().to_string()).or_default() += 1;
        if let Some(step) = record.active_step().filter(|_| record.is_open()) {
            *summary.awaiting_by_role.entry(step.role.as_str().to_string()).or_default() += 1;
        }
    }
    summary
}

/// Keeps open records whose pending step belongs to `role`, oldest first.
pub fn awaiting_role(records: Vec<RequestRecord>, role: Role) -> Vec<RequestRecord> {
    let mut records: Vec<_> = records
        .into_iter()
        .filter(|record| {
            record.is_open() && record.active_step().is_some_and(|step| step.role == role)
        })
        .collect();
    oldest_first(&mut records);
    records
}

pub fn oldest_first(records: &mut [RequestRecord]) {
    records.sort_by(|left, right| {
        left.created_at.cmp(&right.created_at).then_with(|| left.id.cmp(&right.id))
    });
}

/// Read-only queries over stored chains.
pub struct AuditTrail<'a, S> {
    store: &'a S,
    router: &'a ChainRouter,
}

impl<'a, S> AuditTrail<'a, S>
where
    S: RecordStore,
{
    pub fn new(store: &'a S, router: &'a ChainRouter) -> Self {
        Self { store, router }
    }

    pub fn history(&self, id: &RequestId) -> Result<Vec<ChainStep>, StoreError> {
        let record = self.store.load(id)?.ok_or_else(|| StoreError::NotFound(id.clone()))?;
        Ok(history_of(&record))
    }

    /// Rows in the order of `ids`, then chain order.
    pub fn export(
        &self,
        ids: &[RequestId],
        options: ExportOptions,
    ) -> Result<Vec<AuditRow>, StoreError> {
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            records.push(self.store.load(id)?.ok_or_else(|| StoreError::NotFound(id.clone()))?);
        }
        Ok(rows_for(&records, self.router, options))
    }

    pub fn export_all(&self, options: ExportOptions) -> Result<Vec<AuditRow>, StoreError> {
        let mut records = self.store.list()?;
        oldest_first(&mut records);
        Ok(rows_for(&records, self.router, options))
    }

    /// Open records whose pending step belongs to `role`, oldest first.
    pub fn awaiting(&self, role: Role) -> Result<Vec<RequestRecord>, StoreError> {
        Ok(awaiting_role(self.store.list()?, role))
    }

    pub fn summary(&self) -> Result<StatusSummary, StoreError> {
        Ok(summarize(&self.store.list()?))
    }
}
