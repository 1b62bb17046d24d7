use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{sqlite::SqliteRow, Row, Sqlite, Transaction};

use hrflow_core::domain::request::{
    AttachmentRef, ChainStep, EmployeeId, MeetingSchedule, Reconciliation, RequestCategory,
    RequestId, RequestRecord, RequestStatus, Span, StepStatus,
};
use hrflow_core::domain::role::{Role, StaffLevel};

use super::{RepositoryError, RequestRepository};
use crate::DbPool;

const RECORD_COLUMNS: &str = "id,
    category,
    subject_id,
    subject_level,
    start_date,
    end_date,
    total_units,
    status,
    paid_units,
    unpaid_units,
    reason,
    agenda,
    attachments_json,
    revision,
    created_at,
    updated_at";

const STEP_COLUMNS: &str =
    "request_id, position, role, status, decided_by, decided_at, comment, meeting_json";

pub struct SqlRequestRepository {
    pool: DbPool,
}

impl SqlRequestRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl RequestRepository for SqlRequestRepository {
    async fn find_by_id(&self, id: &RequestId) -> Result<Option<RequestRecord>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {RECORD_COLUMNS} FROM request_record WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let steps = sqlx::query(&format!(
            "SELECT {STEP_COLUMNS} FROM chain_step WHERE request_id = ? ORDER BY position ASC"
        ))
        .bind(&id.0)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(step_from_row)
        .collect::<Result<Vec<_>, _>>()?;

        record_from_row(row, steps.into_iter().map(|(_, step)| step).collect()).map(Some)
    }

    async fn list(&self) -> Result<Vec<RequestRecord>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM request_record ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        let mut chains: HashMap<String, Vec<ChainStep>> = HashMap::new();
        let step_rows = sqlx::query(&format!(
            "SELECT {STEP_COLUMNS} FROM chain_step ORDER BY request_id ASC, position ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        for row in step_rows {
            let (request_id, step) = step_from_row(row)?;
            chains.entry(request_id).or_default().push(step);
        }

        rows.into_iter()
            .map(|row| {
                let id = row.try_get::<String, _>("id")?;
                let chain = chains.remove(&id).unwrap_or_default();
                record_from_row(row, chain)
            })
            .collect()
    }

    async fn insert(&self, record: RequestRecord) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(&format!(
            "INSERT INTO request_record ({RECORD_COLUMNS})
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(&record.id.0)
        .bind(record.category.as_str())
        .bind(&record.subject_id.0)
        .bind(record.subject_level.as_str())
        .bind(record.span.start_date.to_string())
        .bind(record.span.end_date.to_string())
        .bind(record.span.total_units)
        .bind(record.status.as_str())
        .bind(record.reconciliation.map(|split| split.paid_units))
        .bind(record.reconciliation.map(|split| split.unpaid_units))
        .bind(record.reason.as_deref())
        .bind(record.agenda.as_deref())
        .bind(attachments_json(&record.attachments)?)
        .bind(i64::from(record.revision))
        .bind(record.created_at.to_rfc3339())
        .bind(record.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(error) if is_unique_violation(&error) => {
                return Err(RepositoryError::Duplicate(record.id));
            }
            Err(error) => return Err(error.into()),
        }

        write_steps(&mut tx, &record).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn replace(
        &self,
        record: RequestRecord,
        expected_revision: u32,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE request_record SET
                status = ?,
                start_date = ?,
                end_date = ?,
                total_units = ?,
                paid_units = ?,
                unpaid_units = ?,
                reason = ?,
                agenda = ?,
                attachments_json = ?,
                revision = ?,
                updated_at = ?
             WHERE id = ? AND revision = ?",
        )
        .bind(record.status.as_str())
        .bind(record.span.start_date.to_string())
        .bind(record.span.end_date.to_string())
        .bind(record.span.total_units)
        .bind(record.reconciliation.map(|split| split.paid_units))
        .bind(record.reconciliation.map(|split| split.unpaid_units))
        .bind(record.reason.as_deref())
        .bind(record.agenda.as_deref())
        .bind(attachments_json(&record.attachments)?)
        .bind(i64::from(record.revision))
        .bind(record.updated_at.to_rfc3339())
        .bind(&record.id.0)
        .bind(i64::from(expected_revision))
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            let exists: i64 =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM request_record WHERE id = ?)")
                    .bind(&record.id.0)
                    .fetch_one(&mut *tx)
                    .await?;
            return Err(if exists == 1 {
                RepositoryError::Conflict { request_id: record.id, expected_revision }
            } else {
                RepositoryError::NotFound(record.id)
            });
        }

        write_steps(&mut tx, &record).await?;
        tx.commit().await?;
        Ok(())
    }
}

/// Upserts the chain. A stored step is only overwritten while it is still
/// pending; recorded decisions are never rewritten.
async fn write_steps(
    tx: &mut Transaction<'_, Sqlite>,
    record: &RequestRecord,
) -> Result<(), RepositoryError> {
    for (position, step) in record.approval_chain.iter().enumerate() {
        let meeting_json = step
            .meeting
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;

        sqlx::query(&format!(
            "INSERT INTO chain_step ({STEP_COLUMNS})
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(request_id, position) DO UPDATE SET
                role = excluded.role,
                status = excluded.status,
                decided_by = excluded.decided_by,
                decided_at = excluded.decided_at,
                comment = excluded.comment,
                meeting_json = excluded.meeting_json
             WHERE chain_step.status = 'pending'"
        ))
        .bind(&record.id.0)
        .bind(position as i64)
        .bind(step.role.as_str())
        .bind(step.status.as_str())
        .bind(step.by.as_deref())
        .bind(step.date.map(|value| value.to_rfc3339()))
        .bind(step.comment.as_deref())
        .bind(meeting_json)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    error.as_database_error().is_some_and(|database| database.is_unique_violation())
}

fn attachments_json(attachments: &[AttachmentRef]) -> Result<String, RepositoryError> {
    serde_json::to_string(attachments).map_err(|error| RepositoryError::Decode(error.to_string()))
}

fn record_from_row(row: SqliteRow, chain: Vec<ChainStep>) -> Result<RequestRecord, RepositoryError> {
    let category_raw = row.try_get::<String, _>("category")?;
    let category = RequestCategory::parse(&category_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown request category `{category_raw}`"))
    })?;

    let level_raw = row.try_get::<String, _>("subject_level")?;
    let subject_level = StaffLevel::parse(&level_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown staff level `{level_raw}`")))?;

    let status_raw = row.try_get::<String, _>("status")?;
    let status = RequestStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown request status `{status_raw}`")))?;

    let span = Span::new(
        parse_date("start_date", row.try_get("start_date")?)?,
        parse_date("end_date", row.try_get("end_date")?)?,
        row.try_get("total_units")?,
    )
    .map_err(|error| RepositoryError::Decode(error.to_string()))?;

    let reconciliation = match (
        row.try_get::<Option<i64>, _>("paid_units")?,
        row.try_get::<Option<i64>, _>("unpaid_units")?,
    ) {
        (Some(paid_units), Some(unpaid_units)) => Some(Reconciliation { paid_units, unpaid_units }),
        (None, None) => None,
        _ => {
            return Err(RepositoryError::Decode(
                "paid_units and unpaid_units must be both set or both empty".to_string(),
            ))
        }
    };

    let attachments_raw = row.try_get::<String, _>("attachments_json")?;
    let attachments: Vec<AttachmentRef> = serde_json::from_str(&attachments_raw)
        .map_err(|error| RepositoryError::Decode(error.to_string()))?;

    Ok(RequestRecord {
        id: RequestId(row.try_get("id")?),
        category,
        subject_id: EmployeeId(row.try_get("subject_id")?),
        subject_level,
        span,
        status,
        approval_chain: chain,
        reconciliation,
        reason: row.try_get("reason")?,
        agenda: row.try_get("agenda")?,
        attachments,
        revision: parse_u32("revision", row.try_get("revision")?)?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}

fn step_from_row(row: SqliteRow) -> Result<(String, ChainStep), RepositoryError> {
    let role_raw = row.try_get::<String, _>("role")?;
    let role = Role::parse(&role_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown role `{role_raw}`")))?;

    let status_raw = row.try_get::<String, _>("status")?;
    let status = StepStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown step status `{status_raw}`")))?;

    let meeting = row
        .try_get::<Option<String>, _>("meeting_json")?
        .map(|raw| serde_json::from_str::<MeetingSchedule>(&raw))
        .transpose()
        .map_err(|error| RepositoryError::Decode(error.to_string()))?;

    let step = ChainStep {
        role,
        status,
        by: row.try_get("decided_by")?,
        date: parse_optional_timestamp("decided_at", row.try_get("decided_at")?)?,
        comment: row.try_get("comment")?,
        meeting,
    };
    Ok((row.try_get("request_id")?, step))
}

fn parse_u32(column: &str, value: i64) -> Result<u32, RepositoryError> {
    u32::try_from(value).map_err(|_| {
        RepositoryError::Decode(format!(
            "invalid value for `{column}` (expected non-negative u32): {value}"
        ))
    })
}

fn parse_date(column: &str, value: String) -> Result<NaiveDate, RepositoryError> {
    NaiveDate::parse_from_str(&value, "%Y-%m-%d").map_err(|error| {
        RepositoryError::Decode(format!("invalid date in `{column}`: `{value}` ({error})"))
    })
}

fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

fn parse_optional_timestamp(
    column: &str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    value.map(|timestamp| parse_timestamp(column, timestamp)).transpose()
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, NaiveDate, Utc};

    use hrflow_core::domain::request::{
        LeaveCategory, MeetingSchedule, RequestCategory, RequestDraft, RequestRecord,
        RequestStatus, ReviewCategory, Span, StepStatus,
    };
    use hrflow_core::domain::role::{Role, StaffLevel};
    use hrflow_core::flows::{Actor, Decision, DecisionCommand, DecisionEngine};

    use super::SqlRequestRepository;
    use crate::migrations;
    use crate::repositories::{RepositoryError, RequestRepository};
    use crate::{connect_with_settings, DbPool};

    #[tokio::test]
    async fn sql_request_repo_round_trip_with_chain_and_reconciliation() {
        let pool = setup_pool().await;
        let repo = SqlRequestRepository::new(pool.clone());
        let engine = DecisionEngine::default();

        let mut record = open(&engine, RequestCategory::Leave(LeaveCategory::Medical), "REQ-SQL-1");
        repo.insert(record.clone()).await.expect("insert request");
        assert_eq!(repo.find_by_id(&record.id).await.expect("find"), Some(record.clone()));

        for (role, decision, split) in [
            (Role::Hod, Decision::Approve, None),
            (Role::Vc, Decision::Approve, None),
            (Role::President, Decision::Approve, Some((3, 2))),
        ] {
            let expected_revision = record.revision;
            let mut command = DecisionCommand::new(
                record.id.clone(),
                Actor::new(role, format!("{role} office")),
                decision,
            )
            .with_comment("ok")
            .at(parse_ts("2026-03-02T09:00:00Z"));
            if let Some((paid, unpaid)) = split {
                command = command.with_reconciliation(paid, unpaid);
            }
            engine.decide(&mut record, &command).expect("decision");
            repo.replace(record.clone(), expected_revision).await.expect("replace");
        }

        let stored = repo.find_by_id(&record.id).await.expect("find").expect("present");
        assert_eq!(stored, record);
        assert_eq!(stored.status, RequestStatus::Approved);
        assert_eq!(stored.approval_chain.len(), 3);

        pool.close().await;
    }

    #[tokio::test]
    async fn meeting_and_attachments_survive_storage() {
        let pool = setup_pool().await;
        let repo = SqlRequestRepository::new(pool.clone());
        let engine = DecisionEngine::default();

        let draft = RequestDraft::new(
            RequestCategory::Review(ReviewCategory::Faculty),
            "E-51",
            StaffLevel::Faculty,
            Span::inclusive(date(2), date(2)).expect("span"),
        )
        .with_id("REQ-SQL-2")
        .with_agenda("Annual PAMS review")
        .with_attachment("doc://pams/2026/E-51.pdf");
        let (mut record, _) = engine.open(draft, parse_ts("2026-03-01T08:00:00Z")).expect("open");
        repo.insert(record.clone()).await.expect("insert");

        let meeting = MeetingSchedule {
            scheduled_for: parse_ts("2026-03-10T14:00:00Z"),
            venue: Some("Faculty board room".to_string()),
        };
        let command = DecisionCommand::new(record.id.clone(), Actor::new(Role::Hod, "HOD"), Decision::Approve)
            .with_meeting(meeting.clone())
            .at(parse_ts("2026-03-03T10:00:00Z"));
        engine
            .decide(&mut record, &command)
            .expect("confirm");
        repo.replace(record.clone(), 0).await.expect("replace");

        let stored = repo.find_by_id(&record.id).await.expect("find").expect("present");
        assert_eq!(stored.approval_chain[0].meeting, Some(meeting));
        assert_eq!(stored.attachments, record.attachments);
        assert_eq!(stored.agenda.as_deref(), Some("Annual PAMS review"));

        pool.close().await;
    }

    #[tokio::test]
    async fn stale_revision_is_a_conflict_and_writes_nothing() {
        let pool = setup_pool().await;
        let repo = SqlRequestRepository::new(pool.clone());
        let engine = DecisionEngine::default();

        let original = open(&engine, RequestCategory::Leave(LeaveCategory::Standard), "REQ-SQL-3");
        repo.insert(original.clone()).await.expect("insert");

        let mut approved = original.clone();
        engine
            .decide(
                &mut approved,
                &DecisionCommand::new(original.id.clone(), Actor::new(Role::Hod, "A"), Decision::Approve),
            )
            .expect("approve");
        let mut rejected = original.clone();
        engine
            .decide(
                &mut rejected,
                &DecisionCommand::new(original.id.clone(), Actor::new(Role::Hod, "B"), Decision::Reject),
            )
            .expect("reject");

        repo.replace(approved.clone(), 0).await.expect("first writer");
        let error = repo.replace(rejected, 0).await.expect_err("second writer");
        assert!(matches!(error, RepositoryError::Conflict { expected_revision: 0, .. }));

        let stored = repo.find_by_id(&original.id).await.expect("find").expect("present");
        assert_eq!(stored, approved);

        pool.close().await;
    }

    #[tokio::test]
    async fn recorded_steps_are_never_rewritten() {
        let pool = setup_pool().await;
        let repo = SqlRequestRepository::new(pool.clone());
        let engine = DecisionEngine::default();

        let mut record = open(&engine, RequestCategory::Leave(LeaveCategory::Standard), "REQ-SQL-4");
        repo.insert(record.clone()).await.expect("insert");
        let command = DecisionCommand::new(record.id.clone(), Actor::new(Role::Hod, "A"), Decision::Approve);
        engine
            .decide(&mut record, &command)
            .expect("approve");
        repo.replace(record.clone(), 0).await.expect("replace");

        let mut tampered = record.clone();
        tampered.approval_chain[0].status = StepStatus::Rejected;
        tampered.approval_chain[0].by = Some("someone else".to_string());
        tampered.revision += 1;
        repo.replace(tampered, record.revision).await.expect("revision matches");

        let stored = repo.find_by_id(&record.id).await.expect("find").expect("present");
        assert_eq!(stored.approval_chain[0].status, StepStatus::Approved);
        assert_eq!(stored.approval_chain[0].by.as_deref(), Some("A"));

        pool.close().await;
    }

    #[tokio::test]
    async fn insert_rejects_duplicates_and_replace_reports_missing() {
        let pool = setup_pool().await;
        let repo = SqlRequestRepository::new(pool.clone());
        let engine = DecisionEngine::default();

        let record = open(&engine, RequestCategory::Leave(LeaveCategory::Standard), "REQ-SQL-5");
        let missing = repo.replace(record.clone(), 0).await.expect_err("absent");
        assert!(matches!(missing, RepositoryError::NotFound(_)));

        repo.insert(record.clone()).await.expect("insert");
        let duplicate = repo.insert(record.clone()).await.expect_err("duplicate");
        assert!(matches!(duplicate, RepositoryError::Duplicate(_)));

        let listed = repo.list().await.expect("list");
        assert_eq!(listed, vec![record]);

        pool.close().await;
    }

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    fn open(engine: &DecisionEngine, category: RequestCategory, id: &str) -> RequestRecord {
        let draft = RequestDraft::new(
            category,
            "E-50",
            StaffLevel::Department,
            Span::inclusive(date(2), date(6)).expect("span"),
        )
        .with_id(id)
        .with_reason("family matter");
        let (record, _) = engine.open(draft, parse_ts("2026-03-01T08:00:00Z")).expect("open");
        record
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, day).expect("valid date")
    }

    fn parse_ts(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value).expect("valid rfc3339").with_timezone(&Utc)
    }
}
