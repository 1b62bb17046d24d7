use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use hrflow_core::domain::request::{
    LeaveCategory, MeetingSchedule, RequestCategory, RequestDraft, RequestId, RequestRecord,
    RequestStatus, ReviewCategory, Span,
};
use hrflow_core::domain::role::{Role, StaffLevel};
use hrflow_core::flows::{Actor, Decision, DecisionCommand, DecisionEngine};

use crate::connection::DbPool;
use crate::repositories::{RepositoryError, RequestRepository};

const DEMO_REQUEST_IDS: &[&str] = &[
    "REQ-DEMO-STANDARD",
    "REQ-DEMO-MEDICAL",
    "REQ-DEMO-FACULTY-REVIEW",
    "REQ-DEMO-HOD-REVIEW",
    "REQ-DEMO-MEDICAL-REJECTED",
];

/// One demo request and the state it must be in after seeding.
struct DemoRequest {
    id: &'static str,
    description: &'static str,
    expected_status: RequestStatus,
    expected_next_role: Option<Role>,
    draft: RequestDraft,
    decisions: Vec<DecisionCommand>,
}

/// Deterministic requests covering every route: one finished standard
/// leave, a medical leave waiting on reconciliation, a returned faculty
/// review, an HOD review mid-chain and a rejected medical leave.
///
/// Records are produced by replaying real decisions through the engine, so
/// the seeded chains are exactly what the portal would have written.
pub struct DemoDataset;

impl DemoDataset {
    pub fn request_ids() -> Vec<RequestId> {
        DEMO_REQUEST_IDS.iter().map(|id| RequestId((*id).to_string())).collect()
    }

    /// Inserts every demo request that is not already stored.
    pub async fn load<R>(repository: &R) -> Result<SeedResult, RepositoryError>
    where
        R: RequestRepository + ?Sized,
    {
        let engine = DecisionEngine::default();
        let mut requests_seeded = Vec::new();

        for demo in demo_requests() {
            let id = RequestId(demo.id.to_string());
            let inserted = if repository.find_by_id(&id).await?.is_some() {
                false
            } else {
                repository.insert(replay(&engine, &demo)?).await?;
                true
            };

            requests_seeded.push(SeedInfo {
                request_id: demo.id,
                description: demo.description,
                inserted,
            });
        }

        Ok(SeedResult { requests_seeded })
    }

    /// Checks each demo request is present with its expected status and
    /// pending role.
    pub async fn verify<R>(repository: &R) -> Result<VerificationResult, RepositoryError>
    where
        R: RequestRepository + ?Sized,
    {
        let engine = DecisionEngine::default();
        let mut checks = Vec::new();

        for demo in demo_requests() {
            let stored = repository.find_by_id(&RequestId(demo.id.to_string())).await?;
            let ok = stored.is_some_and(|record| {
                record.status == demo.expected_status
                    && engine.router().next_role(&record) == demo.expected_next_role
            });
            checks.push((demo.id, ok));
        }

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }

    /// Removes the demo requests; their chain steps go with them.
    pub async fn clean(pool: &DbPool) -> Result<u64, RepositoryError> {
        let quoted = sql_array_from_ids(DEMO_REQUEST_IDS);
        let deleted = sqlx::query(&format!("DELETE FROM request_record WHERE id IN {quoted}"))
            .execute(pool)
            .await?;
        Ok(deleted.rows_affected())
    }
}

fn replay(engine: &DecisionEngine, demo: &DemoRequest) -> Result<RequestRecord, RepositoryError> {
    let (mut record, _) = engine
        .open(demo.draft.clone(), seeded_at(1, 8))
        .map_err(|error| RepositoryError::Decode(format!("{}: {error}", demo.id)))?;
    for command in &demo.decisions {
        engine
            .decide(&mut record, command)
            .map_err(|error| RepositoryError::Decode(format!("{}: {error}", demo.id)))?;
    }
    Ok(record)
}

fn demo_requests() -> Vec<DemoRequest> {
    let decide = |id: &str, role: Role, name: &str, decision: Decision, day: u32| {
        DecisionCommand::new(RequestId(id.to_string()), Actor::new(role, name), decision)
            .at(seeded_at(day, 10))
    };

    vec![
        DemoRequest {
            id: "REQ-DEMO-STANDARD",
            description: "Standard leave for department staff, approved by the HOD",
            expected_status: RequestStatus::Approved,
            expected_next_role: None,
            draft: RequestDraft::new(
                RequestCategory::Leave(LeaveCategory::Standard),
                "E-1001",
                StaffLevel::Department,
                demo_span(14, 16),
            )
            .with_id("REQ-DEMO-STANDARD")
            .with_reason("Family wedding"),
            decisions: vec![decide(
                "REQ-DEMO-STANDARD",
                Role::Hod,
                "Dr. Amina Qureshi",
                Decision::Approve,
                2,
            )
            .with_comment("Enjoy the break")],
        },
        DemoRequest {
            id: "REQ-DEMO-MEDICAL",
            description: "Medical leave waiting on the president's paid/unpaid split",
            expected_status: RequestStatus::Forwarded,
            expected_next_role: Some(Role::President),
            draft: RequestDraft::new(
                RequestCategory::Leave(LeaveCategory::Medical),
                "E-1002",
                StaffLevel::Department,
                demo_span(9, 13),
            )
            .with_id("REQ-DEMO-MEDICAL")
            .with_reason("Post-operative recovery")
            .with_attachment("doc://medical/E-1002/discharge-summary.pdf"),
            decisions: vec![
                decide("REQ-DEMO-MEDICAL", Role::Hod, "Dr. Amina Qureshi", Decision::Approve, 2),
                decide("REQ-DEMO-MEDICAL", Role::Vc, "Prof. Tariq Aziz", Decision::Approve, 3),
            ],
        },
        DemoRequest {
            id: "REQ-DEMO-FACULTY-REVIEW",
            description: "Faculty review returned by the VC, back with the HOD",
            expected_status: RequestStatus::Pending,
            expected_next_role: Some(Role::Hod),
            draft: RequestDraft::new(
                RequestCategory::Review(ReviewCategory::Faculty),
                "E-1003",
                StaffLevel::Faculty,
                demo_span(20, 20),
            )
            .with_id("REQ-DEMO-FACULTY-REVIEW")
            .with_agenda("Annual performance review"),
            decisions: vec![
                decide(
                    "REQ-DEMO-FACULTY-REVIEW",
                    Role::Hod,
                    "Dr. Amina Qureshi",
                    Decision::Approve,
                    2,
                )
                .with_meeting(MeetingSchedule {
                    scheduled_for: seeded_at(20, 14),
                    venue: Some("Faculty board room".to_string()),
                }),
                decide("REQ-DEMO-FACULTY-REVIEW", Role::Vc, "Prof. Tariq Aziz", Decision::Return, 4)
                    .with_comment("Attach the teaching evaluation summary"),
            ],
        },
        DemoRequest {
            id: "REQ-DEMO-HOD-REVIEW",
            description: "HOD review confirmed by the dean, waiting on the VC",
            expected_status: RequestStatus::Forwarded,
            expected_next_role: Some(Role::Vc),
            draft: RequestDraft::new(
                RequestCategory::Review(ReviewCategory::Hod),
                "E-1004",
                StaffLevel::Faculty,
                demo_span(22, 22),
            )
            .with_id("REQ-DEMO-HOD-REVIEW")
            .with_agenda("Departmental leadership review"),
            decisions: vec![decide(
                "REQ-DEMO-HOD-REVIEW",
                Role::Dean,
                "Prof. Sara Malik",
                Decision::Approve,
                3,
            )],
        },
        DemoRequest {
            id: "REQ-DEMO-MEDICAL-REJECTED",
            description: "Medical leave rejected by the HOD",
            expected_status: RequestStatus::Rejected,
            expected_next_role: None,
            draft: RequestDraft::new(
                RequestCategory::Leave(LeaveCategory::Medical),
                "E-1005",
                StaffLevel::Department,
                demo_span(2, 6),
            )
            .with_id("REQ-DEMO-MEDICAL-REJECTED")
            .with_reason("Seasonal flu"),
            decisions: vec![decide(
                "REQ-DEMO-MEDICAL-REJECTED",
                Role::Hod,
                "Dr. Amina Qureshi",
                Decision::Reject,
                2,
            )
            .with_comment("Overlaps the examination period")],
        },
    ]
}

fn demo_span(start_day: u32, end_day: u32) -> Span {
    Span {
        start_date: demo_date(start_day),
        end_date: demo_date(end_day),
        total_units: i64::from(end_day - start_day) + 1,
    }
}

fn demo_date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, day).unwrap_or_default()
}

fn seeded_at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, day, hour, 0, 0).single().unwrap_or_default()
}

fn sql_array_from_ids(ids: &[&str]) -> String {
    let quoted = ids.iter().map(|id| format!("'{}'", id)).collect::<Vec<_>>().join(",");
    format!("({quoted})")
}

#[derive(Debug)]
pub struct SeedResult {
    pub requests_seeded: Vec<SeedInfo>,
}

#[derive(Debug)]
pub struct SeedInfo {
    pub request_id: &'static str,
    pub description: &'static str,
    /// False when the request was already present and left untouched.
    pub inserted: bool,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
