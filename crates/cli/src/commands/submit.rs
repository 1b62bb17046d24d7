use chrono::NaiveDate;
use clap::Args;
use hrflow_core::domain::request::{RequestCategory, RequestDraft, Span};
use hrflow_core::domain::role::StaffLevel;

use crate::commands::{
    invalid_argument, open_workflow, prepare, workflow_failure, CommandResult, Failure,
};

#[derive(Debug, Clone, Args)]
pub struct SubmitArgs {
    #[arg(long, help = "leave.standard | leave.medical | review.faculty | review.hod")]
    pub category: String,
    #[arg(long, help = "Employee id of the person the request is about")]
    pub subject: String,
    #[arg(long, help = "department | faculty")]
    pub level: String,
    #[arg(long, help = "First day (YYYY-MM-DD)")]
    pub start: String,
    #[arg(long, help = "Last day, inclusive (YYYY-MM-DD)")]
    pub end: String,
    #[arg(long, help = "Explicit request id; generated when omitted")]
    pub id: Option<String>,
    #[arg(long)]
    pub reason: Option<String>,
    #[arg(long, help = "Meeting agenda for reviews")]
    pub agenda: Option<String>,
    #[arg(long = "attachment", help = "Supporting document reference (repeatable)")]
    pub attachments: Vec<String>,
}

pub fn run(args: SubmitArgs) -> CommandResult {
    let draft = match build_draft(args) {
        Ok(draft) => draft,
        Err(failure) => return CommandResult::from_failure("submit", failure),
    };
    let (config, runtime) = match prepare("submit") {
        Ok(prepared) => prepared,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let workflow = open_workflow(&config).await?;
        let snapshot = workflow.submit(draft).await.map_err(workflow_failure)?;
        workflow.repository().pool().close().await;
        Ok::<_, Failure>(snapshot)
    });

    match result {
        Ok(snapshot) => CommandResult::success_with_data(
            "submit",
            format!("submitted request {}", snapshot.record.id),
            &snapshot,
        ),
        Err(failure) => CommandResult::from_failure("submit", failure),
    }
}

fn build_draft(args: SubmitArgs) -> Result<RequestDraft, Failure> {
    let category = RequestCategory::parse(&args.category)
        .ok_or_else(|| invalid_argument(format!("unknown category `{}`", args.category)))?;
    let level = StaffLevel::parse(&args.level)
        .ok_or_else(|| invalid_argument(format!("unknown staff level `{}`", args.level)))?;
    if args.subject.trim().is_empty() {
        return Err(invalid_argument("subject must not be empty"));
    }
    let span = Span::inclusive(parse_date("start", &args.start)?, parse_date("end", &args.end)?)
        .map_err(|error| invalid_argument(error.to_string()))?;

    let mut draft = RequestDraft::new(category, args.subject.trim(), level, span);
    if let Some(id) = args.id {
        draft = draft.with_id(id);
    }
    if let Some(reason) = args.reason {
        draft = draft.with_reason(reason);
    }
    if let Some(agenda) = args.agenda {
        draft = draft.with_agenda(agenda);
    }
    for attachment in args.attachments {
        draft = draft.with_attachment(attachment);
    }
    Ok(draft)
}

pub(crate) fn parse_date(field: &str, value: &str) -> Result<NaiveDate, Failure> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|error| invalid_argument(format!("invalid {field} date `{value}`: {error}")))
}
