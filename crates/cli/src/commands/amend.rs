use clap::Args;
use hrflow_core::domain::request::{AttachmentRef, RequestId, Span};
use hrflow_core::flows::RecordSnapshot;

use hrflow_db::WorkflowError;

use crate::commands::submit::parse_date;
use crate::commands::{
    invalid_argument, open_workflow, prepare, workflow_failure, CommandResult, Failure,
};

#[derive(Debug, Clone, Args)]
pub struct AmendArgs {
    pub request_id: String,
    #[arg(long, requires = "end", help = "New first day (YYYY-MM-DD); only before any decision")]
    pub start: Option<String>,
    #[arg(long, requires = "start", help = "New last day, inclusive (YYYY-MM-DD)")]
    pub end: Option<String>,
    #[arg(long = "attachment", help = "Supporting document reference to add (repeatable)")]
    pub attachments: Vec<String>,
}

#[derive(Debug)]
struct Amendment {
    id: RequestId,
    span: Option<Span>,
    attachments: Vec<AttachmentRef>,
}

pub fn run(args: AmendArgs) -> CommandResult {
    let amendment = match build_amendment(args) {
        Ok(amendment) => amendment,
        Err(failure) => return CommandResult::from_failure("amend", failure),
    };
    let (config, runtime) = match prepare("amend") {
        Ok(prepared) => prepared,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let workflow = open_workflow(&config).await?;
        let applied = async {
            let mut snapshot: Option<RecordSnapshot> = None;
            if let Some(span) = amendment.span {
                snapshot = Some(workflow.amend_span(&amendment.id, span).await?);
            }
            for reference in amendment.attachments {
                snapshot = Some(workflow.attach(&amendment.id, reference).await?);
            }
            let snapshot = match snapshot {
                Some(snapshot) => snapshot,
                None => workflow.load(&amendment.id).await?,
            };
            Ok::<_, WorkflowError>(snapshot)
        }
        .await
        .map_err(workflow_failure);
        workflow.repository().pool().close().await;
        applied
    });

    match result {
        Ok(snapshot) => CommandResult::success_with_data(
            "amend",
            format!("amended request {} (revision {})", snapshot.record.id, snapshot.record.revision),
            &snapshot,
        ),
        Err(failure) => CommandResult::from_failure("amend", failure),
    }
}

fn build_amendment(args: AmendArgs) -> Result<Amendment, Failure> {
    let id = args.request_id.trim();
    if id.is_empty() {
        return Err(invalid_argument("request id must not be empty"));
    }

    let span = match (args.start, args.end) {
        (Some(start), Some(end)) => Some(
            Span::inclusive(parse_date("start", &start)?, parse_date("end", &end)?)
                .map_err(|error| invalid_argument(error.to_string()))?,
        ),
        (None, None) => None,
        _ => return Err(invalid_argument("--start and --end must be given together")),
    };

    let attachments: Vec<AttachmentRef> = args
        .attachments
        .into_iter()
        .map(|reference| reference.trim().to_string())
        .filter(|reference| !reference.is_empty())
        .map(AttachmentRef)
        .collect();

    if span.is_none() && attachments.is_empty() {
        return Err(invalid_argument("nothing to amend: pass --start/--end or --attachment"));
    }

    Ok(Amendment { id: RequestId(id.to_string()), span, attachments })
}
