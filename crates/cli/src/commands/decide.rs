use chrono::{DateTime, Utc};
use clap::Args;
use hrflow_core::domain::request::{MeetingSchedule, RequestId};
use hrflow_core::domain::role::Role;
use hrflow_core::flows::{Actor, Decision, DecisionCommand};

use crate::commands::{
    invalid_argument, open_workflow, prepare, workflow_failure, CommandResult, Failure,
};

#[derive(Debug, Clone, Args)]
pub struct DecideArgs {
    #[arg(help = "Request to decide on")]
    pub request_id: String,
    #[arg(long, help = "Acting role: hod | dean | vc | president | hr")]
    pub role: String,
    #[arg(long, help = "Display name recorded on the chain step")]
    pub name: String,
    #[arg(long, help = "approve (or confirm) | reject | return | finalize")]
    pub decision: String,
    #[arg(long)]
    pub comment: Option<String>,
    #[arg(long, help = "Paid units of the reconciliation split")]
    pub paid: Option<i64>,
    #[arg(long, help = "Unpaid units of the reconciliation split")]
    pub unpaid: Option<i64>,
    #[arg(long = "meeting-at", help = "Review meeting time (RFC 3339)")]
    pub meeting_at: Option<String>,
    #[arg(long, requires = "meeting_at", help = "Review meeting venue")]
    pub venue: Option<String>,
}

pub fn run(args: DecideArgs) -> CommandResult {
    let command = match build_command(args) {
        Ok(command) => command,
        Err(failure) => return CommandResult::from_failure("decide", failure),
    };
    let (config, runtime) = match prepare("decide") {
        Ok(prepared) => prepared,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let workflow = open_workflow(&config).await?;
        let outcome = workflow.apply(command).await.map_err(workflow_failure);
        workflow.repository().pool().close().await;
        outcome
    });

    match result {
        Ok(snapshot) => {
            let next = snapshot.next_role.map(|role| role.to_string());
            let message = format!(
                "request {} is {}{}",
                snapshot.record.id,
                snapshot.record.status,
                next.map(|role| format!(", awaiting {role}")).unwrap_or_default()
            );
            CommandResult::success_with_data("decide", message, &snapshot)
        }
        Err(failure) => CommandResult::from_failure("decide", failure),
    }
}

fn build_command(args: DecideArgs) -> Result<DecisionCommand, Failure> {
    let role = Role::parse(&args.role)
        .ok_or_else(|| invalid_argument(format!("unknown role `{}`", args.role)))?;
    let decision = Decision::parse(&args.decision)
        .ok_or_else(|| invalid_argument(format!("unknown decision `{}`", args.decision)))?;
    if args.name.trim().is_empty() {
        return Err(invalid_argument("name must not be empty"));
    }

    let mut command = DecisionCommand::new(
        RequestId(args.request_id.trim().to_string()),
        Actor::new(role, args.name.trim()),
        decision,
    );
    if let Some(comment) = args.comment {
        command = command.with_comment(comment);
    }

    match (args.paid, args.unpaid) {
        (Some(paid), Some(unpaid)) => command = command.with_reconciliation(paid, unpaid),
        (None, None) => {}
        _ => return Err(invalid_argument("--paid and --unpaid must be given together")),
    }

    if let Some(meeting_at) = args.meeting_at {
        let scheduled_for = DateTime::parse_from_rfc3339(meeting_at.trim())
            .map(|timestamp| timestamp.with_timezone(&Utc))
            .map_err(|error| {
                invalid_argument(format!("invalid meeting time `{meeting_at}`: {error}"))
            })?;
        command = command.with_meeting(MeetingSchedule { scheduled_for, venue: args.venue });
    }

    Ok(command)
}
