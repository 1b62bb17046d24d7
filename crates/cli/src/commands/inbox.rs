use clap::Args;
use hrflow_core::domain::role::Role;

use crate::commands::{invalid_argument, open_workflow, prepare, workflow_failure, CommandResult};

#[derive(Debug, Clone, Args)]
pub struct InboxArgs {
    #[arg(long, help = "Role whose pending decisions to list")]
    pub role: String,
}

pub fn run(args: InboxArgs) -> CommandResult {
    let Some(role) = Role::parse(&args.role) else {
        return CommandResult::from_failure(
            "inbox",
            invalid_argument(format!("unknown role `{}`", args.role)),
        );
    };
    let (config, runtime) = match prepare("inbox") {
        Ok(prepared) => prepared,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let workflow = open_workflow(&config).await?;
        let awaiting = workflow.awaiting(role).await.map_err(workflow_failure);
        workflow.repository().pool().close().await;
        awaiting
    });

    match result {
        Ok(snapshots) => CommandResult::success_with_data(
            "inbox",
            format!("{} request(s) awaiting {role}", snapshots.len()),
            &snapshots,
        ),
        Err(failure) => CommandResult::from_failure("inbox", failure),
    }
}
