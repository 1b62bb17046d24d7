use clap::Args;
use hrflow_core::domain::request::{ChainStep, RequestId};
use hrflow_core::flows::RecordSnapshot;
use serde::Serialize;

use hrflow_db::WorkflowError;

use crate::commands::{open_workflow, prepare, workflow_failure, CommandResult};

#[derive(Debug, Clone, Args)]
pub struct ShowArgs {
    pub request_id: String,
}

#[derive(Debug, Serialize)]
struct ShowOutput {
    #[serde(flatten)]
    snapshot: RecordSnapshot,
    history: Vec<ChainStep>,
}

pub fn run(args: ShowArgs) -> CommandResult {
    let (config, runtime) = match prepare("show") {
        Ok(prepared) => prepared,
        Err(result) => return result,
    };
    let id = RequestId(args.request_id.trim().to_string());

    let result = runtime.block_on(async {
        let workflow = open_workflow(&config).await?;
        let loaded = async {
            let snapshot = workflow.load(&id).await?;
            let history = workflow.history(&id).await?;
            Ok::<_, WorkflowError>(ShowOutput { snapshot, history })
        }
        .await
        .map_err(workflow_failure);
        workflow.repository().pool().close().await;
        loaded
    });

    match result {
        Ok(output) => CommandResult::success_with_data(
            "show",
            format!("request {} is {}", output.snapshot.record.id, output.snapshot.record.status),
            &output,
        ),
        Err(failure) => CommandResult::from_failure("show", failure),
    }
}
