use crate::commands::{open_workflow, prepare, workflow_failure, CommandResult};

pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("summary") {
        Ok(prepared) => prepared,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let workflow = open_workflow(&config).await?;
        let summary = workflow.summary().await.map_err(workflow_failure);
        workflow.repository().pool().close().await;
        summary
    });

    match result {
        Ok(summary) => CommandResult::success_with_data(
            "summary",
            format!("{} request(s) on record", summary.total),
            &summary,
        ),
        Err(failure) => CommandResult::from_failure("summary", failure),
    }
}
