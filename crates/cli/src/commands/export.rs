use clap::Args;
use hrflow_core::audit::{AuditRow, ExportOptions};
use hrflow_core::domain::request::RequestId;
use serde::Serialize;

use crate::commands::{open_workflow, prepare, workflow_failure, CommandResult};

#[derive(Debug, Clone, Args)]
pub struct ExportArgs {
    #[arg(help = "Requests to export; every stored request when omitted")]
    pub request_ids: Vec<String>,
    #[arg(long, help = "Also export steps still waiting on a decision")]
    pub include_pending: bool,
}

/// Tabular shape handed to the CSV writer: one header row and one row of
/// cells per chain step.
#[derive(Debug, Serialize)]
struct ExportOutput {
    headers: Vec<&'static str>,
    rows: Vec<Vec<String>>,
}

impl ExportOutput {
    fn from_rows(rows: &[AuditRow]) -> Self {
        Self { headers: AuditRow::HEADERS.to_vec(), rows: rows.iter().map(AuditRow::cells).collect() }
    }
}

pub fn run(args: ExportArgs) -> CommandResult {
    let (config, runtime) = match prepare("export") {
        Ok(prepared) => prepared,
        Err(result) => return result,
    };
    let options =
        ExportOptions { include_pending: args.include_pending || config.export.include_pending };
    let ids: Vec<RequestId> =
        args.request_ids.iter().map(|id| RequestId(id.trim().to_string())).collect();

    let result = runtime.block_on(async {
        let workflow = open_workflow(&config).await?;
        let rows = if ids.is_empty() {
            workflow.export_all(options).await
        } else {
            workflow.export(&ids, options).await
        }
        .map_err(workflow_failure);
        workflow.repository().pool().close().await;
        rows
    });

    match result {
        Ok(rows) => CommandResult::success_with_data(
            "export",
            format!("exported {} chain step(s)", rows.len()),
            &ExportOutput::from_rows(&rows),
        ),
        Err(failure) => CommandResult::from_failure("export", failure),
    }
}
