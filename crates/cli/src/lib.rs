pub mod commands;
pub mod notifier;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use commands::amend::AmendArgs;
use commands::decide::DecideArgs;
use commands::export::ExportArgs;
use commands::inbox::InboxArgs;
use commands::show::ShowArgs;
use commands::submit::SubmitArgs;

#[derive(Debug, Parser)]
#[command(
    name = "hrflow",
    about = "hrflow operator CLI",
    long_about = "Submit and decide leave and review requests, inspect approval chains, and operate the hrflow database.",
    after_help = "Examples:\n  hrflow submit --category leave.medical --subject E-1002 --level department --start 2026-03-09 --end 2026-03-13\n  hrflow decide REQ-DEMO-MEDICAL --role president --name \"Prof. Imran Hakim\" --decision approve --paid 3 --unpaid 2\n  hrflow amend REQ-DEMO-MEDICAL --attachment doc://medical/E-1002/fitness-note.pdf\n  hrflow inbox --role hod\n  hrflow doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Open a new leave or review request and route it to its first approver")]
    Submit(SubmitArgs),
    #[command(about = "Record an approver's decision on the request's pending step")]
    Decide(DecideArgs),
    #[command(about = "Change dates before any decision or add supporting documents")]
    Amend(AmendArgs),
    #[command(about = "Show a request with its approval history and next approver")]
    Show(ShowArgs),
    #[command(about = "List open requests waiting on a role, oldest first")]
    Inbox(InboxArgs),
    #[command(about = "Export approval chains as tabular audit rows")]
    Export(ExportArgs),
    #[command(about = "Count requests by status, category and awaiting role")]
    Summary,
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic demo requests (idempotent)")]
    Seed,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, DB connectivity and schema readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Submit(args) => commands::submit::run(args),
        Command::Decide(args) => commands::decide::run(args),
        Command::Amend(args) => commands::amend::run(args),
        Command::Show(args) => commands::show::run(args),
        Command::Inbox(args) => commands::inbox::run(args),
        Command::Export(args) => commands::export::run(args),
        Command::Summary => commands::summary::run(),
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
