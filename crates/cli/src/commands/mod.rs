pub mod amend;
pub mod config;
pub mod decide;
pub mod doctor;
pub mod export;
pub mod inbox;
pub mod migrate;
pub mod seed;
pub mod show;
pub mod submit;
pub mod summary;

use hrflow_core::config::{AppConfig, LoadOptions};
use hrflow_core::errors::{DecisionError, DomainError};
use hrflow_db::{
    connect_with_config, migrations, PersistentWorkflow, RepositoryError, SqlRequestRepository,
    WorkflowError,
};
use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Runtime;

use crate::notifier::CliNotifier;

pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_RUNTIME: u8 = 3;
pub const EXIT_DATABASE: u8 = 4;
pub const EXIT_MIGRATION: u8 = 5;
pub const EXIT_POLICY: u8 = 6;
pub const EXIT_NOT_FOUND: u8 = 7;
pub const EXIT_INVALID_ARGUMENT: u8 = 8;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

/// `(error_class, message, exit_code)` carried out of an async block.
pub(crate) type Failure = (&'static str, String, u8);

pub(crate) type CliWorkflow = PersistentWorkflow<SqlRequestRepository, CliNotifier>;

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data: None,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn success_with_data(
        command: &str,
        message: impl Into<String>,
        data: &impl Serialize,
    ) -> Self {
        let data = match serde_json::to_value(data) {
            Ok(data) => data,
            Err(error) => {
                return Self::failure(
                    command,
                    "serialization",
                    format!("could not render command output: {error}"),
                    EXIT_RUNTIME,
                );
            }
        };
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data: Some(data),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    pub(crate) fn from_failure(command: &str, (error_class, message, exit_code): Failure) -> Self {
        Self::failure(command, error_class, message, exit_code)
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Loads configuration and builds the single-threaded runtime every
/// database-backed command runs on.
pub(crate) fn prepare(command: &str) -> Result<(AppConfig, Runtime), CommandResult> {
    let config = AppConfig::load(LoadOptions::default()).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            EXIT_CONFIG,
        )
    })?;

    let runtime =
        tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
            CommandResult::failure(
                command,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                EXIT_RUNTIME,
            )
        })?;

    Ok((config, runtime))
}

/// Connects, brings the schema up to date and wires the workflow to the
/// configured notification sink.
pub(crate) async fn open_workflow(config: &AppConfig) -> Result<CliWorkflow, Failure> {
    let pool = connect_with_config(&config.database)
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), EXIT_DATABASE))?;
    migrations::run_pending(&pool)
        .await
        .map_err(|error| ("migration", error.to_string(), EXIT_MIGRATION))?;

    Ok(PersistentWorkflow::new(
        SqlRequestRepository::new(pool),
        CliNotifier::from_config(&config.notifications),
    ))
}

pub(crate) fn workflow_failure(error: WorkflowError) -> Failure {
    let exit_code = match &error {
        _ if error.is_not_found() => EXIT_NOT_FOUND,
        WorkflowError::Repository(RepositoryError::Duplicate(_)) => EXIT_INVALID_ARGUMENT,
        WorkflowError::Repository(_) => EXIT_DATABASE,
        WorkflowError::Decision(DecisionError::Store(_)) => EXIT_DATABASE,
        WorkflowError::Decision(DecisionError::Domain(DomainError::Routing(_))) => EXIT_DATABASE,
        WorkflowError::Decision(DecisionError::Domain(
            DomainError::InvalidSpan { .. }
            | DomainError::NegativeSpanUnits(_)
            | DomainError::UnknownValue { .. },
        )) => EXIT_INVALID_ARGUMENT,
        WorkflowError::Decision(_) | WorkflowError::Contention { .. } => EXIT_POLICY,
    };
    let message = match &error {
        WorkflowError::Decision(decision) => format!("{error} ({})", decision.user_message()),
        _ => error.to_string(),
    };
    (error.error_class(), message, exit_code)
}

pub(crate) fn invalid_argument(message: impl Into<String>) -> Failure {
    ("invalid_argument", message.into(), EXIT_INVALID_ARGUMENT)
}

#[cfg(test)]
mod tests {
    use hrflow_core::domain::request::RequestId;
    use hrflow_core::errors::{DecisionError, DomainError};
    use hrflow_core::flows::RoutingError;
    use hrflow_core::store::StoreError;
    use hrflow_db::{RepositoryError, WorkflowError};

    use super::{
        workflow_failure, EXIT_DATABASE, EXIT_INVALID_ARGUMENT, EXIT_NOT_FOUND, EXIT_POLICY,
    };

    fn id() -> RequestId {
        RequestId("REQ-X".to_string())
    }

    #[test]
    fn duplicate_submission_is_an_argument_error() {
        let (class, _, code) =
            workflow_failure(WorkflowError::Repository(RepositoryError::Duplicate(id())));
        assert_eq!(class, "duplicate_request");
        assert_eq!(code, EXIT_INVALID_ARGUMENT);
    }

    #[test]
    fn store_faults_and_corrupt_chains_are_database_failures() {
        let store = workflow_failure(WorkflowError::Decision(DecisionError::Store(
            StoreError::Backend("disk full".to_string()),
        )));
        assert_eq!(store.2, EXIT_DATABASE);

        let corrupt = workflow_failure(WorkflowError::Decision(DecisionError::from(
            RoutingError::Unscheduled,
        )));
        assert_eq!(corrupt.0, "domain_invariant");
        assert_eq!(corrupt.2, EXIT_DATABASE);
    }

    #[test]
    fn policy_rejections_and_bad_input_keep_their_codes() {
        let terminal = workflow_failure(WorkflowError::Decision(DecisionError::TerminalRequest {
            request_id: id(),
            status: hrflow_core::RequestStatus::Approved,
        }));
        assert_eq!(terminal.2, EXIT_POLICY);

        let span = workflow_failure(WorkflowError::Decision(DecisionError::Domain(
            DomainError::NegativeSpanUnits(-1),
        )));
        assert_eq!(span.2, EXIT_INVALID_ARGUMENT);

        let missing = workflow_failure(WorkflowError::Repository(RepositoryError::NotFound(id())));
        assert_eq!(missing.2, EXIT_NOT_FOUND);
    }
}
