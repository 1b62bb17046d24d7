use std::env;
use std::sync::{Mutex, OnceLock};

use hrflow_cli::commands::amend::AmendArgs;
use hrflow_cli::commands::decide::DecideArgs;
use hrflow_cli::commands::export::ExportArgs;
use hrflow_cli::commands::inbox::InboxArgs;
use hrflow_cli::commands::show::ShowArgs;
use hrflow_cli::commands::submit::SubmitArgs;
use hrflow_cli::commands::{amend, decide, export, inbox, migrate, seed, show, submit, summary};
use serde_json::Value;

#[test]
fn migrate_returns_success_with_valid_env() {
    with_database(|| {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_for_non_sqlite_url() {
    with_env(&[("HRFLOW_DATABASE_URL", "postgres://localhost/hr")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    with_database(|| {
        let first = seed::run();
        assert_eq!(first.exit_code, 0, "expected first seed invocation success");
        let first_message = parse_payload(&first.output)["message"].as_str().unwrap_or("").to_string();
        assert!(first_message.contains("REQ-DEMO-MEDICAL: Medical leave waiting"));
        assert!(first_message.contains("(inserted)"));

        let second = seed::run();
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");
        let second_message = parse_payload(&second.output)["message"].as_str().unwrap_or("").to_string();
        assert!(second_message.contains("(already present)"));
        assert!(!second_message.contains("(inserted)"));

        let totals = parse_payload(&summary::run().output);
        assert_eq!(totals["data"]["total"], 5);
    });
}

#[test]
fn submitted_leave_is_decided_once_and_then_closed() {
    with_database(|| {
        let submitted = submit::run(submit_args("REQ-CLI-100"));
        assert_eq!(submitted.exit_code, 0, "{}", submitted.output);
        let payload = parse_payload(&submitted.output);
        assert_eq!(payload["data"]["next_role"], "hod");
        assert_eq!(payload["data"]["record"]["span"]["total_units"], 3);

        let approved = decide::run(decide_args("REQ-CLI-100", "hod", "approve"));
        assert_eq!(approved.exit_code, 0, "{}", approved.output);
        let payload = parse_payload(&approved.output);
        assert_eq!(payload["data"]["record"]["status"], "approved");
        assert_eq!(payload["data"]["next_role"], Value::Null);

        let again = decide::run(decide_args("REQ-CLI-100", "hod", "reject"));
        assert_eq!(again.exit_code, 6);
        assert_eq!(parse_payload(&again.output)["error_class"], "terminal_request");

        let shown = show::run(ShowArgs { request_id: "REQ-CLI-100".to_string() });
        assert_eq!(shown.exit_code, 0);
        let payload = parse_payload(&shown.output);
        assert_eq!(payload["data"]["record"]["status"], "approved");
        assert_eq!(payload["data"]["history"][0]["status"], "approved");
        assert_eq!(payload["data"]["history"][0]["by"], "Dr. Amina Qureshi");
    });
}

#[test]
fn out_of_order_and_unknown_requests_map_to_distinct_exit_codes() {
    with_database(|| {
        assert_eq!(submit::run(submit_args("REQ-CLI-200")).exit_code, 0);

        let out_of_order = decide::run(decide_args("REQ-CLI-200", "vc", "approve"));
        assert_eq!(out_of_order.exit_code, 6);
        assert_eq!(parse_payload(&out_of_order.output)["error_class"], "out_of_order_actor");

        let missing = decide::run(decide_args("REQ-CLI-MISSING", "hod", "approve"));
        assert_eq!(missing.exit_code, 7);
        assert_eq!(parse_payload(&missing.output)["error_class"], "not_found");

        let invalid = submit::run(SubmitArgs { level: "campus".to_string(), ..submit_args("REQ-CLI-201") });
        assert_eq!(invalid.exit_code, 8);
        assert_eq!(parse_payload(&invalid.output)["error_class"], "invalid_argument");
    });
}

#[test]
fn resubmitting_an_existing_id_is_an_argument_error() {
    with_database(|| {
        assert_eq!(submit::run(submit_args("REQ-CLI-300")).exit_code, 0);

        let duplicate = submit::run(submit_args("REQ-CLI-300"));
        assert_eq!(duplicate.exit_code, 8, "{}", duplicate.output);
        let payload = parse_payload(&duplicate.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "duplicate_request");

        let shown = show::run(ShowArgs { request_id: "REQ-CLI-300".to_string() });
        assert_eq!(parse_payload(&shown.output)["data"]["record"]["revision"], 0);
    });
}

#[test]
fn amend_changes_dates_until_the_first_decision() {
    with_database(|| {
        assert_eq!(submit::run(submit_args("REQ-CLI-400")).exit_code, 0);

        let amended = amend::run(AmendArgs {
            request_id: "REQ-CLI-400".to_string(),
            start: Some("2026-06-01".to_string()),
            end: Some("2026-06-05".to_string()),
            attachments: vec!["doc://travel/E-4100/invite.pdf".to_string()],
        });
        assert_eq!(amended.exit_code, 0, "{}", amended.output);
        let payload = parse_payload(&amended.output);
        assert_eq!(payload["data"]["record"]["span"]["total_units"], 5);
        assert_eq!(payload["data"]["record"]["revision"], 2);

        assert_eq!(decide::run(decide_args("REQ-CLI-400", "hod", "approve")).exit_code, 0);

        let frozen = amend::run(AmendArgs {
            request_id: "REQ-CLI-400".to_string(),
            start: Some("2026-06-01".to_string()),
            end: Some("2026-06-01".to_string()),
            attachments: Vec::new(),
        });
        assert_eq!(frozen.exit_code, 6);
        assert_eq!(parse_payload(&frozen.output)["error_class"], "record_frozen");
    });
}

#[test]
fn inbox_and_export_read_the_seeded_dataset() {
    with_database(|| {
        assert_eq!(seed::run().exit_code, 0);

        let president = inbox::run(InboxArgs { role: "president".to_string() });
        assert_eq!(president.exit_code, 0);
        let payload = parse_payload(&president.output);
        let awaiting = payload["data"].as_array().cloned().unwrap_or_default();
        assert_eq!(awaiting.len(), 1);
        assert_eq!(awaiting[0]["record"]["id"], "REQ-DEMO-MEDICAL");

        let exported = export::run(ExportArgs {
            request_ids: vec!["REQ-DEMO-FACULTY-REVIEW".to_string()],
            include_pending: true,
        });
        assert_eq!(exported.exit_code, 0);
        let payload = parse_payload(&exported.output);
        assert_eq!(payload["data"]["headers"].as_array().map(Vec::len), Some(15));
        assert_eq!(payload["data"]["rows"].as_array().map(Vec::len), Some(3));

        let unknown = export::run(ExportArgs {
            request_ids: vec!["REQ-NOPE".to_string()],
            include_pending: false,
        });
        assert_eq!(unknown.exit_code, 7);
    });
}

fn submit_args(id: &str) -> SubmitArgs {
    SubmitArgs {
        category: "leave.standard".to_string(),
        subject: "E-4100".to_string(),
        level: "department".to_string(),
        start: "2026-06-01".to_string(),
        end: "2026-06-03".to_string(),
        id: Some(id.to_string()),
        reason: Some("Conference travel".to_string()),
        agenda: None,
        attachments: Vec::new(),
    }
}

fn decide_args(id: &str, role: &str, decision: &str) -> DecideArgs {
    DecideArgs {
        request_id: id.to_string(),
        role: role.to_string(),
        name: "Dr. Amina Qureshi".to_string(),
        decision: decision.to_string(),
        comment: None,
        paid: None,
        unpaid: None,
        meeting_at: None,
        venue: None,
    }
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

/// Runs `test_fn` against a fresh file-backed database; every command in
/// the closure sees the same file.
fn with_database(test_fn: impl FnOnce()) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let url = format!("sqlite://{}", dir.path().join("hrflow.db").display());
    with_env(&[("HRFLOW_DATABASE_URL", url.as_str()), ("HRFLOW_NOTIFICATIONS_ENABLED", "false")], test_fn);
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard = match ENV_LOCK.get_or_init(|| Mutex::new(())).lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };

    let keys = [
        "HRFLOW_DATABASE_URL",
        "HRFLOW_DATABASE_MAX_CONNECTIONS",
        "HRFLOW_DATABASE_TIMEOUT_SECS",
        "HRFLOW_LOGGING_LEVEL",
        "HRFLOW_LOGGING_FORMAT",
        "HRFLOW_LOG_LEVEL",
        "HRFLOW_LOG_FORMAT",
        "HRFLOW_NOTIFICATIONS_ENABLED",
        "HRFLOW_EXPORT_INCLUDE_PENDING",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
