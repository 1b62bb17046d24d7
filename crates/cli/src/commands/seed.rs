use hrflow_db::{DemoDataset, SeedInfo};

use crate::commands::{open_workflow, prepare, CommandResult, EXIT_DATABASE, EXIT_POLICY};

pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("seed") {
        Ok(prepared) => prepared,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let workflow = open_workflow(&config).await?;
        let repository = workflow.repository();

        let seeded = DemoDataset::load(repository)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), EXIT_DATABASE));
        let verified = match seeded {
            Ok(seeded) => DemoDataset::verify(repository)
                .await
                .map_err(|error| ("seed_verification", error.to_string(), EXIT_DATABASE))
                .and_then(|verification| {
                    if verification.all_present {
                        Ok(seeded.requests_seeded)
                    } else {
                        let message = failed_checks_message(&verification.checks);
                        Err(("seed_verification", message, EXIT_POLICY))
                    }
                }),
            Err(failure) => Err(failure),
        };

        repository.pool().close().await;
        verified
    });

    match result {
        Ok(seeded) => CommandResult::success("seed", seed_message(&seeded)),
        Err(failure) => CommandResult::from_failure("seed", failure),
    }
}

fn seed_message(seeded: &[SeedInfo]) -> String {
    let lines: Vec<String> = seeded
        .iter()
        .map(|info| {
            let state = if info.inserted { "inserted" } else { "already present" };
            format!("  - {}: {} ({state})", info.request_id, info.description)
        })
        .collect();
    format!("demo dataset ready with {} request(s):\n{}", seeded.len(), lines.join("\n"))
}

fn failed_checks_message(checks: &[(&'static str, bool)]) -> String {
    let failed_checks = checks
        .iter()
        .filter_map(|(check, passed)| (!passed).then_some(*check))
        .collect::<Vec<_>>();
    if failed_checks.is_empty() {
        "some demo requests failed to load".to_string()
    } else {
        format!("demo requests in an unexpected state: {}", failed_checks.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::failed_checks_message;

    #[test]
    fn verification_error_message_targets_failed_checks() {
        let checks = [
            ("REQ-DEMO-STANDARD", true),
            ("REQ-DEMO-MEDICAL", false),
            ("REQ-DEMO-HOD-REVIEW", false),
        ];

        assert_eq!(
            failed_checks_message(&checks),
            "demo requests in an unexpected state: REQ-DEMO-MEDICAL, REQ-DEMO-HOD-REVIEW"
        );
    }

    #[test]
    fn verification_error_message_falls_back_to_generic_when_no_labels() {
        let checks = [("REQ-DEMO-STANDARD", true)];
        assert_eq!(failed_checks_message(&checks), "some demo requests failed to load");
    }
}
