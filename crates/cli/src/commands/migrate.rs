use hrflow_db::{connect_with_config, migrations};

use crate::commands::{prepare, CommandResult, Failure, EXIT_DATABASE, EXIT_MIGRATION};

pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("migrate") {
        Ok(prepared) => prepared,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), EXIT_DATABASE))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), EXIT_MIGRATION))?;
        let pending = migrations::pending_count(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), EXIT_MIGRATION))?;
        pool.close().await;
        Ok::<usize, Failure>(pending)
    });

    match result {
        Ok(0) => CommandResult::success("migrate", "applied pending migrations"),
        Ok(pending) => CommandResult::failure(
            "migrate",
            "migration",
            format!("{pending} migration(s) still pending after run"),
            EXIT_MIGRATION,
        ),
        Err(failure) => CommandResult::from_failure("migrate", failure),
    }
}
