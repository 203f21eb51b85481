use std::path::Path;

use smartscoop_db::{connect_with_settings, export_table_to_path, ExportError, ExportTable};

use crate::commands::{current_thread_runtime, exit, load_config, CommandResult};

/// Writes one managed table to `output` as CSV.
pub fn run(table: &str, output: &Path) -> CommandResult {
    let table = match table.parse::<ExportTable>() {
        Ok(table) => table,
        Err(error) => {
            return CommandResult::failure(
                "export",
                "invalid_table",
                error.to_string(),
                exit::INVALID_INPUT,
            );
        }
    };
    let config = match load_config("export") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match current_thread_runtime("export") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), exit::DATABASE))?;

        let exported = export_table_to_path(&pool, table, output).await;
        pool.close().await;
        exported.map_err(|error| match error {
            ExportError::Io(_) => ("export_write", error.to_string(), exit::IO),
            other => ("export_query", other.to_string(), exit::DATABASE),
        })
    });

    match result {
        Ok(rows) => CommandResult::success(
            "export",
            format!("exported {rows} rows from {} to {}", table.as_str(), output.display()),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("export", error_class, message, exit_code)
        }
    }
}
