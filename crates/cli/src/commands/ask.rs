use std::sync::Arc;

use smartscoop_agent::ShoppingAssistant;
use smartscoop_db::{connect_with_settings, migrations, SqlUserProfileRepository};

use crate::commands::{current_thread_runtime, exit, load_config, CommandResult};

/// Sends one message through the assistant against the configured database.
pub fn run(user_id: &str, message: &str) -> CommandResult {
    if user_id.trim().is_empty() || message.trim().is_empty() {
        return CommandResult::failure(
            "ask",
            "invalid_input",
            "both --user-id and --message must be non-empty",
            exit::INVALID_INPUT,
        );
    }
    let config = match load_config("ask") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match current_thread_runtime("ask") {
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
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), exit::MIGRATION))?;

        let profiles = Arc::new(SqlUserProfileRepository::new(pool.clone()));
        let reply = match ShoppingAssistant::build(&config, profiles) {
            Ok(assistant) => assistant.handle_message(user_id, message).await,
            Err(error) => Err(error),
        };
        pool.close().await;
        reply.map_err(|error| {
            let class =
                if error.is_configuration() { "agent_configuration" } else { "agent_failure" };
            (class, error.to_string(), exit::AGENT)
        })
    });

    match result {
        Ok(reply) => CommandResult::success("ask", reply),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("ask", error_class, message, exit_code)
        }
    }
}
