pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "smartscoop",
    about = "SmartScoop shopping assistant operator CLI",
    long_about = "Operate the SmartScoop shopping assistant: migrations, readiness checks, \
        config inspection, table export, seasonal checks, and one-shot questions.",
    after_help = concat!(
        "Examples:\n",
        "  smartscoop doctor --json\n",
        "  smartscoop export --table users --output users.csv\n",
        "  smartscoop seasonal --product-id B0TEST --price 199.99\n",
        "  smartscoop ask --user-id user123 --message \"laptop under $1000\""
    )
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Validate config, catalog readiness, and DB connectivity checks")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Export a managed table (users, price_alerts) to a CSV file")]
    Export {
        #[arg(long)]
        table: String,
        #[arg(long)]
        output: PathBuf,
    },
    #[command(about = "Report whether to wait for an upcoming seasonal sale")]
    Seasonal {
        #[arg(long)]
        product_id: String,
        #[arg(long)]
        price: String,
        #[arg(long, help = "Evaluate at this instant (RFC 3339 or YYYY-MM-DD)")]
        at: Option<String>,
    },
    #[command(about = "Send one message to the shopping assistant")]
    Ask {
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        message: String,
    },
}

/// Diagnostics go to stderr so stdout stays a single JSON payload.
fn init_logging() {
    let filter =
        EnvFilter::try_from_env("SMARTSCOOP_CLI_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Export { table, output } => commands::export::run(&table, &output),
        Command::Seasonal { product_id, price, at } => {
            commands::seasonal::run(&product_id, &price, at.as_deref())
        }
        Command::Ask { user_id, message } => commands::ask::run(&user_id, &message),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
