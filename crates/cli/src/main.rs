use std::process::ExitCode;

fn main() -> ExitCode {
    smartscoop_cli::run()
}
