use clap::Parser;
use context_foundry::cli::{Cli, run};
use foundry_utils::{exit_codes, logging};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init_tracing(cli.verbose) {
        eprintln!("failed to initialize logging: {e}");
    }

    let code = tokio::select! {
        result = run(cli) => match result {
            Ok(code) => code,
            Err(e) => {
                eprintln!("error: {e:#}");
                match e.downcast_ref::<foundry_utils::error::ConfigIssue>() {
                    Some(_) => exit_codes::CONFIG_ERROR,
                    None => exit_codes::FAILURE,
                }
            }
        },
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\ninterrupted");
            exit_codes::INTERRUPTED
        }
    };

    std::process::exit(code);
}
