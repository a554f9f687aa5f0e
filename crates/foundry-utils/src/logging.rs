//! Tracing initialization
//!
//! Components log through `tracing` with structured fields (`phase`,
//! `provider`, `model`, `task_id`, token counts). The subscriber honors
//! `RUST_LOG`; without it, verbosity falls back to crate-level defaults.

use tracing_subscriber::{EnvFilter, fmt};

/// Initialize the global tracing subscriber.
///
/// # Errors
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(verbose: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            if verbose {
                EnvFilter::try_new("context_foundry=debug,foundry=debug,info")
            } else {
                EnvFilter::try_new("context_foundry=info,foundry=info,warn")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = fmt()
        .with_env_filter(env_filter)
        .with_target(verbose)
        .with_level(true)
        .compact();

    builder.try_init()?;
    Ok(())
}
