//! Command-line interface for the `foundry` binary

mod args;
mod commands;
mod run;

pub use args::{CacheAction, Cli, Command};
pub use run::run;
