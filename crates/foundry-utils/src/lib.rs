//! Shared foundation for context-foundry crates
//!
//! This crate holds the types, error hierarchy, and filesystem primitives
//! that every other crate in the workspace builds on. It deliberately has no
//! knowledge of providers, phases, or orchestration.

pub mod atomic_write;
pub mod canonical;
pub mod error;
pub mod exit_codes;
pub mod logging;
pub mod paths;
pub mod types;

pub use error::{
    ArtifactError, CacheError, ConfigIssue, FoundryError, ParseWarning, ProviderError,
};
pub use types::*;
