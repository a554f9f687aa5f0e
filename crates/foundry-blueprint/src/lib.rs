//! Blueprint and checkpoint persistence
//!
//! Blueprints are the canonical planning artifacts (`RESEARCH.md`,
//! `SPEC.md`, optional `SPEC.yaml`, `PLAN.md`, `TASKS.md`) under the
//! project's hidden context directory, plus a manifest and per-session
//! history copies. Canonical files are overwritten each successful session;
//! history is append-only.
//!
//! Checkpoints snapshot workflow state per phase so an interrupted session
//! can resume from the last completed phase.

mod checkpoint;
mod store;

pub use checkpoint::{Checkpoint, CheckpointStore};
pub use store::{BlueprintKind, BlueprintStore, Manifest, SessionEntry};
