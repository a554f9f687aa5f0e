//! Process exit codes for the `foundry` CLI.

use crate::error::FoundryError;

/// Successful completion
pub const SUCCESS: i32 = 0;
/// Generic failure
pub const FAILURE: i32 = 1;
/// Configuration or CLI argument error
pub const CONFIG_ERROR: i32 = 2;
/// User interrupt (SIGINT)
pub const INTERRUPTED: i32 = 130;

/// Map a [`FoundryError`] to the exit code the CLI should terminate with.
#[must_use]
pub fn for_error(err: &FoundryError) -> i32 {
    match err {
        FoundryError::Config(_) => CONFIG_ERROR,
        _ => FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors_map_to_2() {
        let err = FoundryError::Config(crate::error::ConfigIssue::UnknownProvider("nope".into()));
        assert_eq!(for_error(&err), CONFIG_ERROR);
    }

    #[test]
    fn test_other_errors_map_to_1() {
        let err = FoundryError::Checkpoint("missing".into());
        assert_eq!(for_error(&err), FAILURE);
    }
}
