//! CLI error types and exit codes

use catalog_sync::{ConfigError, StoreError, SyncError};
use thiserror::Error;

/// Exit codes for the CLI
/// - 0: Success
/// - 1: General error
/// - 2: Authentication failed
/// - 3: Remote service unreachable or failing
/// - 4: Invalid input
/// - 5: Some items failed to synchronize
/// - 130: Interrupted
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("Local catalog store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("{failed} of {total} items failed to synchronize")]
    ItemsFailed { failed: usize, total: usize },

    #[error("Interrupted")]
    Interrupted,

    #[error("Output error: {0}")]
    Output(#[from] serde_json::Error),
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) | CliError::Output(_) | CliError::Store(_) => 1,
            CliError::Sync(e) => match e {
                SyncError::Auth(_) => 2,
                SyncError::Cancelled => 130,
                SyncError::Config(_) | SyncError::Url(_) => 4,
                SyncError::RemoteRequest {
                    status: Some(401 | 403),
                    ..
                } => 2,
                SyncError::RemoteRequest {
                    status: Some(400..=499),
                    ..
                } => 4,
                SyncError::RemoteRequest { .. }
                | SyncError::Http(_)
                | SyncError::MaxRetriesExceeded { .. }
                | SyncError::Protocol(_)
                | SyncError::Json(_) => 3,
                SyncError::Mapping(_)
                | SyncError::Persistence(_)
                | SyncError::Unlinked { .. } => 1,
            },
            CliError::Validation(_) => 4,
            CliError::ItemsFailed { .. } => 5,
            CliError::Interrupted => 130,
        }
    }

    /// Print the error to stderr
    pub fn print(&self) {
        eprintln!("Error: {self}");
        if let CliError::Sync(SyncError::Auth(_)) = self {
            eprintln!("\nCheck that CATALOG_API_KEY holds a valid key for this sales point.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::from(SyncError::Auth("nope".into())).exit_code(), 2);
        assert_eq!(CliError::from(SyncError::remote(403, "")).exit_code(), 2);
        assert_eq!(CliError::from(SyncError::remote(422, "")).exit_code(), 4);
        assert_eq!(CliError::from(SyncError::remote(502, "")).exit_code(), 3);
        assert_eq!(
            CliError::from(SyncError::MaxRetriesExceeded { attempts: 3 }).exit_code(),
            3
        );
        assert_eq!(CliError::from(SyncError::Cancelled).exit_code(), 130);
        assert_eq!(
            CliError::ItemsFailed {
                failed: 1,
                total: 4
            }
            .exit_code(),
            5
        );
    }

    #[test]
    fn test_items_failed_message() {
        let err = CliError::ItemsFailed {
            failed: 2,
            total: 10,
        };
        assert_eq!(err.to_string(), "2 of 10 items failed to synchronize");
    }
}
