//! Shared error taxonomy for lacp-lab operations.
//!
//! Every fallible operation across the harness reports one of these
//! classes. The orchestrator keys its step-boundary policy off the
//! class: connection failures are retryable with backoff, a rejected
//! command is scenario-fatal, and parse failures degrade to warnings
//! only when the offending command was optional.

use std::io;
use thiserror::Error;

/// Result type alias for lacp-lab operations.
pub type LabResult<T> = Result<T, LabError>;

/// Errors that can occur while driving devices and interpreting output.
#[derive(Debug, Error)]
pub enum LabError {
    /// Transport-level failure: the device is unreachable, the session
    /// dropped, or a response did not arrive within the timeout.
    #[error("Connection to '{device}' failed: {message}")]
    Connection {
        /// The device involved.
        device: String,
        /// What went wrong at the transport layer.
        message: String,
    },

    /// The device accepted the session but rejected a specific command
    /// (error banner in the response).
    #[error("Device '{device}' rejected command '{command}': {message}")]
    Command {
        /// The device involved.
        device: String,
        /// The command that was rejected.
        command: String,
        /// The error banner text.
        message: String,
    },

    /// CLI output did not match the expected shape for its command
    /// family. Carries the offending raw line for diagnostics.
    #[error("Unrecognized {family} output: '{line}'")]
    Parse {
        /// The command family being parsed.
        family: String,
        /// The raw line that failed to match.
        line: String,
    },

    /// Underlying IO failure (audit log, scenario file).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Internal error (unexpected state, invalid identifier).
    #[error("Internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

impl LabError {
    /// Creates a connection error.
    pub fn connection(device: impl Into<String>, message: impl Into<String>) -> Self {
        LabError::Connection {
            device: device.into(),
            message: message.into(),
        }
    }

    /// Creates a command-rejected error.
    pub fn command(
        device: impl Into<String>,
        command: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        LabError::Command {
            device: device.into(),
            command: command.into(),
            message: message.into(),
        }
    }

    /// Creates a parse error carrying the offending line.
    pub fn parse(family: impl Into<String>, line: impl Into<String>) -> Self {
        LabError::Parse {
            family: family.into(),
            line: line.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        LabError::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this error indicates a transient transport
    /// condition that may succeed on retry.
    ///
    /// A rejected command is never retryable: replaying a configuration
    /// the device refused cannot succeed without a different input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LabError::Connection { .. } | LabError::Io(_))
    }

    /// Returns true if this is a parse failure.
    pub fn is_parse(&self) -> bool {
        matches!(self, LabError::Parse { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LabError::connection("sw-leaf1", "connect timed out");
        assert_eq!(
            err.to_string(),
            "Connection to 'sw-leaf1' failed: connect timed out"
        );
    }

    #[test]
    fn test_command_error_display() {
        let err = LabError::command("sw-leaf1", "no interface Po1", "% Invalid input");
        assert!(err.to_string().contains("rejected command 'no interface Po1'"));
    }

    #[test]
    fn test_retryability() {
        assert!(LabError::connection("d", "m").is_retryable());
        assert!(!LabError::command("d", "c", "m").is_retryable());
        assert!(!LabError::parse("neighbor-table", "garbage").is_retryable());
        assert!(!LabError::internal("bug").is_retryable());
    }

    #[test]
    fn test_parse_carries_offending_line() {
        let err = LabError::parse("interface-status", "?? bogus ??");
        assert_eq!(
            err.to_string(),
            "Unrecognized interface-status output: '?? bogus ??'"
        );
        assert!(err.is_parse());
    }
}
