//! # Error types used by the supervisor kernel.
//!
//! [`KernelError`] is the single result-style error carrier for the whole
//! kernel. Control-surface operations return the kind verbatim to the
//! caller; operations inside the supervisor loop convert errors into state
//! transitions and log entries instead of aborting the loop.

use std::time::Duration;

use thiserror::Error;

/// Errors produced by the supervisor kernel.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum KernelError {
    /// A caller violated a contract (empty name, bad format, out-of-range value).
    #[error("invalid argument: {reason}")]
    InvalidArg {
        /// What was wrong with the argument.
        reason: String,
    },

    /// The named tool is not registered.
    #[error("tool '{name}' not found")]
    NotFound {
        /// The missing tool name.
        name: String,
    },

    /// Attempted to register a tool under a name that is already taken.
    #[error("tool '{name}' already registered")]
    AlreadyExists {
        /// The duplicate tool name.
        name: String,
    },

    /// The registry has reached its configured tool limit.
    #[error("registry full ({max} tools)")]
    RegistryFull {
        /// Configured maximum number of tools.
        max: usize,
    },

    /// The platform refused to create the child process.
    #[error("failed to spawn child: {reason}")]
    SpawnFailed {
        /// Platform error text.
        reason: String,
    },

    /// The platform refused to set up the child's pipes.
    #[error("failed to set up child pipes: {reason}")]
    PipeFailed {
        /// Platform error text.
        reason: String,
    },

    /// The bus or an inbox rejected a message under a no-overflow policy.
    #[error("queue full")]
    QueueFull,

    /// A bounded wait did not complete within its window.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The window that elapsed.
        timeout: Duration,
    },

    /// An event line from a child was malformed.
    #[error("malformed event line: {reason}")]
    ParseFailed {
        /// Why the line did not parse.
        reason: String,
    },

    /// A pipe operation failed in a way not explained by would-block or
    /// pipe-closed.
    #[error("pipe I/O failed: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// The configuration file could not be loaded or did not validate.
    /// Fatal at initialization.
    #[error("configuration error: {reason}")]
    Config {
        /// What failed to parse or validate.
        reason: String,
    },
}

impl KernelError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            KernelError::InvalidArg { .. } => "invalid_arg",
            KernelError::NotFound { .. } => "not_found",
            KernelError::AlreadyExists { .. } => "already_exists",
            KernelError::RegistryFull { .. } => "registry_full",
            KernelError::SpawnFailed { .. } => "spawn_failed",
            KernelError::PipeFailed { .. } => "pipe_failed",
            KernelError::QueueFull => "queue_full",
            KernelError::Timeout { .. } => "timeout",
            KernelError::ParseFailed { .. } => "parse_failed",
            KernelError::Io { .. } => "io",
            KernelError::Config { .. } => "config",
        }
    }

    /// True for errors that leave the tool in a state where a later `start`
    /// may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            KernelError::SpawnFailed { .. }
                | KernelError::PipeFailed { .. }
                | KernelError::QueueFull
                | KernelError::Timeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        let err = KernelError::NotFound {
            name: "x".to_string(),
        };
        assert_eq!(err.as_label(), "not_found");
        assert_eq!(KernelError::QueueFull.as_label(), "queue_full");
    }

    #[test]
    fn spawn_failures_are_retryable() {
        let err = KernelError::SpawnFailed {
            reason: "no such file".to_string(),
        };
        assert!(err.is_retryable());
        let err = KernelError::ParseFailed {
            reason: "missing separator".to_string(),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn messages_name_the_tool() {
        let err = KernelError::AlreadyExists {
            name: "probe".to_string(),
        };
        assert_eq!(err.to_string(), "tool 'probe' already registered");
    }
}
