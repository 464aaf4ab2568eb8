//! Error types for harness_core operations.

use crate::types::ArtifactKind;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// How a failed operation was classified by the retry layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FailureClass {
    /// Network or timeout class failure; another attempt may succeed.
    Retryable,
    /// The remote system rejected the operation; retrying cannot help.
    Fatal,
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Retryable => write!(f, "retryable"),
            Self::Fatal => write!(f, "fatal"),
        }
    }
}

/// Core error type for harness_core operations.
#[derive(Error, Debug)]
pub enum HarnessError {
    /// No artifact with the given name exists for this kind.
    #[error("{kind} artifact not found: {name}")]
    ArtifactNotFound {
        /// Kind that was looked up
        kind: ArtifactKind,
        /// Name that was looked up
        name: String,
    },

    /// The stored artifact has a different kind than the caller asserted.
    #[error("artifact {name} is a {found}, expected a {expected}")]
    ArtifactKindMismatch {
        /// Artifact name
        name: String,
        /// Kind the caller asked for
        expected: ArtifactKind,
        /// Kind actually stored
        found: ArtifactKind,
    },

    /// A breadcrumb exists but holds a different value type.
    #[error("breadcrumb {name} holds {found}, expected {expected}")]
    BreadcrumbTypeMismatch {
        /// Breadcrumb name
        name: String,
        /// Requested type
        expected: &'static str,
        /// Stored type
        found: &'static str,
    },

    /// Role was not registered when the session was loaded.
    #[error("unknown role: {0}")]
    UnknownRole(String),

    /// The network provider could not answer.
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    /// An operation failed after the retry layer gave up.
    #[error("operation failed ({class}) after {attempts} attempt(s): {last_error}")]
    OperationFailed {
        /// Classification of the last failure
        class: FailureClass,
        /// Attempts consumed
        attempts: u32,
        /// Message of the last failure
        last_error: String,
    },

    /// A step ran past its own timeout.
    #[error("step {step} timed out after {timeout_ms}ms")]
    StepTimedOut {
        /// Step name
        step: String,
        /// Timeout in milliseconds
        timeout_ms: u64,
    },

    /// Invalid session state transition.
    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        /// Source state
        from: String,
        /// Target state or attempted operation
        to: String,
    },

    /// The report sink could not be written.
    #[error("report unwritable at {}: {}", path.display(), reason)]
    ReportUnwritable {
        /// Destination of the report
        path: PathBuf,
        /// Underlying failure
        reason: String,
    },

    /// Run directory is locked by another live process.
    #[error("run directory locked by another process (PID: {pid})")]
    RunDirLocked {
        /// Process ID holding the lock
        pid: u32,
    },

    /// Run directory lock could not be acquired.
    #[error("run directory locked")]
    RunDirBusy,

    /// The session store does not match the expected schema.
    #[error("session store corrupted: {0}")]
    StoreCorrupted(String),

    /// Error reported by the embedded database.
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization error while persisting a value.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error while reading a value.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Configuration error (loading, parsing, invalid values).
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Address text could not be parsed.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarnessError {
    /// Returns a user-friendly recovery suggestion for the error, if available.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            Self::ArtifactNotFound { .. } => {
                Some("An earlier step that produces this artifact did not run in this run directory.")
            }
            Self::UnknownRole(_) => Some("Declare the role under [[users]] in session.toml."),
            Self::NetworkUnreachable(_) => Some("Check the gateway for the selected network."),
            Self::RunDirLocked { .. } | Self::RunDirBusy => {
                Some("Wait for the other run to finish, or remove LOCK if that process is dead.")
            }
            Self::StoreCorrupted(_) => {
                Some("Run 'harness clear' to reset the run directory, then start from the first step.")
            }
            Self::InvalidStateTransition { .. } => {
                Some("Session hooks were called out of order (load, steps, report, destroy).")
            }
            _ => None,
        }
    }

    /// Returns true for failures the retry layer may try again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::OperationFailed {
                class: FailureClass::Retryable,
                ..
            }
        )
    }
}

/// Maps an embedded database error into [`HarnessError::Storage`] with context.
pub(crate) fn storage<E: fmt::Display>(context: &'static str) -> impl FnOnce(E) -> HarnessError {
    move |e| HarnessError::Storage(format!("{}: {}", context, e))
}

/// Convenience Result type for harness_core operations.
pub type Result<T> = std::result::Result<T, HarnessError>;
