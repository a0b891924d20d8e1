//! Unified error type for the syncforge workspace.
//!
//! Every crate funnels its failures into [`Error`]. [`Error::kind`] names the
//! failure category so the controller and the worker protocol can report it
//! without matching on variants.

use std::fmt;
use std::path::{Path, PathBuf};

/// Unified error type covering all failure modes of a pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The two inputs could not be classified into subject and reference roles.
    #[error("Identification error: {0}")]
    Identification(String),

    /// A source that must carry audio has no decodable audio stream.
    #[error("Source {role} has no audio track: {}", path.display())]
    MissingAudioTrack {
        /// Role of the offending source ("A" or "B").
        role: String,
        /// Path of the offending source.
        path: PathBuf,
    },

    /// An external tool exited non-zero, failed to spawn, or timed out.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable description including captured diagnostics.
        message: String,
    },

    /// A tool exited successfully but its declared output does not exist.
    #[error("Tool error [{tool}]: exited successfully but produced no output at {}", path.display())]
    ArtifactMissing {
        /// Name of the tool that was expected to write the file.
        tool: String,
        /// The declared output path.
        path: PathBuf,
    },

    /// The worker protocol was violated or the worker exited unexpectedly.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The worker reported a failure through an `error` message.
    #[error("{message}")]
    Worker {
        /// Message reported by the worker.
        message: String,
        /// Optional diagnostic trace reported by the worker.
        stack: Option<String>,
    },

    /// A caller-supplied request failed precondition checks.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Alignment and durations produced a trim plan with no usable duration.
    #[error("Invalid trim plan: {0}")]
    InvalidTrimPlan(String),

    /// Probe output could not be interpreted.
    #[error("Probe error: {0}")]
    Probe(String),

    /// The configuration file could not be read or parsed.
    #[error("Config error: {0}")]
    Config(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Every name [`Error::kind`] can return for a locally raised error.
const KINDS: &[&str] = &[
    "IdentificationError",
    "MissingAudioTrackError",
    "ExternalToolError",
    "ArtifactMissingError",
    "ProtocolError",
    "ValidationError",
    "InvalidTrimPlanError",
    "ProbeError",
    "ConfigError",
    "IoError",
    "InternalError",
];

/// Kind named by a `"<Kind>: ..."` diagnostic, if it is one we know.
fn kind_prefix(stack: &str) -> Option<&'static str> {
    let (prefix, _) = stack.split_once(':')?;
    KINDS.iter().copied().find(|k| *k == prefix.trim())
}

impl Error {
    /// Stable name of the failure category, used in logs and worker messages.
    ///
    /// A worker failure reports the kind named at the start of its stack,
    /// falling back to `WorkerError`.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Identification(_) => "IdentificationError",
            Error::MissingAudioTrack { .. } => "MissingAudioTrackError",
            Error::Tool { .. } => "ExternalToolError",
            Error::ArtifactMissing { .. } => "ArtifactMissingError",
            Error::Protocol(_) => "ProtocolError",
            Error::Worker { stack, .. } => stack
                .as_deref()
                .and_then(kind_prefix)
                .unwrap_or("WorkerError"),
            Error::Validation(_) => "ValidationError",
            Error::InvalidTrimPlan(_) => "InvalidTrimPlanError",
            Error::Probe(_) => "ProbeError",
            Error::Config(_) => "ConfigError",
            Error::Io { .. } => "IoError",
            Error::Internal(_) => "InternalError",
        }
    }

    /// Diagnostic context for callers: the worker's stack when it sent one,
    /// otherwise the kind and debug rendering of this error.
    pub fn diagnostic(&self) -> String {
        match self {
            Error::Worker {
                stack: Some(stack), ..
            } => stack.clone(),
            _ => format!("{}: {self:?}", self.kind()),
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::ArtifactMissing`].
    pub fn artifact_missing(tool: impl Into<String>, path: &Path) -> Self {
        Error::ArtifactMissing {
            tool: tool.into(),
            path: path.to_path_buf(),
        }
    }

    /// Convenience constructor for [`Error::MissingAudioTrack`].
    pub fn missing_audio(role: impl fmt::Display, path: &Path) -> Self {
        Error::MissingAudioTrack {
            role: role.to_string(),
            path: path.to_path_buf(),
        }
    }

    /// Convenience constructor for [`Error::Worker`].
    pub fn worker(message: impl Into<String>, stack: Option<String>) -> Self {
        Error::Worker {
            message: message.into(),
            stack,
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
