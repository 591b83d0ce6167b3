//! Error types used by the streamvisor runtime and channel monitors.
//!
//! This module defines two error enums:
//!
//! - [`RuntimeError`] — errors raised by the supervisor itself.
//! - [`MonitorError`] — errors raised inside a single channel monitor.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging.
//! Monitor errors are never fatal to the supervisor: a failing probe or
//! recorder launch is logged through the status sink and the monitor keeps
//! probing on its normal cadence.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors produced by the supervisor.
///
/// These represent failures of the orchestration layer itself, such as a
/// shutdown sequence exceeding its grace period.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; some monitors had their recorder
    /// trees force-killed before they went quiescent.
    #[error("shutdown grace {grace:?} exceeded; stuck: {stuck:?}; recorder trees were force-killed")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Channel keys whose monitors did not stop in time.
        stuck: Vec<String>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::GraceExceeded { grace, stuck } => {
                format!("grace exceeded after {grace:?}; stuck monitors={stuck:?}")
            }
        }
    }
}

/// Errors produced inside a channel monitor.
///
/// These cover the helper-process boundary: spawning the helper for a probe
/// or a recording, creating the per-channel directory, and tearing down a
/// recorder process tree.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum MonitorError {
    /// The helper executable could not be spawned or awaited.
    #[error("helper invocation failed ({helper:?}): {source}")]
    HelperInvocation {
        /// Path of the helper that failed.
        helper: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The per-channel output directory could not be created.
    #[error("failed to create channel directory {path:?}: {source}")]
    DirectoryCreate {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Enumerating the descendants of a recorder process failed.
    ///
    /// The stop path falls back to a forced kill of the root process when
    /// this happens.
    #[error("failed to enumerate process tree of pid {pid}: {message}")]
    ProcessEnumeration {
        /// Root pid whose tree could not be walked.
        pid: u32,
        /// Platform-specific failure detail.
        message: String,
    },
}

impl MonitorError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            MonitorError::HelperInvocation { .. } => "helper_invocation",
            MonitorError::DirectoryCreate { .. } => "directory_create",
            MonitorError::ProcessEnumeration { .. } => "process_enumeration",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        self.to_string()
    }
}
