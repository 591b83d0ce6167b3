//! Global runtime configuration.
//!
//! [`MonitorConfig`] is a read-only snapshot shared by the supervisor and
//! every channel monitor it creates: where recordings land, how often to
//! probe, which helper binary to invoke, and the timing windows of the stop
//! and shutdown paths.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use streamvisor::MonitorConfig;
//!
//! let mut cfg = MonitorConfig::default();
//! cfg.output_directory = "/srv/recordings".into();
//! cfg.helper_path = "/usr/bin/streamlink".into();
//! cfg.record_high_fps = true;
//!
//! assert_eq!(cfg.check_interval, Duration::from_secs(30));
//! ```

use std::path::PathBuf;
use std::time::Duration;

/// Probes may not run more often than this; persisted settings below the
/// floor are clamped by [`MonitorConfig::with_check_interval_secs`].
pub const MIN_CHECK_INTERVAL: Duration = Duration::from_secs(10);

/// Global configuration for the supervisor and its channel monitors.
///
/// Controls output layout, probe cadence, quality preferences, and the
/// grace windows applied while stopping recorder processes.
#[derive(Clone, Debug)]
pub struct MonitorConfig {
    /// Base directory recordings are written under. Each channel gets its
    /// own subdirectory named after the sanitized channel name.
    pub output_directory: PathBuf,
    /// Path to the stream-capture helper executable.
    pub helper_path: PathBuf,
    /// Seconds between liveness probes while a channel is not recording.
    pub check_interval: Duration,
    /// Wake cadence of a monitor while its recorder is running.
    pub recording_wake_interval: Duration,
    /// Prefer 60/50 fps variants when building the quality chain.
    pub record_high_fps: bool,
    /// Window granted to a recorder between graceful termination and the
    /// forced kill of its process tree.
    pub kill_grace: Duration,
    /// Maximum time the supervisor waits for a monitor to go quiescent
    /// before force-killing its recorder tree.
    pub shutdown_grace: Duration,
    /// Capacity of the event bus channel.
    pub bus_capacity: usize,
}

impl Default for MonitorConfig {
    /// Provides a default configuration:
    /// - `output_directory = "recordings"`
    /// - `helper_path = "streamlink"` (resolved via `PATH`)
    /// - `check_interval = 30s`
    /// - `recording_wake_interval = 30s`
    /// - `record_high_fps = false`
    /// - `kill_grace = 2s`
    /// - `shutdown_grace = 5s`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            output_directory: PathBuf::from("recordings"),
            helper_path: PathBuf::from("streamlink"),
            check_interval: Duration::from_secs(30),
            recording_wake_interval: Duration::from_secs(30),
            record_high_fps: false,
            kill_grace: Duration::from_secs(2),
            shutdown_grace: Duration::from_secs(5),
            bus_capacity: 1024,
        }
    }
}

impl MonitorConfig {
    /// Sets the probe interval from persisted settings, clamping to the
    /// [`MIN_CHECK_INTERVAL`] floor.
    pub fn with_check_interval_secs(mut self, secs: u64) -> Self {
        self.check_interval = Duration::from_secs(secs).max(MIN_CHECK_INTERVAL);
        self
    }
}
