//! Runtime events emitted by the supervisor and channel monitors.
//!
//! [`EventKind`] classifies events across three categories:
//! - **Sink-facing events**: status transitions and product log lines, the
//!   only kinds the status sink ever observes.
//! - **Lifecycle events**: monitor and recorder milestones, useful for tests
//!   and custom bus consumers.
//! - **Shutdown events**: supervisor-wide teardown progress.
//!
//! Each event carries a globally unique, monotonically increasing sequence
//! number (`seq`). For a single monitor, the `seq` order of its events is
//! the order prescribed by the control loop, even when delivery to sinks is
//! asynchronous.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::SystemTime;

use crate::channel::{ChannelDescriptor, ChannelStatus};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Sink-facing events ===
    /// A monitor's observable status changed.
    ///
    /// Sets: `channel`, `status`, `at`, `seq`.
    StatusChanged,

    /// Human-readable log line, already prefixed with `[HH:MM:SS] `.
    ///
    /// Sets: `line`, `at`, `seq` (and `channel` when monitor-scoped).
    Log,

    // === Monitor lifecycle events ===
    /// A monitor entered its control loop.
    ///
    /// Sets: `channel`, `at`, `seq`.
    MonitorStarted,

    /// A monitor left its control loop; its recorder tree is dead.
    ///
    /// Sets: `channel`, `at`, `seq`.
    MonitorStopped,

    /// A recorder process was launched for a live channel.
    ///
    /// Sets: `channel`, `at`, `seq`.
    RecordingStarted,

    /// A recorder process exited or was terminated.
    ///
    /// Sets: `channel`, `at`, `seq`.
    RecordingFinished,

    // === Shutdown events ===
    /// Supervisor shutdown was initiated.
    ///
    /// Sets: `at`, `seq`.
    ShutdownRequested,

    /// All monitors went quiescent within the shutdown grace.
    ///
    /// Sets: `at`, `seq`.
    AllStoppedWithin,

    /// A monitor outlived the shutdown grace and had its recorder tree
    /// force-killed.
    ///
    /// Sets: `channel`, `at`, `seq`.
    GraceExceeded,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp
/// - other fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Descriptor of the channel this event concerns, if any.
    pub channel: Option<Arc<ChannelDescriptor>>,
    /// New observable status, for [`EventKind::StatusChanged`].
    pub status: Option<ChannelStatus>,
    /// Formatted log line, for [`EventKind::Log`].
    pub line: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with the current timestamp and
    /// the next global sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            channel: None,
            status: None,
            line: None,
        }
    }

    /// Attaches the channel descriptor this event concerns.
    #[inline]
    pub fn with_channel(mut self, channel: Arc<ChannelDescriptor>) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Attaches the new observable status.
    #[inline]
    pub fn with_status(mut self, status: ChannelStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Attaches a formatted log line.
    #[inline]
    pub fn with_line(mut self, line: impl Into<Arc<str>>) -> Self {
        self.line = Some(line.into());
        self
    }

    /// Channel key of the attached descriptor, if any.
    pub fn channel_key(&self) -> Option<String> {
        self.channel.as_ref().map(|c| c.key())
    }
}
