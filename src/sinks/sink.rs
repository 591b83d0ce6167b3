//! Status sink trait — the embedder boundary.
//!
//! A [`StatusSink`] receives the two product-facing callbacks: status
//! transitions per channel, and human-readable log lines. Sinks run in
//! isolation:
//! - **Dedicated worker task** per sink (runs independently).
//! - **Per-sink bounded queue** (capacity via [`StatusSink::queue_capacity`]).
//! - **Panic isolation**: panics are caught in the worker and reported.
//!
//! Callbacks are invoked from the sink's worker task, never from a monitor's
//! control loop. Thread affinity (e.g. marshaling onto a UI thread) is the
//! sink's concern.

use std::sync::Arc;

use async_trait::async_trait;

use crate::channel::{ChannelDescriptor, ChannelStatus};

/// Receiver of status transitions and log lines.
///
/// ### Implementation requirements
/// - Use async I/O; avoid blocking the executor.
/// - Handle errors internally; do not panic.
/// - Slow processing affects only this sink's queue.
#[async_trait]
pub trait StatusSink: Send + Sync + 'static {
    /// Called when a monitor's observable status changes.
    ///
    /// `status` is one of `""`, `"Offline"`, `"Recording"`, `"Error"` in
    /// string form; see [`ChannelStatus::as_str`]. Per channel, calls arrive
    /// in control-loop order.
    async fn on_status_changed(&self, channel: &Arc<ChannelDescriptor>, status: ChannelStatus);

    /// Called for each log line, already prefixed with `[HH:MM:SS] `.
    async fn on_log_message(&self, line: &str);

    /// Sink name used in overflow/panic diagnostics.
    ///
    /// Prefer short, descriptive names (e.g. "ui", "logfile").
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred queue capacity for this sink (clamped to ≥ 1).
    ///
    /// On overflow the event is dropped for this sink only; other sinks are
    /// unaffected.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
