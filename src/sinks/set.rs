//! Non-blocking fan-out over multiple status sinks.
//!
//! [`SinkSet`] distributes each [`Event`] to every registered sink
//! **without awaiting** its processing.
//!
//! ## Guarantees
//! - `emit(&Event)` returns immediately.
//! - Per-sink FIFO (queue order), so a single monitor's status transitions
//!   reach each sink in control-loop order.
//! - Panics inside sink callbacks are caught and logged (isolation).
//!
//! ## Not guaranteed
//! - No global ordering across different sinks.
//! - No retries on per-sink queue overflow (the event is dropped for that
//!   sink only).
//!
//! ```text
//!    emit(&Event)
//!        │                        (Arc-clone per sink)
//!        ├────────────────► [queue S1] ─► worker S1 ─► callbacks
//!        ├────────────────► [queue S2] ─► worker S2 ─► callbacks
//!        └────────────────► [queue SN] ─► worker SN ─► callbacks
//! ```

use std::sync::Arc;

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::events::{Event, EventKind};

use super::StatusSink;

/// Per-sink channel with metadata.
struct SinkChannel {
    name: &'static str,
    sender: mpsc::Sender<Arc<Event>>,
}

/// Composite fan-out with per-sink bounded queues and worker tasks.
pub struct SinkSet {
    channels: Vec<SinkChannel>,
    workers: Vec<JoinHandle<()>>,
}

impl SinkSet {
    /// Creates a new set and spawns one worker per sink.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn new(sinks: Vec<Arc<dyn StatusSink>>) -> Self {
        let mut channels = Vec::with_capacity(sinks.len());
        let mut workers = Vec::with_capacity(sinks.len());

        for sink in sinks {
            let cap = sink.queue_capacity().max(1);
            let name = sink.name();
            let (tx, mut rx) = mpsc::channel::<Arc<Event>>(cap);
            let s = Arc::clone(&sink);

            let handle = tokio::spawn(async move {
                while let Some(ev) = rx.recv().await {
                    let fut = dispatch(s.as_ref(), ev.as_ref());
                    if let Err(panic_err) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                        eprintln!("[streamvisor] sink '{}' panicked: {:?}", s.name(), panic_err);
                    }
                }
            });

            channels.push(SinkChannel { name, sender: tx });
            workers.push(handle);
        }

        Self { channels, workers }
    }

    /// Fan-out one event to all sinks (non-blocking).
    ///
    /// If a sink's queue is **full** or **closed**, the event is dropped for
    /// it and a warning is printed with the sink's name.
    pub fn emit(&self, event: &Event) {
        if !matches!(event.kind, EventKind::StatusChanged | EventKind::Log) {
            return;
        }
        let ev = Arc::new(event.clone());
        for channel in &self.channels {
            match channel.sender.try_send(Arc::clone(&ev)) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    eprintln!(
                        "[streamvisor] sink '{}' dropped event: queue full",
                        channel.name
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    eprintln!(
                        "[streamvisor] sink '{}' dropped event: worker closed",
                        channel.name
                    );
                }
            }
        }
    }

    /// Graceful shutdown: close all queues and await worker completion.
    pub async fn shutdown(self) {
        drop(self.channels);
        for h in self.workers {
            let _ = h.await;
        }
    }

    /// True if there are no sinks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Number of sinks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }
}

/// Translates a bus event into the matching sink callback.
async fn dispatch(sink: &dyn StatusSink, ev: &Event) {
    match ev.kind {
        EventKind::StatusChanged => {
            if let (Some(channel), Some(status)) = (&ev.channel, ev.status) {
                sink.on_status_changed(channel, status).await;
            }
        }
        EventKind::Log => {
            if let Some(line) = &ev.line {
                sink.on_log_message(line).await;
            }
        }
        _ => {}
    }
}
