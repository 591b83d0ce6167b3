//! Supervisor: registry and lifecycle owner of all channel monitors.
//!
//! The [`Supervisor`] owns the event bus, a [`SinkSet`], and the global
//! [`MonitorConfig`] snapshot. It materializes one [`ChannelMonitor`] per
//! started channel, each on its own tokio task, and guarantees that
//! [`Supervisor::shutdown`] does not return until every monitor's recorder
//! process tree is dead.
//!
//! ## High-level architecture
//! ```text
//! Inputs:
//!   Arc<ChannelDescriptor> ──► Supervisor::start / start_all_active
//!
//! Registry:
//!   "{platform}:{name}" ──► Handle { monitor, cancel token, join handle }
//!   (duplicate keys are rejected with a log line, never an error)
//!
//! Event flow:
//!   Monitor ── publish(Event) ──► Bus ──► sink_listener ──► SinkSet::emit
//!                                                  ┌─────────┬─────────┐
//!                                                  ▼         ▼         ▼
//!                                             [queue S1] [queue S2] [queue SN]
//!                                                  ▼         ▼         ▼
//!                                             callbacks per StatusSink
//!
//! Shutdown path:
//!   shutdown() ─► publish ShutdownRequested
//!             ─► cancel every monitor token
//!             ─► join each monitor within shutdown_grace:
//!                  ├─ joined       → monitor already tore its recorder down
//!                  └─ grace hit    → publish GraceExceeded,
//!                                    force-kill recorder tree, join again
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Local;
use futures::future::join_all;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::channel::ChannelDescriptor;
use crate::config::MonitorConfig;
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::monitor::ChannelMonitor;
use crate::sinks::{SinkSet, StatusSink};

/// Handle to a running channel monitor.
struct Handle {
    monitor: Arc<ChannelMonitor>,
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

/// Coordinates channel monitors, event delivery, and graceful shutdown.
pub struct Supervisor {
    config: Arc<MonitorConfig>,
    bus: Bus,
    monitors: RwLock<HashMap<String, Handle>>,
    shutting_down: AtomicBool,
}

impl Supervisor {
    /// Creates a supervisor and spawns the sink fan-out listener.
    ///
    /// Must be called from within a tokio runtime. The sinks receive every
    /// status transition and log line published by monitors created here.
    pub fn new(config: MonitorConfig, sinks: Vec<Arc<dyn StatusSink>>) -> Self {
        let bus = Bus::new(config.bus_capacity);
        let set = Arc::new(SinkSet::new(sinks));
        Self::spawn_sink_listener(&bus, set);

        Self {
            config: Arc::new(config),
            bus,
            monitors: RwLock::new(HashMap::new()),
            shutting_down: AtomicBool::new(false),
        }
    }

    /// Subscribes to the bus and forwards events to the sink set
    /// (fire-and-forget).
    fn spawn_sink_listener(bus: &Bus, set: Arc<SinkSet>) {
        let mut rx = bus.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => set.emit(&ev),
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "sink listener lagged");
                        continue;
                    }
                }
            }
        });
    }

    /// Global configuration snapshot shared with every monitor.
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// New receiver observing all subsequent runtime events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Starts monitoring a channel on its own task.
    ///
    /// A duplicate key is a no-op: the existing monitor is left undisturbed
    /// and a log line is emitted. No error is signaled.
    pub async fn start(&self, descriptor: Arc<ChannelDescriptor>) {
        let key = descriptor.key();
        let mut monitors = self.monitors.write().await;

        // The flag check must share the registry critical section: a check
        // before the lock could see "not shutting down", lose the lock race
        // to shutdown's drain, and insert a monitor nobody will ever stop.
        if self.shutting_down.load(Ordering::SeqCst) {
            drop(monitors);
            self.log(format!("Ignoring start during shutdown: {key}"));
            return;
        }

        if monitors.contains_key(&key) {
            drop(monitors);
            self.log(format!("Already monitoring: {key}"));
            return;
        }

        let monitor =
            ChannelMonitor::new(Arc::clone(&descriptor), Arc::clone(&self.config), self.bus.clone());
        let cancel = CancellationToken::new();
        let join = tokio::spawn(Arc::clone(&monitor).run(cancel.clone()));
        monitors.insert(
            key.clone(),
            Handle {
                monitor,
                cancel,
                join,
            },
        );
        drop(monitors);

        info!(channel = %key, "monitor started");
        self.log(format!("Started monitoring: {key}"));
    }

    /// Starts every descriptor whose `active` flag is set.
    pub async fn start_all_active(&self, descriptors: &[Arc<ChannelDescriptor>]) {
        for descriptor in descriptors {
            if descriptor.is_active() {
                self.start(Arc::clone(descriptor)).await;
            }
        }
    }

    /// Stops monitoring a channel and waits for its recorder tree to die.
    ///
    /// Returns within the shutdown grace plus the kill escalation window.
    /// An absent key is a no-op.
    pub async fn stop(&self, descriptor: &ChannelDescriptor) {
        let handle = { self.monitors.write().await.remove(&descriptor.key()) };
        if let Some(handle) = handle {
            self.wait_handle(handle).await;
            self.log(format!("Stopped monitoring: {}", descriptor.key()));
        }
    }

    /// Stops every monitor and empties the registry.
    pub async fn stop_all(&self) {
        let _ = self.drain_and_stop().await;
        self.log("Stopped all monitoring");
    }

    /// True iff the registry holds the key and that monitor reports running.
    pub async fn is_monitoring(&self, descriptor: &ChannelDescriptor) -> bool {
        self.monitors
            .read()
            .await
            .get(&descriptor.key())
            .map(|h| h.monitor.is_running())
            .unwrap_or(false)
    }

    /// The monitor currently registered for a channel, if any.
    pub async fn monitor(&self, descriptor: &ChannelDescriptor) -> Option<Arc<ChannelMonitor>> {
        self.monitors
            .read()
            .await
            .get(&descriptor.key())
            .map(|h| Arc::clone(&h.monitor))
    }

    /// Sorted list of currently registered channel keys.
    pub async fn monitored_channels(&self) -> Vec<String> {
        let monitors = self.monitors.read().await;
        let mut keys: Vec<String> = monitors.keys().cloned().collect();
        keys.sort_unstable();
        keys
    }

    /// Stops all monitors and waits until every recorder tree is dead.
    ///
    /// Escalates to a forced tree-kill for monitors that outlive the grace
    /// period. Idempotent: a second call finds an empty registry and
    /// returns immediately.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        let first = !self.shutting_down.swap(true, Ordering::SeqCst);
        if first {
            self.bus.publish(Event::now(EventKind::ShutdownRequested));
            self.log("Shutting down monitoring service...");
        }

        let stuck = self.drain_and_stop().await;
        if stuck.is_empty() {
            if first {
                self.bus.publish(Event::now(EventKind::AllStoppedWithin));
                self.log("Monitoring service shutdown complete.");
            }
            Ok(())
        } else {
            Err(RuntimeError::GraceExceeded {
                grace: self.config.shutdown_grace,
                stuck,
            })
        }
    }

    /// Drains the registry, cancels every monitor, and joins them
    /// concurrently. Returns the keys of monitors that needed escalation.
    async fn drain_and_stop(&self) -> Vec<String> {
        let handles: Vec<Handle> = {
            let mut monitors = self.monitors.write().await;
            monitors.drain().map(|(_, h)| h).collect()
        };

        // Cancel everything first so monitors wind down in parallel.
        for handle in &handles {
            handle.cancel.cancel();
        }

        let stuck = join_all(handles.into_iter().map(|h| self.wait_handle(h))).await;
        stuck.into_iter().flatten().collect()
    }

    /// Joins one monitor within the shutdown grace; on timeout publishes
    /// `GraceExceeded`, force-kills the recorder tree, and joins again.
    ///
    /// Returns the channel key when escalation was needed.
    async fn wait_handle(&self, mut handle: Handle) -> Option<String> {
        handle.cancel.cancel();

        if time::timeout(self.config.shutdown_grace, &mut handle.join)
            .await
            .is_ok()
        {
            return None;
        }

        let key = handle.monitor.descriptor().key();
        warn!(channel = %key, "monitor outlived shutdown grace; force-killing recorder tree");
        self.bus.publish(
            Event::now(EventKind::GraceExceeded)
                .with_channel(Arc::clone(handle.monitor.descriptor())),
        );

        handle.monitor.force_kill_recorder();
        if time::timeout(self.config.kill_grace, &mut handle.join)
            .await
            .is_err()
        {
            // Last resort: dropping the recorder child inside the aborted
            // task delivers its kill_on_drop.
            handle.join.abort();
        }
        Some(key)
    }

    /// Publishes a supervisor-scoped sink log line.
    fn log(&self, message: impl Into<String>) {
        let line = format!("[{}] {}", Local::now().format("%H:%M:%S"), message.into());
        self.bus.publish(Event::now(EventKind::Log).with_line(line));
    }
}
