//! ChannelMonitor: per-channel probe and recording control loop.
//!
//! One monitor owns one channel. Its loop probes liveness through the
//! helper, launches a recorder process when the channel goes live, and
//! tears the recorder's process tree down on stop.
//!
//! ## State machine
//! ```text
//! Idle ──start──▶ Probing
//! Probing ──live──▶ Recording
//! Probing ──not live──▶ Probing          (sleep check_interval)
//! Probing ──probe error──▶ Probing       (sleep check_interval; status unchanged)
//! Recording ──helper exits──▶ Probing    (status→Offline; sleep 30s)
//! any ──stop or active=false──▶ Stopping
//! Stopping ──recorder tree dead──▶ Stopped (status cleared)
//! ```
//!
//! ## Cancellation semantics
//! Cancellation is cooperative and checked at safe points: the top of each
//! loop iteration, every inter-probe sleep, and the probe/recorder waits.
//! A stop request terminates the recorder gracefully, waits the configured
//! kill grace, then force-kills the whole process subtree. The monitor's
//! run future does not complete until the recorder task has been joined,
//! so joining the monitor implies its recorder tree is dead.
//!
//! ## Rules
//! - `recording` is set **before** the recorder spawns and cleared only
//!   after the helper has exited or been killed.
//! - At most one recorder is in flight per monitor.
//! - Status transitions are published with monotonic sequence numbers; a
//!   transition to the current status is not re-emitted.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Local;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::channel::{ChannelDescriptor, ChannelStatus};
use crate::config::{MonitorConfig, MIN_CHECK_INTERVAL};
use crate::error::MonitorError;
use crate::events::{Bus, Event, EventKind};
use crate::helper::command;
#[cfg(unix)]
use crate::helper::kill_tree;
use crate::{naming, quality};

/// How one recorder run ended; drives the loop's next transition.
enum RecordOutcome {
    /// Helper exited on its own (clean or with a code): stream ended.
    Completed,
    /// Helper could not be launched: status is already `Error`.
    Failed,
    /// Stop requested; the recorder tree was terminated.
    Cancelled,
}

/// Supervises probing and recording for a single channel.
pub struct ChannelMonitor {
    descriptor: Arc<ChannelDescriptor>,
    config: Arc<MonitorConfig>,
    bus: Bus,
    /// Effective probe interval (per-channel override or config default).
    check_interval: Duration,
    running: AtomicBool,
    recording: AtomicBool,
    status: Mutex<ChannelStatus>,
    /// Pid of the in-flight recorder; `None` whenever `recording` is false.
    recorder_pid: Mutex<Option<u32>>,
}

impl ChannelMonitor {
    pub(crate) fn new(
        descriptor: Arc<ChannelDescriptor>,
        config: Arc<MonitorConfig>,
        bus: Bus,
    ) -> Arc<Self> {
        let check_interval = descriptor
            .check_interval_secs
            .map(|secs| Duration::from_secs(secs).max(MIN_CHECK_INTERVAL))
            .unwrap_or(config.check_interval);
        Arc::new(Self {
            descriptor,
            config,
            bus,
            check_interval,
            running: AtomicBool::new(false),
            recording: AtomicBool::new(false),
            status: Mutex::new(ChannelStatus::Cleared),
            recorder_pid: Mutex::new(None),
        })
    }

    /// The channel this monitor owns.
    pub fn descriptor(&self) -> &Arc<ChannelDescriptor> {
        &self.descriptor
    }

    /// True while the control loop is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// True while a recorder process is in flight.
    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    /// Last observable status published for this channel.
    pub fn status(&self) -> ChannelStatus {
        self.status.lock().map(|s| *s).unwrap_or_default()
    }

    /// Pid of the in-flight recorder process, if any.
    pub fn recorder_pid(&self) -> Option<u32> {
        self.recorder_pid.lock().ok().and_then(|g| *g)
    }

    /// Control loop. Runs until cancellation or until the user flips the
    /// descriptor inactive; drains the in-flight recorder before returning.
    pub(crate) async fn run(self: Arc<Self>, token: CancellationToken) {
        self.running.store(true, Ordering::SeqCst);
        self.set_status(ChannelStatus::Offline);
        self.log(format!(
            "[{}] Started monitoring channel: {}",
            self.descriptor.platform, self.descriptor.channel_name
        ));
        self.bus.publish(
            Event::now(EventKind::MonitorStarted).with_channel(Arc::clone(&self.descriptor)),
        );

        // Recorder tasks get a child token so a loop exit for any reason
        // (stop, active=false) tears the recorder down.
        let record_token = token.child_token();
        let mut recorder: Option<JoinHandle<RecordOutcome>> = None;

        loop {
            if token.is_cancelled() || !self.descriptor.is_active() {
                break;
            }

            // A recorder is (or was) in flight: wake on the recording
            // cadence and notice its exit. The helper's own exit is the
            // stream-end signal; no probe fires while it is alive.
            if let Some(handle) = recorder.take() {
                if handle.is_finished() {
                    match handle.await {
                        Ok(RecordOutcome::Completed) => {
                            self.set_status(ChannelStatus::Offline);
                            self.log(format!(
                                "[{}] Stream ended for: {}",
                                self.descriptor.platform, self.descriptor.channel_name
                            ));
                            if !self.sleep(self.config.recording_wake_interval, &token).await {
                                break;
                            }
                        }
                        Ok(RecordOutcome::Failed) => {
                            // Status is already Error; keep probing.
                            if !self.sleep(self.check_interval, &token).await {
                                break;
                            }
                        }
                        Ok(RecordOutcome::Cancelled) | Err(_) => break,
                    }
                } else {
                    recorder = Some(handle);
                    if !self.sleep(self.config.recording_wake_interval, &token).await {
                        break;
                    }
                }
                continue;
            }

            let live = tokio::select! {
                res = command::probe(&self.config.helper_path, &self.descriptor.channel_url) => res,
                _ = token.cancelled() => break,
            };

            match live {
                Ok(true) => {
                    recorder = Some(Arc::clone(&self).start_recording(record_token.clone()));
                }
                Ok(false) => {
                    self.set_status(ChannelStatus::Offline);
                    self.log(format!(
                        "[{}] Channel {} is offline, waiting {} seconds...",
                        self.descriptor.platform,
                        self.descriptor.channel_name,
                        self.check_interval.as_secs()
                    ));
                    if !self.sleep(self.check_interval, &token).await {
                        break;
                    }
                }
                Err(e) => {
                    self.log(format!(
                        "[{}] Error checking stream status for {}: {}",
                        self.descriptor.platform,
                        self.descriptor.channel_name,
                        e.as_message()
                    ));
                    if !self.sleep(self.check_interval, &token).await {
                        break;
                    }
                }
            }
        }

        // Stopping: the recorder must be dead before we declare Stopped.
        record_token.cancel();
        if let Some(handle) = recorder {
            let _ = handle.await;
        }

        self.running.store(false, Ordering::SeqCst);
        self.recording.store(false, Ordering::SeqCst);
        self.set_status(ChannelStatus::Cleared);
        self.log(format!(
            "[{}] Stopped monitoring: {}",
            self.descriptor.platform, self.descriptor.channel_name
        ));
        self.bus.publish(
            Event::now(EventKind::MonitorStopped).with_channel(Arc::clone(&self.descriptor)),
        );
    }

    /// Marks the monitor recording and spawns the recorder task.
    ///
    /// `recording` flips before the spawn so an observer never sees a live
    /// recorder under `recording == false`.
    fn start_recording(self: Arc<Self>, token: CancellationToken) -> JoinHandle<RecordOutcome> {
        self.recording.store(true, Ordering::SeqCst);
        self.set_status(ChannelStatus::Recording);
        self.log(format!(
            "[{}] Stream is live! Starting recording: {}",
            self.descriptor.platform, self.descriptor.channel_name
        ));
        self.bus.publish(
            Event::now(EventKind::RecordingStarted).with_channel(Arc::clone(&self.descriptor)),
        );

        tokio::spawn(async move { self.record(token).await })
    }

    /// One recorder run with a failure-safe epilogue: whatever happens,
    /// `recording` and the stored pid are cleared before this returns.
    async fn record(&self, token: CancellationToken) -> RecordOutcome {
        let outcome = self.record_inner(&token).await;

        if let Ok(mut pid) = self.recorder_pid.lock() {
            *pid = None;
        }
        self.recording.store(false, Ordering::SeqCst);
        self.bus.publish(
            Event::now(EventKind::RecordingFinished).with_channel(Arc::clone(&self.descriptor)),
        );
        outcome
    }

    async fn record_inner(&self, token: &CancellationToken) -> RecordOutcome {
        let platform = self.descriptor.platform;
        let name = &self.descriptor.channel_name;

        let output_file = naming::output_filename(platform.as_str(), name, Local::now());
        let workdir = self.ensure_channel_dir().await;
        let chain = quality::quality_chain(&self.descriptor.quality, self.config.record_high_fps);

        self.log(format!(
            "[{platform}] Starting recording to: {}",
            workdir.join(&output_file).display()
        ));

        let recorder = match command::spawn_recorder(
            &self.config.helper_path,
            &self.descriptor.channel_url,
            &chain,
            &output_file,
            &workdir,
        ) {
            Ok(r) => r,
            Err(e) => {
                self.log(format!(
                    "[{platform}] Recording error for {name}: {}",
                    e.as_message()
                ));
                self.set_status(ChannelStatus::Error);
                return RecordOutcome::Failed;
            }
        };

        if let Ok(mut pid) = self.recorder_pid.lock() {
            *pid = recorder.pid();
        }

        let command::Recorder {
            mut child,
            mut quality_rx,
        } = recorder;

        let mut actual_quality: Option<String> = None;
        let mut quality_open = true;

        let exit = loop {
            tokio::select! {
                res = child.wait() => break res.ok(),
                announced = quality_rx.recv(), if quality_open => {
                    match announced {
                        Some(q) => {
                            quality_open = false;
                            self.log(format!("[{platform}] Recording quality: {q}"));
                            actual_quality = Some(q);
                        }
                        None => quality_open = false,
                    }
                }
                _ = token.cancelled() => {
                    self.shutdown_recorder(&mut child).await;
                    return RecordOutcome::Cancelled;
                }
            }
        };

        let quality = actual_quality.as_deref().unwrap_or("unknown");
        match exit {
            Some(status) if status.success() => {
                self.log(format!(
                    "[{platform}] Recording completed successfully: {output_file} (Quality: {quality})"
                ));
            }
            Some(status) => {
                self.log(format!(
                    "[{platform}] Recording ended with exit code {}: {name}",
                    status.code().unwrap_or(-1)
                ));
            }
            None => {
                self.log(format!("[{platform}] Recording ended without exit status: {name}"));
            }
        }
        RecordOutcome::Completed
    }

    /// Stop path for an in-flight recorder: graceful termination, a bounded
    /// wait, then a forced kill of the whole process subtree.
    async fn shutdown_recorder(&self, child: &mut tokio::process::Child) {
        let platform = self.descriptor.platform;
        let Some(pid) = child.id() else {
            // Already reaped.
            return;
        };

        self.log(format!(
            "[{platform}] Forcing stop of recording process for: {}",
            self.descriptor.channel_name
        ));

        #[cfg(unix)]
        kill_tree::terminate(pid);
        #[cfg(not(unix))]
        let _ = child.start_kill();

        match time::timeout(self.config.kill_grace, child.wait()).await {
            Ok(_) => {}
            Err(_) => {
                self.log(format!(
                    "[{platform}] Process did not terminate gracefully, forcing kill..."
                ));
                self.force_kill_pid(pid);
                let _ = child.wait().await;
                self.log(format!(
                    "[{platform}] Process tree terminated for: {}",
                    self.descriptor.channel_name
                ));
            }
        }
    }

    /// Force-kills the in-flight recorder tree, if any. Used by the
    /// supervisor when a monitor outlives the shutdown grace.
    pub(crate) fn force_kill_recorder(&self) {
        if let Some(pid) = self.recorder_pid() {
            #[cfg(unix)]
            if !kill_tree::is_alive(pid) {
                return;
            }
            self.force_kill_pid(pid);
        }
    }

    fn force_kill_pid(&self, pid: u32) {
        #[cfg(unix)]
        {
            if let Err(e) = kill_tree::kill_descendants(pid) {
                self.log(format!(
                    "[{}] Error killing process tree: {}; falling back to root kill",
                    self.descriptor.platform,
                    e.as_message()
                ));
            }
            kill_tree::kill(pid);
        }
        #[cfg(not(unix))]
        {
            // Without tree enumeration the root kill is all we have; the
            // recorder child also carries kill_on_drop.
            let _ = pid;
        }
    }

    /// Ensures the per-channel directory exists, falling back to the base
    /// output directory on mkdir failure.
    async fn ensure_channel_dir(&self) -> PathBuf {
        let dir = naming::channel_dir(&self.config.output_directory, &self.descriptor.channel_name);
        if dir.is_dir() {
            return dir;
        }
        match tokio::fs::create_dir_all(&dir).await {
            Ok(()) => {
                self.log(format!(
                    "[{}] Created channel directory: {}",
                    self.descriptor.platform,
                    dir.display()
                ));
                dir
            }
            Err(source) => {
                let e = MonitorError::DirectoryCreate { path: dir, source };
                self.log(format!("[{}] {}", self.descriptor.platform, e.as_message()));
                self.config.output_directory.clone()
            }
        }
    }

    /// Publishes a status transition unless it is a no-op.
    fn set_status(&self, status: ChannelStatus) {
        if let Ok(mut last) = self.status.lock() {
            if *last == status {
                return;
            }
            *last = status;
        }
        debug!(channel = %self.descriptor.key(), status = %status, "status changed");
        self.bus.publish(
            Event::now(EventKind::StatusChanged)
                .with_channel(Arc::clone(&self.descriptor))
                .with_status(status),
        );
    }

    /// Publishes a sink log line with the wall-clock prefix.
    fn log(&self, message: impl Into<String>) {
        let line = format!("[{}] {}", Local::now().format("%H:%M:%S"), message.into());
        debug!(channel = %self.descriptor.key(), "{line}");
        self.bus.publish(
            Event::now(EventKind::Log)
                .with_channel(Arc::clone(&self.descriptor))
                .with_line(line),
        );
    }

    /// Cancellable sleep; returns false when the stop token fired.
    async fn sleep(&self, dur: Duration, token: &CancellationToken) -> bool {
        tokio::select! {
            _ = time::sleep(dur) => true,
            _ = token.cancelled() => false,
        }
    }
}
