//! End-to-end tests driving the supervisor against a stub helper script.
//!
//! The stub plays both helper roles: probe (`<url> --json`, exit code is
//! liveness) and recorder (`<url> <chain> -o <file>`). Each test writes its
//! own stub into a temp directory and asserts on the supervisor's observable
//! behavior: sink callbacks, files on disk, and process liveness.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use regex::Regex;
use tempfile::TempDir;
use tokio::time;

use streamvisor::{
    ChannelDescriptor, ChannelMonitor, ChannelStatus, EventKind, MonitorConfig, Platform,
    StatusSink, Supervisor,
};

/// Writes an executable stub helper into `dir`.
fn write_helper(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("helper.sh");
    fs::write(&path, body).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Config with short intervals so tests run in milliseconds.
fn fast_config(base: &Path, helper: PathBuf) -> MonitorConfig {
    let mut cfg = MonitorConfig::default();
    cfg.output_directory = base.join("recordings");
    cfg.helper_path = helper;
    cfg.check_interval = Duration::from_millis(100);
    cfg.recording_wake_interval = Duration::from_millis(100);
    cfg.kill_grace = Duration::from_millis(500);
    cfg.shutdown_grace = Duration::from_secs(5);
    cfg
}

fn pid_alive(pid: u32) -> bool {
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), None).is_ok()
}

async fn wait_for_pid_death(pid: u32, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while pid_alive(pid) {
        assert!(Instant::now() < deadline, "pid {pid} still alive");
        time::sleep(Duration::from_millis(20)).await;
    }
}

async fn wait_for_recording(monitor: &Arc<ChannelMonitor>) -> u32 {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if monitor.is_recording() {
            if let Some(pid) = monitor.recorder_pid() {
                return pid;
            }
        }
        assert!(Instant::now() < deadline, "recorder did not start");
        time::sleep(Duration::from_millis(20)).await;
    }
}

/// Sink that records every callback for later assertions.
#[derive(Default)]
struct Capture {
    statuses: Mutex<Vec<(String, ChannelStatus)>>,
    lines: Mutex<Vec<String>>,
}

#[async_trait]
impl StatusSink for Capture {
    async fn on_status_changed(&self, channel: &Arc<ChannelDescriptor>, status: ChannelStatus) {
        self.statuses.lock().unwrap().push((channel.key(), status));
    }

    async fn on_log_message(&self, line: &str) {
        self.lines.lock().unwrap().push(line.to_string());
    }

    fn name(&self) -> &'static str {
        "capture"
    }
}

#[tokio::test]
async fn records_live_stream_then_returns_to_offline() {
    let tmp = TempDir::new().unwrap();
    // Live while the flag file exists. The recorder dumps its argv, prints
    // a quality announcement, clears the flag, and ends the stream cleanly.
    let helper = write_helper(
        tmp.path(),
        r#"#!/bin/sh
dir="$(dirname "$0")"
if [ "$2" = "--json" ]; then
  test -f "$dir/live"
  exit $?
fi
printf '%s\n' "$@" > "$dir/record_args"
echo "Opening stream: 720p (hls)"
rm -f "$dir/live"
: > "$4"
exit 0
"#,
    );
    fs::write(tmp.path().join("live"), b"").unwrap();

    let mut cfg = fast_config(tmp.path(), helper);
    cfg.record_high_fps = true;
    let sink = Arc::new(Capture::default());
    let supervisor = Supervisor::new(cfg, vec![Arc::clone(&sink) as Arc<dyn StatusSink>]);
    let mut events = supervisor.subscribe_events();

    let channel = Arc::new(ChannelDescriptor::new(
        Platform::YouTube,
        "Alice",
        "https://youtube.com/@Alice/live",
        "720p",
    ));
    supervisor.start(Arc::clone(&channel)).await;

    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let ev = time::timeout(remaining, events.recv())
            .await
            .expect("recording did not finish in time")
            .unwrap();
        if ev.kind == EventKind::RecordingFinished {
            break;
        }
    }

    // Recorder argv: url, quality chain, -o, filename.
    let args = fs::read_to_string(tmp.path().join("record_args")).unwrap();
    let args: Vec<&str> = args.lines().collect();
    assert_eq!(args[0], "https://youtube.com/@Alice/live");
    assert_eq!(
        args[1],
        "720p60,720p50,720p,720p30,720p25,720p24,\
         480p60,480p50,480p,480p30,480p25,480p24,\
         360p60,360p50,360p,360p30,360p25,360p24,\
         240p60,240p50,240p,240p30,240p25,240p24,\
         144p60,144p50,144p,144p30,144p25,144p24,worst"
    );
    assert_eq!(args[2], "-o");
    let filename = args[3];
    let pattern = Regex::new(r"^YouTube_\d{12}_Alice_stream\.ts$").unwrap();
    assert!(pattern.is_match(filename), "unexpected filename {filename}");

    // The recording landed in the per-channel directory.
    let recorded = tmp.path().join("recordings").join("Alice").join(filename);
    assert!(recorded.is_file(), "missing {}", recorded.display());

    // Back to offline probing once the stream ended.
    let monitor = supervisor.monitor(&channel).await.unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    while monitor.status() != ChannelStatus::Offline {
        assert!(Instant::now() < deadline, "status did not return to Offline");
        time::sleep(Duration::from_millis(20)).await;
    }

    supervisor.shutdown().await.unwrap();
    time::sleep(Duration::from_millis(200)).await;

    let statuses: Vec<ChannelStatus> = sink
        .statuses
        .lock()
        .unwrap()
        .iter()
        .filter(|(key, _)| key == "YouTube:Alice")
        .map(|&(_, s)| s)
        .collect();
    assert_eq!(
        statuses,
        vec![
            ChannelStatus::Offline,
            ChannelStatus::Recording,
            ChannelStatus::Offline,
            ChannelStatus::Cleared,
        ]
    );
}

#[tokio::test]
async fn stop_kills_recorder_within_bound() {
    let tmp = TempDir::new().unwrap();
    // Always live; the recorder blocks until killed. exec keeps the tree a
    // single process with default TERM handling.
    let helper = write_helper(
        tmp.path(),
        r#"#!/bin/sh
if [ "$2" = "--json" ]; then exit 0; fi
: > "$4"
exec sleep 300
"#,
    );

    let supervisor = Supervisor::new(fast_config(tmp.path(), helper), vec![]);
    let channel = Arc::new(ChannelDescriptor::new(
        Platform::Twitch,
        "bob",
        "https://twitch.tv/bob",
        "1080p",
    ));
    supervisor.start(Arc::clone(&channel)).await;

    let monitor = supervisor.monitor(&channel).await.unwrap();
    let pid = wait_for_recording(&monitor).await;
    assert!(pid_alive(pid));

    let start = Instant::now();
    supervisor.stop(&channel).await;
    assert!(
        start.elapsed() < Duration::from_secs(3),
        "stop took {:?}",
        start.elapsed()
    );

    assert!(!supervisor.is_monitoring(&channel).await);
    assert_eq!(monitor.status(), ChannelStatus::Cleared);
    assert!(monitor.recorder_pid().is_none());
    wait_for_pid_death(pid, Duration::from_secs(1)).await;
}

#[cfg(any(target_os = "linux", target_os = "macos"))]
#[tokio::test]
async fn stop_escalates_when_recorder_ignores_term() {
    let tmp = TempDir::new().unwrap();
    // The recorder shell ignores TERM and so does the sleep it forks
    // (ignored dispositions are inherited). Only the forced tree kill after
    // the grace window can take both down.
    let helper = write_helper(
        tmp.path(),
        r#"#!/bin/sh
dir="$(dirname "$0")"
if [ "$2" = "--json" ]; then exit 0; fi
trap '' TERM
: > "$4"
sleep 300 &
echo $! > "$dir/grandchild"
wait
"#,
    );

    let supervisor = Supervisor::new(fast_config(tmp.path(), helper), vec![]);
    let channel = Arc::new(ChannelDescriptor::new(
        Platform::Kick,
        "carol",
        "https://kick.com/carol",
        "480p",
    ));
    supervisor.start(Arc::clone(&channel)).await;

    let monitor = supervisor.monitor(&channel).await.unwrap();
    let root_pid = wait_for_recording(&monitor).await;

    let grandchild_path = tmp.path().join("grandchild");
    let deadline = Instant::now() + Duration::from_secs(5);
    while !grandchild_path.is_file() {
        assert!(Instant::now() < deadline, "grandchild pid file never appeared");
        time::sleep(Duration::from_millis(20)).await;
    }
    let grandchild: u32 = fs::read_to_string(&grandchild_path)
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    assert!(pid_alive(root_pid));
    assert!(pid_alive(grandchild));

    let start = Instant::now();
    supervisor.stop(&channel).await;
    assert!(
        start.elapsed() < Duration::from_secs(4),
        "stop took {:?}",
        start.elapsed()
    );

    assert_eq!(monitor.status(), ChannelStatus::Cleared);
    wait_for_pid_death(root_pid, Duration::from_secs(2)).await;
    // The grandchild is reparented before being reaped; allow a moment.
    wait_for_pid_death(grandchild, Duration::from_secs(2)).await;
}

#[tokio::test]
async fn duplicate_start_is_rejected_with_a_log_line() {
    let tmp = TempDir::new().unwrap();
    let helper = write_helper(tmp.path(), "#!/bin/sh\nexit 1\n");

    let sink = Arc::new(Capture::default());
    let supervisor = Supervisor::new(
        fast_config(tmp.path(), helper),
        vec![Arc::clone(&sink) as Arc<dyn StatusSink>],
    );

    let channel = Arc::new(ChannelDescriptor::new(
        Platform::YouTube,
        "Alice",
        "https://youtube.com/@Alice/live",
        "720p",
    ));
    supervisor.start(Arc::clone(&channel)).await;
    supervisor.start(Arc::clone(&channel)).await;

    assert_eq!(supervisor.monitored_channels().await, vec!["YouTube:Alice"]);

    time::sleep(Duration::from_millis(200)).await;
    {
        let lines = sink.lines.lock().unwrap();
        let started = lines
            .iter()
            .filter(|l| l.contains("Started monitoring: YouTube:Alice"))
            .count();
        let duplicate = lines
            .iter()
            .filter(|l| l.contains("Already monitoring: YouTube:Alice"))
            .count();
        assert_eq!(started, 1, "lines: {lines:?}");
        assert_eq!(duplicate, 1, "lines: {lines:?}");
    }

    supervisor.shutdown().await.unwrap();
}

#[tokio::test]
async fn clearing_the_active_flag_winds_the_monitor_down() {
    let tmp = TempDir::new().unwrap();
    let helper = write_helper(tmp.path(), "#!/bin/sh\nexit 1\n");

    let supervisor = Supervisor::new(fast_config(tmp.path(), helper), vec![]);
    let channel = Arc::new(ChannelDescriptor::new(
        Platform::Twitch,
        "dave",
        "https://twitch.tv/dave",
        "720p",
    ));
    supervisor.start(Arc::clone(&channel)).await;
    assert!(supervisor.is_monitoring(&channel).await);

    channel.set_active(false);
    let deadline = Instant::now() + Duration::from_secs(2);
    while supervisor.is_monitoring(&channel).await {
        assert!(Instant::now() < deadline, "monitor did not wind down");
        time::sleep(Duration::from_millis(20)).await;
    }

    // The registry entry survives until an explicit stop.
    assert_eq!(supervisor.monitored_channels().await, vec!["Twitch:dave"]);
    supervisor.stop(&channel).await;
    assert!(supervisor.monitored_channels().await.is_empty());

    // Stopping an unknown channel is a no-op.
    supervisor.stop(&channel).await;
}

#[tokio::test]
async fn shutdown_stops_every_monitor_and_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    // Channels whose URL mentions "rec" are live and record until killed;
    // the rest stay offline.
    let helper = write_helper(
        tmp.path(),
        r#"#!/bin/sh
case "$1" in
  *rec*) live=0 ;;
  *) live=1 ;;
esac
if [ "$2" = "--json" ]; then exit $live; fi
: > "$4"
exec sleep 300
"#,
    );

    let supervisor = Supervisor::new(fast_config(tmp.path(), helper), vec![]);

    let channels: Vec<Arc<ChannelDescriptor>> = (0..20)
        .map(|i| {
            let role = if i % 2 == 0 { "rec" } else { "idle" };
            Arc::new(ChannelDescriptor::new(
                Platform::Twitch,
                format!("{role}{i:02}"),
                format!("https://twitch.tv/{role}{i:02}"),
                "720p",
            ))
        })
        .collect();
    channels[1].set_active(false);

    supervisor.start_all_active(&channels).await;
    assert_eq!(supervisor.monitored_channels().await.len(), 19);
    assert!(!supervisor.is_monitoring(&channels[1]).await);

    // Wait for every live channel to get its recorder going.
    let mut recorder_pids = Vec::new();
    for channel in channels.iter().filter(|c| c.channel_name.contains("rec")) {
        let monitor = supervisor.monitor(channel).await.unwrap();
        recorder_pids.push(wait_for_recording(&monitor).await);
    }
    assert_eq!(recorder_pids.len(), 10);

    let start = Instant::now();
    supervisor.shutdown().await.unwrap();
    assert!(
        start.elapsed() < Duration::from_secs(5),
        "shutdown took {:?}",
        start.elapsed()
    );

    assert!(supervisor.monitored_channels().await.is_empty());
    assert!(!supervisor.is_monitoring(&channels[0]).await);
    for pid in recorder_pids {
        wait_for_pid_death(pid, Duration::from_secs(1)).await;
    }

    // Second call finds an empty registry.
    supervisor.shutdown().await.unwrap();

    // Starts after shutdown are ignored.
    supervisor.start(Arc::clone(&channels[0])).await;
    assert!(supervisor.monitored_channels().await.is_empty());
}

#[tokio::test]
async fn completion_without_quality_announcement_reports_unknown() {
    let tmp = TempDir::new().unwrap();
    // The recorder ends the stream cleanly but never prints a quality
    // announcement.
    let helper = write_helper(
        tmp.path(),
        r#"#!/bin/sh
dir="$(dirname "$0")"
if [ "$2" = "--json" ]; then
  test -f "$dir/live"
  exit $?
fi
rm -f "$dir/live"
: > "$4"
exit 0
"#,
    );
    fs::write(tmp.path().join("live"), b"").unwrap();

    let sink = Arc::new(Capture::default());
    let supervisor = Supervisor::new(
        fast_config(tmp.path(), helper),
        vec![Arc::clone(&sink) as Arc<dyn StatusSink>],
    );
    let channel = Arc::new(ChannelDescriptor::new(
        Platform::Twitch,
        "erin",
        "https://twitch.tv/erin",
        "720p",
    ));
    supervisor.start(Arc::clone(&channel)).await;

    let deadline = Instant::now() + Duration::from_secs(5);
    let completion = loop {
        let line = sink
            .lines
            .lock()
            .unwrap()
            .iter()
            .find(|l| l.contains("Recording completed successfully"))
            .cloned();
        if let Some(line) = line {
            break line;
        }
        assert!(Instant::now() < deadline, "no completion line observed");
        time::sleep(Duration::from_millis(20)).await;
    };
    assert!(
        completion.contains("(Quality: unknown)"),
        "completion line: {completion}"
    );

    supervisor.shutdown().await.unwrap();
}

#[tokio::test]
async fn mkdir_failure_falls_back_to_base_directory() {
    let tmp = TempDir::new().unwrap();
    let helper = write_helper(
        tmp.path(),
        r#"#!/bin/sh
dir="$(dirname "$0")"
if [ "$2" = "--json" ]; then
  test -f "$dir/live"
  exit $?
fi
rm -f "$dir/live"
: > "$4"
exit 0
"#,
    );
    fs::write(tmp.path().join("live"), b"").unwrap();

    // A regular file squats on the channel-directory path, so mkdir fails
    // and the recording must land in the base directory instead.
    let base = tmp.path().join("recordings");
    fs::create_dir_all(&base).unwrap();
    fs::write(base.join("Alice"), b"").unwrap();

    let sink = Arc::new(Capture::default());
    let supervisor = Supervisor::new(
        fast_config(tmp.path(), helper),
        vec![Arc::clone(&sink) as Arc<dyn StatusSink>],
    );
    let channel = Arc::new(ChannelDescriptor::new(
        Platform::YouTube,
        "Alice",
        "https://youtube.com/@Alice/live",
        "720p",
    ));
    let mut events = supervisor.subscribe_events();
    supervisor.start(Arc::clone(&channel)).await;

    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let ev = time::timeout(remaining, events.recv())
            .await
            .expect("recording did not finish in time")
            .unwrap();
        if ev.kind == EventKind::RecordingFinished {
            break;
        }
    }

    let pattern = Regex::new(r"^YouTube_\d{12}_Alice_stream\.ts$").unwrap();
    let recorded = fs::read_dir(&base)
        .unwrap()
        .filter_map(|e| e.ok())
        .any(|e| pattern.is_match(&e.file_name().to_string_lossy()));
    assert!(recorded, "no recording directly under the base directory");

    supervisor.shutdown().await.unwrap();
    time::sleep(Duration::from_millis(200)).await;
    let lines = sink.lines.lock().unwrap();
    assert!(
        lines.iter().any(|l| l.contains("failed to create channel directory")),
        "lines: {lines:?}"
    );
}

#[tokio::test]
async fn probe_spawn_failure_is_logged_and_probing_continues() {
    let tmp = TempDir::new().unwrap();
    let helper = tmp.path().join("missing-helper");

    let sink = Arc::new(Capture::default());
    let supervisor = Supervisor::new(
        fast_config(tmp.path(), helper),
        vec![Arc::clone(&sink) as Arc<dyn StatusSink>],
    );
    let channel = Arc::new(ChannelDescriptor::new(
        Platform::Kick,
        "frank",
        "https://kick.com/frank",
        "720p",
    ));
    supervisor.start(Arc::clone(&channel)).await;

    // Each failed probe logs and the loop keeps its cadence; two distinct
    // error lines prove the monitor survived the first failure.
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let errors = sink
            .lines
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.contains("Error checking stream status for frank"))
            .count();
        if errors >= 2 {
            break;
        }
        assert!(Instant::now() < deadline, "probe errors never repeated");
        time::sleep(Duration::from_millis(20)).await;
    }
    assert!(supervisor.is_monitoring(&channel).await);

    supervisor.shutdown().await.unwrap();
}

#[tokio::test]
async fn concurrent_start_and_shutdown_leave_no_monitor() {
    let tmp = TempDir::new().unwrap();
    let helper = write_helper(tmp.path(), "#!/bin/sh\nexit 1\n");
    let cfg = fast_config(tmp.path(), helper);

    // Whichever side wins the registry lock, a monitor must never survive
    // a completed shutdown.
    for _ in 0..10 {
        let supervisor = Arc::new(Supervisor::new(cfg.clone(), vec![]));
        let channel = Arc::new(ChannelDescriptor::new(
            Platform::Twitch,
            "grace",
            "https://twitch.tv/grace",
            "720p",
        ));

        let starter = {
            let supervisor = Arc::clone(&supervisor);
            let channel = Arc::clone(&channel);
            tokio::spawn(async move { supervisor.start(channel).await })
        };
        let stopper = {
            let supervisor = Arc::clone(&supervisor);
            tokio::spawn(async move { supervisor.shutdown().await })
        };
        starter.await.unwrap();
        stopper.await.unwrap().unwrap();

        assert!(supervisor.monitored_channels().await.is_empty());
        assert!(!supervisor.is_monitoring(&channel).await);
    }
}
