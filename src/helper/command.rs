//! Helper CLI invocation: liveness probes and recorder processes.
//!
//! The stream-capture helper is opaque to this crate except for its CLI and
//! exit codes:
//! - Liveness: `helper <url> --json` → exit 0 iff live.
//! - Record: `helper <url> <qualityChain> -o <file>` → exit 0 on clean
//!   stream end.
//!
//! Both invocations drain stdout and stderr on their own tasks; on
//! platforms with small OS pipe buffers a helper that fills its pipe would
//! otherwise deadlock against our `wait()`. The recorder drain additionally
//! scans for the first quality announcement the helper prints.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::MonitorError;

/// `Opening stream: 1080p60 (hls)`
static OPENING_STREAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Opening stream: ([^\s(]+)").expect("pattern compiles"));
/// `Selected quality: 720p`
static SELECTED_QUALITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Selected quality: (\S+)").expect("pattern compiles"));
/// `Stream ended, will restart ... quality 480p`
static RESTART_QUALITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Stream ended, will restart.*quality (\S+)").expect("pattern compiles"));

/// Probes channel liveness: `helper <url> --json`.
///
/// Exit code 0 means live, anything else means not live. No timeout is
/// imposed; the helper is trusted to return. The child carries
/// `kill_on_drop`, so cancelling the future reaps it.
pub(crate) async fn probe(helper: &Path, url: &str) -> Result<bool, MonitorError> {
    let mut child = Command::new(helper)
        .arg(url)
        .arg("--json")
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| MonitorError::HelperInvocation {
            helper: helper.to_path_buf(),
            source,
        })?;

    drain(child.stdout.take());
    drain(child.stderr.take());

    let status = child
        .wait()
        .await
        .map_err(|source| MonitorError::HelperInvocation {
            helper: helper.to_path_buf(),
            source,
        })?;

    debug!(url, code = ?status.code(), "probe finished");
    Ok(status.success())
}

/// A spawned recorder process and the channel its quality announcement
/// arrives on.
pub(crate) struct Recorder {
    /// The helper child process.
    pub(crate) child: Child,
    /// Receives the first quality announcement scanned from the helper's
    /// output; closed once both drain tasks finish.
    pub(crate) quality_rx: mpsc::Receiver<String>,
}

impl Recorder {
    /// OS pid of the recorder, `None` once the child has been reaped.
    pub(crate) fn pid(&self) -> Option<u32> {
        self.child.id()
    }
}

/// Spawns the recorder: `helper <url> <qualityChain> -o <file>` with the
/// working directory set to the channel directory.
pub(crate) fn spawn_recorder(
    helper: &Path,
    url: &str,
    quality_chain: &str,
    output_file: &str,
    workdir: &Path,
) -> Result<Recorder, MonitorError> {
    let mut child = Command::new(helper)
        .arg(url)
        .arg(quality_chain)
        .arg("-o")
        .arg(output_file)
        .current_dir(workdir)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| MonitorError::HelperInvocation {
            helper: helper.to_path_buf(),
            source,
        })?;

    // Capacity 1: only the first announcement matters, later matches from
    // the other stream are dropped by try_send.
    let (tx, quality_rx) = mpsc::channel(1);
    scan(child.stdout.take(), tx.clone());
    scan(child.stderr.take(), tx);

    Ok(Recorder { child, quality_rx })
}

/// Extracts the quality token from a helper output line, if present.
pub(crate) fn extract_quality(line: &str) -> Option<String> {
    for pattern in [&*OPENING_STREAM, &*SELECTED_QUALITY, &*RESTART_QUALITY] {
        if let Some(caps) = pattern.captures(line) {
            return Some(caps[1].to_string());
        }
    }
    None
}

/// Discards a child output stream on its own task.
fn drain<R>(stream: Option<R>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    if let Some(mut r) = stream {
        tokio::spawn(async move {
            let _ = tokio::io::copy(&mut r, &mut tokio::io::sink()).await;
        });
    }
}

/// Drains a child output stream line by line, forwarding the first quality
/// announcement and discarding everything after it.
fn scan<R>(stream: Option<R>, tx: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    if let Some(r) = stream {
        tokio::spawn(async move {
            let mut lines = BufReader::new(r).lines();
            let mut scanning = true;
            while let Ok(Some(line)) = lines.next_line().await {
                if scanning {
                    if let Some(quality) = extract_quality(&line) {
                        scanning = false;
                        let _ = tx.try_send(quality);
                    }
                }
            }
        });
    }
}
