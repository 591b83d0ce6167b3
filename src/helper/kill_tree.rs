//! Recorder process-tree termination.
//!
//! The helper typically spawns child readers per stream segment (notably on
//! Twitch); a graceful kill of the parent alone orphans readers that keep
//! writing to the output file. This module walks the process tree from the
//! recorder's pid, identifies all descendants, and force-kills them from
//! leaves to root.
//!
//! Enumeration reads `/proc` on Linux and uses `libproc` on macOS. When it
//! fails the caller falls back to a forced kill of the root only.
//!
//! All pids handled here are children we spawned ourselves; ESRCH (process
//! already dead) is treated as success. PID 0 and PID 1 are never targeted.

use std::collections::{HashMap, VecDeque};

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tracing::{debug, warn};

use crate::error::MonitorError;

/// Information about a process in the tree.
#[derive(Debug, Clone)]
struct ProcessInfo {
    pid: i32,
    ppid: i32,
}

/// Requests graceful termination of the recorder root (SIGTERM).
pub fn terminate(pid: u32) {
    send(pid as i32, Signal::SIGTERM);
}

/// Force-kills the recorder root (SIGKILL).
pub fn kill(pid: u32) {
    send(pid as i32, Signal::SIGKILL);
}

/// Returns true if the process still exists.
pub fn is_alive(pid: u32) -> bool {
    // Signal 0 checks existence without delivering anything.
    signal::kill(Pid::from_raw(pid as i32), None).is_ok()
}

/// Force-kills every descendant of `pid`, leaves first, without touching
/// the root itself. Returns the number of descendants signalled.
///
/// The caller is expected to follow up with [`kill`] on the root and to
/// fall back to a root-only kill when this returns an error.
pub fn kill_descendants(pid: u32) -> Result<usize, MonitorError> {
    let processes = enumerate_processes().map_err(|message| MonitorError::ProcessEnumeration {
        pid,
        message,
    })?;

    let descendants = find_descendants(pid as i32, &processes);
    let mut killed = 0;
    for &child in &descendants {
        if child <= 1 {
            warn!(pid = child, "kill_tree: skipping protected pid in tree");
            continue;
        }
        send(child, Signal::SIGKILL);
        killed += 1;
    }

    debug!(root = pid, descendants = killed, "kill_tree: descendants signalled");
    Ok(killed)
}

fn send(pid: i32, sig: Signal) {
    if pid <= 1 {
        warn!(pid, "kill_tree: refusing to signal protected pid");
        return;
    }
    match signal::kill(Pid::from_raw(pid), sig) {
        Ok(()) => debug!(pid, signal = ?sig, "kill_tree: signal sent"),
        Err(nix::errno::Errno::ESRCH) => {
            debug!(pid, signal = ?sig, "kill_tree: process already dead")
        }
        Err(e) => warn!(pid, signal = ?sig, error = %e, "kill_tree: signal failed"),
    }
}

/// Find all descendant pids of `root_pid`, ordered leaves first.
fn find_descendants(root_pid: i32, processes: &[ProcessInfo]) -> Vec<i32> {
    let mut children_map: HashMap<i32, Vec<i32>> = HashMap::new();
    for info in processes {
        children_map.entry(info.ppid).or_default().push(info.pid);
    }

    let mut descendants = Vec::new();
    let mut queue = VecDeque::new();
    queue.push_back(root_pid);

    while let Some(pid) = queue.pop_front() {
        if let Some(children) = children_map.get(&pid) {
            for &child in children {
                if child == root_pid {
                    continue;
                }
                descendants.push(child);
                queue.push_back(child);
            }
        }
    }

    // BFS yields parents before children; reverse so leaves come first.
    descendants.reverse();
    descendants
}

/// Enumerate all processes on Linux by reading /proc.
#[cfg(target_os = "linux")]
fn enumerate_processes() -> Result<Vec<ProcessInfo>, String> {
    use std::fs;

    let entries = fs::read_dir("/proc").map_err(|e| format!("cannot read /proc: {e}"))?;
    let mut processes = Vec::new();

    for entry in entries.flatten() {
        let name = entry.file_name();
        let pid: i32 = match name.to_string_lossy().parse() {
            Ok(p) => p,
            Err(_) => continue,
        };

        // Process may exit between readdir and here.
        let status = match fs::read_to_string(format!("/proc/{pid}/status")) {
            Ok(s) => s,
            Err(_) => continue,
        };

        let mut ppid = 0;
        for line in status.lines() {
            if let Some(val) = line.strip_prefix("PPid:\t") {
                ppid = val.trim().parse().unwrap_or(0);
                break;
            }
        }

        processes.push(ProcessInfo { pid, ppid });
    }

    Ok(processes)
}

/// Enumerate all processes on macOS using libproc APIs.
#[cfg(target_os = "macos")]
fn enumerate_processes() -> Result<Vec<ProcessInfo>, String> {
    use std::mem;

    // PROC_ALL_PIDS = 1, the stable value from <sys/proc_info.h>.
    const PROC_ALL_PIDS: u32 = 1;

    let num_bytes = unsafe { libc::proc_listpids(PROC_ALL_PIDS, 0, std::ptr::null_mut(), 0) };
    if num_bytes <= 0 {
        return Err(format!(
            "proc_listpids size query failed: {}",
            std::io::Error::last_os_error()
        ));
    }

    // Headroom for processes appearing between the two calls.
    let pid_count = (num_bytes as usize / mem::size_of::<libc::pid_t>()) + 64;
    let mut pids: Vec<libc::pid_t> = vec![0; pid_count];
    let buf_size = (pid_count * mem::size_of::<libc::pid_t>()) as libc::c_int;

    let actual_bytes =
        unsafe { libc::proc_listpids(PROC_ALL_PIDS, 0, pids.as_mut_ptr().cast(), buf_size) };
    if actual_bytes <= 0 {
        return Err(format!(
            "proc_listpids data query failed: {}",
            std::io::Error::last_os_error()
        ));
    }
    pids.truncate(actual_bytes as usize / mem::size_of::<libc::pid_t>());

    let mut processes = Vec::with_capacity(pids.len());
    let bsdinfo_size = mem::size_of::<libc::proc_bsdinfo>() as libc::c_int;

    for &pid in &pids {
        if pid <= 0 {
            continue;
        }

        let mut info: libc::proc_bsdinfo = unsafe { mem::zeroed() };
        let ret = unsafe {
            libc::proc_pidinfo(
                pid,
                libc::PROC_PIDTBSDINFO,
                0,
                (&mut info as *mut libc::proc_bsdinfo).cast(),
                bsdinfo_size,
            )
        };
        if ret <= 0 {
            continue;
        }

        processes.push(ProcessInfo {
            pid,
            ppid: info.pbi_ppid as i32,
        });
    }

    Ok(processes)
}

#[cfg(all(unix, not(any(target_os = "linux", target_os = "macos"))))]
fn enumerate_processes() -> Result<Vec<ProcessInfo>, String> {
    Err("process enumeration not supported on this platform".to_string())
}
