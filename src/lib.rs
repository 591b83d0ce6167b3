//! # streamvisor
//!
//! Live-stream monitoring and recording supervisor built on tokio.
//!
//! Streamvisor watches a set of stream channels, probes each one for
//! liveness through an external stream-capture helper, records live
//! streams to disk, and tears recorder process trees down deterministically
//! on stop and shutdown.
//!
//! ## Core concepts
//! - **[`ChannelDescriptor`]** — immutable identity of a watched channel
//!   (platform, name, URL, requested quality) plus its mutable active flag.
//! - **[`ChannelMonitor`]** — per-channel control loop: probe, record,
//!   stop. One tokio task per channel.
//! - **[`Supervisor`]** — registry keyed by `"{platform}:{name}"`; owns
//!   the event bus and the sink set, and guarantees shutdown does not
//!   return before every recorder tree is dead.
//! - **[`StatusSink`]** — observer trait for status transitions and log
//!   lines; sinks run isolated behind bounded queues.
//! - **[`Event`] / [`Bus`]** — broadcast channel carrying sequenced
//!   runtime events (status changes, log lines, lifecycle milestones).
//!
//! ## Architecture
//! ```text
//! ChannelDescriptor ──► Supervisor::start
//!                          │ spawn
//!                          ▼
//!                    ChannelMonitor (one task per channel)
//!                     │  probe: helper <url> --json
//!                     │  record: helper <url> <chain> -o <file>
//!                     ▼
//!                    Bus ──► SinkSet ──► StatusSink impls
//!
//! stop/shutdown: cancel token ──► graceful TERM ──► kill_grace ──► tree kill
//! ```
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use streamvisor::{ChannelDescriptor, LogWriter, MonitorConfig, Platform, Supervisor};
//!
//! #[tokio::main]
//! async fn main() {
//!     let supervisor = Supervisor::new(MonitorConfig::default(), vec![Arc::new(LogWriter)]);
//!
//!     let channel = Arc::new(ChannelDescriptor::new(
//!         Platform::Twitch,
//!         "alice",
//!         "https://twitch.tv/alice",
//!         "1080p",
//!     ));
//!     supervisor.start(Arc::clone(&channel)).await;
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
//!     supervisor.shutdown().await.ok();
//! }
//! ```

mod channel;
mod config;
mod error;
mod events;
mod helper;
mod monitor;
mod naming;
mod quality;
mod sinks;
mod supervisor;

pub use channel::{ChannelDescriptor, ChannelStatus, Platform};
pub use config::{MonitorConfig, MIN_CHECK_INTERVAL};
pub use error::{MonitorError, RuntimeError};
pub use events::{Bus, Event, EventKind};
pub use monitor::ChannelMonitor;
pub use naming::{output_filename, sanitize_segment};
pub use quality::quality_chain;
pub use sinks::{LogWriter, SinkSet, StatusSink};
pub use supervisor::Supervisor;
