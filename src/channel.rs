//! Channel identity and per-channel recording preferences.
//!
//! A [`ChannelDescriptor`] is the unit the supervisor works with: the
//! platform, the human-readable channel name, the URL the helper
//! understands, and the preferred quality. The `(platform, name)` pair is
//! immutable for the descriptor's lifetime and forms the registry key; the
//! `active` flag is the user's monitoring intent and may be flipped while a
//! monitor is running.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// Streaming platform a channel lives on.
///
/// Only used for URL construction by the embedder and for filename/log
/// prefixes here; the helper receives the full channel URL and does not
/// care about the platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Platform {
    YouTube,
    Twitch,
    Kick,
}

impl Platform {
    /// Canonical spelling used in registry keys, filenames, and log lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::YouTube => "YouTube",
            Platform::Twitch => "Twitch",
            Platform::Kick => "Kick",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable status of a channel monitor.
///
/// Emitted through the status sink as plain strings: `""` (cleared),
/// `"Offline"`, `"Recording"`, `"Error"`. Transitions follow the monitor's
/// control loop; a stopped monitor always ends on [`ChannelStatus::Cleared`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChannelStatus {
    /// Monitor is not running; the status column is blank.
    #[default]
    Cleared,
    /// Channel is being probed and is not live.
    Offline,
    /// A recorder process is capturing the stream.
    Recording,
    /// The recorder thread hit an exception; probing continues.
    Error,
}

impl ChannelStatus {
    /// String form delivered to the status sink.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelStatus::Cleared => "",
            ChannelStatus::Offline => "Offline",
            ChannelStatus::Recording => "Recording",
            ChannelStatus::Error => "Error",
        }
    }
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity and recording preferences of one monitored channel.
///
/// Shared between the embedder and the owning monitor via `Arc`; the
/// identity fields are immutable, `active` is an atomic flag the embedder
/// may clear to ask the monitor to wind down on its next wake.
#[derive(Debug)]
pub struct ChannelDescriptor {
    /// Platform the channel lives on.
    pub platform: Platform,
    /// Human-readable channel identifier; becomes the per-channel
    /// directory name after sanitization.
    pub channel_name: String,
    /// Fully-qualified URL the helper understands.
    pub channel_url: String,
    /// Preferred quality token, e.g. `"720p"` or `"1080p60"`.
    pub quality: String,
    /// Per-channel probe interval override in seconds; falls back to
    /// [`MonitorConfig::check_interval`](crate::MonitorConfig) when `None`.
    pub check_interval_secs: Option<u64>,
    /// User intent to monitor this channel.
    active: AtomicBool,
}

impl ChannelDescriptor {
    /// Creates an active descriptor with no per-channel interval override.
    pub fn new(
        platform: Platform,
        channel_name: impl Into<String>,
        channel_url: impl Into<String>,
        quality: impl Into<String>,
    ) -> Self {
        Self {
            platform,
            channel_name: channel_name.into(),
            channel_url: channel_url.into(),
            quality: quality.into(),
            check_interval_secs: None,
            active: AtomicBool::new(true),
        }
    }

    /// Sets a per-channel probe interval in seconds.
    pub fn with_check_interval_secs(mut self, secs: u64) -> Self {
        self.check_interval_secs = Some(secs);
        self
    }

    /// Registry key: `"{platform}:{channelName}"`.
    ///
    /// The sole identity used for duplicate-start rejection.
    pub fn key(&self) -> String {
        format!("{}:{}", self.platform, self.channel_name)
    }

    /// Whether the user currently wants this channel monitored.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Flips the monitoring intent. Clearing it causes a running monitor to
    /// exit its loop on the next wake.
    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }
}
