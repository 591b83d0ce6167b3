//! Simple logging sink for debugging and demos.
//!
//! [`LogWriter`] prints status transitions and log lines to stdout in a
//! human-readable format. Primarily useful for development and headless
//! runs; a real embedder implements its own [`StatusSink`] and marshals
//! callbacks onto its UI thread.
//!
//! ## Output format
//! ```text
//! [status] channel=Twitch:alice -> Recording
//! [status] channel=Twitch:alice -> (cleared)
//! [10:42:07] [Twitch] Stream is live! Starting recording: alice
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use crate::channel::{ChannelDescriptor, ChannelStatus};

use super::StatusSink;

/// Simple stdout sink.
///
/// Not intended for production use — implement a custom [`StatusSink`] for
/// structured logging or UI delivery.
pub struct LogWriter;

#[async_trait]
impl StatusSink for LogWriter {
    async fn on_status_changed(&self, channel: &Arc<ChannelDescriptor>, status: ChannelStatus) {
        match status {
            ChannelStatus::Cleared => {
                println!("[status] channel={} -> (cleared)", channel.key());
            }
            other => {
                println!("[status] channel={} -> {}", channel.key(), other);
            }
        }
    }

    async fn on_log_message(&self, line: &str) {
        println!("{line}");
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
