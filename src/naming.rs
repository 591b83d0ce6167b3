//! Output filename and directory discipline.
//!
//! Recordings land under `{output_directory}/{sanitized channel name}/` with
//! filenames of the form `{platform}_{yyMMddHHmmss}_{channelName}_stream.ts`.
//! Every segment is sanitized independently so arbitrary channel names can
//! never escape the output directory or produce unportable paths.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

/// Fixed stream-title segment of the output filename.
///
/// The helper does not expose the broadcast title at launch time, so the
/// segment is a constant placeholder.
const STREAM_SEGMENT: &str = "stream";

/// Sanitizes one filename segment.
///
/// Any character outside `[A-Za-z0-9_]` becomes `_`, runs of underscores
/// collapse to one, and surrounding whitespace is trimmed first. A blank
/// input yields `"unknown"`; an input of pure punctuation yields `"_"`.
pub fn sanitize_segment(segment: &str) -> String {
    let trimmed = segment.trim();
    if trimmed.is_empty() {
        return "unknown".to_string();
    }

    let mut out = String::with_capacity(trimmed.len());
    for c in trimmed.chars() {
        let c = if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }
    out
}

/// Composes the output filename for a recording started at `at`.
///
/// Pattern: `{platform}_{yyMMddHHmmss}_{channelName}_stream.ts`, each
/// segment sanitized independently.
pub fn output_filename(platform: &str, channel_name: &str, at: DateTime<Local>) -> String {
    format!(
        "{}_{}_{}_{}.ts",
        sanitize_segment(platform),
        at.format("%y%m%d%H%M%S"),
        sanitize_segment(channel_name),
        sanitize_segment(STREAM_SEGMENT),
    )
}

/// Per-channel recording directory under `base`.
///
/// Purely a path computation; creation (and the fallback to `base` on
/// failure) is the monitor's concern.
pub fn channel_dir(base: &Path, channel_name: &str) -> PathBuf {
    base.join(sanitize_segment(channel_name))
}
