//! Quality-chain construction with automatic downward fallback.
//!
//! The helper accepts a comma-joined list of quality tokens and resolves the
//! first one the stream actually offers. [`quality_chain`] expands a single
//! requested token (e.g. `"720p"` or `"1080p60"`) into a deterministic chain
//! that walks the quality ladder downwards and always terminates in `worst`,
//! so recording starts even when the preferred quality is absent.
//!
//! For a fixed `(quality, record_high_fps)` input the chain string is
//! byte-identical across calls.

/// Quality ladder from best to worst base quality.
const BASE_QUALITY_ORDER: [&str; 7] = ["4k", "1080p", "720p", "480p", "360p", "240p", "144p"];

/// FPS suffixes tried per level when high-FPS recording is preferred.
/// The bare token sits between 50 and 30 so a plain `720p` stream still
/// beats the low-fps variants.
const HIGH_FPS_SUFFIXES: [&str; 6] = ["60", "50", "", "30", "25", "24"];

/// FPS suffixes tried per level when high-FPS recording is off.
const STANDARD_FPS_SUFFIXES: [&str; 4] = ["", "30", "25", "24"];

/// Builds the fallback chain for a requested quality token.
///
/// 1. Trailing digits are stripped to obtain the base quality
///    (`"720p60"` → `"720p"`).
/// 2. If the base is not on the ladder the chain is `"<requested>,worst"`.
/// 3. Otherwise FPS variants are emitted for the base's level and every
///    level below it, then `worst` is appended.
///
/// # Example
/// ```
/// use streamvisor::quality_chain;
///
/// let chain = quality_chain("144p", false);
/// assert_eq!(chain, "144p,144p30,144p25,144p24,worst");
///
/// assert_eq!(quality_chain("medium", false), "medium,worst");
/// ```
pub fn quality_chain(requested: &str, record_high_fps: bool) -> String {
    let base = requested.trim_end_matches(|c: char| c.is_ascii_digit());

    let Some(start) = BASE_QUALITY_ORDER.iter().position(|&q| q == base) else {
        return format!("{requested},worst");
    };

    let suffixes: &[&str] = if record_high_fps {
        &HIGH_FPS_SUFFIXES
    } else {
        &STANDARD_FPS_SUFFIXES
    };

    let mut chain = String::new();
    for level in &BASE_QUALITY_ORDER[start..] {
        for suffix in suffixes {
            if !chain.is_empty() {
                chain.push(',');
            }
            chain.push_str(level);
            chain.push_str(suffix);
        }
    }
    chain.push_str(",worst");
    chain
}
