//! Status sinks: the embedder-facing callback boundary.
//!
//! ```text
//! Event flow:
//!   Monitor ── publish(Event) ──► Bus ──► sink_listener (in Supervisor)
//!                                              │
//!                                              ▼
//!                                          SinkSet::emit
//!                                 ┌────────────┼────────────┐
//!                                 ▼            ▼            ▼
//!                            [queue S1]   [queue S2]   [queue SN]
//!                                 ▼            ▼            ▼
//!                       on_status_changed / on_log_message per sink
//! ```
//!
//! - [`StatusSink`] — trait the embedder implements (UI tables, log panes).
//! - [`SinkSet`] — per-sink bounded queue + worker fan-out.
//! - [`LogWriter`] — built-in stdout sink for demos and headless runs.

mod log;
mod set;
mod sink;

pub use log::LogWriter;
pub use set::SinkSet;
pub use sink::StatusSink;
