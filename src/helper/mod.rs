//! The stream-capture helper boundary.
//!
//! Everything that touches the external helper executable lives here:
//! - [`command`] — probe and recorder invocations, output draining, quality
//!   announcement scanning;
//! - [`kill_tree`] — forced termination of a recorder's process subtree
//!   (unix only; elsewhere the stop path falls back to killing the root via
//!   the child handle).

pub(crate) mod command;
#[cfg(unix)]
pub(crate) mod kill_tree;
