//! Runtime events: types and broadcast bus.
//!
//! Groups the event **data model** and the **bus** used to publish and
//! subscribe to events emitted by the supervisor and channel monitors.
//!
//! - [`EventKind`], [`Event`] — classification and payload metadata
//! - [`Bus`] — thin wrapper over `tokio::sync::broadcast`
//!
//! Publishers: `Supervisor`, `ChannelMonitor`, recorder tasks.
//! Consumers: the supervisor's sink listener (fans out to
//! [`SinkSet`](crate::sinks::SinkSet)) and any embedder/test receiver
//! obtained via [`Supervisor::subscribe_events`](crate::Supervisor::subscribe_events).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
