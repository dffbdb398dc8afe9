//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to runtime events emitted by the supervisor, its watchdog
//! loops, the wake scheduler and the restarter.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Supervisor`, watchdog loops, `WakeScheduler`, `Restarter`,
//!   `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the subscriber listener spawned by the builder (fans out to
//!   `SubscriberSet`) and any receiver obtained from `Supervisor::events`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
