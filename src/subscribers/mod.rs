//! # Event subscribers for the keepvisor runtime.
//!
//! This module provides the [`Subscribe`] trait and the fan-out used to deliver
//! runtime events broadcast through the [`Bus`](crate::events::Bus).
//!
//! ## Architecture
//! ```text
//! Supervisor/watchdogs ── publish(Event) ──► Bus ──► subscriber listener
//!                                                        │
//!                                                        ▼
//!                                                  SubscriberSet::emit
//!                                               ┌────────┼─────────┐
//!                                               ▼        ▼         ▼
//!                                           LogWriter  Metrics   Custom
//! ```
//!
//! ## Optional features
//! - `logging` (default): [`LogWriter`] renders events through `tracing`.

mod subscriber;
mod subscriber_set;

#[cfg(feature = "logging")]
mod log;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use subscriber::Subscribe;
pub use subscriber_set::SubscriberSet;
