//! Runtime core: lifecycle state machine and its helpers.
//!
//! - [`supervisor`]: the [`Supervisor`] and its operations;
//! - [`builder`]: [`SupervisorBuilder`];
//! - [`signal`]: [`Signal`] and the [`Inbox`] it travels on;
//! - [`watchdog`]: cancellable periodic liveness loops;
//! - [`restart`]: bounded unit start requests;
//! - [`shutdown`]: process termination signals.

mod builder;
mod restart;
mod shutdown;
mod signal;
mod supervisor;
mod watchdog;

pub use builder::SupervisorBuilder;
pub use signal::{Inbox, Signal, WatchdogKind};
pub use supervisor::Supervisor;
