//! # keepvisor
//!
//! **Keepvisor** keeps a logical background task alive on a mobile OS that
//! aggressively kills background processes.
//!
//! The payload is deliberately trivial (a periodic heartbeat). The crate is about
//! the supervisor around it: detecting that the OS, or a vendor's own process
//! killer, has torn the unit down and restarting it deterministically, while
//! juggling three loosely synchronized liveness signals (a wake lock, a recurring
//! wake trigger and a user-visible indicator) without restart storms or leaks.
//!
//! Two execution modes are supported:
//! - [`TaskMode::OneTime`]: run until torn down, then stop.
//! - [`TaskMode::Persistent`]: survive teardown, process death and reboots.
//!
//! ## Architecture
//! ```text
//!  host commands           OS broadcasts (boot, wake, indicator removal)
//!       │                                │
//!       ▼                                ▼
//! ┌───────────────┐  activate   ┌──────────────────────────────────────────────┐
//! │CommandSurface │────────────►│ Supervisor                                   │
//! └───────────────┘             │  - LifecycleState (Stopped/Running/Destroying)│
//!                               │  - wake lock, pending restart                 │
//!        Inbox (mpsc) ─────────►│  - VendorPolicy (from the device vendor)      │
//!           ▲                   └───┬─────────┬──────────┬──────────────┬───────┘
//!           │ Signal                │         │          │              │
//!           │                       ▼         ▼          ▼              ▼
//!  ┌────────┴─────────┐      WakeScheduler IndicatorMgr StateStore   Restarter
//!  │ watchdog loops   │            │         │                        │
//!  │ heartbeat        │            ▼         ▼                        ▼
//!  │ indicator        │──► PresenceProbe   platform traits (AlarmService, Notifier,
//!  │ vendor (opt.)    │                    Introspector, UnitHost, PowerService, …)
//!  │ removals         │
//!  └──────────────────┘
//!
//!  every state change ──► Event ──► Bus ──► SubscriberSet ──► LogWriter / custom
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                          |
//! |-------------------|---------------------------------------------------------------|---------------------------------------------|
//! | **Supervision**   | Lifecycle state machine, self-heal, teardown, cancel           | [`Supervisor`], [`Signal`], [`Inbox`]       |
//! | **Wake**          | Single deferred wake trigger, exact with inexact fallback      | [`WakeScheduler`], [`WakeHandle`]           |
//! | **Indicator**     | Single user-visible liveness indicator                         | [`IndicatorManager`]                        |
//! | **Policies**      | Vendor table, restart bounds, retry spacing                    | [`VendorPolicy`], [`BackoffPolicy`]         |
//! | **Platform**      | OS facilities as traits, plus an in-memory simulator           | [`platform::Platform`]                      |
//! | **Storage**       | Durable "last mode was persistent" flag                        | [`StateStore`], [`FileStore`]               |
//! | **Commands**      | Host-facing facade with stable error codes                     | [`CommandSurface`], [`CommandError`]        |
//! | **Subscriber API**| Observe runtime events                                         | [`Subscribe`], [`Event`]                    |
//! | **Configuration** | Timing and capacity settings                                   | [`Config`]                                  |
//!
//! ## Optional features
//! - `logging` (default): exports [`LogWriter`], which renders events through `tracing`.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use keepvisor::{CommandSurface, Config, Supervisor, Subscribe};
//! use keepvisor::platform::{DeviceInfo, memory::MemoryPlatform};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mem = MemoryPlatform::new(DeviceInfo::new("Samsung", "com.example.app"));
//!
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(keepvisor::LogWriter::new())];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn Subscribe>> = Vec::new();
//!
//!     let sup = Supervisor::builder(Config::default(), mem.platform())
//!         .with_subscribers(subs)
//!         .build();
//!     mem.attach(sup.inbox());
//!
//!     let commands = CommandSurface::new(sup.clone());
//!     commands.schedule_task(60, true).await?;
//!     assert!(mem.scheduled_alarm().is_some());
//!
//!     commands.cancel_task().await?;
//!     Ok(())
//! }
//! ```
mod command;
mod config;
mod core;
mod error;
mod events;
mod indicator;
mod policies;
mod probe;
mod store;
mod subscribers;
mod tasks;
mod wake;

pub mod platform;

// ---- Public re-exports ----

pub use command::{CommandSurface, DEFAULT_INTERVAL_SECS, PermissionReport};
pub use config::{ALARM_INTERVAL, Config, DEFAULT_UNIT_NAME};
pub use crate::core::{Inbox, Signal, Supervisor, SupervisorBuilder, WatchdogKind};
pub use error::{CommandError, PlatformError, RuntimeError, StoreError};
pub use events::{Bus, Event, EventKind};
pub use indicator::{CHANNEL_ID, INDICATOR_ID, IndicatorManager};
pub use policies::{
    BackoffPolicy, Importance, JitterPolicy, PriorityHint, RestartAggressiveness, VENDOR_TABLE,
    VendorEntry, VendorPolicy, VendorSettings, policy_for,
};
pub use probe::PresenceProbe;
pub use store::{FileStore, MemoryStore, StateStore};
pub use subscribers::{Subscribe, SubscriberSet};
pub use tasks::{LifecycleState, TaskMode};
pub use wake::{ALARM_ID, WakeHandle, WakePrecision, WakeScheduler};

// Built-in tracing subscriber.
// Disable with: `--no-default-features`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
