//! Liveness and retry policies.
//!
//! This module groups the knobs that control **how hard** the supervisor fights
//! to keep the unit alive and **how long** it waits between restart attempts.
//!
//! ## Contents
//! - [`VendorPolicy`] per-vendor tuning, looked up with [`policy_for`]
//! - [`RestartAggressiveness`] bound on back-to-back unit start attempts
//! - [`BackoffPolicy`] delays between those attempts (first / factor / max + jitter)
//! - [`JitterPolicy`] randomization to avoid synchronized retries
//!
//! ## Quick wiring
//! ```text
//! DeviceInfo.manufacturer ──► policy_for() ──► VendorPolicy (fixed for the supervisor's life)
//!      ├─► priority       → UnitHost::apply_priority on activation
//!      ├─► extra_watchdog → vendor watchdog loop on/off + period
//!      ├─► importance     → indicator ChannelSpec
//!      ├─► restart        → Restarter attempt bound (spaced by Config::restart_backoff)
//!      └─► settings       → CommandSurface battery settings navigation
//! ```

mod backoff;
mod jitter;
mod restart;
mod vendor;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
pub use restart::RestartAggressiveness;
pub use vendor::{
    Importance, PriorityHint, VENDOR_TABLE, VendorEntry, VendorPolicy, VendorSettings, policy_for,
};
