//! # Global runtime configuration.
//!
//! Provides [`Config`], centralized timing and capacity settings for the supervisor.
//!
//! Per-vendor tuning (vendor watchdog period, restart attempt bound, indicator
//! importance) lives in [`VendorPolicy`](crate::VendorPolicy); everything here is
//! vendor-independent.
//!
//! ## Sentinel values
//! - `grace = 0s` → watchdog loops are aborted immediately on teardown
//! - `wake_lock_timeout = 0s` → the wake lock is acquired without a timeout

use std::time::Duration;

use crate::policies::BackoffPolicy;

/// Default wake interval (`ALARM_INTERVAL`).
pub const ALARM_INTERVAL: Duration = Duration::from_secs(60);

/// Default name of the supervised unit.
pub const DEFAULT_UNIT_NAME: &str = "BackgroundUnit";

/// Global configuration for the supervisor runtime.
///
/// ## Field semantics
/// - `alarm_interval`: distance of the wake trigger armed by a Persistent activation
/// - `heartbeat_period`: heartbeat loop cadence
/// - `indicator_period`: indicator watchdog cadence
/// - `restart_grace`: delay between teardown and the restart request
/// - `indicator_retry_delay`: delay before re-activating after an indicator publish failure
/// - `restart_backoff`: spacing between bounded unit start attempts
/// - `wake_lock_timeout`: safety timeout passed with each wake-lock acquisition
/// - `grace`: how long teardown waits for watchdog loops to exit
/// - `foreground_lookback`: usage window for the foreground probe
/// - `inbox_capacity` / `bus_capacity`: channel sizes (min 1)
/// - `unit_name` / `wake_lock_tag`: identities registered with the OS
#[derive(Clone, Debug)]
pub struct Config {
    /// Wake interval for Persistent re-arms.
    pub alarm_interval: Duration,

    /// Heartbeat loop period.
    pub heartbeat_period: Duration,

    /// Indicator watchdog loop period.
    pub indicator_period: Duration,

    /// Grace delay before a post-teardown restart request.
    ///
    /// Prevents a thrash loop where the OS kill and the restart race each other.
    pub restart_grace: Duration,

    /// Delay before a Persistent activation retry after the OS refused the indicator.
    pub indicator_retry_delay: Duration,

    /// Delay policy between unit start attempts.
    pub restart_backoff: BackoffPolicy,

    /// Timeout attached to wake-lock acquisition.
    pub wake_lock_timeout: Duration,

    /// Maximum time teardown waits for the watchdog loops to observe cancellation.
    pub grace: Duration,

    /// Lookback window for foreground detection.
    pub foreground_lookback: Duration,

    /// Capacity of the supervisor inbox.
    pub inbox_capacity: usize,

    /// Capacity of the event bus ring buffer.
    pub bus_capacity: usize,

    /// Name of the supervised unit, combined with the package into the unit identity.
    pub unit_name: String,

    /// Tag used for the wake lock.
    pub wake_lock_tag: String,
}

impl Config {
    /// Wake-lock timeout as an `Option` (`None` = no timeout).
    #[inline]
    pub fn wake_lock_timeout(&self) -> Option<Duration> {
        if self.wake_lock_timeout == Duration::ZERO {
            None
        } else {
            Some(self.wake_lock_timeout)
        }
    }

    /// Inbox capacity clamped to a minimum of 1.
    #[inline]
    pub fn inbox_capacity_clamped(&self) -> usize {
        self.inbox_capacity.max(1)
    }

    /// Bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `alarm_interval = 60s`
    /// - `heartbeat_period = 60s`, `indicator_period = 5s`
    /// - `restart_grace = 1s`, `indicator_retry_delay = 5s`
    /// - `restart_backoff = BackoffPolicy::default()`
    /// - `wake_lock_timeout = 10min`
    /// - `grace = 5s`
    /// - `foreground_lookback = 60s`
    /// - `inbox_capacity = 64`, `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            alarm_interval: ALARM_INTERVAL,
            heartbeat_period: Duration::from_secs(60),
            indicator_period: Duration::from_secs(5),
            restart_grace: Duration::from_secs(1),
            indicator_retry_delay: Duration::from_secs(5),
            restart_backoff: BackoffPolicy::default(),
            wake_lock_timeout: Duration::from_secs(10 * 60),
            grace: Duration::from_secs(5),
            foreground_lookback: Duration::from_secs(60),
            inbox_capacity: 64,
            bus_capacity: 1024,
            unit_name: DEFAULT_UNIT_NAME.to_string(),
            wake_lock_tag: "keepvisor::WakeLock".to_string(),
        }
    }
}
