//! # Platform seams.
//!
//! Every OS facility the supervisor touches sits behind one trait, so the core
//! logic runs unchanged against a real host binding or the in-process
//! [`MemoryPlatform`](memory::MemoryPlatform).
//!
//! | Trait                  | OS facility                                       |
//! |------------------------|---------------------------------------------------|
//! | [`AlarmService`]       | deferred wake triggers (exact / inexact)          |
//! | [`Notifier`]           | liveness indicator, channels, removal broadcasts  |
//! | [`Introspector`]       | usage statistics and running-unit registry        |
//! | [`UnitHost`]           | start/stop of the background unit, component flag |
//! | [`PowerService`]       | wake lock, battery optimization state             |
//! | [`SettingsNavigator`]  | settings screens                                  |
//!
//! All of them are bundled in the cloneable [`Platform`].
//!
//! ## Contract
//! - Calls may fail with [`PlatformError`]; none may panic.
//! - Wake triggers are delivered by the host as [`Signal::WakeFired`](crate::Signal::WakeFired)
//!   on the supervisor inbox, even when the previous process is gone.
//! - Indicator removals are announced on [`Notifier::removals`].

pub mod memory;

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::PlatformError;
use crate::policies::{Importance, PriorityHint, VendorSettings};
use crate::tasks::TaskMode;

/// Identity of the device and of the host application.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Device manufacturer as reported by the OS.
    pub manufacturer: String,
    /// Package name of the host application.
    pub package: String,
}

impl DeviceInfo {
    /// Creates device info.
    pub fn new(manufacturer: impl Into<String>, package: impl Into<String>) -> Self {
        Self {
            manufacturer: manufacturer.into(),
            package: package.into(),
        }
    }
}

/// Identifier of a deferred wake trigger (request code).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AlarmId(pub u32);

/// Identifier of an acquired wake lock.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WakeLockId(pub u64);

/// Notification channel carrying the liveness indicator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelSpec {
    /// Stable channel id.
    pub id: &'static str,
    /// User-visible channel name.
    pub name: &'static str,
    /// Channel description.
    pub description: &'static str,
    /// Importance (from the vendor policy).
    pub importance: Importance,
}

/// The single user-visible liveness record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Indicator {
    /// Fixed identifier.
    pub id: u32,
    /// Channel it is posted on.
    pub channel: &'static str,
    /// Title line.
    pub title: String,
    /// Body text.
    pub text: String,
    /// Ongoing (non-dismissable) flag.
    pub ongoing: bool,
    /// Mode the indicator describes.
    pub mode: TaskMode,
}

/// One usage record returned by the usage statistics service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UsageRecord {
    /// Package the record belongs to.
    pub package: String,
    /// Last time the package was in the foreground.
    pub last_used: SystemTime,
}

/// Settings screens the command surface can navigate to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SettingsScreen {
    /// Vendor autostart / battery manager.
    Vendor(VendorSettings),
    /// Request to exempt `package` from battery optimizations.
    IgnoreBatteryOptimization {
        /// Host package.
        package: String,
    },
    /// Generic battery optimization list.
    BatteryOptimizationList,
}

/// Deferred wake triggers.
#[async_trait]
pub trait AlarmService: Send + Sync + 'static {
    /// Whether exact scheduling is permitted.
    ///
    /// `None` means the platform has no such gate (exact is always allowed).
    async fn can_schedule_exact(&self) -> Option<bool>;

    /// Schedules an exact, allow-while-idle trigger, replacing any trigger with the same id.
    async fn set_exact(&self, id: AlarmId, deadline: SystemTime) -> Result<(), PlatformError>;

    /// Schedules a best-effort trigger, replacing any trigger with the same id.
    async fn set_inexact(&self, id: AlarmId, deadline: SystemTime) -> Result<(), PlatformError>;

    /// Cancels the trigger with this id; no-op if none is armed.
    async fn cancel(&self, id: AlarmId) -> Result<(), PlatformError>;
}

/// Liveness indicator facility.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    /// Creates (or updates) the channel; idempotent.
    async fn ensure_channel(&self, channel: &ChannelSpec) -> Result<(), PlatformError>;

    /// Posts the indicator, replacing any indicator with the same id.
    async fn post(&self, indicator: &Indicator) -> Result<(), PlatformError>;

    /// Ids of the indicators currently shown.
    async fn active_ids(&self) -> Result<Vec<u32>, PlatformError>;

    /// Removes the indicator with this id; no-op if absent.
    async fn remove(&self, id: u32) -> Result<(), PlatformError>;

    /// Stream of ids removed by anyone other than [`Notifier::remove`].
    fn removals(&self) -> broadcast::Receiver<u32>;

    /// Whether posting notifications is permitted (`None` = no such gate).
    async fn permission_granted(&self) -> Option<bool>;
}

/// Process and usage introspection.
#[async_trait]
pub trait Introspector: Send + Sync + 'static {
    /// Usage records within `lookback` from now.
    async fn recent_usage(&self, lookback: Duration) -> Result<Vec<UsageRecord>, PlatformError>;

    /// Identities (`{package}/{unit}`) of units currently registered as running.
    async fn running_units(&self) -> Result<Vec<String>, PlatformError>;
}

/// Lifecycle of the OS-managed background unit.
#[async_trait]
pub trait UnitHost: Send + Sync + 'static {
    /// Asks the OS to start (or re-deliver a start to) the unit in `mode`.
    async fn start_unit(&self, mode: TaskMode) -> Result<(), PlatformError>;

    /// Asks the OS to stop the unit; no-op if it is not running.
    async fn stop_unit(&self) -> Result<(), PlatformError>;

    /// Sets the OS-level "component enabled" flag of the unit.
    async fn set_component_enabled(&self, enabled: bool) -> Result<(), PlatformError>;

    /// Applies a scheduling priority hint to the unit's carriers.
    fn apply_priority(&self, hint: PriorityHint);
}

/// Power management.
#[async_trait]
pub trait PowerService: Send + Sync + 'static {
    /// Acquires a partial wake lock (`timeout = None` → held until released).
    async fn acquire_wake_lock(
        &self,
        tag: &str,
        timeout: Option<Duration>,
    ) -> Result<WakeLockId, PlatformError>;

    /// Releases a wake lock; releasing an expired lock is a no-op.
    async fn release_wake_lock(&self, id: WakeLockId);

    /// Whether the host package is exempt from battery optimizations.
    async fn is_ignoring_battery_optimizations(&self) -> bool;
}

/// Settings screen launcher.
#[async_trait]
pub trait SettingsNavigator: Send + Sync + 'static {
    /// Opens the screen; `PermissionDenied`/`Unavailable` if it has no handler.
    async fn open(&self, screen: &SettingsScreen) -> Result<(), PlatformError>;
}

/// Bundle of platform facilities handed to the supervisor.
#[derive(Clone)]
pub struct Platform {
    /// Device identity.
    pub device: DeviceInfo,
    /// Wake triggers.
    pub alarms: Arc<dyn AlarmService>,
    /// Liveness indicator.
    pub notifier: Arc<dyn Notifier>,
    /// Introspection.
    pub introspector: Arc<dyn Introspector>,
    /// Unit lifecycle.
    pub units: Arc<dyn UnitHost>,
    /// Power management.
    pub power: Arc<dyn PowerService>,
    /// Settings navigation.
    pub settings: Arc<dyn SettingsNavigator>,
}
