//! # In-process platform.
//!
//! [`MemoryPlatform`] implements every platform trait against plain in-memory
//! state. It backs the demos and the test-suite, and doubles as a simulator for
//! host bindings: knobs on the struct play the part of the OS (revoking the exact
//! alarm permission, killing the unit, dismissing the indicator, refusing starts).
//!
//! ```text
//!                 ┌────────────── MemoryPlatform ──────────────┐
//! Supervisor ───► │ alarm slot │ indicators │ unit registry │ … │
//!                 └──────┬───────────┬───────────────────────────┘
//!        fire_alarm() ───┘           └─── dismiss(id) ──► removals()
//!        (posts Signal::WakeFired to the attached inbox)
//! ```

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::{
    AlarmId, AlarmService, ChannelSpec, DeviceInfo, Indicator, Introspector, Notifier, Platform,
    PowerService, SettingsNavigator, SettingsScreen, UnitHost, UsageRecord, WakeLockId,
};
use crate::config::DEFAULT_UNIT_NAME;
use crate::core::{Inbox, Signal};
use crate::error::PlatformError;
use crate::policies::PriorityHint;
use crate::tasks::TaskMode;

/// Package reported as foreground when the host app is not.
const LAUNCHER_PACKAGE: &str = "com.android.launcher";

/// A wake trigger currently held by the simulated alarm service.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScheduledAlarm {
    /// Request code.
    pub id: AlarmId,
    /// Requested deadline.
    pub deadline: SystemTime,
    /// True if scheduled through the exact path.
    pub exact: bool,
}

#[derive(Default)]
struct State {
    exact_gate: Option<bool>,
    exact_revoked: bool,
    inexact_rejected: bool,
    alarm: Option<ScheduledAlarm>,

    channels: Vec<ChannelSpec>,
    indicators: BTreeMap<u32, Indicator>,
    post_rejections: u32,
    notification_permission: Option<bool>,

    usage: Vec<UsageRecord>,
    introspection_fails: bool,

    unit_running: bool,
    start_rejections: u32,
    start_requests: Vec<TaskMode>,
    stop_requests: u32,
    component_enabled: bool,
    component_reasserts: u32,
    priority: Option<PriorityHint>,

    next_lock: u64,
    held_locks: HashSet<u64>,
    locks_acquired: u64,
    locks_released: u64,
    lock_rejected: bool,
    battery_exempt: bool,

    refused_screens: Vec<SettingsScreen>,
    opened_screens: Vec<SettingsScreen>,

    inbox: Option<Inbox>,
}

/// In-memory implementation of every platform trait.
pub struct MemoryPlatform {
    device: DeviceInfo,
    unit_identity: String,
    state: Mutex<State>,
    removals: broadcast::Sender<u32>,
}

impl MemoryPlatform {
    /// Creates a platform for `device` whose unit is named [`DEFAULT_UNIT_NAME`].
    pub fn new(device: DeviceInfo) -> Arc<Self> {
        Self::with_unit_name(device, DEFAULT_UNIT_NAME)
    }

    /// Creates a platform whose unit identity is `{package}/{unit_name}`.
    pub fn with_unit_name(device: DeviceInfo, unit_name: &str) -> Arc<Self> {
        let (removals, _rx) = broadcast::channel(16);
        let unit_identity = format!("{}/{}", device.package, unit_name);
        Arc::new(Self {
            device,
            unit_identity,
            state: Mutex::new(State {
                component_enabled: true,
                ..State::default()
            }),
            removals,
        })
    }

    /// Bundles this instance as a [`Platform`].
    pub fn platform(self: &Arc<Self>) -> Platform {
        Platform {
            device: self.device.clone(),
            alarms: self.clone(),
            notifier: self.clone(),
            introspector: self.clone(),
            units: self.clone(),
            power: self.clone(),
            settings: self.clone(),
        }
    }

    /// Routes OS broadcasts (wake triggers) to a supervisor inbox.
    pub fn attach(&self, inbox: Inbox) {
        self.state().inbox = Some(inbox);
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ---- alarms ----

    /// Sets the exact-alarm permission gate (`None` = platform without the gate).
    pub fn set_exact_gate(&self, gate: Option<bool>) {
        self.state().exact_gate = gate;
    }

    /// Makes `set_exact` fail with `PermissionDenied` even though the gate reads granted.
    pub fn revoke_exact_at_runtime(&self, revoked: bool) {
        self.state().exact_revoked = revoked;
    }

    /// Makes `set_inexact` fail.
    pub fn reject_inexact(&self, rejected: bool) {
        self.state().inexact_rejected = rejected;
    }

    /// The trigger currently armed, if any.
    pub fn scheduled_alarm(&self) -> Option<ScheduledAlarm> {
        self.state().alarm
    }

    /// Fires the armed trigger: clears it and posts [`Signal::WakeFired`] to the attached inbox.
    ///
    /// Returns `false` if nothing was armed.
    pub fn fire_alarm(&self) -> bool {
        let (fired, inbox) = {
            let mut st = self.state();
            (st.alarm.take().is_some(), st.inbox.clone())
        };
        if fired {
            if let Some(inbox) = inbox {
                inbox.post(Signal::WakeFired);
            }
        }
        fired
    }

    // ---- indicator ----

    /// Indicators currently shown.
    pub fn indicators(&self) -> Vec<Indicator> {
        self.state().indicators.values().cloned().collect()
    }

    /// Channels created so far.
    pub fn channels(&self) -> Vec<ChannelSpec> {
        self.state().channels.clone()
    }

    /// Simulates the user or the OS removing an indicator.
    pub fn dismiss(&self, id: u32) {
        let removed = self.state().indicators.remove(&id).is_some();
        if removed {
            let _ = self.removals.send(id);
        }
    }

    /// Makes the next `n` posts fail with `IndicatorRejected`.
    pub fn reject_next_posts(&self, n: u32) {
        self.state().post_rejections = n;
    }

    /// Sets the notification permission answer.
    pub fn set_notification_permission(&self, granted: Option<bool>) {
        self.state().notification_permission = granted;
    }

    // ---- introspection ----

    /// Records the host package (or the launcher) as the latest foreground app.
    pub fn set_foreground(&self, foreground: bool) {
        let package = if foreground {
            self.device.package.clone()
        } else {
            LAUNCHER_PACKAGE.to_string()
        };
        self.state().usage.push(UsageRecord {
            package,
            last_used: SystemTime::now(),
        });
    }

    /// Makes every introspection call fail.
    pub fn fail_introspection(&self, fails: bool) {
        self.state().introspection_fails = fails;
    }

    // ---- unit ----

    /// Simulates the OS or a vendor killer removing the unit without notice.
    pub fn kill_unit(&self) {
        self.state().unit_running = false;
    }

    /// Whether the unit is registered as running.
    pub fn is_unit_running(&self) -> bool {
        self.state().unit_running
    }

    /// Makes the next `n` start requests fail with `StartRejected`.
    pub fn reject_next_starts(&self, n: u32) {
        self.state().start_rejections = n;
    }

    /// Accepted start requests, oldest first.
    pub fn start_requests(&self) -> Vec<TaskMode> {
        self.state().start_requests.clone()
    }

    /// Number of stop requests.
    pub fn stop_requests(&self) -> u32 {
        self.state().stop_requests
    }

    /// Simulates a vendor disabling the unit component.
    pub fn disable_component(&self) {
        self.state().component_enabled = false;
    }

    /// Whether the unit component is enabled.
    pub fn is_component_enabled(&self) -> bool {
        self.state().component_enabled
    }

    /// Number of `set_component_enabled(true)` calls.
    pub fn component_reasserts(&self) -> u32 {
        self.state().component_reasserts
    }

    /// Last priority hint applied.
    pub fn priority(&self) -> Option<PriorityHint> {
        self.state().priority
    }

    // ---- power ----

    /// Total wake-lock acquisitions.
    pub fn wake_locks_acquired(&self) -> u64 {
        self.state().locks_acquired
    }

    /// Total wake-lock releases.
    pub fn wake_locks_released(&self) -> u64 {
        self.state().locks_released
    }

    /// Number of wake locks currently held.
    pub fn wake_locks_held(&self) -> usize {
        self.state().held_locks.len()
    }

    /// Makes wake-lock acquisition fail.
    pub fn reject_wake_lock(&self, rejected: bool) {
        self.state().lock_rejected = rejected;
    }

    /// Sets the battery optimization exemption.
    pub fn set_battery_exempt(&self, exempt: bool) {
        self.state().battery_exempt = exempt;
    }

    // ---- settings ----

    /// Makes `screen` behave as if it had no handler.
    pub fn refuse_screen(&self, screen: SettingsScreen) {
        self.state().refused_screens.push(screen);
    }

    /// Screens opened so far.
    pub fn opened_screens(&self) -> Vec<SettingsScreen> {
        self.state().opened_screens.clone()
    }
}

#[async_trait]
impl AlarmService for MemoryPlatform {
    async fn can_schedule_exact(&self) -> Option<bool> {
        self.state().exact_gate
    }

    async fn set_exact(&self, id: AlarmId, deadline: SystemTime) -> Result<(), PlatformError> {
        let mut st = self.state();
        if st.exact_gate == Some(false) || st.exact_revoked {
            return Err(PlatformError::PermissionDenied {
                what: "exact alarm".into(),
            });
        }
        st.alarm = Some(ScheduledAlarm {
            id,
            deadline,
            exact: true,
        });
        Ok(())
    }

    async fn set_inexact(&self, id: AlarmId, deadline: SystemTime) -> Result<(), PlatformError> {
        let mut st = self.state();
        if st.inexact_rejected {
            return Err(PlatformError::Unavailable {
                what: "alarm service".into(),
            });
        }
        st.alarm = Some(ScheduledAlarm {
            id,
            deadline,
            exact: false,
        });
        Ok(())
    }

    async fn cancel(&self, id: AlarmId) -> Result<(), PlatformError> {
        let mut st = self.state();
        if st.alarm.is_some_and(|a| a.id == id) {
            st.alarm = None;
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for MemoryPlatform {
    async fn ensure_channel(&self, channel: &ChannelSpec) -> Result<(), PlatformError> {
        let mut st = self.state();
        st.channels.retain(|c| c.id != channel.id);
        st.channels.push(channel.clone());
        Ok(())
    }

    async fn post(&self, indicator: &Indicator) -> Result<(), PlatformError> {
        let mut st = self.state();
        if st.post_rejections > 0 {
            st.post_rejections -= 1;
            return Err(PlatformError::IndicatorRejected {
                reason: "unit not eligible for foreground".into(),
            });
        }
        st.indicators.insert(indicator.id, indicator.clone());
        Ok(())
    }

    async fn active_ids(&self) -> Result<Vec<u32>, PlatformError> {
        Ok(self.state().indicators.keys().copied().collect())
    }

    async fn remove(&self, id: u32) -> Result<(), PlatformError> {
        self.state().indicators.remove(&id);
        Ok(())
    }

    fn removals(&self) -> broadcast::Receiver<u32> {
        self.removals.subscribe()
    }

    async fn permission_granted(&self) -> Option<bool> {
        self.state().notification_permission
    }
}

#[async_trait]
impl Introspector for MemoryPlatform {
    async fn recent_usage(&self, lookback: Duration) -> Result<Vec<UsageRecord>, PlatformError> {
        let st = self.state();
        if st.introspection_fails {
            return Err(PlatformError::ProbeFailed {
                reason: "usage stats unavailable".into(),
            });
        }
        let since = SystemTime::now()
            .checked_sub(lookback)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        Ok(st
            .usage
            .iter()
            .filter(|r| r.last_used >= since)
            .cloned()
            .collect())
    }

    async fn running_units(&self) -> Result<Vec<String>, PlatformError> {
        let st = self.state();
        if st.introspection_fails {
            return Err(PlatformError::ProbeFailed {
                reason: "activity manager unavailable".into(),
            });
        }
        Ok(if st.unit_running {
            vec![self.unit_identity.clone()]
        } else {
            Vec::new()
        })
    }
}

#[async_trait]
impl UnitHost for MemoryPlatform {
    async fn start_unit(&self, mode: TaskMode) -> Result<(), PlatformError> {
        let mut st = self.state();
        if st.start_rejections > 0 {
            st.start_rejections -= 1;
            return Err(PlatformError::StartRejected {
                reason: "background start not allowed".into(),
            });
        }
        st.unit_running = true;
        st.start_requests.push(mode);
        Ok(())
    }

    async fn stop_unit(&self) -> Result<(), PlatformError> {
        let mut st = self.state();
        st.unit_running = false;
        st.stop_requests += 1;
        Ok(())
    }

    async fn set_component_enabled(&self, enabled: bool) -> Result<(), PlatformError> {
        let mut st = self.state();
        st.component_enabled = enabled;
        if enabled {
            st.component_reasserts += 1;
        }
        Ok(())
    }

    fn apply_priority(&self, hint: PriorityHint) {
        self.state().priority = Some(hint);
    }
}

#[async_trait]
impl PowerService for MemoryPlatform {
    async fn acquire_wake_lock(
        &self,
        _tag: &str,
        _timeout: Option<Duration>,
    ) -> Result<WakeLockId, PlatformError> {
        let mut st = self.state();
        if st.lock_rejected {
            return Err(PlatformError::PermissionDenied {
                what: "wake lock".into(),
            });
        }
        st.next_lock += 1;
        let id = st.next_lock;
        st.held_locks.insert(id);
        st.locks_acquired += 1;
        Ok(WakeLockId(id))
    }

    async fn release_wake_lock(&self, id: WakeLockId) {
        let mut st = self.state();
        if st.held_locks.remove(&id.0) {
            st.locks_released += 1;
        }
    }

    async fn is_ignoring_battery_optimizations(&self) -> bool {
        self.state().battery_exempt
    }
}

#[async_trait]
impl SettingsNavigator for MemoryPlatform {
    async fn open(&self, screen: &SettingsScreen) -> Result<(), PlatformError> {
        let mut st = self.state();
        if st.refused_screens.contains(screen) {
            return Err(PlatformError::Unavailable {
                what: format!("{screen:?}"),
            });
        }
        st.opened_screens.push(screen.clone());
        Ok(())
    }
}
