//! # Supervisor: lifecycle state machine and self-healing.
//!
//! The [`Supervisor`] owns the lifecycle state, the wake lock, the watchdog loops
//! and the pending restart request. Every transition goes through one of its
//! operations while holding the state mutex; everything asynchronous reaches it
//! as a [`Signal`] on the inbox.
//!
//! ## State machine
//! ```text
//!            activate(mode)                    teardown()
//!  Stopped ───────────────────► Running ─────────────────────► Destroying
//!     ▲                           ▲  │ activate: refresh only       │
//!     │                           │  └──────────────────────────    │
//!     │       persisted OneTime   │   persisted Persistent:         │
//!     └───────────────────────────┼── re-arm wake, restart after ◄──┘
//!                                 │   restart_grace, re-activate
//!                                 └─────────────────────────────────┘
//! ```
//!
//! ## Activation (from Stopped / Destroying)
//! ```text
//! abort pending restart ─► acquire wake lock ─► persist mode ─► apply priority hint
//!   ─► publish indicator ─► Running ─► start watchdogs ─► [Persistent] arm wake
//! ```
//!
//! ## Teardown (from Running)
//! ```text
//! Destroying ─► stop watchdogs (join within grace) ─► release wake lock ─► withdraw indicator
//!   ├─ persisted Persistent ─► arm wake, spawn restart (sleep restart_grace, start unit, Activate)
//!   └─ otherwise            ─► cancel wake ─► Stopped
//! ```
//!
//! Delayed re-activations (restart after teardown, indicator retry) carry the
//! activation epoch they were scheduled under. [`Supervisor::cancel`] bumps the
//! epoch, so a re-activation already queued in the inbox cannot undo it.
//!
//! ## Example
//! ```rust
//! use keepvisor::{Config, Supervisor, TaskMode, LifecycleState};
//! use keepvisor::platform::{DeviceInfo, memory::MemoryPlatform};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), keepvisor::RuntimeError> {
//!     let mem = MemoryPlatform::new(DeviceInfo::new("Google", "com.example.app"));
//!     let sup = Supervisor::builder(Config::default(), mem.platform()).build();
//!
//!     sup.activate(TaskMode::OneTime, false).await?;
//!     assert_eq!(sup.state().await, LifecycleState::Running);
//!
//!     sup.cancel().await?;
//!     assert_eq!(sup.state().await, LifecycleState::Stopped);
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::restart::Restarter;
use super::shutdown;
use super::signal::{Inbox, Signal, WatchdogKind};
use super::watchdog::{Periods, WatchdogCtx, Watchdogs};
use crate::config::Config;
use crate::error::{PlatformError, RuntimeError};
use crate::events::{Bus, Event, EventKind};
use crate::indicator::IndicatorManager;
use crate::platform::{Platform, WakeLockId};
use crate::policies::VendorPolicy;
use crate::probe::PresenceProbe;
use crate::store::StateStore;
use crate::subscribers::SubscriberSet;
use crate::tasks::{LifecycleState, TaskMode};
use crate::wake::WakeScheduler;

/// State guarded by the supervisor mutex.
struct Inner {
    state: LifecycleState,
    mode: TaskMode,
    /// Set by cancel: the next teardown must not restart.
    forced_one_time: bool,
    /// Bumped by cancel. Delayed re-activations from an older epoch are dropped.
    epoch: u64,
    wake_lock: Option<WakeLockId>,
    watchdogs: Option<Watchdogs>,
    pending_restart: Option<JoinHandle<()>>,
    pending_retry: Option<JoinHandle<()>>,
    wake_interval: Duration,
}

/// Keeps the background unit alive.
pub struct Supervisor {
    cfg: Config,
    policy: VendorPolicy,
    platform: Platform,
    bus: Bus,
    subs: Arc<SubscriberSet>,
    store: Arc<dyn StateStore>,
    wake: WakeScheduler,
    indicator: Arc<IndicatorManager>,
    probe: Arc<PresenceProbe>,
    restarter: Restarter,
    inner: Mutex<Inner>,
    mode_tx: watch::Sender<TaskMode>,
    inbox: Inbox,
    inbox_rx: Mutex<Option<mpsc::Receiver<Signal>>>,
}

impl Supervisor {
    pub(crate) fn new_internal(
        cfg: Config,
        policy: VendorPolicy,
        platform: Platform,
        bus: Bus,
        subs: Arc<SubscriberSet>,
        store: Arc<dyn StateStore>,
    ) -> Self {
        let (inbox, inbox_rx) = Inbox::channel(cfg.inbox_capacity_clamped(), bus.clone());
        let wake = WakeScheduler::new(platform.alarms.clone(), bus.clone());
        let indicator = Arc::new(IndicatorManager::new(
            platform.notifier.clone(),
            policy.importance,
        ));
        let probe = Arc::new(PresenceProbe::new(
            platform.introspector.clone(),
            &platform.device.package,
            &cfg.unit_name,
            cfg.foreground_lookback,
        ));
        let restarter = Restarter::new(
            platform.units.clone(),
            bus.clone(),
            cfg.restart_backoff,
            policy.restart.max_attempts(),
        );
        let (mode_tx, _) = watch::channel(TaskMode::OneTime);

        Self {
            inner: Mutex::new(Inner {
                state: LifecycleState::Stopped,
                mode: TaskMode::OneTime,
                forced_one_time: false,
                epoch: 0,
                wake_lock: None,
                watchdogs: None,
                pending_restart: None,
                pending_retry: None,
                wake_interval: cfg.alarm_interval,
            }),
            cfg,
            policy,
            platform,
            bus,
            subs,
            store,
            wake,
            indicator,
            probe,
            restarter,
            mode_tx,
            inbox,
            inbox_rx: Mutex::new(Some(inbox_rx)),
        }
    }

    // ---- accessors ----

    /// Current lifecycle state.
    pub async fn state(&self) -> LifecycleState {
        self.inner.lock().await.state
    }

    /// Mode of the current (or last) activation.
    pub async fn mode(&self) -> TaskMode {
        self.inner.lock().await.mode
    }

    /// Vendor policy derived from the device manufacturer.
    pub fn policy(&self) -> &VendorPolicy {
        &self.policy
    }

    /// Runtime configuration.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Device and OS facilities.
    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// New receiver of runtime events.
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Handle for posting signals to this supervisor.
    pub fn inbox(&self) -> Inbox {
        self.inbox.clone()
    }

    /// The wake scheduler.
    pub fn wake(&self) -> &WakeScheduler {
        &self.wake
    }

    /// Number of event subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subs.len()
    }

    /// Interval used for wake re-arms.
    pub async fn wake_interval(&self) -> Duration {
        self.inner.lock().await.wake_interval
    }

    /// Changes the interval used for later wake re-arms.
    pub async fn set_wake_interval(&self, interval: Duration) {
        self.inner.lock().await.wake_interval = interval;
    }

    // ---- operations ----

    /// Brings the supervisor to Running in `mode`.
    ///
    /// Idempotent while Running: only the indicator is refreshed. The wake is
    /// re-armed for a Persistent wake retrigger and when the mode switches to
    /// Persistent. Fails only when the wake lock cannot be acquired, leaving
    /// the state and the persisted mode unchanged.
    pub async fn activate(&self, mode: TaskMode, wake_retrigger: bool) -> Result<(), RuntimeError> {
        let mut inner = self.inner.lock().await;
        self.activate_locked(&mut inner, mode, wake_retrigger).await
    }

    async fn activate_locked(
        &self,
        inner: &mut Inner,
        mode: TaskMode,
        wake_retrigger: bool,
    ) -> Result<(), RuntimeError> {
        if !inner.state.can_start() {
            let became_persistent = mode.is_persistent() && !inner.mode.is_persistent();
            inner.mode = mode;
            self.mode_tx.send_replace(mode);
            self.persist(mode).await;
            self.publish_indicator(inner, "refresh").await;
            self.bus.publish(
                Event::new(EventKind::Refreshed)
                    .with_mode(mode)
                    .with_retrigger(wake_retrigger),
            );
            if mode.is_persistent() && (wake_retrigger || became_persistent) {
                let _ = self.wake.arm(inner.wake_interval).await;
            }
            return Ok(());
        }

        if let Some(pending) = inner.pending_restart.take() {
            pending.abort();
        }
        inner.forced_one_time = false;

        if inner.wake_lock.is_none() {
            match self
                .platform
                .power
                .acquire_wake_lock(&self.cfg.wake_lock_tag, self.cfg.wake_lock_timeout())
                .await
            {
                Ok(id) => {
                    inner.wake_lock = Some(id);
                    self.bus.publish(Event::new(EventKind::WakeLockAcquired));
                }
                Err(e) => {
                    self.bus.publish(
                        Event::new(EventKind::ActivationFailed)
                            .with_mode(mode)
                            .with_reason(e.to_string()),
                    );
                    return Err(RuntimeError::WakeLock(e));
                }
            }
        }

        self.persist(mode).await;
        self.platform.units.apply_priority(self.policy.priority);
        inner.mode = mode;
        self.mode_tx.send_replace(mode);
        inner.state = LifecycleState::Running;
        self.publish_indicator(inner, "activate").await;

        let dogs = Watchdogs::start(self.watchdog_ctx(), self.periods());
        self.bus.publish(Event::new(EventKind::WatchdogsStarted).with_attempt(dogs.len() as u32));
        inner.watchdogs = Some(dogs);

        self.bus.publish(
            Event::new(EventKind::Activated)
                .with_mode(mode)
                .with_retrigger(wake_retrigger),
        );
        if mode.is_persistent() {
            let _ = self.wake.arm(inner.wake_interval).await;
        }
        Ok(())
    }

    /// Handles the OS tearing the unit down. No-op unless Running.
    ///
    /// Returns `GraceExceeded` if watchdog loops had to be aborted; the
    /// teardown itself still completes.
    pub async fn teardown(&self) -> Result<(), RuntimeError> {
        let mut inner = self.inner.lock().await;
        if inner.state != LifecycleState::Running {
            return Ok(());
        }
        inner.state = LifecycleState::Destroying;
        self.bus
            .publish(Event::new(EventKind::TeardownStarted).with_mode(inner.mode));

        if let Some(retry) = inner.pending_retry.take() {
            retry.abort();
        }

        let mut result = Ok(());
        if let Some(dogs) = inner.watchdogs.take() {
            match dogs.stop(self.cfg.grace).await {
                Ok(()) => self.bus.publish(Event::new(EventKind::WatchdogsStopped)),
                Err(stuck) => {
                    self.bus.publish(
                        Event::new(EventKind::GraceExceeded).with_reason(stuck.join(",")),
                    );
                    result = Err(RuntimeError::GraceExceeded {
                        grace: self.cfg.grace,
                        stuck,
                    });
                }
            }
        }

        if let Some(id) = inner.wake_lock.take() {
            self.platform.power.release_wake_lock(id).await;
            self.bus.publish(Event::new(EventKind::WakeLockReleased));
        }
        if self.indicator.withdraw().await.is_ok() {
            self.bus.publish(Event::new(EventKind::IndicatorWithdrawn));
        }

        let persistent = if inner.forced_one_time {
            false
        } else {
            match self.store.load_persistent().await {
                Ok(persistent) => persistent,
                Err(e) => {
                    self.bus.publish(
                        Event::new(EventKind::StoreFailed).with_reason(e.to_string()),
                    );
                    inner.mode.is_persistent()
                }
            }
        };

        if persistent {
            let _ = self.wake.arm(inner.wake_interval).await;
            let epoch = inner.epoch;
            inner.pending_restart = Some(self.spawn_restart(epoch));
            self.bus.publish(
                Event::new(EventKind::RestartScheduled)
                    .with_mode(TaskMode::Persistent)
                    .with_delay(self.cfg.restart_grace),
            );
        } else {
            self.wake.cancel().await;
            inner.state = LifecycleState::Stopped;
            self.bus.publish(Event::new(EventKind::Stopped));
        }
        result
    }

    /// Stops for good: clears the persisted mode, stops the unit, cancels the
    /// wake trigger and any pending restart. Ends in Stopped.
    pub async fn cancel(&self) -> Result<(), RuntimeError> {
        {
            let mut inner = self.inner.lock().await;
            inner.epoch = inner.epoch.wrapping_add(1);
            inner.forced_one_time = true;
            if let Some(pending) = inner.pending_restart.take() {
                pending.abort();
            }
            if let Some(retry) = inner.pending_retry.take() {
                retry.abort();
            }
            if let Err(e) = self.store.save_persistent(false).await {
                self.bus
                    .publish(Event::new(EventKind::StoreFailed).with_reason(e.to_string()));
            }
        }

        let stopped = self.platform.units.stop_unit().await;
        self.wake.cancel().await;
        let torn_down = self.teardown().await;

        {
            let mut inner = self.inner.lock().await;
            inner.state = LifecycleState::Stopped;
            inner.mode = TaskMode::OneTime;
            self.mode_tx.send_replace(TaskMode::OneTime);
        }
        self.bus.publish(Event::new(EventKind::Cancelled));

        stopped?;
        torn_down
    }

    /// Restarts the unit after a watchdog found it unregistered.
    ///
    /// Only acts while Running in Persistent mode.
    pub async fn self_heal(&self, source: WatchdogKind) -> Result<(), RuntimeError> {
        let epoch = {
            let inner = self.inner.lock().await;
            if inner.state != LifecycleState::Running || !inner.mode.is_persistent() {
                return Ok(());
            }
            inner.epoch
        };
        self.bus.publish(
            Event::new(EventKind::SelfHealRequested)
                .with_mode(TaskMode::Persistent)
                .with_source(source.as_label()),
        );
        self.start_and_activate(epoch, TaskMode::Persistent, false, "self_heal")
            .await
    }

    /// Resumes a Persistent task after the device booted.
    pub async fn boot_completed(&self) -> Result<(), RuntimeError> {
        let epoch = self.inner.lock().await.epoch;
        let persistent = match self.store.load_persistent().await {
            Ok(persistent) => persistent,
            Err(e) => {
                self.bus
                    .publish(Event::new(EventKind::StoreFailed).with_reason(e.to_string()));
                return Err(e.into());
            }
        };
        if !persistent {
            self.bus
                .publish(Event::new(EventKind::BootCompleted).with_reason("idle"));
            return Ok(());
        }
        self.bus.publish(
            Event::new(EventKind::BootCompleted)
                .with_mode(TaskMode::Persistent)
                .with_reason("restarting"),
        );
        self.start_and_activate(epoch, TaskMode::Persistent, false, "boot_completed")
            .await
    }

    /// A OneTime task that already stopped stays stopped.
    async fn wake_fired(&self) -> Result<(), RuntimeError> {
        self.wake.mark_fired().await;
        let (epoch, state, current) = {
            let inner = self.inner.lock().await;
            (inner.epoch, inner.state, inner.mode)
        };
        let mode = match self.store.load_persistent().await {
            Ok(persistent) => TaskMode::from_persistent(persistent),
            Err(e) => {
                self.bus
                    .publish(Event::new(EventKind::StoreFailed).with_reason(e.to_string()));
                current
            }
        };
        if !mode.is_persistent() && state == LifecycleState::Stopped {
            self.bus
                .publish(Event::new(EventKind::WakeFired).with_mode(mode).with_reason("idle"));
            return Ok(());
        }
        self.bus.publish(Event::new(EventKind::WakeFired).with_mode(mode));
        self.start_and_activate(epoch, mode, true, "wake_fired").await
    }

    /// Handles one inbox signal.
    pub async fn dispatch(&self, signal: Signal) -> Result<(), RuntimeError> {
        match signal {
            Signal::Activate {
                mode,
                wake_retrigger,
            } => self.activate(mode, wake_retrigger).await,
            Signal::Reactivate { epoch } => {
                self.activate_if_current(epoch, TaskMode::Persistent, false, "reactivate")
                    .await
            }
            Signal::Teardown => self.teardown().await,
            Signal::Cancel => self.cancel().await,
            Signal::BootCompleted => self.boot_completed().await,
            Signal::WakeFired => self.wake_fired().await,
            Signal::IndicatorRemoved => {
                self.republish_indicator("removed").await;
                Ok(())
            }
            Signal::RepublishIndicator => {
                self.republish_indicator(WatchdogKind::Indicator.as_label())
                    .await;
                Ok(())
            }
            Signal::SelfHeal { source } => self.self_heal(source).await,
        }
    }

    /// Serves the inbox until `token` is cancelled.
    ///
    /// Signals are handled one at a time. Failures are reported as events and do
    /// not stop the loop. A concurrent second call returns immediately.
    pub async fn run_until(&self, token: CancellationToken) -> Result<(), RuntimeError> {
        let Some(mut rx) = self.inbox_rx.lock().await.take() else {
            return Ok(());
        };
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                signal = rx.recv() => match signal {
                    Some(signal) => {
                        let _ = self.dispatch(signal).await;
                    }
                    None => break,
                },
            }
        }
        *self.inbox_rx.lock().await = Some(rx);
        Ok(())
    }

    /// Serves the inbox until the process receives a termination signal, then
    /// tears down as if the OS destroyed the unit.
    pub async fn run(&self) -> Result<(), RuntimeError> {
        let token = CancellationToken::new();
        let serve = self.run_until(token.clone());
        tokio::pin!(serve);

        let signal = tokio::select! {
            res = &mut serve => return res,
            signal = shutdown::wait_for_shutdown_signal() => signal,
        };
        let Ok(name) = signal else {
            return serve.await;
        };

        self.bus
            .publish(Event::new(EventKind::ShutdownRequested).with_source(name));
        token.cancel();
        serve.await?;
        self.teardown().await
    }

    // ---- internals ----

    async fn persist(&self, mode: TaskMode) {
        if let Err(e) = self.store.save_persistent(mode.is_persistent()).await {
            self.bus.publish(
                Event::new(EventKind::StoreFailed)
                    .with_mode(mode)
                    .with_reason(e.to_string()),
            );
        }
    }

    /// Activates only if no cancel ran since `epoch` was read.
    async fn activate_if_current(
        &self,
        epoch: u64,
        mode: TaskMode,
        wake_retrigger: bool,
        source: &'static str,
    ) -> Result<(), RuntimeError> {
        let mut inner = self.inner.lock().await;
        if inner.epoch != epoch {
            self.bus.publish(
                Event::new(EventKind::ActivationSuperseded)
                    .with_mode(mode)
                    .with_source(source),
            );
            return Ok(());
        }
        self.activate_locked(&mut inner, mode, wake_retrigger).await
    }

    async fn start_and_activate(
        &self,
        epoch: u64,
        mode: TaskMode,
        wake_retrigger: bool,
        source: &'static str,
    ) -> Result<(), RuntimeError> {
        if let Err(e) = self.restarter.request(mode).await {
            let inner = self.inner.lock().await;
            if mode.is_persistent() && inner.epoch == epoch {
                let _ = self.wake.arm(inner.wake_interval).await;
            }
            return Err(e);
        }
        self.activate_if_current(epoch, mode, wake_retrigger, source)
            .await
    }

    async fn republish_indicator(&self, source: &'static str) {
        let mut inner = self.inner.lock().await;
        if inner.state != LifecycleState::Running {
            return;
        }
        self.publish_indicator(&mut inner, source).await;
    }

    /// Publishes the indicator for the current mode; on refusal in Persistent
    /// mode schedules a delayed re-activation.
    async fn publish_indicator(&self, inner: &mut Inner, source: &'static str) {
        let mode = inner.mode;
        match self.indicator.publish(mode).await {
            Ok(()) => self.bus.publish(
                Event::new(EventKind::IndicatorPublished)
                    .with_mode(mode)
                    .with_source(source),
            ),
            Err(e) => self.indicator_failed(inner, mode, e),
        }
    }

    fn indicator_failed(&self, inner: &mut Inner, mode: TaskMode, e: PlatformError) {
        self.bus.publish(
            Event::new(EventKind::IndicatorPublishFailed)
                .with_mode(mode)
                .with_reason(e.to_string()),
        );
        if !mode.is_persistent() {
            return;
        }
        if let Some(previous) = inner.pending_retry.take() {
            previous.abort();
        }
        let delay = self.cfg.indicator_retry_delay;
        let inbox = self.inbox.clone();
        let epoch = inner.epoch;
        inner.pending_retry = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inbox.post(Signal::Reactivate { epoch });
        }));
        self.bus
            .publish(Event::new(EventKind::IndicatorRetryScheduled).with_delay(delay));
    }

    fn spawn_restart(&self, epoch: u64) -> JoinHandle<()> {
        let grace = self.cfg.restart_grace;
        let restarter = self.restarter.clone();
        let inbox = self.inbox.clone();
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            if restarter.request(TaskMode::Persistent).await.is_ok() {
                inbox.post(Signal::Reactivate { epoch });
            }
        })
    }

    fn watchdog_ctx(&self) -> WatchdogCtx {
        WatchdogCtx {
            bus: self.bus.clone(),
            inbox: self.inbox.clone(),
            probe: Arc::clone(&self.probe),
            indicator: Arc::clone(&self.indicator),
            units: self.platform.units.clone(),
            mode: self.mode_tx.subscribe(),
        }
    }

    fn periods(&self) -> Periods {
        Periods {
            heartbeat: self.cfg.heartbeat_period,
            indicator: self.cfg.indicator_period,
            vendor: self
                .policy
                .extra_watchdog
                .then_some(self.policy.watchdog_period),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicator::INDICATOR_ID;
    use crate::platform::memory::MemoryPlatform;
    use crate::platform::{DeviceInfo, Notifier, UnitHost};
    use crate::store::MemoryStore;

    fn setup_with(vendor: &str, store: Arc<dyn StateStore>) -> (Arc<MemoryPlatform>, Arc<Supervisor>) {
        let mem = MemoryPlatform::new(DeviceInfo::new(vendor, "com.example.app"));
        let sup = Supervisor::builder(Config::default(), mem.platform())
            .with_store(store)
            .build();
        mem.attach(sup.inbox());
        (mem, sup)
    }

    fn setup(vendor: &str) -> (Arc<MemoryPlatform>, Arc<Supervisor>) {
        setup_with(vendor, Arc::new(MemoryStore::new()))
    }

    fn serve(sup: &Arc<Supervisor>) -> CancellationToken {
        let token = CancellationToken::new();
        let sup = Arc::clone(sup);
        let child = token.clone();
        tokio::spawn(async move {
            let _ = sup.run_until(child).await;
        });
        token
    }

    fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_activation_holds_lock_and_single_indicator() {
        for mode in [TaskMode::OneTime, TaskMode::Persistent] {
            let (mem, sup) = setup("Google");
            sup.activate(mode, false).await.unwrap();

            assert_eq!(sup.state().await, LifecycleState::Running);
            assert_eq!(sup.mode().await, mode);
            assert_eq!(mem.indicators().len(), 1);
            assert_eq!(mem.indicators()[0].mode, mode);
            assert_eq!(mem.wake_locks_held(), 1);
            assert_eq!(sup.wake().armed().await.is_some(), mode.is_persistent());

            sup.cancel().await.unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wake_lock_balanced_across_cycles() {
        let (mem, sup) = setup("Google");
        for _ in 0..3 {
            sup.activate(TaskMode::OneTime, false).await.unwrap();
            sup.teardown().await.unwrap();
        }
        assert_eq!(mem.wake_locks_acquired(), 3);
        assert_eq!(mem.wake_locks_released(), 3);
        assert_eq!(mem.wake_locks_held(), 0);
        assert_eq!(sup.state().await, LifecycleState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_activate_is_idempotent() {
        let (mem, sup) = setup("Google");
        sup.activate(TaskMode::Persistent, false).await.unwrap();
        sup.activate(TaskMode::Persistent, false).await.unwrap();

        assert_eq!(sup.state().await, LifecycleState::Running);
        assert_eq!(mem.indicators().len(), 1);
        assert_eq!(mem.wake_locks_acquired(), 1);
        sup.cancel().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_running_activate_updates_wording() {
        let (mem, sup) = setup("Google");
        sup.activate(TaskMode::OneTime, false).await.unwrap();
        sup.activate(TaskMode::Persistent, false).await.unwrap();

        let shown = mem.indicators();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].text, "Service is active (Persistent)");
        assert_eq!(sup.mode().await, TaskMode::Persistent);
        sup.cancel().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_switch_to_persistent_arms_wake() {
        let store = Arc::new(MemoryStore::new());
        let (mem, sup) = setup_with("Google", store.clone());
        sup.activate(TaskMode::OneTime, false).await.unwrap();
        assert!(mem.scheduled_alarm().is_none());

        sup.activate(TaskMode::Persistent, false).await.unwrap();
        assert!(sup.wake().armed().await.is_some());
        assert!(mem.scheduled_alarm().is_some());
        assert!(store.load_persistent().await.unwrap());
        sup.cancel().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_wake_retrigger_rearms_while_running() {
        let (_mem, sup) = setup("Google");
        sup.activate(TaskMode::Persistent, false).await.unwrap();
        let first = sup.wake().armed().await.unwrap();

        sup.activate(TaskMode::Persistent, false).await.unwrap();
        assert_eq!(sup.wake().armed().await, Some(first));

        sup.activate(TaskMode::Persistent, true).await.unwrap();
        let second = sup.wake().armed().await.unwrap();
        assert!(second.generation > first.generation);
        sup.cancel().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_teardown_arms_wake_and_restarts() {
        let (mem, sup) = setup("Google");
        let _token = serve(&sup);
        sup.activate(TaskMode::Persistent, false).await.unwrap();

        sup.teardown().await.unwrap();
        assert_eq!(sup.state().await, LifecycleState::Destroying);
        assert!(sup.wake().armed().await.is_some());
        assert_eq!(mem.wake_locks_held(), 0);
        assert!(mem.indicators().is_empty());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(mem.start_requests(), vec![TaskMode::Persistent]);
        assert_eq!(sup.state().await, LifecycleState::Running);
        assert_eq!(mem.indicators().len(), 1);
        assert_eq!(mem.wake_locks_held(), 1);
        sup.cancel().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_time_teardown_neither_arms_nor_restarts() {
        let (mem, sup) = setup("Google");
        let _token = serve(&sup);
        sup.activate(TaskMode::OneTime, false).await.unwrap();

        sup.teardown().await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(sup.state().await, LifecycleState::Stopped);
        assert!(sup.wake().armed().await.is_none());
        assert!(mem.scheduled_alarm().is_none());
        assert!(mem.start_requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_when_stopped_is_noop() {
        let (mem, sup) = setup("Google");
        sup.teardown().await.unwrap();
        assert_eq!(sup.state().await, LifecycleState::Stopped);
        assert_eq!(mem.wake_locks_released(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_removed_indicator_is_republished() {
        let (mem, sup) = setup("Google");
        let _token = serve(&sup);
        sup.activate(TaskMode::Persistent, false).await.unwrap();

        mem.dismiss(INDICATOR_ID);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(mem.indicators().len(), 1);

        // silent removal, only the indicator watchdog notices
        mem.remove(INDICATOR_ID).await.unwrap();
        assert!(mem.indicators().is_empty());
        tokio::time::sleep(sup.config().indicator_period + Duration::from_millis(10)).await;
        assert_eq!(mem.indicators().len(), 1);
        sup.cancel().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_indicator_refusal_schedules_retry() {
        let (mem, sup) = setup("Google");
        let mut rx = sup.events();
        let _token = serve(&sup);
        mem.reject_next_posts(1);

        sup.activate(TaskMode::Persistent, false).await.unwrap();
        assert_eq!(sup.state().await, LifecycleState::Running);
        assert!(mem.indicators().is_empty());

        tokio::time::sleep(sup.config().indicator_retry_delay + Duration::from_millis(10)).await;
        assert_eq!(mem.indicators().len(), 1);

        let kinds: Vec<_> = drain(&mut rx).into_iter().map(|e| e.kind).collect();
        assert!(kinds.contains(&EventKind::IndicatorPublishFailed));
        assert!(kinds.contains(&EventKind::IndicatorRetryScheduled));
        sup.cancel().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_self_heals_unregistered_unit() {
        let (mem, sup) = setup("Google");
        let _token = serve(&sup);
        sup.activate(TaskMode::Persistent, false).await.unwrap();
        assert!(!mem.is_unit_running());

        tokio::time::sleep(sup.config().heartbeat_period + Duration::from_secs(1)).await;
        assert_eq!(mem.start_requests(), vec![TaskMode::Persistent]);
        assert!(mem.is_unit_running());
        assert_eq!(sup.state().await, LifecycleState::Running);
        sup.cancel().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_time_never_self_heals() {
        let (mem, sup) = setup("Xiaomi");
        let _token = serve(&sup);
        sup.activate(TaskMode::OneTime, false).await.unwrap();

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(mem.start_requests().is_empty());
        sup.cancel().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_vendor_policy_applied() {
        let (mem, sup) = setup("Redmi Note");
        sup.activate(TaskMode::Persistent, false).await.unwrap();

        assert_eq!(sup.policy().vendor, "xiaomi");
        assert_eq!(mem.priority(), Some(sup.policy().priority));
        assert_eq!(mem.channels()[0].importance, sup.policy().importance);
        sup.cancel().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_kill_then_wake_reactivates_persistent() {
        let store = Arc::new(MemoryStore::new());
        let (mem, sup) = setup_with("Google", store.clone());
        let mut rx = sup.events();
        let _token = serve(&sup);

        mem.start_unit(TaskMode::Persistent).await.unwrap();
        sup.activate(TaskMode::Persistent, false).await.unwrap();

        // the OS kills the unit and refuses every immediate restart
        mem.kill_unit();
        mem.reject_next_starts(3);
        sup.inbox().post(Signal::Teardown);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(sup.state().await, LifecycleState::Destroying);
        assert!(mem.scheduled_alarm().is_some());

        assert!(mem.fire_alarm());
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(sup.state().await, LifecycleState::Running);
        assert_eq!(sup.mode().await, TaskMode::Persistent);
        assert!(store.load_persistent().await.unwrap());
        let events = drain(&mut rx);
        assert!(events.iter().any(|e| e.kind == EventKind::RestartExhausted));
        assert!(
            events
                .iter()
                .any(|e| e.kind == EventKind::Activated && e.retrigger)
        );
        sup.cancel().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_time_then_cancel() {
        let (mem, sup) = setup("Google");
        sup.activate(TaskMode::OneTime, false).await.unwrap();
        sup.cancel().await.unwrap();

        assert_eq!(sup.state().await, LifecycleState::Stopped);
        assert!(sup.wake().armed().await.is_none());
        assert!(mem.scheduled_alarm().is_none());
        assert!(mem.indicators().is_empty());
        assert_eq!(mem.wake_locks_held(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_aborts_pending_restart() {
        let store = Arc::new(MemoryStore::new());
        let (mem, sup) = setup_with("Google", store.clone());
        let _token = serve(&sup);
        sup.activate(TaskMode::Persistent, false).await.unwrap();
        sup.teardown().await.unwrap();

        sup.cancel().await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(sup.state().await, LifecycleState::Stopped);
        assert!(mem.start_requests().is_empty());
        assert!(mem.scheduled_alarm().is_none());
        assert!(!store.load_persistent().await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_queued_reactivation() {
        let store = Arc::new(MemoryStore::new());
        let (mem, sup) = setup_with("Google", store.clone());
        let mut rx = sup.events();
        sup.activate(TaskMode::Persistent, false).await.unwrap();
        sup.teardown().await.unwrap();

        // restart grace passes while nobody serves the inbox
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(mem.start_requests(), vec![TaskMode::Persistent]);

        sup.cancel().await.unwrap();
        assert_eq!(sup.state().await, LifecycleState::Stopped);

        let _token = serve(&sup);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(sup.state().await, LifecycleState::Stopped);
        assert!(!store.load_persistent().await.unwrap());
        assert!(sup.wake().armed().await.is_none());
        assert!(mem.scheduled_alarm().is_none());
        assert_eq!(mem.wake_locks_held(), 0);
        assert!(
            drain(&mut rx)
                .iter()
                .any(|e| e.kind == EventKind::ActivationSuperseded)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_queued_indicator_retry() {
        let (mem, sup) = setup("Google");
        mem.reject_next_posts(1);
        sup.activate(TaskMode::Persistent, false).await.unwrap();

        tokio::time::sleep(sup.config().indicator_retry_delay + Duration::from_secs(1)).await;
        sup.cancel().await.unwrap();

        let _token = serve(&sup);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(sup.state().await, LifecycleState::Stopped);
        assert!(mem.indicators().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_one_time_ignores_wake() {
        let (mem, sup) = setup("Google");
        sup.activate(TaskMode::OneTime, false).await.unwrap();
        sup.teardown().await.unwrap();

        sup.dispatch(Signal::WakeFired).await.unwrap();
        assert_eq!(sup.state().await, LifecycleState::Stopped);
        assert!(mem.start_requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wake_lock_failure_leaves_state() {
        let store = Arc::new(MemoryStore::seeded(false));
        let (mem, sup) = setup_with("Google", store.clone());
        mem.reject_wake_lock(true);

        let err = sup.activate(TaskMode::Persistent, false).await.unwrap_err();
        assert_eq!(err.as_label(), "runtime_wake_lock");
        assert_eq!(sup.state().await, LifecycleState::Stopped);
        assert!(mem.indicators().is_empty());
        assert!(!store.load_persistent().await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_boot_resumes_only_persistent() {
        let (mem, sup) = setup_with("Google", Arc::new(MemoryStore::seeded(true)));
        sup.dispatch(Signal::BootCompleted).await.unwrap();
        assert_eq!(sup.state().await, LifecycleState::Running);
        assert_eq!(sup.mode().await, TaskMode::Persistent);
        assert_eq!(mem.start_requests(), vec![TaskMode::Persistent]);
        sup.cancel().await.unwrap();

        let (mem, sup) = setup_with("Google", Arc::new(MemoryStore::seeded(false)));
        sup.dispatch(Signal::BootCompleted).await.unwrap();
        assert_eq!(sup.state().await, LifecycleState::Stopped);
        assert!(mem.start_requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_grace_aborts_loops() {
        let mem = MemoryPlatform::new(DeviceInfo::new("Samsung", "com.example.app"));
        let cfg = Config {
            grace: Duration::ZERO,
            ..Config::default()
        };
        let sup = Supervisor::builder(cfg, mem.platform()).build();
        sup.activate(TaskMode::OneTime, false).await.unwrap();
        sup.teardown().await.unwrap();
        assert_eq!(sup.state().await, LifecycleState::Stopped);
    }
}
