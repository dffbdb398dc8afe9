//! # Watchdog loops.
//!
//! Started by activation, stopped by teardown. Loops never touch supervisor
//! state: they read the current mode through a `watch` channel and report by
//! posting [`Signal`]s to the inbox.
//!
//! ```text
//! heartbeat  (cfg.heartbeat_period)   Heartbeat event; Persistent && !registered ─► SelfHeal{Heartbeat}
//! indicator  (cfg.indicator_period)   !present ─► IndicatorMissing, RepublishIndicator
//! vendor     (policy.watchdog_period) re-enable component; !foreground && !registered ─► SelfHeal{Vendor}
//! removals   (OS broadcast)           INDICATOR_ID removed ─► IndicatorRemoved
//! ```
//!
//! Every periodic loop checks its token at the top and again after each sleep.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::core::signal::{Inbox, Signal, WatchdogKind};
use crate::events::{Bus, Event, EventKind};
use crate::indicator::{INDICATOR_ID, IndicatorManager};
use crate::platform::UnitHost;
use crate::probe::PresenceProbe;
use crate::tasks::TaskMode;

/// Shared handles the loops run against.
#[derive(Clone)]
pub(crate) struct WatchdogCtx {
    pub(crate) bus: Bus,
    pub(crate) inbox: Inbox,
    pub(crate) probe: Arc<PresenceProbe>,
    pub(crate) indicator: Arc<IndicatorManager>,
    pub(crate) units: Arc<dyn UnitHost>,
    pub(crate) mode: watch::Receiver<TaskMode>,
}

/// Loop periods.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Periods {
    pub(crate) heartbeat: Duration,
    pub(crate) indicator: Duration,
    /// `None` disables the vendor loop.
    pub(crate) vendor: Option<Duration>,
}

/// Running set of watchdog loops.
pub(crate) struct Watchdogs {
    token: CancellationToken,
    set: JoinSet<()>,
    started: usize,
    /// Loops that have not exited yet.
    live: Arc<Mutex<BTreeSet<&'static str>>>,
}

impl Watchdogs {
    /// Spawns the loops. The removal subscription is taken before returning so
    /// no removal after activation is missed.
    pub(crate) fn start(ctx: WatchdogCtx, periods: Periods) -> Self {
        let mut dogs = Self {
            token: CancellationToken::new(),
            set: JoinSet::new(),
            started: 0,
            live: Arc::new(Mutex::new(BTreeSet::new())),
        };

        let removals = ctx.indicator.removals();
        dogs.spawn("removals", removal_loop(ctx.clone(), dogs.token.clone(), removals));
        dogs.spawn(
            "heartbeat",
            heartbeat_loop(ctx.clone(), dogs.token.clone(), periods.heartbeat),
        );
        dogs.spawn(
            "indicator",
            indicator_loop(ctx.clone(), dogs.token.clone(), periods.indicator),
        );
        if let Some(period) = periods.vendor {
            dogs.spawn("vendor", vendor_loop(ctx, dogs.token.clone(), period));
        }
        dogs
    }

    fn spawn<F>(&mut self, name: &'static str, fut: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.started += 1;
        lock(&self.live).insert(name);
        let live = Arc::clone(&self.live);
        self.set.spawn(async move {
            fut.await;
            lock(&live).remove(name);
        });
    }

    /// Number of loops started.
    pub(crate) fn len(&self) -> usize {
        self.started
    }

    /// Cancels every loop and waits up to `grace` for them to exit.
    ///
    /// Stragglers are aborted and their names returned as `Err`.
    pub(crate) async fn stop(mut self, grace: Duration) -> Result<(), Vec<String>> {
        self.token.cancel();
        if grace.is_zero() {
            self.set.abort_all();
            while self.set.join_next().await.is_some() {}
            return Ok(());
        }

        let set = &mut self.set;
        let joined = tokio::time::timeout(grace, async {
            while set.join_next().await.is_some() {}
        })
        .await;

        if joined.is_ok() {
            return Ok(());
        }
        let stuck: Vec<String> = lock(&self.live).iter().map(|n| n.to_string()).collect();
        self.set.abort_all();
        while self.set.join_next().await.is_some() {}
        Err(stuck)
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Sleeps one period; `false` once the token is cancelled.
async fn next_tick(token: &CancellationToken, period: Duration) -> bool {
    if token.is_cancelled() {
        return false;
    }
    tokio::select! {
        _ = token.cancelled() => return false,
        _ = tokio::time::sleep(period) => {}
    }
    !token.is_cancelled()
}

async fn heartbeat_loop(ctx: WatchdogCtx, token: CancellationToken, period: Duration) {
    while next_tick(&token, period).await {
        let mode = *ctx.mode.borrow();
        ctx.bus.publish(
            Event::new(EventKind::Heartbeat)
                .with_mode(mode)
                .with_source(WatchdogKind::Heartbeat.as_label()),
        );
        if mode.is_persistent() && !ctx.probe.is_own_unit_registered().await {
            ctx.inbox.post(Signal::SelfHeal {
                source: WatchdogKind::Heartbeat,
            });
        }
    }
}

async fn indicator_loop(ctx: WatchdogCtx, token: CancellationToken, period: Duration) {
    while next_tick(&token, period).await {
        if !ctx.indicator.is_present().await {
            ctx.bus.publish(
                Event::new(EventKind::IndicatorMissing)
                    .with_source(WatchdogKind::Indicator.as_label()),
            );
            ctx.inbox.post(Signal::RepublishIndicator);
        }
    }
}

async fn vendor_loop(ctx: WatchdogCtx, token: CancellationToken, period: Duration) {
    while next_tick(&token, period).await {
        if let Err(e) = ctx.units.set_component_enabled(true).await {
            ctx.bus.publish(
                Event::new(EventKind::ComponentReassertFailed)
                    .with_source(WatchdogKind::Vendor.as_label())
                    .with_reason(e.to_string()),
            );
        }
        if !ctx.probe.is_foreground().await && !ctx.probe.is_own_unit_registered().await {
            ctx.inbox.post(Signal::SelfHeal {
                source: WatchdogKind::Vendor,
            });
        }
    }
}

async fn removal_loop(
    ctx: WatchdogCtx,
    token: CancellationToken,
    mut removals: broadcast::Receiver<u32>,
) {
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            res = removals.recv() => match res {
                Ok(id) if id == INDICATOR_ID => {
                    ctx.inbox.post(Signal::IndicatorRemoved);
                }
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::DeviceInfo;
    use crate::platform::memory::MemoryPlatform;
    use crate::policies::Importance;
    use tokio::sync::mpsc;

    struct Rig {
        mem: Arc<MemoryPlatform>,
        ctx: WatchdogCtx,
        rx: mpsc::Receiver<Signal>,
        _mode: watch::Sender<TaskMode>,
    }

    fn rig(mode: TaskMode) -> Rig {
        let mem = MemoryPlatform::new(DeviceInfo::new("Xiaomi", "com.example.app"));
        let platform = mem.platform();
        let bus = Bus::new(256);
        let (inbox, rx) = Inbox::channel(64, bus.clone());
        let (mode_tx, mode_rx) = watch::channel(mode);
        let ctx = WatchdogCtx {
            bus,
            inbox,
            probe: Arc::new(PresenceProbe::new(
                platform.introspector.clone(),
                "com.example.app",
                "BackgroundUnit",
                Duration::from_secs(60),
            )),
            indicator: Arc::new(IndicatorManager::new(platform.notifier.clone(), Importance::High)),
            units: platform.units.clone(),
            mode: mode_rx,
        };
        Rig {
            mem,
            ctx,
            rx,
            _mode: mode_tx,
        }
    }

    fn periods(vendor: Option<Duration>) -> Periods {
        Periods {
            heartbeat: Duration::from_secs(60),
            indicator: Duration::from_secs(5),
            vendor,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_posts_self_heal_when_unregistered() {
        let mut r = rig(TaskMode::Persistent);
        r.ctx.indicator.publish(TaskMode::Persistent).await.unwrap();
        let dogs = Watchdogs::start(r.ctx.clone(), periods(None));

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(
            r.rx.try_recv().unwrap(),
            Signal::SelfHeal {
                source: WatchdogKind::Heartbeat
            }
        );
        dogs.stop(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_quiet_in_one_time_mode() {
        let mut r = rig(TaskMode::OneTime);
        r.ctx.indicator.publish(TaskMode::OneTime).await.unwrap();
        let dogs = Watchdogs::start(r.ctx.clone(), periods(None));

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(r.rx.try_recv().is_err());
        dogs.stop(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_indicator_loop_requests_republish() {
        let mut r = rig(TaskMode::OneTime);
        let dogs = Watchdogs::start(r.ctx.clone(), periods(None));

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(r.rx.try_recv().unwrap(), Signal::RepublishIndicator);
        dogs.stop(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_removal_is_forwarded() {
        let mut r = rig(TaskMode::Persistent);
        r.ctx.indicator.publish(TaskMode::Persistent).await.unwrap();
        let dogs = Watchdogs::start(r.ctx.clone(), periods(None));

        r.mem.dismiss(INDICATOR_ID);
        assert_eq!(r.rx.recv().await, Some(Signal::IndicatorRemoved));
        dogs.stop(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_vendor_loop_reasserts_and_heals() {
        let mut r = rig(TaskMode::Persistent);
        r.ctx.indicator.publish(TaskMode::Persistent).await.unwrap();
        r.mem.disable_component();
        let dogs = Watchdogs::start(r.ctx.clone(), periods(Some(Duration::from_secs(30))));
        assert_eq!(dogs.len(), 4);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(r.mem.is_component_enabled());
        assert_eq!(r.mem.component_reasserts(), 1);
        assert_eq!(
            r.rx.try_recv().unwrap(),
            Signal::SelfHeal {
                source: WatchdogKind::Vendor
            }
        );
        dogs.stop(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_joins_within_grace() {
        let r = rig(TaskMode::Persistent);
        let dogs = Watchdogs::start(r.ctx.clone(), periods(Some(Duration::from_secs(30))));
        assert!(dogs.stop(Duration::from_secs(5)).await.is_ok());
    }
}
