//! # Wake scheduler.
//!
//! Arms a single deferred wake trigger that re-invokes the supervisor after a
//! fixed interval, even when the process has been evicted in between. The host
//! delivers the trigger as [`Signal::WakeFired`](crate::Signal::WakeFired).
//!
//! ## Scheduling policy
//! ```text
//! arm(interval)
//!   ├─ cancel previous handle (fixed alarm id)
//!   ├─ can_schedule_exact() == Some(false) ──► inexact        (WakeExactDenied)
//!   ├─ set_exact() ok ─────────────────────► Exact
//!   ├─ set_exact() err ────────────────────► inexact          (WakeExactDenied)
//!   └─ set_inexact() err ──────────────────► Err              (WakeArmFailed)
//! ```
//!
//! The trigger is one-shot: each activation in Persistent mode re-arms it.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::Mutex;

use crate::error::PlatformError;
use crate::events::{Bus, Event, EventKind};
use crate::platform::{AlarmId, AlarmService};

/// Request code of the single wake trigger.
pub const ALARM_ID: AlarmId = AlarmId(0);

/// How the trigger was scheduled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WakePrecision {
    /// Exact, allow-while-idle.
    Exact,
    /// Best-effort; the OS may batch or delay it.
    Inexact,
}

impl WakePrecision {
    /// Stable label.
    pub fn as_label(self) -> &'static str {
        match self {
            WakePrecision::Exact => "exact",
            WakePrecision::Inexact => "inexact",
        }
    }
}

/// The outstanding wake trigger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WakeHandle {
    /// Alarm request code.
    pub id: AlarmId,
    /// Monotonic arm counter; a newer handle supersedes older ones.
    pub generation: u64,
    /// Requested fire time.
    pub deadline: SystemTime,
    /// Precision actually obtained.
    pub precision: WakePrecision,
}

struct Slot {
    armed: Option<WakeHandle>,
    generation: u64,
}

/// Arms and cancels the single wake trigger.
pub struct WakeScheduler {
    alarms: Arc<dyn AlarmService>,
    bus: Bus,
    slot: Mutex<Slot>,
}

impl WakeScheduler {
    /// Creates a scheduler over `alarms`, reporting on `bus`.
    pub fn new(alarms: Arc<dyn AlarmService>, bus: Bus) -> Self {
        Self {
            alarms,
            bus,
            slot: Mutex::new(Slot {
                armed: None,
                generation: 0,
            }),
        }
    }

    /// Arms the trigger `interval` from now, replacing any previous one.
    pub async fn arm(&self, interval: Duration) -> Result<WakeHandle, PlatformError> {
        let mut slot = self.slot.lock().await;
        if slot.armed.take().is_some() {
            let _ = self.alarms.cancel(ALARM_ID).await;
        }

        let deadline = SystemTime::now() + interval;
        let precision = match self.schedule(deadline).await {
            Ok(precision) => precision,
            Err(e) => {
                self.bus
                    .publish(Event::new(EventKind::WakeArmFailed).with_reason(e.to_string()));
                return Err(e);
            }
        };

        slot.generation += 1;
        let handle = WakeHandle {
            id: ALARM_ID,
            generation: slot.generation,
            deadline,
            precision,
        };
        slot.armed = Some(handle);

        self.bus.publish(
            Event::new(EventKind::WakeArmed)
                .with_delay(interval)
                .with_reason(precision.as_label()),
        );
        Ok(handle)
    }

    async fn schedule(&self, deadline: SystemTime) -> Result<WakePrecision, PlatformError> {
        if self.alarms.can_schedule_exact().await == Some(false) {
            self.bus.publish(
                Event::new(EventKind::WakeExactDenied)
                    .with_reason("exact alarm permission not granted"),
            );
        } else {
            match self.alarms.set_exact(ALARM_ID, deadline).await {
                Ok(()) => return Ok(WakePrecision::Exact),
                Err(e) => {
                    self.bus
                        .publish(Event::new(EventKind::WakeExactDenied).with_reason(e.to_string()));
                }
            }
        }
        self.alarms.set_inexact(ALARM_ID, deadline).await?;
        Ok(WakePrecision::Inexact)
    }

    /// Cancels the trigger. Safe to call when nothing is armed.
    ///
    /// The platform cancel is issued unconditionally: a trigger armed by a
    /// previous process is not tracked locally.
    pub async fn cancel(&self) {
        let mut slot = self.slot.lock().await;
        slot.armed = None;
        let _ = self.alarms.cancel(ALARM_ID).await;
        self.bus.publish(Event::new(EventKind::WakeCancelled));
    }

    /// Forgets the armed handle after the host reported it fired.
    pub async fn mark_fired(&self) -> Option<WakeHandle> {
        self.slot.lock().await.armed.take()
    }

    /// Currently armed handle.
    pub async fn armed(&self) -> Option<WakeHandle> {
        self.slot.lock().await.armed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::DeviceInfo;
    use crate::platform::memory::MemoryPlatform;

    fn scheduler() -> (Arc<MemoryPlatform>, WakeScheduler, Bus) {
        let mem = MemoryPlatform::new(DeviceInfo::new("Google", "com.example.app"));
        let bus = Bus::new(64);
        let wake = WakeScheduler::new(mem.platform().alarms, bus.clone());
        (mem, wake, bus)
    }

    fn drain(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<EventKind> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev.kind);
        }
        out
    }

    #[tokio::test]
    async fn test_exact_when_gate_absent() {
        let (mem, wake, _bus) = scheduler();
        let handle = wake.arm(Duration::from_secs(60)).await.unwrap();
        assert_eq!(handle.precision, WakePrecision::Exact);
        assert!(mem.scheduled_alarm().unwrap().exact);
    }

    #[tokio::test]
    async fn test_inexact_when_gate_denied() {
        let (mem, wake, bus) = scheduler();
        let mut rx = bus.subscribe();
        mem.set_exact_gate(Some(false));

        let handle = wake.arm(Duration::from_secs(60)).await.unwrap();
        assert_eq!(handle.precision, WakePrecision::Inexact);
        assert!(!mem.scheduled_alarm().unwrap().exact);
        assert_eq!(
            drain(&mut rx),
            vec![EventKind::WakeExactDenied, EventKind::WakeArmed]
        );
    }

    #[tokio::test]
    async fn test_inexact_when_exact_rejected_at_call_time() {
        let (mem, wake, _bus) = scheduler();
        mem.set_exact_gate(Some(true));
        mem.revoke_exact_at_runtime(true);

        let handle = wake.arm(Duration::from_secs(60)).await.unwrap();
        assert_eq!(handle.precision, WakePrecision::Inexact);
        assert!(mem.scheduled_alarm().is_some());
    }

    #[tokio::test]
    async fn test_error_when_both_paths_fail() {
        let (mem, wake, bus) = scheduler();
        let mut rx = bus.subscribe();
        mem.set_exact_gate(Some(false));
        mem.reject_inexact(true);

        assert!(wake.arm(Duration::from_secs(60)).await.is_err());
        assert!(wake.armed().await.is_none());
        assert!(drain(&mut rx).contains(&EventKind::WakeArmFailed));
    }

    #[tokio::test]
    async fn test_rearm_replaces_single_handle() {
        let (mem, wake, _bus) = scheduler();
        let first = wake.arm(Duration::from_secs(60)).await.unwrap();
        let second = wake.arm(Duration::from_secs(120)).await.unwrap();

        assert!(second.generation > first.generation);
        assert_eq!(wake.armed().await, Some(second));
        assert_eq!(mem.scheduled_alarm().unwrap().deadline, second.deadline);
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let (mem, wake, _bus) = scheduler();
        wake.arm(Duration::from_secs(60)).await.unwrap();
        wake.cancel().await;
        wake.cancel().await;
        assert!(wake.armed().await.is_none());
        assert!(mem.scheduled_alarm().is_none());
    }
}
