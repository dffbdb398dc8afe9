//! Bounded unit start requests.
//!
//! ```text
//! attempt = 1..=max_attempts(policy.restart):
//!   start_unit(mode) ok  ─► RestartRequested, done
//!   start_unit(mode) err ─► RestartFailed{delay = backoff.next(attempt-1)}, sleep(delay)
//! last err ─► RestartExhausted, Err(RuntimeError::RestartExhausted)
//! ```
//!
//! Exhaustion is not fatal: the armed wake trigger brings the supervisor back later.

use std::sync::Arc;

use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::platform::UnitHost;
use crate::policies::BackoffPolicy;
use crate::tasks::TaskMode;

#[derive(Clone)]
pub(crate) struct Restarter {
    units: Arc<dyn UnitHost>,
    bus: Bus,
    backoff: BackoffPolicy,
    max_attempts: u32,
}

impl Restarter {
    pub(crate) fn new(
        units: Arc<dyn UnitHost>,
        bus: Bus,
        backoff: BackoffPolicy,
        max_attempts: u32,
    ) -> Self {
        Self {
            units,
            bus,
            backoff,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Asks the OS to start the unit in `mode`, retrying rejected starts.
    pub(crate) async fn request(&self, mode: TaskMode) -> Result<(), RuntimeError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.units.start_unit(mode).await {
                Ok(()) => {
                    self.bus.publish(
                        Event::new(EventKind::RestartRequested)
                            .with_mode(mode)
                            .with_attempt(attempt),
                    );
                    return Ok(());
                }
                Err(last) if attempt >= self.max_attempts => {
                    self.bus.publish(
                        Event::new(EventKind::RestartExhausted)
                            .with_mode(mode)
                            .with_attempt(attempt)
                            .with_reason(last.to_string()),
                    );
                    return Err(RuntimeError::RestartExhausted {
                        attempts: attempt,
                        last,
                    });
                }
                Err(e) => {
                    let delay = self.backoff.next(attempt - 1);
                    self.bus.publish(
                        Event::new(EventKind::RestartFailed)
                            .with_mode(mode)
                            .with_attempt(attempt)
                            .with_delay(delay)
                            .with_reason(e.to_string()),
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::DeviceInfo;
    use crate::platform::memory::MemoryPlatform;
    use crate::policies::RestartAggressiveness;

    fn restarter(mem: &Arc<MemoryPlatform>, bus: &Bus, aggr: RestartAggressiveness) -> Restarter {
        Restarter::new(
            mem.platform().units,
            bus.clone(),
            BackoffPolicy::default(),
            aggr.max_attempts(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_accepted() {
        let mem = MemoryPlatform::new(DeviceInfo::new("Google", "com.example.app"));
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        mem.reject_next_starts(2);

        restarter(&mem, &bus, RestartAggressiveness::Standard)
            .request(TaskMode::Persistent)
            .await
            .unwrap();

        assert_eq!(mem.start_requests(), vec![TaskMode::Persistent]);
        let kinds: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::RestartFailed,
                EventKind::RestartFailed,
                EventKind::RestartRequested
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_standard_gives_up_after_three() {
        let mem = MemoryPlatform::new(DeviceInfo::new("Google", "com.example.app"));
        let bus = Bus::new(64);
        mem.reject_next_starts(10);

        let err = restarter(&mem, &bus, RestartAggressiveness::Standard)
            .request(TaskMode::Persistent)
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::RestartExhausted { attempts: 3, .. }));
        assert!(!mem.is_unit_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_aggressive_tries_five_times() {
        let mem = MemoryPlatform::new(DeviceInfo::new("Xiaomi", "com.example.app"));
        let bus = Bus::new(64);
        mem.reject_next_starts(4);

        restarter(&mem, &bus, RestartAggressiveness::Aggressive)
            .request(TaskMode::Persistent)
            .await
            .unwrap();
        assert!(mem.is_unit_running());
    }
}
