//! # LogWriter: renders events through `tracing`.
//!
//! A subscriber that turns every [`Event`] into one structured `tracing` record.
//! Install any `tracing` subscriber (e.g. `tracing-subscriber`) in the host binary
//! to see them.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO keepvisor: activated mode=persistent retrigger=false
//! DEBUG keepvisor: heartbeat mode=persistent source=heartbeat
//! WARN keepvisor: self-heal requested source=vendor
//! WARN keepvisor: unit start rejected mode=persistent attempt=1 delay_ms=500 reason=...
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let mode = e.mode.map(|m| m.as_label()).unwrap_or("-");
        let source = e.source.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");

        match e.kind {
            EventKind::Activated => {
                info!(target: "keepvisor", seq = e.seq, mode, retrigger = e.retrigger, "activated")
            }
            EventKind::Refreshed => {
                debug!(target: "keepvisor", seq = e.seq, mode, retrigger = e.retrigger, "already running, indicator refreshed")
            }
            EventKind::ActivationFailed => {
                error!(target: "keepvisor", seq = e.seq, mode, reason, "activation failed")
            }
            EventKind::ActivationSuperseded => {
                info!(target: "keepvisor", seq = e.seq, source, "stale activation dropped")
            }
            EventKind::TeardownStarted => info!(target: "keepvisor", seq = e.seq, mode, "teardown"),
            EventKind::Stopped => info!(target: "keepvisor", seq = e.seq, "stopped"),
            EventKind::Cancelled => info!(target: "keepvisor", seq = e.seq, "cancelled"),
            EventKind::ShutdownRequested => {
                info!(target: "keepvisor", seq = e.seq, "shutdown signal received")
            }
            EventKind::BootCompleted => {
                info!(target: "keepvisor", seq = e.seq, mode, reason, "boot completed")
            }
            EventKind::WatchdogsStarted => {
                debug!(target: "keepvisor", seq = e.seq, loops = e.attempt, "watchdogs started")
            }
            EventKind::WatchdogsStopped => debug!(target: "keepvisor", seq = e.seq, "watchdogs stopped"),
            EventKind::GraceExceeded => {
                warn!(target: "keepvisor", seq = e.seq, stuck = reason, "watchdog grace exceeded")
            }
            EventKind::Heartbeat => debug!(target: "keepvisor", seq = e.seq, mode, source, "heartbeat"),
            EventKind::SelfHealRequested => {
                warn!(target: "keepvisor", seq = e.seq, source, "self-heal requested")
            }
            EventKind::ComponentReassertFailed => {
                warn!(target: "keepvisor", seq = e.seq, reason, "component re-enable failed")
            }
            EventKind::SignalDropped => {
                warn!(target: "keepvisor", seq = e.seq, signal = source, reason, "signal dropped")
            }
            EventKind::IndicatorPublished => {
                debug!(target: "keepvisor", seq = e.seq, mode, "indicator published")
            }
            EventKind::IndicatorMissing => {
                warn!(target: "keepvisor", seq = e.seq, source, "indicator missing")
            }
            EventKind::IndicatorPublishFailed => {
                error!(target: "keepvisor", seq = e.seq, mode, reason, "indicator publish failed")
            }
            EventKind::IndicatorRetryScheduled => {
                info!(target: "keepvisor", seq = e.seq, delay_ms = e.delay_ms, "activation retry scheduled")
            }
            EventKind::IndicatorWithdrawn => debug!(target: "keepvisor", seq = e.seq, "indicator withdrawn"),
            EventKind::WakeArmed => {
                debug!(target: "keepvisor", seq = e.seq, delay_ms = e.delay_ms, precision = reason, "wake armed")
            }
            EventKind::WakeExactDenied => {
                warn!(target: "keepvisor", seq = e.seq, reason, "exact wake denied, using inexact")
            }
            EventKind::WakeArmFailed => {
                error!(target: "keepvisor", seq = e.seq, reason, "wake trigger could not be armed")
            }
            EventKind::WakeCancelled => debug!(target: "keepvisor", seq = e.seq, "wake cancelled"),
            EventKind::WakeFired => info!(target: "keepvisor", seq = e.seq, mode, "wake fired"),
            EventKind::WakeLockAcquired => debug!(target: "keepvisor", seq = e.seq, "wake lock acquired"),
            EventKind::WakeLockReleased => debug!(target: "keepvisor", seq = e.seq, "wake lock released"),
            EventKind::RestartScheduled => {
                info!(target: "keepvisor", seq = e.seq, delay_ms = e.delay_ms, "restart scheduled")
            }
            EventKind::RestartRequested => {
                info!(target: "keepvisor", seq = e.seq, mode, attempt = e.attempt, "unit start requested")
            }
            EventKind::RestartFailed => {
                warn!(
                    target: "keepvisor",
                    seq = e.seq,
                    mode,
                    attempt = e.attempt,
                    delay_ms = e.delay_ms,
                    reason,
                    "unit start rejected"
                )
            }
            EventKind::RestartExhausted => {
                error!(target: "keepvisor", seq = e.seq, mode, attempt = e.attempt, reason, "unit restart exhausted, waiting for wake")
            }
            EventKind::StoreFailed => error!(target: "keepvisor", seq = e.seq, reason, "state store failed"),
            EventKind::SubscriberOverflow => {
                warn!(target: "keepvisor", seq = e.seq, subscriber = source, reason, "subscriber overflow")
            }
            EventKind::SubscriberPanicked => {
                error!(target: "keepvisor", seq = e.seq, subscriber = source, reason, "subscriber panicked")
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
