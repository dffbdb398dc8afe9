//! # Runtime events emitted by the supervisor, its watchdog loops and services.
//!
//! The [`EventKind`] enum classifies event types across several categories:
//! - **Lifecycle events**: activation, refresh, teardown, stop, cancel
//! - **Watchdog events**: heartbeat, self-heal requests, loop start/stop
//! - **Service events**: indicator, wake trigger, wake lock, unit restart
//! - **Subscriber events**: overflow and panic reports from the fan-out
//!
//! The [`Event`] struct carries additional metadata such as timestamps, mode,
//! source, reasons and delays.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use keepvisor::{Event, EventKind, TaskMode};
//!
//! let ev = Event::new(EventKind::RestartFailed)
//!     .with_mode(TaskMode::Persistent)
//!     .with_reason("background start not allowed")
//!     .with_attempt(2)
//!     .with_delay(Duration::from_millis(500));
//!
//! assert_eq!(ev.kind, EventKind::RestartFailed);
//! assert_eq!(ev.mode, Some(TaskMode::Persistent));
//! assert_eq!(ev.delay_ms, Some(500));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::tasks::TaskMode;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `source` (subscriber name), `reason` (panic message).
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `source` (subscriber name), `reason`.
    SubscriberOverflow,

    // === Lifecycle events ===
    /// The OS asked the process to terminate (signal observed).
    ShutdownRequested,

    /// Full start sequence completed; state is now Running.
    ///
    /// Sets: `mode`, `retrigger`.
    Activated,

    /// Activation arrived while Running; only the indicator was refreshed.
    ///
    /// Sets: `mode`, `retrigger`.
    Refreshed,

    /// Activation abandoned because the wake lock could not be acquired.
    ///
    /// Sets: `mode`, `reason`.
    ActivationFailed,

    /// Delayed activation dropped because cancel ran after it was scheduled.
    ///
    /// Sets: `source` (trigger name).
    ActivationSuperseded,

    /// Teardown began (Running → Destroying).
    ///
    /// Sets: `mode`.
    TeardownStarted,

    /// The unit reached Stopped.
    Stopped,

    /// Explicit cancel processed.
    Cancelled,

    /// Boot-completed handled.
    ///
    /// Sets: `mode` (persisted mode), `reason` (`"restarting"` / `"idle"`).
    BootCompleted,

    // === Watchdog events ===
    /// Watchdog loops spawned.
    ///
    /// Sets: `attempt` (number of loops).
    WatchdogsStarted,

    /// All watchdog loops observed cancellation and were joined.
    WatchdogsStopped,

    /// Watchdog loops did not stop within grace and were aborted.
    ///
    /// Sets: `reason` (stuck loops).
    GraceExceeded,

    /// Periodic liveness beat (the placeholder payload).
    ///
    /// Sets: `mode`, `source`.
    Heartbeat,

    /// A watchdog detected that the unit is no longer registered.
    ///
    /// Sets: `source` (heartbeat / vendor).
    SelfHealRequested,

    /// Re-asserting the component-enabled flag failed.
    ///
    /// Sets: `reason`.
    ComponentReassertFailed,

    /// A signal could not be queued into the supervisor inbox.
    ///
    /// Sets: `source` (signal name), `reason`.
    SignalDropped,

    // === Indicator events ===
    /// Indicator posted.
    ///
    /// Sets: `mode`.
    IndicatorPublished,

    /// Indicator found absent (watchdog check or OS removal notification).
    ///
    /// Sets: `source`.
    IndicatorMissing,

    /// OS refused to post the indicator.
    ///
    /// Sets: `mode`, `reason`.
    IndicatorPublishFailed,

    /// A delayed activation retry was scheduled after a publish failure.
    ///
    /// Sets: `delay_ms`.
    IndicatorRetryScheduled,

    /// Indicator removed on teardown.
    IndicatorWithdrawn,

    // === Wake trigger events ===
    /// Wake trigger armed.
    ///
    /// Sets: `delay_ms`, `reason` (`"exact"` / `"inexact"`).
    WakeArmed,

    /// Exact scheduling denied; falling back to inexact.
    ///
    /// Sets: `reason`.
    WakeExactDenied,

    /// Neither exact nor inexact scheduling succeeded.
    ///
    /// Sets: `reason`.
    WakeArmFailed,

    /// Wake trigger cancelled.
    WakeCancelled,

    /// Wake trigger delivered to the supervisor.
    ///
    /// Sets: `mode` (persisted mode).
    WakeFired,

    // === Wake lock events ===
    /// Wake lock acquired.
    WakeLockAcquired,

    /// Wake lock released.
    WakeLockReleased,

    // === Restart events ===
    /// Restart request scheduled after teardown.
    ///
    /// Sets: `delay_ms` (grace).
    RestartScheduled,

    /// OS accepted a unit start request.
    ///
    /// Sets: `mode`, `attempt`.
    RestartRequested,

    /// OS rejected a unit start request; retry follows.
    ///
    /// Sets: `mode`, `attempt`, `reason`, `delay_ms` (when another attempt follows).
    RestartFailed,

    /// All bounded start attempts rejected; relying on the armed wake trigger.
    ///
    /// Sets: `mode`, `attempt`, `reason`.
    RestartExhausted,

    // === Store events ===
    /// The durable store failed to read or write.
    ///
    /// Sets: `reason`.
    StoreFailed,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Mode in effect, if applicable.
    pub mode: Option<TaskMode>,
    /// Emitting loop, subscriber or signal name.
    pub source: Option<Arc<str>>,
    /// Human-readable reason (errors, fallback details, etc.).
    pub reason: Option<Arc<str>>,
    /// Delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Attempt count (starting from 1).
    pub attempt: Option<u32>,
    /// True if the activation came from a wake trigger.
    pub retrigger: bool,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            mode: None,
            source: None,
            reason: None,
            delay_ms: None,
            attempt: None,
            retrigger: false,
        }
    }

    /// Attaches the mode in effect.
    #[inline]
    pub fn with_mode(mut self, mode: TaskMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Attaches the emitting source.
    #[inline]
    pub fn with_source(mut self, source: impl Into<Arc<str>>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Marks the event as caused by a wake trigger.
    #[inline]
    pub fn with_retrigger(mut self, retrigger: bool) -> Self {
        self.retrigger = retrigger;
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_source(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_source(subscriber)
            .with_reason(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_is_monotonic() {
        let a = Event::new(EventKind::Heartbeat);
        let b = Event::new(EventKind::Heartbeat);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_delay_saturates() {
        let ev = Event::new(EventKind::WakeArmed).with_delay(Duration::from_secs(u64::MAX / 4));
        assert_eq!(ev.delay_ms, Some(u32::MAX));
    }
}
