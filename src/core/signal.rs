//! # Supervisor inbox.
//!
//! Everything that reaches the supervisor from outside its own call stack
//! (OS broadcasts, watchdog findings, delayed retries) arrives as a [`Signal`]
//! on a bounded channel and is handled serially by
//! [`Supervisor::run_until`](crate::Supervisor::run_until).
//!
//! ```text
//!  host: boot / wake / removal ──┐
//!  watchdog loops ───────────────┼──► Inbox::post ──► mpsc ──► run_until ──► dispatch
//!  delayed restarts / retries ───┘        │
//!                                         └─ full/closed ──► SignalDropped event
//! ```

use tokio::sync::mpsc::{self, error::TrySendError};

use crate::events::{Bus, Event, EventKind};
use crate::tasks::TaskMode;

/// Which watchdog loop detected a problem.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatchdogKind {
    /// Generic heartbeat loop.
    Heartbeat,
    /// Indicator watchdog loop.
    Indicator,
    /// Vendor-specific extra watchdog loop.
    Vendor,
}

impl WatchdogKind {
    /// Stable label.
    pub fn as_label(self) -> &'static str {
        match self {
            WatchdogKind::Heartbeat => "heartbeat",
            WatchdogKind::Indicator => "indicator",
            WatchdogKind::Vendor => "vendor",
        }
    }
}

/// A message for the supervisor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signal {
    /// Start request delivered by the OS.
    Activate {
        /// Requested mode.
        mode: TaskMode,
        /// Whether the request comes from a wake trigger.
        wake_retrigger: bool,
    },
    /// Delayed Persistent re-activation from a restart or indicator retry.
    ///
    /// Dropped if the supervisor was cancelled after it was scheduled.
    Reactivate {
        /// Activation epoch the request was scheduled under.
        epoch: u64,
    },
    /// The OS is tearing the unit down.
    Teardown,
    /// The host asked to stop for good.
    Cancel,
    /// The device finished booting.
    BootCompleted,
    /// The armed wake trigger fired.
    WakeFired,
    /// The indicator was removed by the user or the OS.
    IndicatorRemoved,
    /// The indicator watchdog found the indicator missing.
    RepublishIndicator,
    /// A watchdog found the unit unregistered.
    SelfHeal {
        /// Reporting loop.
        source: WatchdogKind,
    },
}

impl Signal {
    /// Stable label.
    pub fn as_label(&self) -> &'static str {
        match self {
            Signal::Activate { .. } => "activate",
            Signal::Reactivate { .. } => "reactivate",
            Signal::Teardown => "teardown",
            Signal::Cancel => "cancel",
            Signal::BootCompleted => "boot_completed",
            Signal::WakeFired => "wake_fired",
            Signal::IndicatorRemoved => "indicator_removed",
            Signal::RepublishIndicator => "republish_indicator",
            Signal::SelfHeal { .. } => "self_heal",
        }
    }
}

/// Sending half of the supervisor inbox. Cheap to clone.
#[derive(Clone)]
pub struct Inbox {
    tx: mpsc::Sender<Signal>,
    bus: Bus,
}

impl Inbox {
    pub(crate) fn channel(capacity: usize, bus: Bus) -> (Self, mpsc::Receiver<Signal>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx, bus }, rx)
    }

    /// Posts a signal without waiting.
    ///
    /// Returns `false` (and publishes [`EventKind::SignalDropped`]) if the inbox
    /// is full or the supervisor is gone.
    pub fn post(&self, signal: Signal) -> bool {
        let reason = match self.tx.try_send(signal) {
            Ok(()) => return true,
            Err(TrySendError::Full(_)) => "inbox full",
            Err(TrySendError::Closed(_)) => "inbox closed",
        };
        self.bus.publish(
            Event::new(EventKind::SignalDropped)
                .with_source(signal.as_label())
                .with_reason(reason),
        );
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_full_inbox_reports_drop() {
        let bus = Bus::new(8);
        let mut events = bus.subscribe();
        let (inbox, mut rx) = Inbox::channel(1, bus);

        assert!(inbox.post(Signal::WakeFired));
        assert!(!inbox.post(Signal::Teardown));

        let ev = events.try_recv().unwrap();
        assert_eq!(ev.kind, EventKind::SignalDropped);
        assert_eq!(ev.source.as_deref(), Some("teardown"));
        assert_eq!(rx.recv().await, Some(Signal::WakeFired));
    }
}
