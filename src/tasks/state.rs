//! # Lifecycle state of the supervised unit.
//!
//! ```text
//!            activate                 teardown
//! Stopped ─────────────► Running ─────────────► Destroying
//!    ▲                      ▲                      │
//!    │                      └──── activate ────────┤ (Persistent: restart request)
//!    └──────────────────────────────────────────────┘ (OneTime, or cancel)
//! ```

/// Lifecycle state owned by the [`Supervisor`](crate::Supervisor).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LifecycleState {
    /// Nothing is running and nothing is pending.
    #[default]
    Stopped,
    /// Wake lock held, indicator published, watchdog loops active.
    Running,
    /// Torn down; a Persistent unit waits here for its restart activation.
    Destroying,
}

impl LifecycleState {
    /// Short label for logs/metrics.
    pub fn as_label(self) -> &'static str {
        match self {
            LifecycleState::Stopped => "stopped",
            LifecycleState::Running => "running",
            LifecycleState::Destroying => "destroying",
        }
    }

    /// True if an activation performs the full start sequence from this state.
    #[inline]
    pub fn can_start(self) -> bool {
        !matches!(self, LifecycleState::Running)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_running_skips_start_sequence() {
        assert!(LifecycleState::Stopped.can_start());
        assert!(LifecycleState::Destroying.can_start());
        assert!(!LifecycleState::Running.can_start());
        assert_eq!(LifecycleState::default().as_label(), "stopped");
    }
}
