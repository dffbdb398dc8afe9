//! # Execution mode of the supervised background unit.
//!
//! [`TaskMode`] decides what happens when the unit is torn down:
//!
//! - [`TaskMode::OneTime`] the unit runs until it is stopped and is never restarted.
//! - [`TaskMode::Persistent`] the unit re-arms the wake trigger and requests its own restart.
//!
//! ```text
//! teardown ──► TaskMode::OneTime    → Stopped, nothing armed
//!          └─► TaskMode::Persistent → wake re-armed + restart after grace
//! ```

use serde::{Deserialize, Serialize};

/// Mode requested by the caller for one activation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskMode {
    /// Run once; no restart after teardown (default).
    #[default]
    OneTime,
    /// Self-perpetuating: re-arm the wake trigger and restart after teardown.
    Persistent,
}

impl TaskMode {
    /// Maps the host's `isPersistent` flag to a mode.
    #[inline]
    pub fn from_persistent(persistent: bool) -> Self {
        if persistent {
            TaskMode::Persistent
        } else {
            TaskMode::OneTime
        }
    }

    /// True for [`TaskMode::Persistent`].
    #[inline]
    pub fn is_persistent(self) -> bool {
        matches!(self, TaskMode::Persistent)
    }

    /// Short label for logs and indicator text.
    pub fn as_label(self) -> &'static str {
        match self {
            TaskMode::OneTime => "one-time",
            TaskMode::Persistent => "persistent",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_persistent_flag() {
        assert_eq!(TaskMode::from_persistent(true), TaskMode::Persistent);
        assert_eq!(TaskMode::from_persistent(false), TaskMode::OneTime);
        assert_eq!(TaskMode::default(), TaskMode::OneTime);
    }
}
