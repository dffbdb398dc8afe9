//! # Restart aggressiveness.
//!
//! [`RestartAggressiveness`] bounds how many back-to-back unit start attempts the
//! supervisor makes before it gives up and waits for the armed wake trigger.
//!
//! ```text
//! Standard   → 3 attempts, then rely on wake trigger
//! Aggressive → 5 attempts, then rely on wake trigger (vendors with custom killers)
//! ```

/// How hard the supervisor pushes restart requests through.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RestartAggressiveness {
    /// Stock platform behavior (default).
    #[default]
    Standard,
    /// Vendors known to kill backgrounded apps outside the normal stop path.
    Aggressive,
}

impl RestartAggressiveness {
    /// Maximum number of start attempts per restart request (always at least 1).
    pub fn max_attempts(self) -> u32 {
        match self {
            RestartAggressiveness::Standard => 3,
            RestartAggressiveness::Aggressive => 5,
        }
    }
}
