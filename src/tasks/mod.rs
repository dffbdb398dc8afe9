//! # Unit mode and lifecycle types.
//!
//! - [`TaskMode`] - one-time vs persistent execution, persisted across process death
//! - [`LifecycleState`] - supervisor state machine (stopped / running / destroying)

mod mode;
mod state;

pub use mode::TaskMode;
pub use state::LifecycleState;
