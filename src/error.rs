//! Error types used by the keepvisor runtime, its platform seams and the command surface.
//!
//! This module defines four error enums:
//!
//! - [`PlatformError`]: failures reported by an OS facility (alarms, indicator, probes, unit host).
//! - [`StoreError`]: failures of the durable state store.
//! - [`RuntimeError`]: errors raised by the supervisor itself.
//! - [`CommandError`]: structured failures returned to the host application.
//!
//! All of them provide `as_label` (stable snake_case strings for logs/metrics).

use std::time::Duration;
use thiserror::Error;

/// # Errors reported by platform facilities.
///
/// Every variant is recoverable; the supervisor maps each one to a local fallback
/// (inexact scheduling, delayed retry, conservative "not running" answer, or the
/// already-armed wake trigger).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// The platform refused an operation behind a (possibly revocable) permission,
    /// or a settings screen has no handler.
    #[error("permission denied: {what}")]
    PermissionDenied {
        /// What was refused.
        what: String,
    },

    /// The OS refused to show or update the liveness indicator.
    #[error("indicator rejected: {reason}")]
    IndicatorRejected {
        /// Platform-supplied reason.
        reason: String,
    },

    /// Process or usage introspection failed.
    #[error("probe failed: {reason}")]
    ProbeFailed {
        /// Platform-supplied reason.
        reason: String,
    },

    /// The OS refused to start (or restart) the background unit.
    #[error("unit start rejected: {reason}")]
    StartRejected {
        /// Platform-supplied reason.
        reason: String,
    },

    /// The facility is not available on this platform or device.
    #[error("unavailable: {what}")]
    Unavailable {
        /// Missing facility.
        what: String,
    },
}

impl PlatformError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use keepvisor::PlatformError;
    ///
    /// let err = PlatformError::StartRejected { reason: "background start".into() };
    /// assert_eq!(err.as_label(), "platform_start_rejected");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            PlatformError::PermissionDenied { .. } => "platform_permission_denied",
            PlatformError::IndicatorRejected { .. } => "platform_indicator_rejected",
            PlatformError::ProbeFailed { .. } => "platform_probe_failed",
            PlatformError::StartRejected { .. } => "platform_start_rejected",
            PlatformError::Unavailable { .. } => "platform_unavailable",
        }
    }

    /// True if the error means a permission gate is closed.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, PlatformError::PermissionDenied { .. })
    }
}

/// # Errors produced by the durable state store.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("store i/o: {0}")]
    Io(#[from] std::io::Error),

    /// The stored document could not be encoded or decoded.
    #[error("store codec: {0}")]
    Codec(#[from] serde_json::Error),
}

impl StoreError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            StoreError::Io(_) => "store_io",
            StoreError::Codec(_) => "store_codec",
        }
    }
}

/// # Errors produced by the supervisor runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The wake lock could not be acquired; activation was abandoned.
    #[error("wake lock unavailable: {0}")]
    WakeLock(PlatformError),

    /// Every bounded unit start attempt was rejected; recovery is left to the armed wake trigger.
    #[error("unit restart exhausted after {attempts} attempts: {last}")]
    RestartExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// The last rejection.
        last: PlatformError,
    },

    /// Watchdog loops did not stop within the grace period and were aborted.
    #[error("watchdog shutdown exceeded {grace:?}; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Loops that had not exited.
        stuck: Vec<String>,
    },

    /// The durable state store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A platform call failed outside any recovery path.
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use keepvisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::WakeLock(_) => "runtime_wake_lock",
            RuntimeError::RestartExhausted { .. } => "runtime_restart_exhausted",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::Store(_) => "runtime_store",
            RuntimeError::Platform(_) => "runtime_platform",
        }
    }
}

/// # Structured failures returned to the host application.
///
/// Each variant carries a stable [`code`](CommandError::code) that the host can
/// match on, plus a human-readable message.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum CommandError {
    /// Starting the unit or scheduling the wake trigger failed.
    #[error("schedule failed: {message}")]
    Schedule {
        /// Details.
        message: String,
    },

    /// Stopping the unit failed.
    #[error("cancel failed: {message}")]
    Cancel {
        /// Details.
        message: String,
    },

    /// No settings screen could be opened.
    #[error("failed to open settings: {message}")]
    Settings {
        /// Details.
        message: String,
    },

    /// Arguments could not be decoded.
    #[error("bad arguments for {method}: {message}")]
    BadArguments {
        /// Method name.
        method: String,
        /// Decoder message.
        message: String,
    },

    /// The method is unknown.
    #[error("method not implemented: {method}")]
    NotImplemented {
        /// Method name.
        method: String,
    },
}

impl CommandError {
    /// Returns the stable error code surfaced to the host.
    ///
    /// # Example
    /// ```
    /// use keepvisor::CommandError;
    ///
    /// let err = CommandError::Cancel { message: "boom".into() };
    /// assert_eq!(err.code(), "CANCEL_ERROR");
    /// ```
    pub fn code(&self) -> &'static str {
        match self {
            CommandError::Schedule { .. } => "SCHEDULE_ERROR",
            CommandError::Cancel { .. } => "CANCEL_ERROR",
            CommandError::Settings { .. } => "SETTINGS_ERROR",
            CommandError::BadArguments { .. } => "BAD_ARGUMENTS",
            CommandError::NotImplemented { .. } => "NOT_IMPLEMENTED",
        }
    }
}
