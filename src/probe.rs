//! # Presence probe.
//!
//! Best-effort answers to two questions the watchdog loops ask on every tick.
//! Introspection failures never propagate: they read as "no".

use std::sync::Arc;
use std::time::Duration;

use crate::platform::Introspector;

/// Foreground and registration checks.
pub struct PresenceProbe {
    introspector: Arc<dyn Introspector>,
    package: String,
    unit_identity: String,
    lookback: Duration,
}

impl PresenceProbe {
    /// Creates a probe for `package`, whose unit is named `unit_name`.
    pub fn new(
        introspector: Arc<dyn Introspector>,
        package: &str,
        unit_name: &str,
        lookback: Duration,
    ) -> Self {
        Self {
            introspector,
            package: package.to_string(),
            unit_identity: format!("{package}/{unit_name}"),
            lookback,
        }
    }

    /// Identity the OS reports for our unit.
    pub fn unit_identity(&self) -> &str {
        &self.unit_identity
    }

    /// True when the most recently used package in the lookback window is ours.
    pub async fn is_foreground(&self) -> bool {
        let Ok(records) = self.introspector.recent_usage(self.lookback).await else {
            return false;
        };
        records
            .iter()
            .max_by_key(|r| r.last_used)
            .is_some_and(|r| r.package == self.package)
    }

    /// True when our unit is in the OS running-unit list.
    pub async fn is_own_unit_registered(&self) -> bool {
        self.introspector
            .running_units()
            .await
            .map(|units| units.iter().any(|u| *u == self.unit_identity))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::memory::MemoryPlatform;
    use crate::platform::{DeviceInfo, UnitHost};
    use crate::tasks::TaskMode;

    fn probe(mem: &Arc<MemoryPlatform>) -> PresenceProbe {
        PresenceProbe::new(
            mem.platform().introspector,
            "com.example.app",
            "BackgroundUnit",
            Duration::from_secs(60),
        )
    }

    #[tokio::test]
    async fn test_foreground_follows_latest_record() {
        let mem = MemoryPlatform::new(DeviceInfo::new("Xiaomi", "com.example.app"));
        let probe = probe(&mem);
        assert!(!probe.is_foreground().await);

        mem.set_foreground(true);
        assert!(probe.is_foreground().await);

        std::thread::sleep(Duration::from_millis(5));
        mem.set_foreground(false);
        assert!(!probe.is_foreground().await);
    }

    #[tokio::test]
    async fn test_registration_exact_identity() {
        let mem = MemoryPlatform::new(DeviceInfo::new("Xiaomi", "com.example.app"));
        let probe = probe(&mem);
        assert!(!probe.is_own_unit_registered().await);

        mem.start_unit(TaskMode::Persistent).await.unwrap();
        assert!(probe.is_own_unit_registered().await);

        mem.kill_unit();
        assert!(!probe.is_own_unit_registered().await);
    }

    #[tokio::test]
    async fn test_registration_uses_configured_unit_name() {
        let mem = MemoryPlatform::with_unit_name(
            DeviceInfo::new("Xiaomi", "com.example.app"),
            "SyncUnit",
        );
        mem.start_unit(TaskMode::Persistent).await.unwrap();

        assert!(!probe(&mem).is_own_unit_registered().await);
        let named = PresenceProbe::new(
            mem.platform().introspector,
            "com.example.app",
            "SyncUnit",
            Duration::from_secs(60),
        );
        assert_eq!(named.unit_identity(), "com.example.app/SyncUnit");
        assert!(named.is_own_unit_registered().await);
    }

    #[tokio::test]
    async fn test_failures_read_as_absent() {
        let mem = MemoryPlatform::new(DeviceInfo::new("Xiaomi", "com.example.app"));
        let probe = probe(&mem);
        mem.start_unit(TaskMode::Persistent).await.unwrap();
        mem.set_foreground(true);
        mem.fail_introspection(true);

        assert!(!probe.is_foreground().await);
        assert!(!probe.is_own_unit_registered().await);
    }
}
