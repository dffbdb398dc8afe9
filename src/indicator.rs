//! # Status indicator manager.
//!
//! Owns the wording and identity of the single user-visible liveness indicator.
//! While the supervisor is running at most one indicator exists, keyed by
//! [`INDICATOR_ID`].

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::error::PlatformError;
use crate::platform::{ChannelSpec, Indicator, Notifier};
use crate::policies::Importance;
use crate::tasks::TaskMode;

/// Fixed identifier of the liveness indicator.
pub const INDICATOR_ID: u32 = 1;

/// Channel the indicator is posted on.
pub const CHANNEL_ID: &str = "background_task_channel";

const CHANNEL_NAME: &str = "Background Task Channel";
const CHANNEL_DESCRIPTION: &str = "Shows while the background task is running";
const TITLE: &str = "Background Task Running";

/// Publishes, checks and withdraws the liveness indicator.
pub struct IndicatorManager {
    notifier: Arc<dyn Notifier>,
    channel: ChannelSpec,
}

impl IndicatorManager {
    /// Creates a manager whose channel uses `importance`.
    pub fn new(notifier: Arc<dyn Notifier>, importance: Importance) -> Self {
        Self {
            notifier,
            channel: ChannelSpec {
                id: CHANNEL_ID,
                name: CHANNEL_NAME,
                description: CHANNEL_DESCRIPTION,
                importance,
            },
        }
    }

    /// Indicator contents for `mode`.
    pub fn render(mode: TaskMode) -> Indicator {
        let text = match mode {
            TaskMode::Persistent => "Service is active (Persistent)",
            TaskMode::OneTime => "Service is active (One-time)",
        };
        Indicator {
            id: INDICATOR_ID,
            channel: CHANNEL_ID,
            title: TITLE.to_string(),
            text: text.to_string(),
            ongoing: mode.is_persistent(),
            mode,
        }
    }

    /// Ensures the channel exists and posts (or replaces) the indicator.
    pub async fn publish(&self, mode: TaskMode) -> Result<(), PlatformError> {
        self.notifier.ensure_channel(&self.channel).await?;
        self.notifier.post(&Self::render(mode)).await
    }

    /// Whether the indicator is currently shown. A failed query counts as absent.
    pub async fn is_present(&self) -> bool {
        self.notifier
            .active_ids()
            .await
            .map(|ids| ids.contains(&INDICATOR_ID))
            .unwrap_or(false)
    }

    /// Removes the indicator.
    pub async fn withdraw(&self) -> Result<(), PlatformError> {
        self.notifier.remove(INDICATOR_ID).await
    }

    /// Removal notifications from the OS.
    pub fn removals(&self) -> broadcast::Receiver<u32> {
        self.notifier.removals()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::DeviceInfo;
    use crate::platform::memory::MemoryPlatform;

    #[test]
    fn test_render_wording_per_mode() {
        let p = IndicatorManager::render(TaskMode::Persistent);
        assert_eq!(p.text, "Service is active (Persistent)");
        assert!(p.ongoing);

        let o = IndicatorManager::render(TaskMode::OneTime);
        assert_eq!(o.text, "Service is active (One-time)");
        assert!(!o.ongoing);
        assert_eq!(o.id, INDICATOR_ID);
    }

    #[tokio::test]
    async fn test_publish_replaces_single_indicator() {
        let mem = MemoryPlatform::new(DeviceInfo::new("Samsung", "com.example.app"));
        let mgr = IndicatorManager::new(mem.platform().notifier, Importance::Default);

        mgr.publish(TaskMode::OneTime).await.unwrap();
        mgr.publish(TaskMode::Persistent).await.unwrap();

        let shown = mem.indicators();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].mode, TaskMode::Persistent);
        assert_eq!(mem.channels()[0].importance, Importance::Default);
        assert!(mgr.is_present().await);

        mgr.withdraw().await.unwrap();
        assert!(!mgr.is_present().await);
    }

    #[tokio::test]
    async fn test_publish_refusal_surfaces() {
        let mem = MemoryPlatform::new(DeviceInfo::new("Google", "com.example.app"));
        let mgr = IndicatorManager::new(mem.platform().notifier, Importance::Low);
        mem.reject_next_posts(1);

        let err = mgr.publish(TaskMode::Persistent).await.unwrap_err();
        assert!(matches!(err, PlatformError::IndicatorRejected { .. }));
        assert!(!mgr.is_present().await);
    }
}
