//! # Liveness policy table.
//!
//! Device vendors ship their own process killers on top of the stock platform.
//! [`policy_for`] maps the manufacturer string to a [`VendorPolicy`] by
//! case-insensitive substring match against [`VENDOR_TABLE`]. Unknown vendors get
//! [`VendorPolicy::DEFAULT`], which keeps the extra watchdog disabled.
//!
//! Adding a vendor means adding a row; no code path branches on vendor names.
//!
//! ```rust
//! use keepvisor::{policy_for, RestartAggressiveness};
//!
//! let policy = policy_for("Xiaomi");
//! assert!(policy.extra_watchdog);
//! assert_eq!(policy.restart, RestartAggressiveness::Aggressive);
//!
//! assert!(!policy_for("Google").extra_watchdog);
//! ```

use std::time::Duration;

use super::restart::RestartAggressiveness;

/// Scheduling priority hint applied to the unit's watchdog carriers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PriorityHint {
    /// Leave the platform default.
    #[default]
    Default,
    /// Raise to foreground priority.
    Foreground,
    /// Highest non-realtime priority the platform allows for apps.
    UrgentDisplay,
}

/// Importance of the notification channel carrying the liveness indicator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Importance {
    /// Silent, collapsed (default).
    #[default]
    Low,
    /// Shown in the shade without sound.
    Default,
    /// Some vendors deprioritize units whose indicator channel is low.
    High,
}

/// Vendor-specific settings screen that controls background autostart.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VendorSettings {
    /// Package hosting the screen.
    pub package: &'static str,
    /// Fully-qualified activity name.
    pub activity: &'static str,
}

/// Immutable per-vendor tuning of supervisor behavior.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VendorPolicy {
    /// Vendor classification (`"generic"` for unmatched vendors).
    pub vendor: &'static str,
    /// Priority hint applied on activation.
    pub priority: PriorityHint,
    /// Whether the vendor watchdog loop runs.
    pub extra_watchdog: bool,
    /// Period of the vendor watchdog loop (30–60s).
    pub watchdog_period: Duration,
    /// Indicator channel importance.
    pub importance: Importance,
    /// Bound on back-to-back restart attempts.
    pub restart: RestartAggressiveness,
    /// Vendor autostart/battery screen, if the vendor has one.
    pub settings: Option<VendorSettings>,
}

impl VendorPolicy {
    /// Policy for vendors without a custom killer.
    pub const DEFAULT: VendorPolicy = VendorPolicy {
        vendor: "generic",
        priority: PriorityHint::Default,
        extra_watchdog: false,
        watchdog_period: Duration::from_secs(60),
        importance: Importance::Low,
        restart: RestartAggressiveness::Standard,
        settings: None,
    };
}

impl Default for VendorPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// One row of the policy table.
#[derive(Debug)]
pub struct VendorEntry {
    /// Lowercase fragments matched against the manufacturer string.
    pub fragments: &'static [&'static str],
    /// Policy for matching devices.
    pub policy: VendorPolicy,
}

const fn aggressive(
    vendor: &'static str,
    watchdog_secs: u64,
    settings: VendorSettings,
) -> VendorPolicy {
    VendorPolicy {
        vendor,
        priority: PriorityHint::Foreground,
        extra_watchdog: true,
        watchdog_period: Duration::from_secs(watchdog_secs),
        importance: Importance::High,
        restart: RestartAggressiveness::Aggressive,
        settings: Some(settings),
    }
}

/// Known vendors, first match wins.
pub static VENDOR_TABLE: &[VendorEntry] = &[
    VendorEntry {
        fragments: &["xiaomi", "redmi", "poco"],
        policy: aggressive(
            "xiaomi",
            30,
            VendorSettings {
                package: "com.miui.securitycenter",
                activity: "com.miui.permcenter.autostart.AutoStartManagementActivity",
            },
        ),
    },
    VendorEntry {
        fragments: &["huawei", "honor"],
        policy: aggressive(
            "huawei",
            30,
            VendorSettings {
                package: "com.huawei.systemmanager",
                activity: "com.huawei.systemmanager.startupmgr.ui.StartupNormalAppListActivity",
            },
        ),
    },
    VendorEntry {
        fragments: &["oneplus"],
        policy: aggressive(
            "oneplus",
            45,
            VendorSettings {
                package: "com.oneplus.security",
                activity: "com.oneplus.security.chainlaunch.view.ChainLaunchAppListActivity",
            },
        ),
    },
    VendorEntry {
        fragments: &["oppo", "realme"],
        policy: aggressive(
            "oppo",
            30,
            VendorSettings {
                package: "com.coloros.safecenter",
                activity: "com.coloros.safecenter.permission.startup.StartupAppListActivity",
            },
        ),
    },
    VendorEntry {
        fragments: &["vivo", "iqoo"],
        policy: aggressive(
            "vivo",
            30,
            VendorSettings {
                package: "com.iqoo.secure",
                activity: "com.iqoo.secure.ui.phoneoptimize.AddWhiteListActivity",
            },
        ),
    },
    VendorEntry {
        fragments: &["letv", "leeco"],
        policy: aggressive(
            "letv",
            45,
            VendorSettings {
                package: "com.letv.android.letvsafe",
                activity: "com.letv.android.letvsafe.AutobootManageActivity",
            },
        ),
    },
    VendorEntry {
        fragments: &["meizu"],
        policy: aggressive(
            "meizu",
            45,
            VendorSettings {
                package: "com.meizu.safe",
                activity: "com.meizu.safe.security.SHOW_APPSEC",
            },
        ),
    },
    VendorEntry {
        fragments: &["asus"],
        policy: aggressive(
            "asus",
            60,
            VendorSettings {
                package: "com.asus.mobilemanager",
                activity: "com.asus.mobilemanager.entry.FunctionActivity",
            },
        ),
    },
    VendorEntry {
        fragments: &["samsung"],
        policy: VendorPolicy {
            vendor: "samsung",
            priority: PriorityHint::Foreground,
            extra_watchdog: true,
            watchdog_period: Duration::from_secs(60),
            importance: Importance::Default,
            restart: RestartAggressiveness::Standard,
            settings: Some(VendorSettings {
                package: "com.samsung.android.lool",
                activity: "com.samsung.android.sm.ui.battery.BatteryActivity",
            }),
        },
    },
];

/// Looks up the policy for a manufacturer string.
pub fn policy_for(vendor: &str) -> VendorPolicy {
    let needle = vendor.to_ascii_lowercase();
    VENDOR_TABLE
        .iter()
        .find(|entry| entry.fragments.iter().any(|f| needle.contains(f)))
        .map(|entry| entry.policy)
        .unwrap_or(VendorPolicy::DEFAULT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_is_case_insensitive_substring() {
        assert_eq!(policy_for("XIAOMI").vendor, "xiaomi");
        assert_eq!(policy_for("Redmi Note").vendor, "xiaomi");
        assert_eq!(policy_for("HONOR").vendor, "huawei");
        assert_eq!(policy_for("realme").vendor, "oppo");
        assert_eq!(policy_for("OnePlus").vendor, "oneplus");
        assert_eq!(policy_for("samsung electronics").vendor, "samsung");
    }

    #[test]
    fn test_unknown_vendor_gets_default() {
        let policy = policy_for("Google");
        assert_eq!(policy, VendorPolicy::DEFAULT);
        assert!(!policy.extra_watchdog);
        assert!(policy.settings.is_none());
        assert_eq!(policy_for(""), VendorPolicy::DEFAULT);
    }

    #[test]
    fn test_watchdog_periods_within_bounds() {
        for entry in VENDOR_TABLE {
            let period = entry.policy.watchdog_period;
            assert!(period >= Duration::from_secs(30) && period <= Duration::from_secs(60));
            assert!(entry.fragments.iter().all(|f| *f == f.to_ascii_lowercase()));
        }
    }
}
