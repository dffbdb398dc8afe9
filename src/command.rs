//! # Command surface.
//!
//! Thin facade the host application talks to. Each command maps onto
//! supervisor and platform calls and fails with a [`CommandError`] carrying a
//! stable code, never a panic.
//!
//! [`CommandSurface::call`] exposes the same commands method-channel style:
//!
//! | method                            | arguments                                   | result             |
//! |-----------------------------------|---------------------------------------------|--------------------|
//! | `scheduleTask`                    | `{"interval": 60, "isPersistent": false}`   | `true`             |
//! | `cancelTask`                      | none                                        | `true`             |
//! | `checkPermissions`                | none                                        | [`PermissionReport`] |
//! | `requestPermissions`              | none                                        | `true`             |
//! | `openBatteryOptimizationSettings` | none                                        | `null`             |

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::Supervisor;
use crate::error::CommandError;
use crate::platform::SettingsScreen;
use crate::tasks::TaskMode;

/// Default `scheduleTask` interval in seconds.
pub const DEFAULT_INTERVAL_SECS: u64 = 60;

/// Snapshot of the permissions the supervisor depends on.
///
/// Fields the platform does not gate are omitted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionReport {
    /// Notification permission.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub notification: Option<bool>,
    /// Exact alarm permission.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub exact_alarm: Option<bool>,
    /// Battery optimization exemption.
    pub battery_optimization: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleArgs {
    #[serde(default = "default_interval")]
    interval: u64,
    #[serde(default)]
    is_persistent: bool,
}

fn default_interval() -> u64 {
    DEFAULT_INTERVAL_SECS
}

/// Host-facing commands.
#[derive(Clone)]
pub struct CommandSurface {
    sup: Arc<Supervisor>,
}

impl CommandSurface {
    /// Wraps a supervisor.
    pub fn new(sup: Arc<Supervisor>) -> Self {
        Self { sup }
    }

    /// Starts the unit in the derived mode and arms the wake trigger
    /// `interval_secs` from now. The interval is kept for later re-arms.
    pub async fn schedule_task(
        &self,
        interval_secs: u64,
        is_persistent: bool,
    ) -> Result<(), CommandError> {
        if interval_secs == 0 {
            return Err(CommandError::Schedule {
                message: "interval must be at least one second".into(),
            });
        }
        let mode = TaskMode::from_persistent(is_persistent);
        let interval = Duration::from_secs(interval_secs);
        let schedule_err = |e: &dyn std::fmt::Display| CommandError::Schedule {
            message: e.to_string(),
        };

        self.sup.set_wake_interval(interval).await;
        self.sup
            .platform()
            .units
            .start_unit(mode)
            .await
            .map_err(|e| schedule_err(&e))?;
        self.sup
            .activate(mode, false)
            .await
            .map_err(|e| schedule_err(&e))?;
        self.sup
            .wake()
            .arm(interval)
            .await
            .map_err(|e| schedule_err(&e))?;
        Ok(())
    }

    /// Stops the unit and cancels the wake trigger. Idempotent.
    pub async fn cancel_task(&self) -> Result<(), CommandError> {
        self.sup.cancel().await.map_err(|e| CommandError::Cancel {
            message: e.to_string(),
        })
    }

    /// Reads the current permission state.
    pub async fn check_permissions(&self) -> PermissionReport {
        let platform = self.sup.platform();
        PermissionReport {
            notification: platform.notifier.permission_granted().await,
            exact_alarm: platform.alarms.can_schedule_exact().await,
            battery_optimization: platform.power.is_ignoring_battery_optimizations().await,
        }
    }

    /// Opens the most specific settings screen available for this device.
    pub async fn request_permissions(&self) -> Result<SettingsScreen, CommandError> {
        self.open_first_available().await
    }

    /// Same navigation as [`request_permissions`](Self::request_permissions).
    pub async fn open_battery_optimization_settings(
        &self,
    ) -> Result<SettingsScreen, CommandError> {
        self.open_first_available().await
    }

    /// Candidate screens, most specific first.
    fn settings_candidates(&self) -> Vec<SettingsScreen> {
        let mut screens = Vec::with_capacity(3);
        if let Some(vendor) = self.sup.policy().settings {
            screens.push(SettingsScreen::Vendor(vendor));
        }
        screens.push(SettingsScreen::IgnoreBatteryOptimization {
            package: self.sup.platform().device.package.clone(),
        });
        screens.push(SettingsScreen::BatteryOptimizationList);
        screens
    }

    async fn open_first_available(&self) -> Result<SettingsScreen, CommandError> {
        let navigator = &self.sup.platform().settings;
        let mut last = None;
        for screen in self.settings_candidates() {
            match navigator.open(&screen).await {
                Ok(()) => return Ok(screen),
                Err(e) => last = Some(e),
            }
        }
        Err(CommandError::Settings {
            message: last
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no settings screen available".into()),
        })
    }

    /// Dispatches a command by name with JSON arguments.
    pub async fn call(&self, method: &str, args: Value) -> Result<Value, CommandError> {
        match method {
            "scheduleTask" => {
                let args = if args.is_null() {
                    Value::Object(Default::default())
                } else {
                    args
                };
                let args: ScheduleArgs =
                    serde_json::from_value(args).map_err(|e| CommandError::BadArguments {
                        method: method.to_string(),
                        message: e.to_string(),
                    })?;
                self.schedule_task(args.interval, args.is_persistent).await?;
                Ok(Value::Bool(true))
            }
            "cancelTask" => {
                self.cancel_task().await?;
                Ok(Value::Bool(true))
            }
            "checkPermissions" => {
                let report = self.check_permissions().await;
                serde_json::to_value(report).map_err(|e| CommandError::BadArguments {
                    method: method.to_string(),
                    message: e.to_string(),
                })
            }
            "requestPermissions" => {
                self.request_permissions().await?;
                Ok(Value::Bool(true))
            }
            "openBatteryOptimizationSettings" => {
                self.open_battery_optimization_settings().await?;
                Ok(Value::Null)
            }
            _ => Err(CommandError::NotImplemented {
                method: method.to_string(),
            }),
        }
    }
}
