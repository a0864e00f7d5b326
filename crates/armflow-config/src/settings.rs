//! armflow settings model

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Audit description written on connections approved by armflow
pub const DEFAULT_APPROVAL_DESCRIPTION: &str = "Auto-Approved by armflow";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub timeouts: Timeouts,
    pub polling: Polling,
    pub approval: Approval,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        let t = &self.timeouts;
        for (name, secs) in [
            ("create_secs", t.create_secs),
            ("read_secs", t.read_secs),
            ("update_secs", t.update_secs),
            ("delete_secs", t.delete_secs),
        ] {
            if secs == 0 {
                return Err(ConfigError::Invalid(format!(
                    "timeouts.{} must be greater than zero",
                    name
                )));
            }
        }
        if self.polling.continuous_target_occurrence == 0 {
            return Err(ConfigError::Invalid(
                "polling.continuous_target_occurrence must be at least 1".to_string(),
            ));
        }
        if self.polling.min_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "polling.min_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.approval.description.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "approval.description must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Per-operation budgets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Timeouts {
    pub create_secs: u64,
    pub read_secs: u64,
    pub update_secs: u64,
    pub delete_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create_secs: 60 * 60,
            read_secs: 5 * 60,
            update_secs: 60 * 60,
            delete_secs: 60 * 60,
        }
    }
}

impl Timeouts {
    pub fn create(&self) -> Duration {
        Duration::from_secs(self.create_secs)
    }

    pub fn read(&self) -> Duration {
        Duration::from_secs(self.read_secs)
    }

    pub fn update(&self) -> Duration {
        Duration::from_secs(self.update_secs)
    }

    pub fn delete(&self) -> Duration {
        Duration::from_secs(self.delete_secs)
    }
}

/// Reconciler tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Polling {
    pub min_interval_ms: u64,
    /// Fixed interval; exponential backoff from `min_interval_ms` when unset
    pub poll_interval_ms: Option<u64>,
    pub continuous_target_occurrence: u32,
    pub not_found_checks: u32,
}

impl Default for Polling {
    fn default() -> Self {
        Self {
            min_interval_ms: 10_000,
            poll_interval_ms: None,
            continuous_target_occurrence: 3,
            not_found_checks: 20,
        }
    }
}

impl Polling {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Approval {
    pub description: String,
}

impl Default for Approval {
    fn default() -> Self {
        Self {
            description: DEFAULT_APPROVAL_DESCRIPTION.to_string(),
        }
    }
}
