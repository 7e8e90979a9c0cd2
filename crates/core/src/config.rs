// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

//! Tunables for the policy, timing, and ledger-ordering knobs fixed by
//! §4/§5 as defaults. Loaded from TOML; every field defaults to the value
//! the design fixes, so an empty file is a valid configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::policy::ApplyPolicy;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub retry_delay_ms: u64,
    pub max_retries: u32,
    pub vd_reset_cooldown_s: u64,
    pub verification_spin_ms: u64,
    pub heartbeat_timeout_s: u64,
    pub disconnect_grace_s: u64,
    pub deferral_initial_delay_ms: u64,
    pub prefer_golden_first: bool,
    pub active_poll_interval_s: u64,
    pub suspended_poll_interval_s: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            retry_delay_ms: 300,
            max_retries: 3,
            vd_reset_cooldown_s: 30,
            verification_spin_ms: 500,
            heartbeat_timeout_s: 30,
            disconnect_grace_s: 30,
            deferral_initial_delay_ms: 1500,
            prefer_golden_first: false,
            active_poll_interval_s: 5,
            suspended_poll_interval_s: 30,
        }
    }
}

impl Config {
    pub fn from_toml_str(contents: &str) -> CoreResult<Self> {
        toml::from_str(contents).map_err(|err| CoreError::InvalidConfig(err.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> CoreResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn virtual_display_cooldown(&self) -> Duration {
        Duration::from_secs(self.vd_reset_cooldown_s)
    }

    pub fn verification_spin_bound(&self) -> Duration {
        Duration::from_millis(self.verification_spin_ms)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_s)
    }

    pub fn disconnect_grace(&self) -> Duration {
        Duration::from_secs(self.disconnect_grace_s)
    }

    pub fn deferral_initial_delay(&self) -> Duration {
        Duration::from_millis(self.deferral_initial_delay_ms)
    }

    pub fn active_poll_interval(&self) -> Duration {
        Duration::from_secs(self.active_poll_interval_s)
    }

    pub fn suspended_poll_interval(&self) -> Duration {
        Duration::from_secs(self.suspended_poll_interval_s)
    }

    pub fn apply_policy(&self) -> ApplyPolicy {
        ApplyPolicy {
            retry_delay: self.retry_delay(),
            max_retries: self.max_retries,
            virtual_display_cooldown: self.virtual_display_cooldown(),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
