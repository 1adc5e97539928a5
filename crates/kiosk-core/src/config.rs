//! Protocol timings and limits.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Route of the pairing page unless configured otherwise.
pub const DEFAULT_PAIRING_PATH: &str = "/screen";

/// Tunables for one device.
///
/// The defaults are the production values; tests shrink nothing and run on
/// paused time instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KioskConfig {
    /// Period of the pull heartbeat. The first beat fires immediately.
    pub heartbeat_interval: Duration,
    /// Period of push channel health checks and subscribe retries.
    pub health_check_interval: Duration,
    /// How long every push channel may stay dead before a forced reload.
    pub disconnect_threshold: Duration,
    /// Registration attempts shared by code collisions and store failures.
    pub max_registration_attempts: u32,
    /// Pause after a registration attempt fails for a reason other than a taken code.
    pub registration_retry_delay: Duration,
    /// Route of the pairing page. An assignment pointing here counts as
    /// no assignment.
    pub pairing_path: String,
}

impl Default for KioskConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            health_check_interval: Duration::from_secs(5),
            disconnect_threshold: Duration::from_secs(120),
            max_registration_attempts: 10,
            registration_retry_delay: Duration::from_secs(1),
            pairing_path: DEFAULT_PAIRING_PATH.to_string(),
        }
    }
}

impl KioskConfig {
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval = interval;
        self
    }

    pub fn with_disconnect_threshold(mut self, threshold: Duration) -> Self {
        self.disconnect_threshold = threshold;
        self
    }

    pub fn with_max_registration_attempts(mut self, attempts: u32) -> Self {
        self.max_registration_attempts = attempts;
        self
    }

    pub fn with_registration_retry_delay(mut self, delay: Duration) -> Self {
        self.registration_retry_delay = delay;
        self
    }

    pub fn with_pairing_path(mut self, path: impl Into<String>) -> Self {
        self.pairing_path = path.into();
        self
    }

    /// Reject values the runtime cannot work with.
    pub fn validate(&self) -> crate::Result<()> {
        if self.heartbeat_interval.is_zero() {
            return Err(crate::Error::config("heartbeat interval must be positive"));
        }
        if self.health_check_interval.is_zero() {
            return Err(crate::Error::config("health check interval must be positive"));
        }
        if self.max_registration_attempts == 0 {
            return Err(crate::Error::config(
                "at least one registration attempt is required",
            ));
        }
        if !self.pairing_path.starts_with('/') {
            return Err(crate::Error::config(format!(
                "pairing path {:?} must start with '/'",
                self.pairing_path
            )));
        }
        Ok(())
    }
}
