//! Tiered identity recovery.
//!
//! Runs once per pairing-page load. Each [`Tier`] either settles the boot
//! (navigate, or wait for pairing with a known code) or falls through to the
//! next one. Tiers run strictly in order and never concurrently.
//!
//! 1. [`Tier::Hostname`]: look the launch hostname up in the store.
//!    Survives a wiped local cache.
//! 2. [`Tier::LocalCache`]: verify the cached id with a single heartbeat,
//!    which writes liveness and returns the row in one round trip.
//! 3. [`Tier::Registration`]: insert a new row under a fresh code.

use kiosk_api_contract::{Heartbeat, NewScreen, Screen, ScreenId};
use kiosk_client_api::{ScreenStore, StoreError};
use std::fmt;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::assignment::effective_assignment;
use crate::cache::{CacheKey, LocalIdentity};
use crate::code::CodeSource;
use crate::config::KioskConfig;
use crate::device::DeviceStatus;
use crate::env::LaunchEnv;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Hostname,
    LocalCache,
    Registration,
}

impl Tier {
    /// Evaluation order.
    pub const ORDER: [Tier; 3] = [Tier::Hostname, Tier::LocalCache, Tier::Registration];
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Hostname => f.write_str("hostname"),
            Tier::LocalCache => f.write_str("local-cache"),
            Tier::Registration => f.write_str("registration"),
        }
    }
}

/// Identity to show on the code-waiting screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitingScreen {
    pub screen_id: ScreenId,
    /// `None` only when a transport failure left nothing but a cached id
    pub code: Option<String>,
}

impl WaitingScreen {
    fn from_row(row: Screen) -> Self {
        Self {
            screen_id: row.id,
            code: row.code,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TierOutcome {
    Navigate(String),
    Wait(WaitingScreen),
    FallThrough,
}

/// Final result of a boot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Navigate(String),
    Waiting(WaitingScreen),
    /// Registration gave up; a human has to refresh the device
    Stalled { attempts: u32 },
}

pub struct IdentityResolver<'a> {
    store: &'a dyn ScreenStore,
    cache: &'a LocalIdentity,
    env: &'a LaunchEnv,
    config: &'a KioskConfig,
    codes: &'a mut dyn CodeSource,
    status: Option<&'a watch::Sender<DeviceStatus>>,
    attempts: u32,
}

impl<'a> IdentityResolver<'a> {
    pub fn new(
        store: &'a dyn ScreenStore,
        cache: &'a LocalIdentity,
        env: &'a LaunchEnv,
        config: &'a KioskConfig,
        codes: &'a mut dyn CodeSource,
    ) -> Self {
        Self {
            store,
            cache,
            env,
            config,
            codes,
            status: None,
            attempts: 0,
        }
    }

    /// Publish registration progress to `status`.
    pub fn with_status(mut self, status: &'a watch::Sender<DeviceStatus>) -> Self {
        self.status = Some(status);
        self
    }

    /// Registration attempts made so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub async fn resolve(&mut self) -> Resolution {
        for tier in Tier::ORDER {
            let outcome = self.run_tier(tier).await;
            info!(tier = %tier, outcome = ?outcome, "identity tier finished");
            match outcome {
                TierOutcome::Navigate(path) => return Resolution::Navigate(path),
                TierOutcome::Wait(waiting) => return Resolution::Waiting(waiting),
                TierOutcome::FallThrough => continue,
            }
        }
        Resolution::Stalled {
            attempts: self.attempts,
        }
    }

    pub async fn run_tier(&mut self, tier: Tier) -> TierOutcome {
        match tier {
            Tier::Hostname => self.recover_by_hostname().await,
            Tier::LocalCache => self.recover_from_cache().await,
            Tier::Registration => self.register().await,
        }
    }

    fn heartbeat(&self) -> Heartbeat {
        Heartbeat::now()
            .with_name(self.env.hostname.clone())
            .with_user_agent(self.env.user_agent.clone())
    }

    /// Cache the row's assignment and navigate, or wait with its code.
    fn settle(&self, row: Screen) -> TierOutcome {
        match self.assignment(&row) {
            Some(path) => {
                self.cache.write(CacheKey::AssignedPath, &path);
                TierOutcome::Navigate(path)
            }
            None => {
                self.cache.forget(CacheKey::AssignedPath);
                if let Some(code) = &row.code {
                    self.cache.write(CacheKey::ScreenCode, code);
                }
                TierOutcome::Wait(WaitingScreen::from_row(row))
            }
        }
    }

    fn assignment(&self, row: &Screen) -> Option<String> {
        effective_assignment(row.assignment(), &self.config.pairing_path).map(str::to_string)
    }

    async fn recover_by_hostname(&mut self) -> TierOutcome {
        let Some(hostname) = self.env.hostname.as_deref() else {
            return TierOutcome::FallThrough;
        };
        self.cache.write(CacheKey::ScreenName, hostname);

        let row = match self.store.find_latest_by_name(hostname).await {
            Ok(Some(row)) => row,
            Ok(None) => {
                info!(hostname, "no screen registered under hostname");
                return TierOutcome::FallThrough;
            }
            Err(e) => {
                warn!(hostname, error = %e, "hostname lookup failed");
                return TierOutcome::FallThrough;
            }
        };

        self.cache.write(CacheKey::ScreenId, row.id.as_str());
        if let Some(code) = &row.code {
            self.cache.write(CacheKey::ScreenCode, code);
        }

        let row = match self.store.heartbeat(&row.id, &self.heartbeat()).await {
            Ok(fresh) => fresh,
            Err(StoreError::NotFound) => {
                self.cache.purge();
                return TierOutcome::FallThrough;
            }
            Err(e) => {
                warn!(screen_id = %row.id, error = %e, "heartbeat after hostname recovery failed");
                row
            }
        };
        self.settle(row)
    }

    async fn recover_from_cache(&mut self) -> TierOutcome {
        let Some(screen_id) = self.cache.screen_id() else {
            return TierOutcome::FallThrough;
        };
        let cached_path = self.cache.read(CacheKey::AssignedPath);

        match self.store.heartbeat(&screen_id, &self.heartbeat()).await {
            Ok(row) => match cached_path {
                Some(cached) if self.assignment(&row).is_none() => TierOutcome::Navigate(cached),
                _ => self.settle(row),
            },
            Err(StoreError::NotFound) => {
                info!(screen_id = %screen_id, "cached screen no longer exists");
                self.cache.purge();
                TierOutcome::FallThrough
            }
            Err(e) => match cached_path {
                Some(path) => {
                    warn!(screen_id = %screen_id, error = %e, path = %path, "store unreachable; using cached assignment");
                    TierOutcome::Navigate(path)
                }
                None => {
                    // Keep the recoverable id rather than registering a new one.
                    warn!(screen_id = %screen_id, error = %e, "store unreachable; waiting with cached identity");
                    TierOutcome::Wait(WaitingScreen {
                        screen_id,
                        code: self.cache.read(CacheKey::ScreenCode),
                    })
                }
            },
        }
    }

    async fn register(&mut self) -> TierOutcome {
        let max = self.config.max_registration_attempts;
        while self.attempts < max {
            self.attempts += 1;
            let attempt = self.attempts;
            if let Some(status) = self.status {
                status.send_replace(DeviceStatus::Registering { attempt });
            }

            let code = self.codes.next_code();
            let new_screen =
                NewScreen::new(code.clone(), self.env.user_agent.clone()).with_name(self.env.hostname.clone());

            match self.store.insert_screen(&new_screen).await {
                Ok(row) => {
                    info!(screen_id = %row.id, code = %code, attempt, "registered new screen");
                    self.cache.write(CacheKey::ScreenId, row.id.as_str());
                    self.cache.write(CacheKey::ScreenCode, &code);
                    self.cache.forget(CacheKey::AssignedPath);
                    return TierOutcome::Wait(WaitingScreen {
                        screen_id: row.id,
                        code: Some(code),
                    });
                }
                Err(StoreError::UniqueViolation(_)) => {
                    info!(code = %code, attempt, "pairing code taken; regenerating");
                }
                Err(e) => {
                    warn!(code = %code, attempt, error = %e, "registration failed");
                    if attempt < max {
                        sleep(self.config.registration_retry_delay).await;
                    }
                }
            }
        }
        warn!(attempts = self.attempts, "registration attempts exhausted");
        TierOutcome::FallThrough
    }
}
