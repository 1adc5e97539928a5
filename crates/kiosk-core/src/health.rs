//! Push channel liveness backstop.
//!
//! The push feed can degrade without ever reporting an error to the code
//! consuming it. The monitor samples the transport state of every live
//! subscription and reloads the page once all of them have been dead for
//! longer than the configured threshold.

use kiosk_api_contract::ChannelState;
use kiosk_client_api::ScreenStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::assignment::{AssignmentReconciler, Source};
use crate::config::KioskConfig;

/// Result of one health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthVerdict {
    /// At least one channel is alive, or there is nothing to judge
    Healthy,
    /// Every channel is dead, not yet for long enough
    Disconnected { since: Instant },
    /// Every channel has been dead for at least the threshold
    Reload,
}

/// Tracks how long every push channel has been dead.
#[derive(Debug, Clone)]
pub struct DisconnectTracker {
    threshold: Duration,
    since: Option<Instant>,
}

impl DisconnectTracker {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            since: None,
        }
    }

    pub fn disconnected_since(&self) -> Option<Instant> {
        self.since
    }

    pub fn check(&mut self, states: &[ChannelState], now: Instant) -> HealthVerdict {
        let all_dead = !states.is_empty() && states.iter().all(|state| state.is_dead());
        if !all_dead {
            self.since = None;
            return HealthVerdict::Healthy;
        }

        let since = *self.since.get_or_insert(now);
        if now.saturating_duration_since(since) >= self.threshold {
            HealthVerdict::Reload
        } else {
            HealthVerdict::Disconnected { since }
        }
    }
}

/// Check the store's channels every health-check interval until the page
/// navigates or the threshold forces a reload.
pub async fn monitor(
    store: Arc<dyn ScreenStore>,
    reconciler: Arc<AssignmentReconciler>,
    config: KioskConfig,
) {
    let mut tracker = DisconnectTracker::new(config.disconnect_threshold);
    let mut ticker = interval(config.health_check_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if reconciler.has_navigated() {
            return;
        }

        let was_disconnected = tracker.disconnected_since().is_some();
        match tracker.check(&store.channel_states(), Instant::now()) {
            HealthVerdict::Healthy => {
                if was_disconnected {
                    info!("push channel recovered");
                }
            }
            HealthVerdict::Disconnected { since } => {
                debug!(
                    down_secs = since.elapsed().as_secs(),
                    "every push channel is down"
                );
            }
            HealthVerdict::Reload => {
                warn!(
                    threshold_secs = config.disconnect_threshold.as_secs(),
                    "push channels dead past threshold"
                );
                reconciler.force_reload(Source::HealthMonitor);
                return;
            }
        }
    }
}
