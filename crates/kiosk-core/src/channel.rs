//! Heartbeat and push delivery of assignment changes.
//!
//! Both loops run inside the page's [`PageScope`] and feed the same
//! [`AssignmentReconciler`]. Neither ever returns an error: store failures
//! are logged and retried on the next tick.

use futures::StreamExt;
use kiosk_api_contract::{ChangeType, Heartbeat, Screen, ScreenId};
use kiosk_client_api::{ScreenStore, StoreError};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::assignment::{AssignmentReconciler, Source};
use crate::config::KioskConfig;
use crate::device::DeviceStatus;
use crate::navigation::Page;
use crate::scope::PageScope;

/// Pull and push paths for one screen on one page load.
pub struct AssignmentChannel {
    store: Arc<dyn ScreenStore>,
    screen_id: ScreenId,
    reconciler: Arc<AssignmentReconciler>,
    hostname: Option<String>,
    status: Option<Arc<watch::Sender<DeviceStatus>>>,
    config: KioskConfig,
}

impl AssignmentChannel {
    pub fn new(
        store: Arc<dyn ScreenStore>,
        screen_id: ScreenId,
        reconciler: Arc<AssignmentReconciler>,
        config: KioskConfig,
    ) -> Self {
        Self {
            store,
            screen_id,
            reconciler,
            hostname: None,
            status: None,
            config,
        }
    }

    /// Tag every heartbeat with the device's launch hostname.
    pub fn with_hostname(mut self, hostname: Option<String>) -> Self {
        self.hostname = hostname;
        self
    }

    /// Keep the waiting screen's pairing code in step with the row.
    pub fn with_status(mut self, status: Arc<watch::Sender<DeviceStatus>>) -> Self {
        self.status = Some(status);
        self
    }

    /// Start the heartbeat and push loops inside `scope`.
    pub fn spawn(self, scope: &mut PageScope) {
        let channel = Arc::new(self);
        scope.spawn(channel.clone().run_heartbeat());
        scope.spawn(channel.run_push());
    }

    /// Send one heartbeat and reconcile the returned row.
    /// Returns `true` if this beat started navigation.
    pub async fn beat(&self) -> bool {
        let beat = Heartbeat::now()
            .with_current_page(self.reconciler.page().assigned_path().map(str::to_string))
            .with_name(self.hostname.clone());

        match self.store.heartbeat(&self.screen_id, &beat).await {
            Ok(row) => {
                debug!(screen_id = %self.screen_id, assigned = ?row.assigned_path, "heartbeat");
                self.observe(&row, Source::Heartbeat)
            }
            Err(StoreError::NotFound) => self.reconciler.row_absent(Source::Heartbeat),
            Err(e) => {
                warn!(screen_id = %self.screen_id, error = %e, "heartbeat failed; retrying next tick");
                false
            }
        }
    }

    /// Reconcile a fresh copy of the row. Returns `true` if it started navigation.
    fn observe(&self, row: &Screen, source: Source) -> bool {
        if self.reconciler.apply_assignment(row.assignment(), source) {
            return true;
        }
        self.refresh_code(row);
        false
    }

    /// Show the row's pairing code when the waiting screen has none or a stale one.
    fn refresh_code(&self, row: &Screen) {
        let (Some(status), Some(code)) = (&self.status, row.code.as_deref()) else {
            return;
        };
        if *self.reconciler.page() != Page::Pairing || self.reconciler.has_navigated() {
            return;
        }

        let refreshed = status.send_if_modified(|current| match current {
            DeviceStatus::Waiting { code: shown, .. } if shown.as_deref() != Some(code) => {
                *shown = Some(code.to_string());
                true
            }
            _ => false,
        });
        if refreshed {
            self.reconciler.remember_code(code);
            info!(screen_id = %self.screen_id, code, "showing pairing code from the store");
        }
    }

    async fn run_heartbeat(self: Arc<Self>) {
        let mut ticker = interval(self.config.heartbeat_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // The first tick completes immediately.
        loop {
            ticker.tick().await;
            if self.reconciler.has_navigated() || self.beat().await {
                return;
            }
        }
    }

    async fn run_push(self: Arc<Self>) {
        while !self.reconciler.has_navigated() {
            let mut subscription = match self.store.subscribe(&self.screen_id).await {
                Ok(subscription) => subscription,
                Err(e) => {
                    warn!(screen_id = %self.screen_id, error = %e, "push subscribe failed");
                    sleep(self.config.health_check_interval).await;
                    continue;
                }
            };
            info!(screen_id = %self.screen_id, "subscribed to screen changes");

            while let Some(change) = subscription.next().await {
                let navigated = match change.change_type {
                    ChangeType::Delete => self.reconciler.row_absent(Source::Push),
                    ChangeType::Insert | ChangeType::Update => {
                        self.observe(&change.record, Source::Push)
                    }
                };
                if navigated {
                    return;
                }
            }

            // Keep the ended subscription registered so the health monitor
            // sees it as closed.
            debug!(screen_id = %self.screen_id, state = %subscription.state(), "push feed ended");
            std::future::pending::<()>().await;
        }
    }
}
