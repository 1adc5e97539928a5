//! Page-load runtime for one device.
//!
//! Each call to [`Device::load_page`] models one full page load: it starts
//! whatever the page needs inside a fresh [`PageScope`], waits for the first
//! navigation, tears the scope down and returns where to go next.

use kiosk_api_contract::ScreenId;
use kiosk_client_api::ScreenStore;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::assignment::AssignmentReconciler;
use crate::cache::{IdentityCache, LocalIdentity};
use crate::channel::AssignmentChannel;
use crate::code::{generate_code, CodeSource};
use crate::config::KioskConfig;
use crate::env::LaunchEnv;
use crate::health;
use crate::navigation::{Destination, NavigationLatch, Page};
use crate::resolver::{IdentityResolver, Resolution};
use crate::scope::PageScope;

/// What the device is currently showing or doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceStatus {
    Booting,
    Registering { attempt: u32 },
    Waiting { screen_id: String, code: Option<String> },
    /// Registration gave up; needs a human-initiated refresh
    Stalled { attempts: u32 },
    Showing { path: String },
    Navigating(Destination),
}

pub struct Device {
    store: Arc<dyn ScreenStore>,
    cache: LocalIdentity,
    env: LaunchEnv,
    config: KioskConfig,
    codes: Box<dyn CodeSource>,
    status: Arc<watch::Sender<DeviceStatus>>,
}

impl Device {
    pub fn new(
        store: Arc<dyn ScreenStore>,
        cache: Arc<dyn IdentityCache>,
        env: LaunchEnv,
        config: KioskConfig,
    ) -> Self {
        let (status, _) = watch::channel(DeviceStatus::Booting);
        Self {
            store,
            cache: LocalIdentity::new(cache),
            env,
            config,
            codes: Box::new(generate_code),
            status: Arc::new(status),
        }
    }

    /// Replace the random code generator.
    pub fn with_codes(mut self, codes: impl CodeSource + 'static) -> Self {
        self.codes = Box::new(codes);
        self
    }

    pub fn status(&self) -> watch::Receiver<DeviceStatus> {
        self.status.subscribe()
    }

    pub fn identity(&self) -> &LocalIdentity {
        &self.cache
    }

    fn publish(&self, status: DeviceStatus) {
        self.status.send_replace(status);
    }

    /// Load pages forever, following every navigation.
    pub async fn run(mut self, mut page: Page) {
        loop {
            let destination = self.load_page(page.clone()).await;
            page = page.next(&destination);
        }
    }

    /// Run one page load and return the navigation that ended it.
    ///
    /// A stalled registration never returns; the device waits for a human.
    pub async fn load_page(&mut self, page: Page) -> Destination {
        self.publish(DeviceStatus::Booting);
        info!(route = page.route(&self.config.pairing_path), "loading page");

        let latch = NavigationLatch::new();
        let mut scope = PageScope::new();
        let destination = match &page {
            Page::Pairing => self.load_pairing(&latch, &mut scope).await,
            Page::Assigned(path) => self.load_assigned(path.clone(), &latch, &mut scope).await,
        };
        scope.teardown();

        match destination.route(&self.config.pairing_path) {
            Some(route) => info!(route, "navigating"),
            None => info!(route = page.route(&self.config.pairing_path), "reloading"),
        }
        self.publish(DeviceStatus::Navigating(destination.clone()));
        destination
    }

    async fn load_pairing(&mut self, latch: &NavigationLatch, scope: &mut PageScope) -> Destination {
        let resolution = IdentityResolver::new(
            self.store.as_ref(),
            &self.cache,
            &self.env,
            &self.config,
            self.codes.as_mut(),
        )
        .with_status(&self.status)
        .resolve()
        .await;

        match resolution {
            Resolution::Navigate(path) => Destination::Assigned(path),
            Resolution::Waiting(waiting) => {
                self.publish(DeviceStatus::Waiting {
                    screen_id: waiting.screen_id.to_string(),
                    code: waiting.code.clone(),
                });
                self.start_channel(Page::Pairing, waiting.screen_id, latch, scope);
                latch.wait().await
            }
            Resolution::Stalled { attempts } => {
                error!(attempts, "registration stalled; refresh the device to retry");
                self.publish(DeviceStatus::Stalled { attempts });
                std::future::pending().await
            }
        }
    }

    async fn load_assigned(
        &mut self,
        path: String,
        latch: &NavigationLatch,
        scope: &mut PageScope,
    ) -> Destination {
        self.publish(DeviceStatus::Showing { path: path.clone() });

        let Some(screen_id) = self.cache.screen_id() else {
            warn!(path = %path, "assigned page loaded without a cached identity");
            return Destination::Pairing;
        };

        let reconciler = self.start_channel(Page::Assigned(path), screen_id, latch, scope);
        scope.spawn(health::monitor(
            self.store.clone(),
            reconciler,
            self.config.clone(),
        ));
        latch.wait().await
    }

    fn start_channel(
        &self,
        page: Page,
        screen_id: ScreenId,
        latch: &NavigationLatch,
        scope: &mut PageScope,
    ) -> Arc<AssignmentReconciler> {
        let reconciler = Arc::new(
            AssignmentReconciler::new(page, latch.clone(), self.cache.clone())
                .with_pairing_path(self.config.pairing_path.clone()),
        );
        AssignmentChannel::new(
            self.store.clone(),
            screen_id,
            reconciler.clone(),
            self.config.clone(),
        )
        .with_hostname(self.env.hostname.clone())
        .with_status(self.status.clone())
        .spawn(scope);
        reconciler
    }
}
