//! `kiosk run`: drive a device against the real store

use anyhow::{Context, Result};
use clap::Args;
use kiosk_core::{Device, DeviceStatus, KioskConfig, LaunchEnv, Page};
use kiosk_rest_client::{AuthConfig, RestClient};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

use crate::DbArgs;

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Base URL of the screen store
    #[arg(long, env = "KIOSK_STORE_URL")]
    pub store_url: String,

    /// Anonymous API key of the screen store
    #[arg(long, env = "KIOSK_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// JWT sent as bearer token instead of the API key
    #[arg(long, env = "KIOSK_BEARER_TOKEN", hide_env_values = true)]
    pub bearer_token: Option<String>,

    /// Database schema holding the screens table
    #[arg(long, env = "KIOSK_SCHEMA")]
    pub schema: Option<String>,

    /// Durable hostname of this device
    #[arg(long, env = "KIOSK_HOSTNAME", conflicts_with = "launch_url")]
    pub hostname: Option<String>,

    /// URL the device was launched with; its `hostname` query parameter is used
    #[arg(long, env = "KIOSK_LAUNCH_URL")]
    pub launch_url: Option<String>,

    #[command(flatten)]
    pub db: DbArgs,

    /// Seconds between heartbeats
    #[arg(long, env = "KIOSK_HEARTBEAT_SECS", default_value_t = 30)]
    pub heartbeat_secs: u64,

    /// Route of the pairing page
    #[arg(long, env = "KIOSK_PAIRING_PATH", default_value = "/screen")]
    pub pairing_path: String,
}

impl RunArgs {
    pub fn launch_env(&self) -> Result<LaunchEnv> {
        match &self.launch_url {
            Some(url) => LaunchEnv::from_launch_url(url).context("Failed to parse launch URL"),
            None => Ok(LaunchEnv::new().with_hostname(self.hostname.clone())),
        }
    }

    pub fn config(&self) -> Result<KioskConfig> {
        let config = KioskConfig::default()
            .with_heartbeat_interval(Duration::from_secs(self.heartbeat_secs))
            .with_pairing_path(self.pairing_path.clone());
        config.validate()?;
        Ok(config)
    }

    pub fn auth(&self) -> AuthConfig {
        let mut auth = AuthConfig::with_api_key(self.api_key.clone());
        if let Some(jwt) = &self.bearer_token {
            auth = auth.with_bearer(jwt.clone());
        }
        if let Some(schema) = &self.schema {
            auth = auth.with_schema(schema.clone());
        }
        auth
    }

    /// Run the device until Ctrl-C
    pub async fn run(self) -> Result<()> {
        let env = self.launch_env()?;
        let config = self.config()?;
        let client = RestClient::from_url(&self.store_url, self.auth())
            .context("Failed to create screen store client")?;
        let db = self.db.open()?;

        info!(store = %self.store_url, hostname = ?env.hostname, "starting kiosk");
        let pairing_path = config.pairing_path.clone();
        let device = Device::new(Arc::new(client), Arc::new(db), env, config);
        let reporter = tokio::spawn(report_status(device.status(), pairing_path));

        tokio::select! {
            _ = device.run(Page::Pairing) => {}
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                println!("Stopping kiosk");
            }
        }

        reporter.abort();
        Ok(())
    }
}

/// One line of console output for a status change, if it deserves one
pub fn describe(status: &DeviceStatus, pairing_path: &str) -> Option<String> {
    match status {
        DeviceStatus::Booting => None,
        DeviceStatus::Registering { attempt } => Some(format!("Registering (attempt {attempt})")),
        DeviceStatus::Waiting {
            code: Some(code), ..
        } => Some(format!("Pairing code: {code}")),
        DeviceStatus::Waiting { code: None, .. } => {
            Some("Waiting for assignment (store unreachable, no cached pairing code)".to_string())
        }
        DeviceStatus::Stalled { attempts } => Some(format!(
            "Registration stalled after {attempts} attempts. Refresh the device to retry."
        )),
        DeviceStatus::Showing { path } => Some(format!("Showing {path}")),
        DeviceStatus::Navigating(destination) => match destination.route(pairing_path) {
            Some(route) => Some(format!("Navigating to {route}")),
            None => Some("Reloading".to_string()),
        },
    }
}

async fn report_status(mut status: watch::Receiver<DeviceStatus>, pairing_path: String) {
    loop {
        let current = status.borrow_and_update().clone();
        if let Some(line) = describe(&current, &pairing_path) {
            println!("{line}");
        }
        if status.changed().await.is_err() {
            return;
        }
    }
}
