//! Screen store trait shared by the REST client, the mock and the device core

use async_trait::async_trait;
use kiosk_api_contract::*;
use thiserror::Error;

pub mod subscription;

pub use subscription::{ChannelHandle, ChannelRegistry, ChannelReporter, ScreenSubscription};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("no matching screen row")]
    NotFound,
    #[error("pairing code {0} is already taken")]
    UniqueViolation(String),
    #[error("store rejected request ({status}): {message}")]
    Server { status: u16, message: String },
    #[error("contract violation: {0}")]
    Contract(String),
}

impl StoreError {
    /// Failures that say nothing about the row itself and are retried later
    pub fn is_transport(&self) -> bool {
        matches!(self, StoreError::Transport(_) | StoreError::Server { .. })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Row store with change notifications, as seen from one device
#[async_trait]
pub trait ScreenStore: Send + Sync {
    /// Point lookup by id. `Ok(None)` when the row does not exist.
    async fn get_screen(&self, id: &ScreenId) -> StoreResult<Option<Screen>>;

    /// Most recently seen screen carrying `name`
    async fn find_latest_by_name(&self, name: &str) -> StoreResult<Option<Screen>>;

    /// Create a row. A taken code yields [`StoreError::UniqueViolation`].
    async fn insert_screen(&self, screen: &NewScreen) -> StoreResult<Screen>;

    /// Write liveness fields and read the row back in the same operation.
    /// A missing row yields [`StoreError::NotFound`].
    async fn heartbeat(&self, id: &ScreenId, beat: &Heartbeat) -> StoreResult<Screen>;

    /// Subscribe to change events scoped to one row
    async fn subscribe(&self, id: &ScreenId) -> StoreResult<ScreenSubscription>;

    /// Transport state of every live subscription
    fn channel_states(&self) -> Vec<ChannelState>;
}
