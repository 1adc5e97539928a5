//! REST client for the kiosk screen store
//!
//! This crate provides an HTTP client for the PostgREST-style screen table
//! exposed by the managed database, including API-key authentication,
//! request/response handling and an SSE change feed for realtime updates.

pub mod auth;
pub mod client;
pub mod error;
pub mod sse;

pub use auth::*;
pub use client::*;
pub use error::*;

use async_trait::async_trait;
use kiosk_api_contract::*;
use kiosk_client_api::{ScreenStore, ScreenSubscription, StoreError, StoreResult};

#[async_trait]
impl ScreenStore for client::RestClient {
    async fn get_screen(&self, id: &ScreenId) -> StoreResult<Option<Screen>> {
        self.get_screen(id).await.map_err(StoreError::from)
    }

    async fn find_latest_by_name(&self, name: &str) -> StoreResult<Option<Screen>> {
        self.find_latest_by_name(name).await.map_err(StoreError::from)
    }

    async fn insert_screen(&self, screen: &NewScreen) -> StoreResult<Screen> {
        self.insert_screen(screen).await.map_err(StoreError::from)
    }

    async fn heartbeat(&self, id: &ScreenId, beat: &Heartbeat) -> StoreResult<Screen> {
        self.heartbeat(id, beat).await.map_err(StoreError::from)?.ok_or(StoreError::NotFound)
    }

    async fn subscribe(&self, id: &ScreenId) -> StoreResult<ScreenSubscription> {
        self.stream_screen_changes(id).map_err(StoreError::from)
    }

    fn channel_states(&self) -> Vec<ChannelState> {
        self.channels().states()
    }
}
