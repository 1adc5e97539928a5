//! Push subscription handles and the registry behind transport-state queries

use futures::stream::Stream;
use kiosk_api_contract::{ChannelState, ScreenChange};
use std::collections::BTreeMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
struct RegistryInner {
    next_id: u64,
    channels: BTreeMap<u64, ChannelState>,
}

/// Tracks the transport state of every live subscription of one store
#[derive(Debug, Clone, Default)]
pub struct ChannelRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add a channel; it stays registered until the handle is dropped
    pub fn register(&self, initial: ChannelState) -> ChannelHandle {
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.channels.insert(id, initial);
        ChannelHandle {
            id,
            registry: self.clone(),
        }
    }

    pub fn states(&self) -> Vec<ChannelState> {
        self.lock().channels.values().copied().collect()
    }

    /// Force every registered channel into `state`
    pub fn set_all(&self, state: ChannelState) {
        for value in self.lock().channels.values_mut() {
            *value = state;
        }
    }

    pub fn len(&self) -> usize {
        self.lock().channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Registry entry owned by one subscription
#[derive(Debug)]
pub struct ChannelHandle {
    id: u64,
    registry: ChannelRegistry,
}

impl ChannelHandle {
    pub fn set(&self, state: ChannelState) {
        if let Some(value) = self.registry.lock().channels.get_mut(&self.id) {
            *value = state;
        }
    }

    pub fn state(&self) -> ChannelState {
        self.registry
            .lock()
            .channels
            .get(&self.id)
            .copied()
            .unwrap_or(ChannelState::Closed)
    }

    /// A cloneable setter for the task driving this channel
    pub fn reporter(&self) -> ChannelReporter {
        ChannelReporter {
            id: self.id,
            registry: self.registry.clone(),
        }
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.registry.lock().channels.remove(&self.id);
    }
}

/// Updates one channel's state without owning its registration
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    id: u64,
    registry: ChannelRegistry,
}

impl ChannelReporter {
    pub fn set(&self, state: ChannelState) {
        if let Some(value) = self.registry.lock().channels.get_mut(&self.id) {
            *value = state;
        }
    }
}

/// Row-scoped change stream
///
/// Owns the background task feeding it and its registry entry; dropping the
/// subscription stops the task and unregisters the channel.
pub struct ScreenSubscription {
    receiver: mpsc::Receiver<ScreenChange>,
    channel: ChannelHandle,
    task: Option<JoinHandle<()>>,
}

impl ScreenSubscription {
    pub fn new(receiver: mpsc::Receiver<ScreenChange>, channel: ChannelHandle) -> Self {
        Self {
            receiver,
            channel,
            task: None,
        }
    }

    /// Attach the task producing events so it is aborted with the subscription
    pub fn with_task(mut self, task: JoinHandle<()>) -> Self {
        self.task = Some(task);
        self
    }

    pub fn state(&self) -> ChannelState {
        self.channel.state()
    }
}

impl Stream for ScreenSubscription {
    type Item = ScreenChange;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for ScreenSubscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
