//! In-memory screen store for tests
//!
//! Behaves like the real store for every [`ScreenStore`] operation and adds
//! the administrator side (assign, unassign, delete), scripted failures,
//! per-operation call counters and direct control over channel states.

use async_trait::async_trait;
use chrono::Utc;
use kiosk_api_contract::*;
use kiosk_client_api::{ChannelRegistry, ScreenStore, ScreenSubscription, StoreError, StoreResult};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc;

/// Store operations that can be counted or made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetScreen,
    FindByName,
    Insert,
    Heartbeat,
    Subscribe,
}

#[derive(Default)]
struct MockState {
    rows: BTreeMap<ScreenId, Screen>,
    faults: HashMap<Operation, VecDeque<StoreError>>,
    calls: HashMap<Operation, usize>,
    attempted_codes: Vec<String>,
    heartbeats: Vec<(ScreenId, Heartbeat)>,
    subscribers: Vec<(ScreenId, mpsc::Sender<ScreenChange>)>,
    next_id: u64,
}

impl MockState {
    /// Count the call and pop a scripted failure, if any
    fn enter(&mut self, op: Operation) -> StoreResult<()> {
        *self.calls.entry(op).or_default() += 1;
        match self.faults.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn notify(&mut self, change: ScreenChange) {
        let id = change.record.id.clone();
        self.subscribers.retain(|(_, tx)| !tx.is_closed());
        for (_, tx) in self.subscribers.iter().filter(|(sub, _)| *sub == id) {
            let _ = tx.try_send(change.clone());
        }
    }
}

#[derive(Default)]
pub struct MockStore {
    state: Mutex<MockState>,
    channels: ChannelRegistry,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert an existing row as if it had been registered earlier
    pub fn seed(&self, screen: Screen) -> ScreenId {
        let id = screen.id.clone();
        self.lock().rows.insert(id.clone(), screen);
        id
    }

    /// Seed a row with the given code, name and assignment
    pub fn seed_screen(&self, code: &str, name: Option<&str>, assigned_path: Option<&str>) -> ScreenId {
        let id = {
            let mut state = self.lock();
            state.next_id += 1;
            ScreenId::new(format!("seeded-{}", state.next_id))
        };
        self.seed(Screen {
            id,
            code: Some(code.to_string()),
            name: name.map(str::to_string),
            assigned_path: assigned_path.map(str::to_string),
            last_seen: Some(Utc::now()),
            current_page: None,
            user_agent: None,
            created_at: Utc::now(),
        })
    }

    /// Administrator assigns content to a screen; subscribers are notified
    pub fn assign(&self, id: &ScreenId, path: &str) -> bool {
        self.set_assignment(id, Some(path.to_string()))
    }

    /// Administrator clears a screen's assignment; subscribers are notified
    pub fn unassign(&self, id: &ScreenId) -> bool {
        self.set_assignment(id, None)
    }

    fn set_assignment(&self, id: &ScreenId, path: Option<String>) -> bool {
        let mut state = self.lock();
        let Some(row) = state.rows.get_mut(id) else {
            return false;
        };
        row.assigned_path = path;
        let change = ScreenChange::update(row.clone());
        state.notify(change);
        true
    }

    /// Administrator decommissions a screen
    pub fn delete(&self, id: &ScreenId) -> Option<Screen> {
        let mut state = self.lock();
        let removed = state.rows.remove(id)?;
        state.notify(ScreenChange::delete(removed.clone()));
        Some(removed)
    }

    /// Deliver a change event to subscribers without touching the row
    pub fn push(&self, change: ScreenChange) {
        self.lock().notify(change);
    }

    /// Make the next call of `op` fail with `error`
    pub fn fail_next(&self, op: Operation, error: StoreError) {
        self.lock().faults.entry(op).or_default().push_back(error);
    }

    /// Make the next `times` calls of `op` fail with `error`
    pub fn fail_times(&self, op: Operation, times: usize, error: StoreError) {
        let mut state = self.lock();
        let queue = state.faults.entry(op).or_default();
        for _ in 0..times {
            queue.push_back(error.clone());
        }
    }

    pub fn calls(&self, op: Operation) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.lock().calls.values().sum()
    }

    pub fn screen(&self, id: &ScreenId) -> Option<Screen> {
        self.lock().rows.get(id).cloned()
    }

    pub fn screens(&self) -> Vec<Screen> {
        self.lock().rows.values().cloned().collect()
    }

    /// Every code passed to `insert_screen`, in call order
    pub fn attempted_codes(&self) -> Vec<String> {
        self.lock().attempted_codes.clone()
    }

    pub fn heartbeats_for(&self, id: &ScreenId) -> Vec<Heartbeat> {
        self.lock()
            .heartbeats
            .iter()
            .filter(|(beat_id, _)| beat_id == id)
            .map(|(_, beat)| beat.clone())
            .collect()
    }

    pub fn channels(&self) -> &ChannelRegistry {
        &self.channels
    }

    /// Force every live subscription into `state`
    pub fn set_channel_state(&self, state: ChannelState) {
        self.channels.set_all(state);
    }
}

#[async_trait]
impl ScreenStore for MockStore {
    async fn get_screen(&self, id: &ScreenId) -> StoreResult<Option<Screen>> {
        let mut state = self.lock();
        state.enter(Operation::GetScreen)?;
        Ok(state.rows.get(id).cloned())
    }

    async fn find_latest_by_name(&self, name: &str) -> StoreResult<Option<Screen>> {
        let mut state = self.lock();
        state.enter(Operation::FindByName)?;
        Ok(state
            .rows
            .values()
            .filter(|row| row.name.as_deref() == Some(name))
            .max_by_key(|row| row.last_seen)
            .cloned())
    }

    async fn insert_screen(&self, screen: &NewScreen) -> StoreResult<Screen> {
        let mut state = self.lock();
        state.attempted_codes.push(screen.code.clone());
        state.enter(Operation::Insert)?;
        screen.checked().map_err(|e| StoreError::Contract(e.to_string()))?;

        if state.rows.values().any(|row| row.code.as_deref() == Some(screen.code.as_str())) {
            return Err(StoreError::UniqueViolation(screen.code.clone()));
        }

        state.next_id += 1;
        let row = Screen {
            id: ScreenId::new(format!("screen-{}", state.next_id)),
            code: Some(screen.code.clone()),
            name: screen.name.clone(),
            assigned_path: None,
            last_seen: Some(screen.last_seen),
            current_page: None,
            user_agent: Some(screen.user_agent.clone()),
            created_at: Utc::now(),
        };
        state.rows.insert(row.id.clone(), row.clone());
        Ok(row)
    }

    async fn heartbeat(&self, id: &ScreenId, beat: &Heartbeat) -> StoreResult<Screen> {
        let mut state = self.lock();
        state.enter(Operation::Heartbeat)?;
        state.heartbeats.push((id.clone(), beat.clone()));

        let row = state.rows.get_mut(id).ok_or(StoreError::NotFound)?;
        row.last_seen = Some(beat.last_seen);
        if let Some(page) = &beat.current_page {
            row.current_page = Some(page.clone());
        }
        if let Some(name) = &beat.name {
            row.name = Some(name.clone());
        }
        if let Some(user_agent) = &beat.user_agent {
            row.user_agent = Some(user_agent.clone());
        }
        Ok(row.clone())
    }

    async fn subscribe(&self, id: &ScreenId) -> StoreResult<ScreenSubscription> {
        let mut state = self.lock();
        state.enter(Operation::Subscribe)?;

        let (tx, rx) = mpsc::channel(32);
        state.subscribers.push((id.clone(), tx));
        Ok(ScreenSubscription::new(rx, self.channels.register(ChannelState::Open)))
    }

    fn channel_states(&self) -> Vec<ChannelState> {
        self.channels.states()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_insert_rejects_taken_code() {
        let store = MockStore::new();
        store.seed_screen("K7QX", None, None);

        let err = store.insert_screen(&NewScreen::new("K7QX", "kiosk/test")).await.unwrap_err();
        assert_eq!(err, StoreError::UniqueViolation("K7QX".into()));

        let row = store.insert_screen(&NewScreen::new("M4PZ", "kiosk/test")).await.unwrap();
        assert_eq!(row.code.as_deref(), Some("M4PZ"));
        assert_eq!(store.attempted_codes(), vec!["K7QX", "M4PZ"]);
    }

    #[tokio::test]
    async fn test_heartbeat_missing_row() {
        let store = MockStore::new();
        let err = store.heartbeat(&ScreenId::new("gone"), &Heartbeat::now()).await.unwrap_err();
        assert_eq!(err, StoreError::NotFound);
    }

    #[tokio::test]
    async fn test_scripted_fault_is_consumed_once() {
        let store = MockStore::new();
        let id = store.seed_screen("K7QX", None, None);
        store.fail_next(Operation::GetScreen, StoreError::Transport("timeout".into()));

        assert!(store.get_screen(&id).await.is_err());
        assert!(store.get_screen(&id).await.unwrap().is_some());
        assert_eq!(store.calls(Operation::GetScreen), 2);
    }

    #[tokio::test]
    async fn test_find_latest_by_name_prefers_recent() {
        let store = MockStore::new();
        let older = store.seed_screen("AAAA", Some("gate-4"), None);
        let newer = store.seed_screen("BBBB", Some("gate-4"), Some("/queues"));
        store.heartbeat(&older, &Heartbeat::now()).await.unwrap();
        store.heartbeat(&newer, &Heartbeat::now()).await.unwrap();

        let found = store.find_latest_by_name("gate-4").await.unwrap().unwrap();
        assert_eq!(found.id, newer);
    }

    #[tokio::test]
    async fn test_assign_notifies_subscriber() {
        let store = MockStore::new();
        let id = store.seed_screen("K7QX", None, None);
        let mut subscription = store.subscribe(&id).await.unwrap();
        assert_eq!(store.channel_states(), vec![ChannelState::Open]);

        assert!(store.assign(&id, "/rides/coaster"));
        let change = subscription.next().await.unwrap();
        assert_eq!(change.record.assignment(), Some("/rides/coaster"));

        drop(subscription);
        assert!(store.channel_states().is_empty());
    }
}
