//! Row, payload and event types for the kiosk screen store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

/// Opaque identifier assigned by the store when a screen row is created
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScreenId(pub String);

impl ScreenId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScreenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ScreenId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Persisted identity and assignment record for one physical display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screen {
    pub id: ScreenId,
    /// Short pairing code typed in by an operator
    #[serde(default)]
    pub code: Option<String>,
    /// Hostname supplied by the device's launch environment
    #[serde(default)]
    pub name: Option<String>,
    /// Content route the device should display; `None` means awaiting assignment
    #[serde(default)]
    pub assigned_path: Option<String>,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
    /// Advisory: last path the device confirmed rendering
    #[serde(default)]
    pub current_page: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Screen {
    /// The assigned content path, if any
    pub fn assignment(&self) -> Option<&str> {
        self.assigned_path.as_deref()
    }

    pub fn is_assigned(&self) -> bool {
        self.assigned_path.is_some()
    }
}

/// Insert payload used by fresh registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct NewScreen {
    #[validate(length(equal = 4, message = "Pairing code must be 4 characters"))]
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[validate(length(min = 1, message = "User agent cannot be empty"))]
    pub user_agent: String,
    pub last_seen: DateTime<Utc>,
}

impl NewScreen {
    pub fn new(code: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: None,
            user_agent: user_agent.into(),
            last_seen: Utc::now(),
        }
    }

    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }
}

/// Liveness update written by every heartbeat
///
/// Unset optional fields are left out of the update entirely so they never
/// overwrite existing column values with null.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub last_seen: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_page: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl Heartbeat {
    /// A heartbeat stamped with the current time
    pub fn now() -> Self {
        Self {
            last_seen: Utc::now(),
            current_page: None,
            name: None,
            user_agent: None,
        }
    }

    pub fn with_current_page(mut self, page: Option<String>) -> Self {
        self.current_page = page;
        self
    }

    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}

/// Kind of row change carried by a push notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeType {
    Insert,
    Update,
    Delete,
}

/// Push notification delivered for a subscribed screen row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenChange {
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    /// Post-change row snapshot (the removed row for deletes)
    pub record: Screen,
}

impl ScreenChange {
    pub fn update(record: Screen) -> Self {
        Self {
            change_type: ChangeType::Update,
            record,
        }
    }

    pub fn delete(record: Screen) -> Self {
        Self {
            change_type: ChangeType::Delete,
            record,
        }
    }
}

/// Transport state of one push subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelState {
    Connecting,
    Open,
    Closed,
    Errored,
}

impl ChannelState {
    /// Closed and errored channels deliver nothing until they recover
    pub fn is_dead(self) -> bool {
        matches!(self, ChannelState::Closed | ChannelState::Errored)
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ChannelState::Connecting => "connecting",
            ChannelState::Open => "open",
            ChannelState::Closed => "closed",
            ChannelState::Errored => "errored",
        };
        f.write_str(label)
    }
}

/// Postgres error code reported for unique-constraint violations
pub const UNIQUE_VIOLATION_CODE: &str = "23505";

/// Error body returned by the store for failed requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreProblem {
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}

impl StoreProblem {
    pub fn is_unique_violation(&self) -> bool {
        self.code.as_deref() == Some(UNIQUE_VIOLATION_CODE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_screen_parsing_with_nulls() {
        let json = r#"{
            "id": "7f0c4a1e-2a4b-4b53-9e7e-0b7d1d6b2f11",
            "code": "K7QX",
            "name": null,
            "assigned_path": null,
            "last_seen": "2025-06-01T08:30:00Z",
            "current_page": null,
            "user_agent": "kiosk/0.1.0",
            "created_at": "2025-06-01T08:00:00Z"
        }"#;

        let screen: Screen = serde_json::from_str(json).unwrap();
        assert_eq!(screen.id.as_str(), "7f0c4a1e-2a4b-4b53-9e7e-0b7d1d6b2f11");
        assert_eq!(screen.code.as_deref(), Some("K7QX"));
        assert!(!screen.is_assigned());
    }

    #[test]
    fn test_heartbeat_omits_unset_fields() {
        let beat = Heartbeat::now().with_current_page(Some("/rides/coaster".into()));
        let value = serde_json::to_value(&beat).unwrap();

        assert_eq!(value["current_page"], "/rides/coaster");
        assert!(value.get("name").is_none());
        assert!(value.get("user_agent").is_none());
    }

    #[test]
    fn test_screen_change_parsing() {
        let json = r#"{
            "type": "UPDATE",
            "record": {
                "id": "abc",
                "code": "K7QX",
                "assigned_path": "/queues/north",
                "created_at": "2025-06-01T08:00:00Z"
            }
        }"#;

        let change: ScreenChange = serde_json::from_str(json).unwrap();
        assert_eq!(change.change_type, ChangeType::Update);
        assert_eq!(change.record.assignment(), Some("/queues/north"));
    }

    #[test]
    fn test_problem_unique_violation() {
        let json = r#"{"code":"23505","message":"duplicate key value violates unique constraint \"screens_code_key\"","details":null,"hint":null}"#;
        let problem: StoreProblem = serde_json::from_str(json).unwrap();
        assert!(problem.is_unique_violation());
    }

    #[test]
    fn test_dead_channel_states() {
        assert!(ChannelState::Closed.is_dead());
        assert!(ChannelState::Errored.is_dead());
        assert!(!ChannelState::Open.is_dead());
        assert!(!ChannelState::Connecting.is_dead());
    }
}
