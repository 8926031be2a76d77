//! Broker topics and the events decoded from them.

use serde::Deserialize;
use tracing::debug;

/// A destination the client subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    User(i64),
    Global,
    Logout,
    Kitchen(i64),
    KitchenAlerts(i64),
}

impl Topic {
    pub fn destination(&self) -> String {
        match self {
            Topic::User(id) => format!("/topic/user/{id}"),
            Topic::Global => "/topic/global".to_string(),
            Topic::Logout => "/topic/logout".to_string(),
            Topic::Kitchen(id) => format!("/topic/kitchen/{id}"),
            Topic::KitchenAlerts(id) => format!("/topic/kitchen/{id}/alerts"),
        }
    }

    pub fn parse(destination: &str) -> Option<Topic> {
        let segments: Vec<&str> = destination.trim_matches('/').split('/').collect();
        match segments.as_slice() {
            ["topic", "user", id] => id.parse().ok().map(Topic::User),
            ["topic", "global"] => Some(Topic::Global),
            ["topic", "logout"] => Some(Topic::Logout),
            ["topic", "kitchen", id] => id.parse().ok().map(Topic::Kitchen),
            ["topic", "kitchen", id, "alerts"] => id.parse().ok().map(Topic::KitchenAlerts),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveEvent {
    /// The user was removed from their kitchen.
    AccessRevoked,
    /// The backend data was reset; all local state is stale.
    DatabaseReset,
    /// Every client must log out.
    ForceLogout,
    MemberAdded { kitchen_id: i64 },
    MemberRemoved { kitchen_id: i64 },
    UnreadCount { kitchen_id: i64, count: u64 },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlertPayload {
    unread_count: u64,
}

/// Plain-text marker, tolerating a JSON-quoted form.
fn marker(body: &str) -> String {
    let trimmed = body.trim();
    serde_json::from_str::<String>(trimmed).unwrap_or_else(|_| trimmed.to_string())
}

impl LiveEvent {
    /// Interpret a message body received on `topic`. Unknown markers yield
    /// `None`.
    pub fn decode(topic: Topic, body: &str) -> Option<LiveEvent> {
        let event = match topic {
            Topic::User(_) => match marker(body).as_str() {
                "ACCESS_REVOKED" => LiveEvent::AccessRevoked,
                _ => return ignored(topic, body),
            },
            Topic::Global => match marker(body).as_str() {
                "DATABASE_RESET" => LiveEvent::DatabaseReset,
                _ => return ignored(topic, body),
            },
            Topic::Logout => match marker(body).as_str() {
                "FORCE_LOGOUT" => LiveEvent::ForceLogout,
                _ => return ignored(topic, body),
            },
            Topic::Kitchen(kitchen_id) => match marker(body).as_str() {
                "MEMBER_ADDED" => LiveEvent::MemberAdded { kitchen_id },
                "MEMBER_REMOVED" => LiveEvent::MemberRemoved { kitchen_id },
                _ => return ignored(topic, body),
            },
            Topic::KitchenAlerts(kitchen_id) => match serde_json::from_str::<AlertPayload>(body) {
                Ok(payload) => LiveEvent::UnreadCount {
                    kitchen_id,
                    count: payload.unread_count,
                },
                Err(_) => return ignored(topic, body),
            },
        };
        Some(event)
    }
}

fn ignored(topic: Topic, body: &str) -> Option<LiveEvent> {
    debug!(destination = %topic.destination(), body, "ignoring unrecognised live message");
    None
}
