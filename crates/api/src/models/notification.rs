use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    #[default]
    Info,
    Warning,
    Critical,
}

/// Kitchen alert raised by the backend (low stock, expiry, membership).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i64,
    #[serde(default)]
    pub kitchen_id: Option<i64>,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub related_item_id: Option<i64>,
    #[serde(default, rename = "read", alias = "isRead")]
    pub is_read: bool,
    #[serde(default)]
    pub read_by_users: Vec<i64>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Body of `GET /notifications/unread-count`. The backend answers with either a
/// bare number or `{"unreadCount": n}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UnreadCount {
    Bare(u64),
    #[serde(rename_all = "camelCase")]
    Wrapped { unread_count: u64 },
}

impl UnreadCount {
    pub fn value(&self) -> u64 {
        match self {
            UnreadCount::Bare(count) => *count,
            UnreadCount::Wrapped { unread_count } => *unread_count,
        }
    }
}
