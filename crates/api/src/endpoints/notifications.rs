use reqwest::Method;

use crate::client::ApiClient;
use crate::error::ApiResult;
use crate::models::{Notification, Role, UnreadCount};

/// The backend scopes notifications by role and falls back to the admin view
/// when the caller does not know its role yet.
fn role_param(role: Option<Role>) -> &'static str {
    match role {
        Some(Role::Member) => Role::Member.as_str(),
        _ => Role::Admin.as_str(),
    }
}

impl ApiClient {
    pub async fn list_notifications(
        &self,
        kitchen_id: i64,
        role: Option<Role>,
    ) -> ApiResult<Vec<Notification>> {
        self.send_json(self.request(Method::GET, "notifications").query(&[
            ("kitchenId", kitchen_id.to_string()),
            ("userRole", role_param(role).to_string()),
        ]))
        .await
    }

    pub async fn unread_count(&self, kitchen_id: i64, role: Option<Role>) -> ApiResult<u64> {
        let count: UnreadCount = self
            .send_json(
                self.request(Method::GET, "notifications/unread-count")
                    .query(&[
                        ("kitchenId", kitchen_id.to_string()),
                        ("userRole", role_param(role).to_string()),
                    ]),
            )
            .await?;
        Ok(count.value())
    }

    pub async fn mark_all_read(&self, kitchen_id: i64, role: Option<Role>) -> ApiResult<()> {
        self.send_unit(
            self.request(Method::POST, "notifications/mark-read")
                .query(&[
                    ("kitchenId", kitchen_id.to_string()),
                    ("userRole", role_param(role).to_string()),
                ]),
        )
        .await
    }

    pub async fn delete_notification(&self, id: i64) -> ApiResult<()> {
        self.send_unit(self.request(Method::DELETE, &format!("notifications/{id}")))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_role_queries_as_admin() {
        assert_eq!(role_param(None), "ADMIN");
        assert_eq!(role_param(Some(Role::Unassigned)), "ADMIN");
        assert_eq!(role_param(Some(Role::Member)), "MEMBER");
    }
}
