use reqwest::Method;

use crate::client::ApiClient;
use crate::error::{ApiError, ApiResult};
use crate::models::{CreateKitchenRequest, JoinKitchenRequest, Kitchen, User};

impl ApiClient {
    /// Create a kitchen owned by the current user, who becomes its admin.
    pub async fn create_kitchen(&self, name: &str) -> ApiResult<Kitchen> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ApiError::InvalidRequest("Kitchen name is required".into()));
        }
        let body = CreateKitchenRequest {
            name: name.to_string(),
        };
        self.send_json(self.request(Method::POST, "kitchens").json(&body))
            .await
    }

    /// Join an existing kitchen as a member using its invitation code.
    pub async fn join_kitchen(&self, invitation_code: &str) -> ApiResult<Kitchen> {
        let code = invitation_code.trim();
        if code.is_empty() {
            return Err(ApiError::InvalidRequest("Invitation code is required".into()));
        }
        let body = JoinKitchenRequest {
            invitation_code: code.to_string(),
        };
        self.send_json(self.request(Method::POST, "kitchens/join").json(&body))
            .await
    }

    pub async fn get_kitchen(&self, id: i64) -> ApiResult<Kitchen> {
        self.send_json(self.request(Method::GET, &format!("kitchens/{id}")))
            .await
    }

    pub async fn list_members(&self, kitchen_id: i64) -> ApiResult<Vec<User>> {
        self.send_json(
            self.request(Method::GET, "kitchens/members")
                .query(&[("kitchenId", kitchen_id)]),
        )
        .await
    }

    pub async fn remove_member(&self, member_id: i64) -> ApiResult<()> {
        self.send_unit(self.request(
            Method::DELETE,
            &format!("kitchens/members/{member_id}"),
        ))
        .await
    }
}
