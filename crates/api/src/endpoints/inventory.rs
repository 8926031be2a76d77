use reqwest::Method;

use crate::client::ApiClient;
use crate::error::{ApiError, ApiResult};
use crate::models::{CreateInventoryItemRequest, InventoryItem, UpdateInventoryItemRequest};

impl ApiClient {
    pub async fn list_inventory(&self, kitchen_id: i64) -> ApiResult<Vec<InventoryItem>> {
        self.send_json(
            self.request(Method::GET, "inventory")
                .query(&[("kitchenId", kitchen_id)]),
        )
        .await
    }

    pub async fn get_inventory_item(&self, id: i64) -> ApiResult<InventoryItem> {
        self.send_json(self.request(Method::GET, &format!("inventory/{id}")))
            .await
    }

    pub async fn create_inventory_item(
        &self,
        request: &CreateInventoryItemRequest,
    ) -> ApiResult<InventoryItem> {
        if request.name.trim().is_empty() {
            return Err(ApiError::InvalidRequest("Name is required".into()));
        }
        if request.quantity <= 0 {
            return Err(ApiError::InvalidRequest("Quantity must be positive".into()));
        }
        self.send_json(self.request(Method::POST, "inventory").json(request))
            .await
    }

    pub async fn update_inventory_item(
        &self,
        id: i64,
        request: &UpdateInventoryItemRequest,
    ) -> ApiResult<InventoryItem> {
        self.send_json(
            self.request(Method::PUT, &format!("inventory/{id}"))
                .json(request),
        )
        .await
    }

    pub async fn delete_inventory_item(&self, id: i64) -> ApiResult<()> {
        self.send_unit(self.request(Method::DELETE, &format!("inventory/{id}")))
            .await
    }
}
