use reqwest::Method;

use crate::client::ApiClient;
use crate::error::{ApiError, ApiResult};
use crate::models::{
    CreateShoppingItemRequest, GenerateShoppingListRequest, GeneratedShoppingList, ShoppingItem,
    ShoppingListSummary, UpdateShoppingItemRequest,
};

impl ApiClient {
    pub async fn list_shopping(&self, kitchen_id: i64) -> ApiResult<Vec<ShoppingItem>> {
        self.send_json(
            self.request(Method::GET, "shopping-list")
                .query(&[("kitchenId", kitchen_id)]),
        )
        .await
    }

    pub async fn shopping_summary(&self, kitchen_id: i64) -> ApiResult<ShoppingListSummary> {
        self.send_json(
            self.request(Method::GET, "shopping-list/summary")
                .query(&[("kitchenId", kitchen_id)]),
        )
        .await
    }

    /// Ask the backend to add every item at or under `threshold` to the list.
    pub async fn generate_from_low_stock(
        &self,
        request: &GenerateShoppingListRequest,
    ) -> ApiResult<GeneratedShoppingList> {
        if request.threshold == 0 {
            return Err(ApiError::InvalidRequest("Threshold must be positive".into()));
        }
        self.send_json(
            self.request(Method::POST, "shopping-list/generate-from-low-stock")
                .json(request),
        )
        .await
    }

    pub async fn add_shopping_item(
        &self,
        request: &CreateShoppingItemRequest,
    ) -> ApiResult<ShoppingItem> {
        if request.item_name.trim().is_empty() {
            return Err(ApiError::InvalidRequest("Item name is required".into()));
        }
        if request.quantity <= 0 {
            return Err(ApiError::InvalidRequest("Quantity must be positive".into()));
        }
        self.send_json(self.request(Method::POST, "shopping-list").json(request))
            .await
    }

    pub async fn update_shopping_item(
        &self,
        id: i64,
        request: &UpdateShoppingItemRequest,
    ) -> ApiResult<ShoppingItem> {
        self.send_json(
            self.request(Method::PUT, &format!("shopping-list/{id}"))
                .json(request),
        )
        .await
    }

    pub async fn toggle_purchased(&self, id: i64) -> ApiResult<ShoppingItem> {
        self.send_json(self.request(
            Method::PUT,
            &format!("shopping-list/{id}/toggle-purchased"),
        ))
        .await
    }

    pub async fn delete_shopping_item(&self, id: i64) -> ApiResult<()> {
        self.send_unit(self.request(Method::DELETE, &format!("shopping-list/{id}")))
            .await
    }

    pub async fn clear_purchased(&self, kitchen_id: i64) -> ApiResult<()> {
        self.send_unit(
            self.request(Method::DELETE, "shopping-list/clear-purchased")
                .query(&[("kitchenId", kitchen_id)]),
        )
        .await
    }
}
