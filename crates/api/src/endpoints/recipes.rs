use reqwest::Method;

use crate::client::ApiClient;
use crate::error::ApiResult;
use crate::models::{ConsumeIngredientsRequest, RecipeSuggestions};

pub const DEFAULT_SERVINGS: u32 = 4;

impl ApiClient {
    pub async fn suggest_recipes(
        &self,
        kitchen_id: i64,
        servings: Option<u32>,
    ) -> ApiResult<RecipeSuggestions> {
        let servings = servings.unwrap_or(DEFAULT_SERVINGS);
        self.send_json(
            self.request(Method::GET, &format!("recipes/suggest/{kitchen_id}"))
                .query(&[("servings", servings)]),
        )
        .await
    }

    pub async fn consume_ingredients(
        &self,
        kitchen_id: i64,
        ingredients: &ConsumeIngredientsRequest,
    ) -> ApiResult<()> {
        self.send_unit(
            self.request(Method::POST, &format!("recipes/consume/{kitchen_id}"))
                .json(ingredients),
        )
        .await
    }
}
