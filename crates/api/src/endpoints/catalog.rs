use reqwest::Method;

use crate::client::ApiClient;
use crate::error::ApiResult;
use crate::models::{Category, CreateUnitRequest, Location, Unit};

impl ApiClient {
    pub async fn list_categories(&self) -> ApiResult<Vec<Category>> {
        self.send_json(self.request(Method::GET, "categories")).await
    }

    pub async fn list_units(&self) -> ApiResult<Vec<Unit>> {
        self.send_json(self.request(Method::GET, "units")).await
    }

    pub async fn create_unit(&self, request: &CreateUnitRequest) -> ApiResult<Unit> {
        self.send_json(self.request(Method::POST, "units").json(request))
            .await
    }

    pub async fn list_locations(&self) -> ApiResult<Vec<Location>> {
        self.send_json(self.request(Method::GET, "locations")).await
    }
}
