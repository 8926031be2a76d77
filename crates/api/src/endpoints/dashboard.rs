use reqwest::Method;

use crate::client::ApiClient;
use crate::error::ApiResult;
use crate::models::{AlertSettings, DashboardStats};

impl ApiClient {
    pub async fn dashboard_stats(&self) -> ApiResult<DashboardStats> {
        self.send_json(self.request(Method::GET, "dashboard/stats"))
            .await
    }

    pub async fn alert_settings(&self, kitchen_id: i64) -> ApiResult<AlertSettings> {
        self.send_json(
            self.request(Method::GET, "dashboard/settings/alerts")
                .query(&[("kitchenId", kitchen_id)]),
        )
        .await
    }

    pub async fn update_alert_settings(
        &self,
        kitchen_id: i64,
        settings: &AlertSettings,
    ) -> ApiResult<AlertSettings> {
        self.send_json(
            self.request(Method::PUT, "dashboard/settings/alerts")
                .query(&[("kitchenId", kitchen_id)])
                .json(settings),
        )
        .await
    }
}
