use serde::{Deserialize, Serialize};

/// Kitchen-wide counters shown on the dashboards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DashboardStats {
    pub total_products: u64,
    pub total_value: f64,
    pub low_stock_count: u64,
    pub expiry_count: u64,
    pub expired_products_count: u64,
    pub expired_waste_value: f64,
}

/// Daily alert schedule of a kitchen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertSettings {
    pub alert_time_hour: u8,
    pub alert_time_minute: u8,
    pub alerts_enabled: bool,
}
