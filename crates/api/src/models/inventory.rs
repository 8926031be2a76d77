use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A pantry item tracked by a kitchen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    /// Server-assigned identifier
    pub id: i64,
    /// Display name
    pub name: String,
    /// Free-form notes
    #[serde(default)]
    pub description: Option<String>,
    /// Owning kitchen
    #[serde(default)]
    pub kitchen_id: Option<i64>,
    /// Category reference and its resolved name
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub category_name: Option<String>,
    /// Unit reference and its resolved name
    #[serde(default)]
    pub unit_id: Option<i64>,
    #[serde(default)]
    pub unit_name: Option<String>,
    /// Id of the user who added the item
    #[serde(default)]
    pub created_by: Option<i64>,
    /// Amount on hand, in `unit`
    #[serde(default)]
    pub quantity: i64,
    /// Storage location label
    #[serde(default)]
    pub location: Option<String>,
    /// Expiry as sent by the backend (date or timestamp)
    #[serde(default)]
    pub expiry_date: Option<String>,
    /// Creation timestamp as sent by the backend
    #[serde(default)]
    pub created_at: Option<String>,
}

impl InventoryItem {
    /// Calendar day of expiry, if the item has a readable one.
    pub fn expiry_day(&self) -> Option<NaiveDate> {
        self.expiry_date.as_deref().and_then(parse_day)
    }
}

/// Read the date part of a backend date value.
///
/// Accepts `2024-05-01`, RFC 3339 timestamps and the `+00:00` offset form the
/// backend uses for `java.util.Date`, as well as epoch milliseconds.
pub fn parse_day(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if let Ok(millis) = value.parse::<i64>() {
        return chrono::DateTime::from_timestamp_millis(millis).map(|ts| ts.date_naive());
    }
    let head = value.get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInventoryItemRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_id: Option<i64>,
    pub kitchen_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<i64>,
    pub quantity: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<NaiveDate>,
}

/// Full replacement of the editable fields of an item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInventoryItemRequest {
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub unit_id: Option<i64>,
    pub quantity: i64,
    pub location: Option<String>,
    pub expiry_date: Option<NaiveDate>,
}

impl From<&InventoryItem> for UpdateInventoryItemRequest {
    fn from(item: &InventoryItem) -> Self {
        Self {
            name: item.name.clone(),
            description: item.description.clone(),
            category_id: item.category_id,
            unit_id: item.unit_id,
            quantity: item.quantity,
            location: item.location.clone(),
            expiry_date: item.expiry_day(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_day_accepts_backend_formats() {
        let may_first = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        assert_eq!(parse_day("2024-05-01"), Some(may_first));
        assert_eq!(parse_day("2024-05-01T00:00:00.000+00:00"), Some(may_first));
        assert_eq!(parse_day("2024-05-01T10:30:00Z"), Some(may_first));
        assert_eq!(parse_day("1714521600000"), Some(may_first));
        assert_eq!(parse_day("soon"), None);
        assert_eq!(parse_day(""), None);
    }

    #[test]
    fn update_request_copies_editable_fields() {
        let item: InventoryItem = serde_json::from_str(
            r#"{"id":4,"name":"Rice","quantity":5,"unitId":2,"expiryDate":"2030-01-02"}"#,
        )
        .unwrap();
        let update = UpdateInventoryItemRequest::from(&item);
        assert_eq!(update.name, "Rice");
        assert_eq!(update.quantity, 5);
        assert_eq!(update.unit_id, Some(2));
        assert_eq!(update.expiry_date, NaiveDate::from_ymd_opt(2030, 1, 2));
    }
}
