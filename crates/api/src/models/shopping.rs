use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

/// Where a shopping list entry came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Source {
    LowStock,
    Expired,
    #[default]
    Manual,
    Recipe,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShoppingItem {
    pub id: i64,
    pub item_name: String,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub is_purchased: bool,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub source: Source,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub created_by_name: Option<String>,
    #[serde(default)]
    pub kitchen_id: Option<i64>,
    #[serde(default)]
    pub kitchen_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateShoppingItemRequest {
    pub kitchen_id: i64,
    pub item_name: String,
    pub quantity: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub priority: Priority,
    pub source: Source,
}

impl CreateShoppingItemRequest {
    /// A manual entry of one unit at medium priority.
    pub fn manual(kitchen_id: i64, item_name: impl Into<String>) -> Self {
        Self {
            kitchen_id,
            item_name: item_name.into(),
            quantity: 1,
            unit: None,
            category: None,
            priority: Priority::default(),
            source: Source::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateShoppingItemRequest {
    pub item_name: String,
    pub quantity: i64,
    pub unit: Option<String>,
    pub category: Option<String>,
    pub priority: Priority,
    pub is_purchased: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateShoppingListRequest {
    pub kitchen_id: i64,
    pub threshold: u32,
}

impl GenerateShoppingListRequest {
    pub const DEFAULT_THRESHOLD: u32 = 3;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedShoppingList {
    #[serde(default)]
    pub items_generated: u32,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub generated_items: Vec<ShoppingItem>,
}

/// Shopping list grouped by priority, with purchased entries split out.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShoppingListSummary {
    pub kitchen_id: i64,
    #[serde(default)]
    pub kitchen_name: Option<String>,
    #[serde(default)]
    pub total_items: u32,
    #[serde(default)]
    pub purchased_items: u32,
    #[serde(default)]
    pub pending_items: u32,
    #[serde(default)]
    pub high_priority_items: Vec<ShoppingItem>,
    #[serde(default)]
    pub medium_priority_items: Vec<ShoppingItem>,
    #[serde(default)]
    pub low_priority_items: Vec<ShoppingItem>,
    #[serde(default)]
    pub purchased_items_list: Vec<ShoppingItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_decodes_wire_enums() {
        let item: ShoppingItem = serde_json::from_str(
            r#"{"id":1,"itemName":"Milk","quantity":2,"isPurchased":true,"priority":"HIGH","source":"LOW_STOCK"}"#,
        )
        .unwrap();
        assert!(item.is_purchased);
        assert_eq!(item.priority, Priority::High);
        assert_eq!(item.source, Source::LowStock);
    }

    #[test]
    fn manual_entry_uses_backend_defaults() {
        let request = CreateShoppingItemRequest::manual(9, "Eggs");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["kitchenId"], 9);
        assert_eq!(json["quantity"], 1);
        assert_eq!(json["priority"], "MEDIUM");
        assert_eq!(json["source"], "MANUAL");
        assert!(json.get("unit").is_none());
    }
}
