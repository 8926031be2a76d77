//! Low-stock and expiry views over the loaded inventory.

use chrono::NaiveDate;
use pantry_api::InventoryItem;

/// Items expiring within this many days are shown as alerts.
pub const DEFAULT_EXPIRY_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Urgency {
    Expired,
    Critical,
    Warning,
}

impl Urgency {
    pub fn for_days(days_left: i64) -> Self {
        match days_left {
            d if d <= 0 => Urgency::Expired,
            d if d <= 2 => Urgency::Critical,
            _ => Urgency::Warning,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExpiryAlert {
    pub item: InventoryItem,
    pub days_left: i64,
    pub urgency: Urgency,
}

/// Items with less than `threshold` left, scarcest first.
pub fn low_stock(items: &[InventoryItem], threshold: i64) -> Vec<InventoryItem> {
    let mut low: Vec<InventoryItem> = items
        .iter()
        .filter(|item| item.quantity < threshold)
        .cloned()
        .collect();
    low.sort_by(|a, b| a.quantity.cmp(&b.quantity).then_with(|| a.name.cmp(&b.name)));
    low
}

/// Items whose expiry day falls on or before `today + window_days`, soonest
/// first. Already expired items are included. Items without a readable
/// expiry date are skipped.
pub fn expiring(items: &[InventoryItem], today: NaiveDate, window_days: i64) -> Vec<ExpiryAlert> {
    let mut alerts: Vec<ExpiryAlert> = items
        .iter()
        .filter_map(|item| {
            let days_left = (item.expiry_day()? - today).num_days();
            (days_left <= window_days).then(|| ExpiryAlert {
                item: item.clone(),
                days_left,
                urgency: Urgency::for_days(days_left),
            })
        })
        .collect();
    alerts.sort_by_key(|alert| alert.days_left);
    alerts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: i64, quantity: i64, expiry: Option<&str>) -> InventoryItem {
        InventoryItem {
            id,
            name: format!("item-{id}"),
            description: None,
            kitchen_id: Some(1),
            category_id: None,
            category_name: None,
            unit_id: None,
            unit_name: None,
            created_by: None,
            quantity,
            location: None,
            expiry_date: expiry.map(str::to_string),
            created_at: None,
        }
    }

    fn day(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn low_stock_is_strictly_below_threshold() {
        let items = vec![item(1, 5, None), item(2, 1, None), item(3, 3, None), item(4, 2, None)];
        let ids: Vec<i64> = low_stock(&items, 3).iter().map(|item| item.id).collect();
        assert_eq!(ids, vec![2, 4]);
    }

    #[test]
    fn expiry_window_and_urgency() {
        let today = day("2024-05-10");
        let items = vec![
            item(1, 1, Some("2024-05-20")),
            item(2, 1, Some("2024-05-12T00:00:00.000+00:00")),
            item(3, 1, Some("2024-05-09")),
            item(4, 1, None),
            item(5, 1, Some("2024-05-17")),
            item(6, 1, Some("not a date")),
        ];

        let alerts = expiring(&items, today, DEFAULT_EXPIRY_WINDOW_DAYS);
        let summary: Vec<(i64, i64, Urgency)> = alerts
            .iter()
            .map(|alert| (alert.item.id, alert.days_left, alert.urgency))
            .collect();
        assert_eq!(
            summary,
            vec![
                (3, -1, Urgency::Expired),
                (2, 2, Urgency::Critical),
                (5, 7, Urgency::Warning),
            ]
        );
    }

    #[test]
    fn today_counts_as_expired() {
        assert_eq!(Urgency::for_days(0), Urgency::Expired);
        assert_eq!(Urgency::for_days(3), Urgency::Warning);
    }
}
