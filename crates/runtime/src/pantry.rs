//! Kitchen data held by the client, one slice per feature.
//!
//! Every slice keeps the last list the backend returned together with a
//! loading flag and the message of the last failure. Calls on different
//! slices are independent; within a slice the last response to arrive wins.

use std::future::Future;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use pantry_api::{
    AlertSettings, ApiClient, ApiError, Category, ConsumeIngredientsRequest,
    CreateInventoryItemRequest, CreateShoppingItemRequest, CreateUnitRequest, DashboardStats,
    GenerateShoppingListRequest, GeneratedShoppingList, InventoryItem, Location, Notification,
    RecipeSuggestions, ShoppingItem, ShoppingListSummary, Unit, UpdateInventoryItemRequest, User,
};
use pantry_session::{SessionState, StorageError};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum PantryError {
    #[error("no kitchen selected")]
    NoKitchen,
    #[error("cannot consume {requested}, only {available} available")]
    InsufficientQuantity { requested: i64, available: i64 },
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("failed to persist session: {0}")]
    Storage(#[from] StorageError),
}

impl PantryError {
    pub fn user_message(&self) -> String {
        match self {
            PantryError::NoKitchen => "Join or create a kitchen first".to_string(),
            PantryError::Api(error) => error.user_message(),
            other => other.to_string(),
        }
    }
}

pub type PantryResult<T> = Result<T, PantryError>;

/// Records addressed by a backend id.
pub trait Keyed {
    fn key(&self) -> i64;
}

macro_rules! keyed {
    ($($ty:ty),* $(,)?) => {
        $(impl Keyed for $ty {
            fn key(&self) -> i64 {
                self.id
            }
        })*
    };
}

keyed!(InventoryItem, ShoppingItem, User, Notification, Category, Unit, Location);

#[derive(Debug, Clone, PartialEq)]
pub struct Slice<T> {
    pub items: Vec<T>,
    pub loading: bool,
    pub error: Option<String>,
    /// Whether a list has been fetched since the last reset.
    pub loaded: bool,
}

impl<T> Default for Slice<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            loading: false,
            error: None,
            loaded: false,
        }
    }
}

struct SliceCell<T> {
    name: &'static str,
    slice: RwLock<Slice<T>>,
}

impl<T: Keyed + Clone> SliceCell<T> {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            slice: RwLock::new(Slice::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Slice<T>> {
        self.slice.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Slice<T>> {
        self.slice.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn snapshot(&self) -> Slice<T> {
        self.read().clone()
    }

    fn find(&self, id: i64) -> Option<T> {
        self.read().items.iter().find(|item| item.key() == id).cloned()
    }

    async fn load<F>(&self, request: F) -> PantryResult<Vec<T>>
    where
        F: Future<Output = Result<Vec<T>, ApiError>>,
    {
        {
            let mut slice = self.write();
            slice.loading = true;
            slice.error = None;
        }
        let result = request.await;

        let mut slice = self.write();
        slice.loading = false;
        match result {
            Ok(items) => {
                debug!(slice = self.name, count = items.len(), "slice loaded");
                slice.items = items.clone();
                slice.loaded = true;
                Ok(items)
            }
            Err(error) => {
                warn!(slice = self.name, %error, "slice load failed");
                let error = PantryError::from(error);
                slice.error = Some(error.user_message());
                Err(error)
            }
        }
    }

    /// Note a failed operation on this slice and hand the result back.
    fn record<R>(&self, result: PantryResult<R>) -> PantryResult<R> {
        match &result {
            Ok(_) => self.write().error = None,
            Err(error) => {
                debug!(slice = self.name, %error, "operation failed");
                self.write().error = Some(error.user_message());
            }
        }
        result
    }

    fn upsert(&self, item: T) {
        let mut slice = self.write();
        match slice.items.iter_mut().find(|existing| existing.key() == item.key()) {
            Some(existing) => *existing = item,
            None => slice.items.push(item),
        }
    }

    fn remove(&self, id: i64) {
        self.write().items.retain(|item| item.key() != id);
    }

    fn modify<F: FnOnce(&mut Vec<T>)>(&self, change: F) {
        change(&mut self.write().items);
    }

    fn reset(&self) {
        *self.write() = Slice::default();
    }
}

pub struct Pantry {
    api: ApiClient,
    state: Arc<SessionState>,
    inventory: SliceCell<InventoryItem>,
    shopping: SliceCell<ShoppingItem>,
    members: SliceCell<User>,
    notifications: SliceCell<Notification>,
    categories: SliceCell<Category>,
    units: SliceCell<Unit>,
    locations: SliceCell<Location>,
    unread: watch::Sender<u64>,
    members_revision: watch::Sender<u64>,
}

impl Pantry {
    pub fn new(api: ApiClient, state: Arc<SessionState>) -> Self {
        Self {
            api,
            state,
            inventory: SliceCell::new("inventory"),
            shopping: SliceCell::new("shopping"),
            members: SliceCell::new("members"),
            notifications: SliceCell::new("notifications"),
            categories: SliceCell::new("categories"),
            units: SliceCell::new("units"),
            locations: SliceCell::new("locations"),
            unread: watch::channel(0).0,
            members_revision: watch::channel(0).0,
        }
    }

    fn kitchen_id(&self) -> PantryResult<i64> {
        self.state.snapshot().kitchen_id().ok_or(PantryError::NoKitchen)
    }

    pub fn inventory(&self) -> Slice<InventoryItem> {
        self.inventory.snapshot()
    }

    pub fn shopping(&self) -> Slice<ShoppingItem> {
        self.shopping.snapshot()
    }

    pub fn members(&self) -> Slice<User> {
        self.members.snapshot()
    }

    pub fn notifications(&self) -> Slice<Notification> {
        self.notifications.snapshot()
    }

    pub fn categories(&self) -> Slice<Category> {
        self.categories.snapshot()
    }

    pub fn units(&self) -> Slice<Unit> {
        self.units.snapshot()
    }

    pub fn locations(&self) -> Slice<Location> {
        self.locations.snapshot()
    }

    /// Forget every slice. Used when the session or kitchen goes away.
    pub fn reset(&self) {
        self.inventory.reset();
        self.shopping.reset();
        self.members.reset();
        self.notifications.reset();
        self.categories.reset();
        self.units.reset();
        self.locations.reset();
        self.unread.send_replace(0);
    }

    // Inventory

    pub async fn load_inventory(&self) -> PantryResult<Vec<InventoryItem>> {
        let kitchen_id = self.inventory.record(self.kitchen_id())?;
        self.inventory.load(self.api.list_inventory(kitchen_id)).await
    }

    /// Create an item in the current kitchen. Kitchen and creator are taken
    /// from the session.
    pub async fn add_inventory_item(
        &self,
        mut request: CreateInventoryItemRequest,
    ) -> PantryResult<InventoryItem> {
        request.kitchen_id = self.inventory.record(self.kitchen_id())?;
        if request.created_by.is_none() {
            request.created_by = self.state.snapshot().user_id();
        }

        let created = self
            .inventory
            .record(self.api.create_inventory_item(&request).await.map_err(Into::into))?;
        info!(item_id = created.id, "inventory item added");
        self.inventory.upsert(created.clone());
        Ok(created)
    }

    pub async fn update_inventory_item(
        &self,
        id: i64,
        request: &UpdateInventoryItemRequest,
    ) -> PantryResult<InventoryItem> {
        let updated = self
            .inventory
            .record(self.api.update_inventory_item(id, request).await.map_err(Into::into))?;
        self.inventory.upsert(updated.clone());
        Ok(updated)
    }

    pub async fn delete_inventory_item(&self, id: i64) -> PantryResult<()> {
        self.inventory
            .record(self.api.delete_inventory_item(id).await.map_err(Into::into))?;
        self.inventory.remove(id);
        Ok(())
    }

    /// Use up `amount` of an item. The amount is checked against the known
    /// quantity before anything is sent.
    pub async fn consume_item(&self, id: i64, amount: i64) -> PantryResult<InventoryItem> {
        let item = match self.inventory.find(id) {
            Some(item) => item,
            None => self
                .inventory
                .record(self.api.get_inventory_item(id).await.map_err(Into::into))?,
        };

        if amount <= 0 {
            return self.inventory.record(Err(PantryError::Validation(
                "Quantity to consume must be positive".into(),
            )));
        }
        if amount > item.quantity {
            return self.inventory.record(Err(PantryError::InsufficientQuantity {
                requested: amount,
                available: item.quantity,
            }));
        }

        let mut request = UpdateInventoryItemRequest::from(&item);
        request.quantity = item.quantity - amount;
        let updated = self.update_inventory_item(id, &request).await?;
        info!(item_id = id, amount, left = updated.quantity, "item consumed");
        Ok(updated)
    }

    // Shopping list

    pub async fn load_shopping(&self) -> PantryResult<Vec<ShoppingItem>> {
        let kitchen_id = self.shopping.record(self.kitchen_id())?;
        self.shopping.load(self.api.list_shopping(kitchen_id)).await
    }

    pub async fn shopping_summary(&self) -> PantryResult<ShoppingListSummary> {
        let kitchen_id = self.shopping.record(self.kitchen_id())?;
        self.shopping
            .record(self.api.shopping_summary(kitchen_id).await.map_err(Into::into))
    }

    pub async fn add_to_shopping_list(
        &self,
        item_name: &str,
        quantity: i64,
    ) -> PantryResult<ShoppingItem> {
        let kitchen_id = self.shopping.record(self.kitchen_id())?;
        let mut request = CreateShoppingItemRequest::manual(kitchen_id, item_name.trim());
        request.quantity = quantity;

        let created = self
            .shopping
            .record(self.api.add_shopping_item(&request).await.map_err(Into::into))?;
        self.shopping.upsert(created.clone());
        Ok(created)
    }

    pub async fn toggle_purchased(&self, id: i64) -> PantryResult<ShoppingItem> {
        let toggled = self
            .shopping
            .record(self.api.toggle_purchased(id).await.map_err(Into::into))?;
        self.shopping.upsert(toggled.clone());
        Ok(toggled)
    }

    pub async fn remove_from_shopping_list(&self, id: i64) -> PantryResult<()> {
        self.shopping
            .record(self.api.delete_shopping_item(id).await.map_err(Into::into))?;
        self.shopping.remove(id);
        Ok(())
    }

    pub async fn clear_purchased(&self) -> PantryResult<()> {
        let kitchen_id = self.shopping.record(self.kitchen_id())?;
        self.shopping
            .record(self.api.clear_purchased(kitchen_id).await.map_err(Into::into))?;
        self.shopping.modify(|items| items.retain(|item| !item.is_purchased));
        Ok(())
    }

    /// Add every item at or under `threshold` to the list, then reload it.
    pub async fn generate_shopping_list(
        &self,
        threshold: Option<u32>,
    ) -> PantryResult<GeneratedShoppingList> {
        let kitchen_id = self.shopping.record(self.kitchen_id())?;
        let request = GenerateShoppingListRequest {
            kitchen_id,
            threshold: threshold.unwrap_or(GenerateShoppingListRequest::DEFAULT_THRESHOLD),
        };
        let generated = self
            .shopping
            .record(self.api.generate_from_low_stock(&request).await.map_err(Into::into))?;
        info!(kitchen_id, items = generated.items_generated, "shopping list generated");
        self.load_shopping().await?;
        Ok(generated)
    }

    // Members

    pub async fn load_members(&self) -> PantryResult<Vec<User>> {
        let kitchen_id = self.members.record(self.kitchen_id())?;
        self.members.load(self.api.list_members(kitchen_id)).await
    }

    pub async fn remove_member(&self, member_id: i64) -> PantryResult<()> {
        self.members
            .record(self.api.remove_member(member_id).await.map_err(Into::into))?;
        self.members.remove(member_id);
        Ok(())
    }

    pub fn members_revision(&self) -> u64 {
        *self.members_revision.borrow()
    }

    pub fn watch_members_revision(&self) -> watch::Receiver<u64> {
        self.members_revision.subscribe()
    }

    /// Record a membership change announced by the backend and reload the
    /// member list if one is being shown.
    pub async fn membership_changed(&self) {
        self.members_revision.send_modify(|revision| *revision += 1);
        if self.members.read().loaded {
            if let Err(error) = self.load_members().await {
                warn!(%error, "failed to refresh members");
            }
        }
    }

    // Notifications

    pub async fn load_notifications(&self) -> PantryResult<Vec<Notification>> {
        let kitchen_id = self.notifications.record(self.kitchen_id())?;
        let role = self.state.snapshot().role();
        self.notifications
            .load(self.api.list_notifications(kitchen_id, role))
            .await
    }

    pub async fn refresh_unread_count(&self) -> PantryResult<u64> {
        let kitchen_id = self.notifications.record(self.kitchen_id())?;
        let role = self.state.snapshot().role();
        let count = self
            .notifications
            .record(self.api.unread_count(kitchen_id, role).await.map_err(Into::into))?;
        self.publish_unread(count);
        Ok(count)
    }

    pub async fn mark_all_read(&self) -> PantryResult<()> {
        let kitchen_id = self.notifications.record(self.kitchen_id())?;
        let role = self.state.snapshot().role();
        self.notifications
            .record(self.api.mark_all_read(kitchen_id, role).await.map_err(Into::into))?;
        self.notifications
            .modify(|items| items.iter_mut().for_each(|item| item.is_read = true));
        self.publish_unread(0);
        Ok(())
    }

    pub async fn delete_notification(&self, id: i64) -> PantryResult<()> {
        self.notifications
            .record(self.api.delete_notification(id).await.map_err(Into::into))?;
        self.notifications.remove(id);
        Ok(())
    }

    pub fn unread_count(&self) -> u64 {
        *self.unread.borrow()
    }

    pub fn watch_unread(&self) -> watch::Receiver<u64> {
        self.unread.subscribe()
    }

    pub fn publish_unread(&self, count: u64) {
        self.unread.send_replace(count);
    }

    // Catalog

    /// Fetch categories, units and locations side by side.
    pub async fn load_catalog(&self) -> PantryResult<()> {
        let (categories, units, locations) = tokio::join!(
            self.categories.load(self.api.list_categories()),
            self.units.load(self.api.list_units()),
            self.locations.load(self.api.list_locations()),
        );
        categories?;
        units?;
        locations?;
        Ok(())
    }

    pub async fn create_unit(&self, request: &CreateUnitRequest) -> PantryResult<Unit> {
        let unit = self
            .units
            .record(self.api.create_unit(request).await.map_err(Into::into))?;
        self.units.upsert(unit.clone());
        Ok(unit)
    }

    // Recipes

    pub async fn suggest_recipes(&self, servings: Option<u32>) -> PantryResult<RecipeSuggestions> {
        let kitchen_id = self.kitchen_id()?;
        Ok(self.api.suggest_recipes(kitchen_id, servings).await?)
    }

    /// Deduct a cooked recipe's ingredients and reload the inventory if it
    /// is being shown.
    pub async fn cook(&self, ingredients: Vec<String>) -> PantryResult<()> {
        if ingredients.is_empty() {
            return Err(PantryError::Validation("No ingredients selected".into()));
        }
        let kitchen_id = self.kitchen_id()?;
        self.api
            .consume_ingredients(kitchen_id, &ConsumeIngredientsRequest(ingredients))
            .await?;
        if self.inventory.read().loaded {
            self.load_inventory().await?;
        }
        Ok(())
    }

    // Dashboard

    pub async fn dashboard_stats(&self) -> PantryResult<DashboardStats> {
        Ok(self.api.dashboard_stats().await?)
    }

    pub async fn alert_settings(&self) -> PantryResult<AlertSettings> {
        let kitchen_id = self.kitchen_id()?;
        Ok(self.api.alert_settings(kitchen_id).await?)
    }

    pub async fn update_alert_settings(
        &self,
        settings: &AlertSettings,
    ) -> PantryResult<AlertSettings> {
        if settings.alert_time_hour > 23 || settings.alert_time_minute > 59 {
            return Err(PantryError::Validation("Alert time is out of range".into()));
        }
        let kitchen_id = self.kitchen_id()?;
        Ok(self.api.update_alert_settings(kitchen_id, settings).await?)
    }
}
