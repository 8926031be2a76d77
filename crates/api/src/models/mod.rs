mod catalog;
mod dashboard;
mod inventory;
mod kitchen;
mod notification;
mod recipe;
mod shopping;
mod user;

pub use catalog::{Category, CreateUnitRequest, Location, Unit};
pub use dashboard::{AlertSettings, DashboardStats};
pub use inventory::{
    parse_day, CreateInventoryItemRequest, InventoryItem, UpdateInventoryItemRequest,
};
pub use kitchen::{CreateKitchenRequest, JoinKitchenRequest, Kitchen};
pub use notification::{Notification, Severity, UnreadCount};
pub use recipe::{ConsumeIngredientsRequest, RecipeSuggestions};
pub use shopping::{
    CreateShoppingItemRequest, GenerateShoppingListRequest, GeneratedShoppingList, Priority,
    ShoppingItem, ShoppingListSummary, Source, UpdateShoppingItemRequest,
};
pub use user::{
    AuthResponse, ChangePasswordRequest, LoginRequest, RegisterRequest, Role,
    UpdateProfileRequest, User,
};
