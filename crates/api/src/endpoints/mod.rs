//! Backend endpoints grouped by area. Each module adds methods to
//! [`ApiClient`](crate::ApiClient).

mod catalog;
mod dashboard;
mod inventory;
mod kitchens;
mod notifications;
mod recipes;
mod shopping;
mod user;
pub use recipes::DEFAULT_SERVINGS;
