//! Application routes and the navigation seam.

use std::fmt;
use std::sync::Mutex;

/// Every page of the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Landing,
    Login,
    Register,
    ForgotPassword,
    ResetPassword,
    Unauthorized,
    KitchenSetup,
    Dashboard,
    Admin,
    Member,
    Members,
    Inventory,
    InventoryAdd,
    InventoryAddOcr,
    InventoryDetails(i64),
    InventoryEdit(i64),
    Reports,
    Settings,
    Profile,
    Recipes,
    Shopping,
}

impl Route {
    pub fn path(&self) -> String {
        let fixed = match self {
            Route::Landing => "/",
            Route::Login => "/login",
            Route::Register => "/register",
            Route::ForgotPassword => "/forgot-password",
            Route::ResetPassword => "/reset-password",
            Route::Unauthorized => "/unauthorized",
            Route::KitchenSetup => "/kitchen-setup",
            Route::Dashboard => "/dashboard",
            Route::Admin => "/admin",
            Route::Member => "/member",
            Route::Members => "/members",
            Route::Inventory => "/inventory",
            Route::InventoryAdd => "/inventory/add",
            Route::InventoryAddOcr => "/inventory/add-ocr",
            Route::InventoryDetails(id) => return format!("/inventory/details/{id}"),
            Route::InventoryEdit(id) => return format!("/inventory/edit/{id}"),
            Route::Reports => "/reports",
            Route::Settings => "/settings",
            Route::Profile => "/profile",
            Route::Recipes => "/recipes",
            Route::Shopping => "/shopping",
        };
        fixed.to_string()
    }

    /// Resolve a path (query string and trailing slash ignored).
    pub fn parse(path: &str) -> Option<Route> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let trimmed = path.trim_end_matches('/');
        let segments: Vec<&str> = trimmed
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect();

        let route = match segments.as_slice() {
            [] => Route::Landing,
            ["login"] => Route::Login,
            ["register"] => Route::Register,
            ["forgot-password"] => Route::ForgotPassword,
            ["reset-password"] => Route::ResetPassword,
            ["unauthorized"] => Route::Unauthorized,
            ["kitchen-setup"] => Route::KitchenSetup,
            ["dashboard"] => Route::Dashboard,
            ["admin"] => Route::Admin,
            ["member"] => Route::Member,
            ["members"] => Route::Members,
            ["inventory"] => Route::Inventory,
            ["inventory", "add"] => Route::InventoryAdd,
            ["inventory", "add-ocr"] => Route::InventoryAddOcr,
            ["inventory", "details", id] => Route::InventoryDetails(id.parse().ok()?),
            ["inventory", "edit", id] => Route::InventoryEdit(id.parse().ok()?),
            ["reports"] => Route::Reports,
            ["settings"] => Route::Settings,
            ["profile"] => Route::Profile,
            ["recipes"] => Route::Recipes,
            ["shopping"] => Route::Shopping,
            _ => return None,
        };
        Some(route)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Receives forced navigations (session rejection, wipe, revoked access).
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}

/// Navigator that records every navigation in order.
#[derive(Default)]
pub struct History {
    entries: Mutex<Vec<Route>>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Route> {
        self.lock().last().copied()
    }

    pub fn entries(&self) -> Vec<Route> {
        self.lock().clone()
    }

    /// How many times `route` has been navigated to.
    pub fn count(&self, route: Route) -> usize {
        self.lock().iter().filter(|entry| **entry == route).count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Route>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Navigator for History {
    fn navigate(&self, route: Route) {
        tracing::debug!(%route, "navigate");
        self.lock().push(route);
    }
}
