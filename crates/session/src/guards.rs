//! Route guards. Pure functions of a [`Session`] snapshot.

use pantry_api::Role;

use crate::navigation::Route;
use crate::state::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    Render,
    Redirect(Route),
}

/// Who may open a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Anyone.
    Public,
    /// Anonymous visitors only; signed-in users go to their dashboard.
    PublicOnly,
    /// Any signed-in user, with or without a kitchen.
    Authenticated,
    /// Signed-in users holding one of the roles. An empty list admits any
    /// assigned role.
    Roles(&'static [Role]),
}

const ADMIN: &[Role] = &[Role::Admin];
const MEMBER: &[Role] = &[Role::Member];
const KITCHEN: &[Role] = &[Role::Admin, Role::Member];

pub fn access_for(route: Route) -> Access {
    match route {
        Route::Landing | Route::Login | Route::Register => Access::PublicOnly,
        Route::ForgotPassword | Route::ResetPassword | Route::Unauthorized => Access::Public,
        Route::KitchenSetup | Route::Dashboard => Access::Authenticated,
        Route::Admin | Route::Members => Access::Roles(ADMIN),
        Route::Member => Access::Roles(MEMBER),
        Route::Inventory
        | Route::InventoryAdd
        | Route::InventoryAddOcr
        | Route::InventoryDetails(_)
        | Route::InventoryEdit(_)
        | Route::Reports
        | Route::Settings
        | Route::Profile
        | Route::Recipes
        | Route::Shopping => Access::Roles(KITCHEN),
    }
}

pub fn require_authenticated(session: &Session) -> GuardOutcome {
    if session.is_authenticated {
        GuardOutcome::Render
    } else {
        GuardOutcome::Redirect(Route::Login)
    }
}

pub fn require_role(session: &Session, allowed: &[Role]) -> GuardOutcome {
    let user = match (&session.user, session.is_authenticated) {
        (Some(user), true) => user,
        _ => return GuardOutcome::Redirect(Route::Login),
    };

    let role = match user.role {
        Some(role) if role.is_assigned() => role,
        _ => return GuardOutcome::Redirect(Route::KitchenSetup),
    };

    if !allowed.is_empty() && !allowed.contains(&role) {
        return GuardOutcome::Redirect(Route::Unauthorized);
    }

    GuardOutcome::Render
}

/// Landing page for a signed-in user.
pub fn dashboard_for(session: &Session) -> Route {
    match session.role() {
        Some(Role::Admin) => Route::Admin,
        Some(Role::Member) => Route::Member,
        _ => Route::KitchenSetup,
    }
}

/// Decide whether `route` renders for `session`.
pub fn evaluate(route: Route, session: &Session) -> GuardOutcome {
    match access_for(route) {
        Access::Public => GuardOutcome::Render,
        Access::PublicOnly if session.is_authenticated => {
            GuardOutcome::Redirect(dashboard_for(session))
        }
        Access::PublicOnly => GuardOutcome::Render,
        Access::Authenticated => match require_authenticated(session) {
            GuardOutcome::Render if route == Route::Dashboard => {
                GuardOutcome::Redirect(dashboard_for(session))
            }
            outcome => outcome,
        },
        Access::Roles(allowed) => require_role(session, allowed),
    }
}
