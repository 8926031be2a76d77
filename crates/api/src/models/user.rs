use serde::{Deserialize, Serialize};

/// Kitchen role of a user.
///
/// The backend sends `"USER"` for accounts that have not created or joined a
/// kitchen yet. Anything unrecognised is treated the same way so that an
/// unexpected value never grants access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Unassigned,
    Member,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Unassigned => "USER",
            Role::Member => "MEMBER",
            Role::Admin => "ADMIN",
        }
    }

    /// Whether the role grants access to kitchen features.
    pub fn is_assigned(&self) -> bool {
        !matches!(self, Role::Unassigned)
    }
}

impl From<&str> for Role {
    fn from(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "ADMIN" => Role::Admin,
            "MEMBER" => Role::Member,
            _ => Role::Unassigned,
        }
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        Role::from(s.as_str())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The signed-in account as returned by the backend and persisted locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub kitchen_id: Option<i64>,
}

impl User {
    /// Role with `None` folded into [`Role::Unassigned`].
    pub fn effective_role(&self) -> Role {
        self.role.unwrap_or(Role::Unassigned)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Body of a successful login or registration. Both halves are optional on the
/// wire so a partial answer can be reported instead of failing to decode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}
