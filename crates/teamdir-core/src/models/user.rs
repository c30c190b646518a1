//! Signed-in user identity and role-based capabilities.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account role as reported by the server.
///
/// Older servers send `user` for regular accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    #[serde(alias = "user")]
    Regular,
    Admin,
    CompanyAdmin,
    Superuser,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Regular => "regular",
            Role::Admin => "admin",
            Role::CompanyAdmin => "company_admin",
            Role::Superuser => "superuser",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Role::Regular => "Regular",
            Role::Admin => "Admin",
            Role::CompanyAdmin => "Company admin",
            Role::Superuser => "Superuser",
        }
    }

    /// Whether this role may perform `action`
    pub fn allows(&self, action: Action) -> bool {
        match action {
            Action::ViewMembers | Action::AddMember | Action::EditMember => true,
            Action::DeleteMember | Action::ChangeRole => !matches!(self, Role::Regular),
            Action::ManageUsers => matches!(self, Role::Superuser),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something the user may try to do in the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    ViewMembers,
    AddMember,
    EditMember,
    DeleteMember,
    ChangeRole,
    ManageUsers,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub is_superuser: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

impl User {
    /// Role after applying the superuser flag
    pub fn effective_role(&self) -> Role {
        if self.is_superuser {
            Role::Superuser
        } else {
            self.role
        }
    }

    pub fn display_name(&self) -> String {
        match (self.first_name.as_deref(), self.last_name.as_deref()) {
            (Some(first), Some(last)) if !first.is_empty() && !last.is_empty() => {
                format!("{} {}", first, last)
            }
            (Some(first), _) if !first.is_empty() => first.to_string(),
            _ => self.username.clone(),
        }
    }
}

/// Capability check used to gate directory actions.
///
/// Nobody may do anything while signed out.
pub fn can(user: Option<&User>, action: Action) -> bool {
    user.map(|u| u.effective_role().allows(action))
        .unwrap_or(false)
}

/// User record as persisted under the `user` storage key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredUser {
    #[serde(flatten)]
    pub user: User,
    pub saved_at: DateTime<Utc>,
}

impl StoredUser {
    pub fn new(user: User) -> Self {
        Self {
            user,
            saved_at: Utc::now(),
        }
    }
}
