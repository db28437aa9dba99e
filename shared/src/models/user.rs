//! User and role models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A staff account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub name: String,
    pub role: UserRole,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Staff roles
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Bartender,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Bartender => "bartender",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(UserRole::Admin),
            "bartender" => Some(UserRole::Bartender),
            _ => None,
        }
    }

    /// Permissions granted to the role
    pub fn permissions(&self) -> Vec<Permission> {
        match self {
            UserRole::Admin => Resource::ALL
                .iter()
                .map(|resource| Permission {
                    resource: *resource,
                    actions: Action::ALL.to_vec(),
                })
                .collect(),
            UserRole::Bartender => vec![
                Permission {
                    resource: Resource::Order,
                    actions: vec![Action::View, Action::Create, Action::Edit],
                },
                Permission {
                    resource: Resource::Guest,
                    actions: vec![Action::View, Action::Create, Action::Edit],
                },
                Permission {
                    resource: Resource::Shift,
                    actions: vec![Action::View, Action::Create, Action::Edit],
                },
                Permission {
                    resource: Resource::Product,
                    actions: vec![Action::View],
                },
                Permission {
                    resource: Resource::WriteOff,
                    actions: vec![Action::View, Action::Create],
                },
            ],
        }
    }

    /// Flattened `resource:action` strings, as carried in access tokens
    pub fn permission_strings(&self) -> Vec<String> {
        self.permissions()
            .iter()
            .flat_map(|p| {
                p.actions
                    .iter()
                    .map(move |a| format!("{}:{}", p.resource.as_str(), a.as_str()))
            })
            .collect()
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A permission granting access to a resource
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Permission {
    pub resource: Resource,
    pub actions: Vec<Action>,
}

/// Resources that can be accessed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Product,
    Order,
    Guest,
    Shift,
    WriteOff,
    Report,
    User,
}

impl Resource {
    pub const ALL: [Resource; 7] = [
        Resource::Product,
        Resource::Order,
        Resource::Guest,
        Resource::Shift,
        Resource::WriteOff,
        Resource::Report,
        Resource::User,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Product => "product",
            Resource::Order => "order",
            Resource::Guest => "guest",
            Resource::Shift => "shift",
            Resource::WriteOff => "write_off",
            Resource::Report => "report",
            Resource::User => "user",
        }
    }
}

/// Actions that can be performed on resources
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    View,
    Create,
    Edit,
    Delete,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::View, Action::Create, Action::Edit, Action::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Create => "create",
            Action::Edit => "edit",
            Action::Delete => "delete",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_has_every_permission() {
        let perms = UserRole::Admin.permission_strings();
        assert_eq!(perms.len(), Resource::ALL.len() * Action::ALL.len());
        assert!(perms.contains(&"user:delete".to_string()));
    }

    #[test]
    fn bartender_cannot_edit_catalog() {
        let perms = UserRole::Bartender.permission_strings();
        assert!(perms.contains(&"order:edit".to_string()));
        assert!(perms.contains(&"product:view".to_string()));
        assert!(!perms.contains(&"product:edit".to_string()));
        assert!(!perms.iter().any(|p| p.starts_with("report:")));
    }

    #[test]
    fn role_round_trips_through_str() {
        for role in [UserRole::Admin, UserRole::Bartender] {
            assert_eq!(UserRole::parse(role.as_str()), Some(role));
        }
        assert_eq!(UserRole::parse("owner"), None);
    }
}
