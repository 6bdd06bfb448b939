//! Dashboard users and their per-area permissions.

use serde::{Deserialize, Serialize};

/// Account role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum UserRole {
    Admin,
    #[default]
    Member,
    Api,
}

/// Access level for one area.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum Permission {
    #[default]
    None,
    View,
    Edit,
    Admin,
}

/// Access levels by dashboard area.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct UserPermissions {
    pub events: Permission,
    pub contacts: Permission,
    pub messages: Permission,
    pub media: Permission,
    pub chat: Permission,
    pub analytics: Permission,
    pub integrations: Permission,
    pub subscription: Permission,
    pub users: Permission,
    pub org: Permission,
    pub api: Permission,
    pub web_chat: Permission,
}

/// A dashboard user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct User {
    pub id: String,
    pub org_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_img: Option<String>,
    #[serde(default)]
    pub permissions: UserPermissions,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default)]
    pub auth_id: String,
}

impl User {
    /// Returns `true` if the user may change contacts.
    pub fn can_edit_contacts(&self) -> bool {
        self.role == UserRole::Admin || self.permissions.contacts >= Permission::Edit
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_permission_ordering() {
        let user: User = serde_json::from_value(json!({
            "id": "u1",
            "orgId": "org-1",
            "firstName": "Ada",
            "lastName": "Lovelace",
            "email": "ada@example.org",
            "role": "Member",
            "permissions": {
                "events": "view", "contacts": "edit", "messages": "view",
                "media": "none", "chat": "none", "analytics": "view",
                "integrations": "none", "subscription": "none", "users": "none",
                "org": "none", "api": "none", "webChat": "none"
            },
            "createdAt": 1,
            "updatedAt": 1
        }))
        .unwrap();
        assert!(user.can_edit_contacts());
        assert!(Permission::View < Permission::Admin);
    }
}
