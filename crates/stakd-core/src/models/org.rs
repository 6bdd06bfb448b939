//! Organizations (the tenancy scope for every other record).

use serde::{Deserialize, Serialize};

/// Account status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[allow(missing_docs)]
pub enum OrgStatus {
    #[default]
    Active,
    Onboarding,
    InReview,
    Suspended,
    Canceled,
}

/// Brand colors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct OrgColors {
    pub primary: String,
    pub secondary: String,
}

/// Primary point of contact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct OrgContact {
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// An organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct Organization {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub logo: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default)]
    pub status: OrgStatus,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip_code: String,
    #[serde(default)]
    pub colors: OrgColors,
    #[serde(default)]
    pub contact: OrgContact,
    #[serde(default)]
    pub custom_fields_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_plan: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trial_ends: Option<i64>,
    #[serde(default)]
    pub is_trialing: bool,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl Organization {
    /// Suspended and canceled organizations are read-only.
    pub fn is_writable(&self) -> bool {
        !matches!(self.status, OrgStatus::Suspended | OrgStatus::Canceled)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_minimal_record() {
        let org: Organization = serde_json::from_value(json!({
            "id": "org-1",
            "name": "Friends of the Library",
            "status": "in-review",
            "createdAt": 1
        }))
        .unwrap();
        assert_eq!(org.status, OrgStatus::InReview);
        assert!(org.is_writable());
    }
}
