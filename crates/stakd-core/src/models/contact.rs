//! Contacts.

use serde::{Deserialize, Serialize};

use crate::entity::{Crud, EntityKind, Resource, Validate, require};
use crate::filter::Searchable;
use crate::{Error, Result};

/// Contact lifecycle status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactStatus {
    /// Visible in lists
    #[default]
    Active,
    /// Soft-deleted
    Archived,
}

impl ContactStatus {
    /// Wire value.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactStatus::Active => "active",
            ContactStatus::Archived => "archived",
        }
    }
}

/// A person the organization keeps in touch with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    /// Record id
    pub id: String,
    /// Owning organization
    pub org_id: String,
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: String,
    /// Email address
    pub email: String,
    /// Phone number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Employer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    /// Job title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    /// Lifecycle status
    #[serde(default)]
    pub status: ContactStatus,
    /// Free-form tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// ISO-8601 time of last outreach
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_contacted: Option<String>,
    /// Epoch milliseconds
    pub created_at: i64,
    /// Epoch milliseconds
    pub updated_at: i64,
}

impl Contact {
    /// "First Last"
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl Resource for Contact {
    const KIND: EntityKind = EntityKind::Contact;

    fn id(&self) -> &str {
        &self.id
    }
}

impl Crud for Contact {
    type Create = CreateContact;
    type Update = UpdateContact;
}

impl Searchable for Contact {
    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![
            self.first_name.as_str(),
            self.last_name.as_str(),
            self.email.as_str(),
        ];
        fields.extend(self.organization.as_deref());
        fields
    }

    fn status(&self) -> Option<&str> {
        Some(self.status.as_str())
    }

    fn tags(&self) -> &[String] {
        &self.tags
    }

    fn date(&self) -> Option<&str> {
        self.last_contacted.as_deref()
    }
}

/// A past interaction with a contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactActivity {
    /// Record id
    pub id: String,
    /// Contact the activity belongs to
    pub contact_id: String,
    /// `email`, `call`, `meeting`, `note` or `task`
    #[serde(rename = "type")]
    pub activity_type: String,
    /// Short title
    pub title: String,
    /// Longer description
    #[serde(default)]
    pub description: String,
    /// ISO-8601 time
    pub timestamp: String,
    /// Acting user
    pub user_id: String,
}

/// POST body for `/contacts`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateContact {
    /// Owning organization
    pub org_id: String,
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: String,
    /// Email address
    pub email: String,
    /// Phone number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Employer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    /// Job title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    /// Lifecycle status
    #[serde(default)]
    pub status: ContactStatus,
    /// Free-form tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl CreateContact {
    /// Minimal input with the required fields.
    pub fn new(
        org_id: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            org_id: org_id.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
            ..Default::default()
        }
    }
}

fn check_email(email: &str) -> Result<()> {
    let well_formed = email
        .split_once('@')
        .is_some_and(|(user, domain)| !user.is_empty() && !domain.is_empty());
    if !well_formed {
        return Err(Error::validation_field("email", "email must be a valid address"));
    }
    Ok(())
}

impl Validate for CreateContact {
    fn validate(&self) -> Result<()> {
        require("orgId", &self.org_id)?;
        require("firstName", &self.first_name)?;
        require("lastName", &self.last_name)?;
        check_email(&self.email)
    }
}

/// PUT body for `/contacts/{id}`; absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateContact {
    /// Given name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    /// Family name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    /// Email address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Phone number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Employer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    /// Job title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    /// Lifecycle status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ContactStatus>,
    /// Free-form tags
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// Notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Validate for UpdateContact {
    fn validate(&self) -> Result<()> {
        if let Some(first) = &self.first_name {
            require("firstName", first)?;
        }
        if let Some(last) = &self.last_name {
            require("lastName", last)?;
        }
        if let Some(email) = &self.email {
            check_email(email)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::filter::FilterParams;
    use serde_json::json;

    fn contact() -> Contact {
        serde_json::from_value(json!({
            "id": "c1",
            "orgId": "org-1",
            "firstName": "Grace",
            "lastName": "Hopper",
            "email": "grace@navy.mil",
            "organization": "US Navy",
            "status": "active",
            "tags": ["donor"],
            "createdAt": 1,
            "updatedAt": 2
        }))
        .unwrap()
    }

    #[test]
    fn test_deserialize_wire_record() {
        let c = contact();
        assert_eq!(c.full_name(), "Grace Hopper");
        assert_eq!(c.status, ContactStatus::Active);
        assert_eq!(c.id(), "c1");
    }

    #[test]
    fn test_create_validation() {
        let ok = CreateContact::new("org-1", "Grace", "Hopper", "grace@navy.mil");
        assert!(ok.validate().is_ok());

        let bad_email = CreateContact::new("org-1", "Grace", "Hopper", "grace");
        let Err(Error::Validation { field, .. }) = bad_email.validate() else {
            unreachable!("Expected Validation error");
        };
        assert_eq!(field.as_deref(), Some("email"));

        let no_name = CreateContact::new("org-1", "", "Hopper", "g@n.mil");
        assert!(no_name.validate().is_err());
    }

    #[test]
    fn test_update_validates_only_present_fields() {
        assert!(UpdateContact::default().validate().is_ok());
        let update = UpdateContact {
            email: Some("@".to_string()),
            ..Default::default()
        };
        assert!(update.validate().is_err());
    }

    #[test]
    fn test_update_skips_absent_fields() {
        let update = UpdateContact {
            notes: Some("met at gala".to_string()),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&update).unwrap(), json!({"notes": "met at gala"}));
    }

    #[test]
    fn test_search_matches_organization() {
        let filter = FilterParams {
            search: Some("navy".to_string()),
            tags: vec!["donor".to_string()],
            ..Default::default()
        };
        assert!(filter.matches(&contact()));
    }
}
