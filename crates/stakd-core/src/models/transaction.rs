//! Donations, purchases and other money movements tied to a contact.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::entity::{Crud, EntityKind, Resource, Validate, require};
use crate::filter::Searchable;
use crate::{Error, Result};

/// Settlement state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum TransactionStatus {
    #[default]
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl TransactionStatus {
    /// Wire value.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Refunded => "refunded",
        }
    }
}

/// What the money was for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum TransactionType {
    #[default]
    Donation,
    Purchase,
    Subscription,
    Other,
}

/// Where the transaction was recorded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum TransactionPlatform {
    Stripe,
    #[default]
    Manual,
    Other,
}

/// A transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Record id
    pub id: String,
    /// Owning organization
    pub org_id: String,
    /// Contact the money came from
    pub contact_id: String,
    /// Label
    pub name: String,
    /// Amount in the organization's currency
    pub amount: f64,
    /// Settlement state
    #[serde(default)]
    pub status: TransactionStatus,
    /// Purpose
    #[serde(rename = "type", default)]
    pub transaction_type: TransactionType,
    /// Source system
    #[serde(default)]
    pub platform: TransactionPlatform,
    /// Id in the source system
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_transaction_id: Option<String>,
    /// Likelihood of closing, 0-100
    #[serde(default)]
    pub probability: f64,
    /// ISO-8601 date
    pub date: String,
    /// Notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Free-form metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    /// ISO-8601 timestamp
    #[serde(default)]
    pub created_at: String,
    /// ISO-8601 timestamp
    #[serde(default)]
    pub updated_at: String,
}

impl Resource for Transaction {
    const KIND: EntityKind = EntityKind::Transaction;

    fn id(&self) -> &str {
        &self.id
    }
}

impl Crud for Transaction {
    type Create = CreateTransaction;
    type Update = UpdateTransaction;
}

impl Searchable for Transaction {
    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.name.as_str()];
        fields.extend(self.notes.as_deref());
        fields
    }

    fn status(&self) -> Option<&str> {
        Some(self.status.as_str())
    }

    fn date(&self) -> Option<&str> {
        Some(&self.date)
    }
}

fn check_amount(amount: f64) -> Result<()> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(Error::validation_field(
            "amount",
            "amount must be a non-negative number",
        ));
    }
    Ok(())
}

fn check_probability(probability: f64) -> Result<()> {
    if !(0.0..=100.0).contains(&probability) {
        return Err(Error::validation_field(
            "probability",
            "probability must be between 0 and 100",
        ));
    }
    Ok(())
}

/// POST body for `/transactions`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransaction {
    /// Owning organization
    pub org_id: String,
    /// Contact the money came from
    pub contact_id: String,
    /// Label
    pub name: String,
    /// Amount
    pub amount: f64,
    /// Settlement state
    pub status: TransactionStatus,
    /// Purpose
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// Source system
    pub platform: TransactionPlatform,
    /// Id in the source system
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_transaction_id: Option<String>,
    /// Likelihood of closing, 0-100
    pub probability: f64,
    /// ISO-8601 date
    pub date: String,
    /// Notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Free-form metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl Validate for CreateTransaction {
    fn validate(&self) -> Result<()> {
        require("contactId", &self.contact_id)?;
        require("name", &self.name)?;
        require("date", &self.date)?;
        check_amount(self.amount)?;
        check_probability(self.probability)
    }
}

/// PUT body for `/transactions/{id}`.
///
/// `contact_id` is not updatable but must be present so the contact's
/// transaction list can be invalidated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTransaction {
    /// Contact the transaction belongs to
    pub contact_id: String,
    /// Label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Amount
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    /// Settlement state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TransactionStatus>,
    /// Purpose
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub transaction_type: Option<TransactionType>,
    /// Source system
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<TransactionPlatform>,
    /// Likelihood of closing, 0-100
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,
    /// ISO-8601 date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// Notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Validate for UpdateTransaction {
    fn validate(&self) -> Result<()> {
        require("contactId", &self.contact_id)?;
        if let Some(name) = &self.name {
            require("name", name)?;
        }
        if let Some(date) = &self.date {
            require("date", date)?;
        }
        if let Some(amount) = self.amount {
            check_amount(amount)?;
        }
        if let Some(probability) = self.probability {
            check_probability(probability)?;
        }
        Ok(())
    }
}
