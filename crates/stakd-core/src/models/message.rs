//! Outbound messages and their per-recipient delivery records.

use serde::{Deserialize, Serialize};

use crate::entity::{Crud, EntityKind, Resource, Validate, require};
use crate::filter::Searchable;
use crate::{Error, Result};

/// Delivery channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessagePlatform {
    /// Twitter DM
    Twitter,
    /// Organization SMS number
    StackedSms,
    /// Email
    Email,
    /// Sender's own phone
    PersonalSms,
    /// Website chat widget
    WebChat,
}

/// Message pipeline status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[allow(missing_docs)]
pub enum MessageStatus {
    Draft,
    Building,
    Dispatched,
    Scheduled,
    InProgress,
    Pending,
    Ready,
    Sending,
    Completed,
    Sent,
    Failed,
    Cancelled,
    Error,
}

impl MessageStatus {
    /// Wire value.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Draft => "draft",
            MessageStatus::Building => "building",
            MessageStatus::Dispatched => "dispatched",
            MessageStatus::Scheduled => "scheduled",
            MessageStatus::InProgress => "in-progress",
            MessageStatus::Pending => "pending",
            MessageStatus::Ready => "ready",
            MessageStatus::Sending => "sending",
            MessageStatus::Completed => "completed",
            MessageStatus::Sent => "sent",
            MessageStatus::Failed => "failed",
            MessageStatus::Cancelled => "cancelled",
            MessageStatus::Error => "error",
        }
    }
}

/// Body format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyType {
    /// Plain text
    Text,
    /// HTML
    Html,
}

/// Message content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBody {
    /// Format
    #[serde(rename = "type")]
    pub body_type: BodyType,
    /// Content
    pub value: String,
    /// Email subject
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

/// Who a message goes to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientList {
    /// Individual contacts
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contact_ids: Vec<String>,
    /// Contact boards
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub board_ids: Vec<String>,
}

impl RecipientList {
    /// Returns `true` if nobody is addressed.
    pub fn is_empty(&self) -> bool {
        self.contact_ids.is_empty() && self.board_ids.is_empty()
    }
}

/// Birthday-message cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BirthdayFrequency {
    /// Every day
    BirthdayDaily,
    /// Every week
    BirthdayWeekly,
    /// Every month
    BirthdayMonthly,
}

/// When to send: a fixed time or a recurring birthday cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SendAt {
    /// Epoch milliseconds
    At(i64),
    /// Recurring
    Recurring(BirthdayFrequency),
}

/// Aggregate delivery counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct MessageStats {
    pub ready: u64,
    pub pending: u64,
    pub sent: u64,
    pub error: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub total: u64,
}

/// A message (campaign) addressed to one or more contacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Record id
    pub id: String,
    /// Owning organization
    pub org_id: String,
    /// Internal title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Subject line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Pipeline status
    pub status: MessageStatus,
    /// Authoring user
    pub author_id: String,
    /// Sending user
    pub sender_id: String,
    /// Addressees
    #[serde(default)]
    pub recipients: RecipientList,
    /// Content
    #[serde(default)]
    pub body: Option<MessageBody>,
    /// Channel
    pub platform: MessagePlatform,
    /// Schedule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_at: Option<SendAt>,
    /// Epoch milliseconds
    pub created_at: i64,
    /// Epoch milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
    /// Archived flag
    #[serde(default)]
    pub archived: bool,
    /// Delivery counters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<MessageStats>,
    /// Last pipeline error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl Resource for Message {
    const KIND: EntityKind = EntityKind::Message;

    fn id(&self) -> &str {
        &self.id
    }
}

impl Crud for Message {
    type Create = CreateMessage;
    type Update = UpdateMessage;
}

impl Searchable for Message {
    fn search_fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = Vec::new();
        fields.extend(self.title.as_deref());
        fields.extend(self.subject.as_deref());
        fields.extend(self.body.as_ref().map(|b| b.value.as_str()));
        fields
    }

    fn status(&self) -> Option<&str> {
        Some(self.status.as_str())
    }
}

/// One recipient's copy of a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecipient {
    /// Record id
    pub id: String,
    /// Owning organization
    pub org_id: String,
    /// Parent message
    pub message_id: String,
    /// Delivery status
    pub status: MessageStatus,
    /// Personalized content
    #[serde(default)]
    pub body: Option<MessageBody>,
    /// Sending user
    pub sender_id: String,
    /// Contact id
    pub recipient_id: String,
    /// Channel
    pub platform: MessagePlatform,
    /// Address on the channel
    #[serde(default)]
    pub channel: String,
    /// Epoch milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<i64>,
    /// Delivery error or note
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    /// Epoch milliseconds
    pub created_at: i64,
}

fn check_body(body: &MessageBody) -> Result<()> {
    if body.value.trim().is_empty() {
        return Err(Error::validation_field("body", "message body must not be empty"));
    }
    Ok(())
}

/// POST body for `/messages`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMessage {
    /// Owning organization
    pub org_id: String,
    /// Internal title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Pipeline status (usually `draft`)
    pub status: MessageStatus,
    /// Authoring user
    pub author_id: String,
    /// Sending user
    pub sender_id: String,
    /// Addressees
    pub recipients: RecipientList,
    /// Content
    pub body: Option<MessageBody>,
    /// Channel
    pub platform: MessagePlatform,
    /// Schedule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_at: Option<SendAt>,
}

impl Validate for CreateMessage {
    fn validate(&self) -> Result<()> {
        require("orgId", &self.org_id)?;
        require("authorId", &self.author_id)?;
        require("senderId", &self.sender_id)?;
        if let Some(body) = &self.body {
            check_body(body)?;
        }
        if self.status != MessageStatus::Draft && self.recipients.is_empty() {
            return Err(Error::validation_field(
                "recipients",
                "at least one recipient is required",
            ));
        }
        Ok(())
    }
}

/// PUT body for `/messages/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMessage {
    /// Internal title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Sending user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,
    /// Addressees
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipients: Option<RecipientList>,
    /// Content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<MessageBody>,
    /// Channel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<MessagePlatform>,
    /// Schedule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_at: Option<SendAt>,
}

impl Validate for UpdateMessage {
    fn validate(&self) -> Result<()> {
        if let Some(body) = &self.body {
            check_body(body)?;
        }
        if self.recipients.as_ref().is_some_and(RecipientList::is_empty) {
            return Err(Error::validation_field(
                "recipients",
                "at least one recipient is required",
            ));
        }
        Ok(())
    }
}
