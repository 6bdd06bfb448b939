//! In-app notifications.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::{EntityKind, Resource};
use crate::filter::ToQuery;

/// What a notification is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[allow(missing_docs)]
pub enum NotificationType {
    ChatInbound,
    VideoShareRequest,
    System,
    Error,
    MessageSent,
    MessageFailed,
    ContactUpdated,
}

impl NotificationType {
    /// Wire value.
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::ChatInbound => "chat-inbound",
            NotificationType::VideoShareRequest => "video-share-request",
            NotificationType::System => "system",
            NotificationType::Error => "error",
            NotificationType::MessageSent => "message-sent",
            NotificationType::MessageFailed => "message-failed",
            NotificationType::ContactUpdated => "contact-updated",
        }
    }
}

/// Notification urgency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    /// Wire value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

/// A notification. Type-specific payload lives in `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Record id
    pub id: String,
    /// Owning organization
    pub org_id: String,
    /// Target user; `None` means everyone in the org
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Kind
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    /// Headline
    pub title: String,
    /// Body
    pub message: String,
    /// Read flag
    #[serde(default)]
    pub read: bool,
    /// Epoch milliseconds
    pub created_at: i64,
    /// Urgency
    #[serde(default)]
    pub priority: Priority,
    /// Type-specific payload
    #[serde(default)]
    pub data: Value,
    /// Free-form metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl Resource for Notification {
    const KIND: EntityKind = EntityKind::Notification;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Filter for `GET /notifications`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationFilter {
    /// Accepted kinds
    #[serde(default, rename = "type", skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<NotificationType>,
    /// Read state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read: Option<bool>,
    /// Accepted priorities
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub priority: Vec<Priority>,
    /// Epoch milliseconds, inclusive
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<i64>,
    /// Epoch milliseconds, inclusive
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<i64>,
    /// 1-based page number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Page size
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl NotificationFilter {
    /// Only unread notifications.
    pub fn unread() -> Self {
        Self {
            read: Some(false),
            ..Default::default()
        }
    }

    /// Returns `true` if the notification passes every populated criterion.
    pub fn matches(&self, n: &Notification) -> bool {
        (self.types.is_empty() || self.types.contains(&n.notification_type))
            && self.read.is_none_or(|r| r == n.read)
            && (self.priority.is_empty() || self.priority.contains(&n.priority))
            && self.start_date.is_none_or(|s| n.created_at >= s)
            && self.end_date.is_none_or(|e| n.created_at <= e)
    }
}

impl ToQuery for NotificationFilter {
    fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        for t in &self.types {
            pairs.push(("type[]".to_string(), t.as_str().to_string()));
        }
        if let Some(read) = self.read {
            pairs.push(("read".to_string(), read.to_string()));
        }
        for p in &self.priority {
            pairs.push(("priority[]".to_string(), p.as_str().to_string()));
        }
        if let Some(start) = self.start_date {
            pairs.push(("startDate".to_string(), start.to_string()));
        }
        if let Some(end) = self.end_date {
            pairs.push(("endDate".to_string(), end.to_string()));
        }
        if let Some(page) = self.page {
            pairs.push(("page".to_string(), page.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        pairs
    }
}

/// Per-type delivery preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypePreference {
    /// Deliver this kind at all
    pub enabled: bool,
    /// Priority to deliver it with
    pub priority: Priority,
}

/// User notification preferences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPreferences {
    /// Email delivery
    #[serde(default)]
    pub email: bool,
    /// Push delivery
    #[serde(default)]
    pub push: bool,
    /// In-app delivery
    #[serde(default)]
    pub in_app: bool,
    /// Per-kind settings
    #[serde(default)]
    pub types: BTreeMap<NotificationType, TypePreference>,
}

/// `GET /notifications/unread-count` response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadCount {
    /// Unread notifications for the current user
    pub count: u64,
}
