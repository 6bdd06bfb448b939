//! Entity kinds and the traits that tie a record type to its REST
//! collection and change-event stream.

use std::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::Result;

/// The synchronized entity collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// `/contacts`
    Contact,
    /// `/tasks`
    Task,
    /// `/messages`
    Message,
    /// `/notifications`
    Notification,
    /// `/transactions`
    Transaction,
}

impl EntityKind {
    /// Every kind, in display order.
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Contact,
        EntityKind::Task,
        EntityKind::Message,
        EntityKind::Notification,
        EntityKind::Transaction,
    ];

    /// REST collection name, also the first query-key segment.
    pub fn collection(&self) -> &'static str {
        match self {
            EntityKind::Contact => "contacts",
            EntityKind::Task => "tasks",
            EntityKind::Message => "messages",
            EntityKind::Notification => "notifications",
            EntityKind::Transaction => "transactions",
        }
    }

    /// Change-event type emitted when a record of this kind changes.
    pub fn event_type(&self) -> &'static str {
        match self {
            EntityKind::Contact => "contact:update",
            EntityKind::Task => "task:update",
            EntityKind::Message => "message:update",
            EntityKind::Notification => "notification",
            EntityKind::Transaction => "transaction:update",
        }
    }

    /// How many recent events a list listener asks for.
    pub fn list_event_limit(&self) -> usize {
        match self {
            EntityKind::Notification => 3,
            _ => 5,
        }
    }

    /// How many recent events a single-document listener asks for.
    pub fn detail_event_limit(&self) -> usize {
        1
    }

    /// Parses a collection name.
    pub fn from_collection(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.collection() == name)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection())
    }
}

/// Sub-resource change-event types, scoped by `parentId`.
pub mod sub_events {
    /// Task assignee added/removed.
    pub const TASK_ASSIGNEE: &str = "task-assignee:update";
    /// Message recipient status changed.
    pub const MESSAGE_RECIPIENT: &str = "message-recipient:update";
    /// Events per sub-resource listener.
    pub const LIMIT: usize = 10;
}

/// Pre-submit validation for mutation inputs.
pub trait Validate {
    /// Returns [`crate::Error::Validation`] on the first failing field.
    fn validate(&self) -> Result<()>;
}

/// A record type stored in a REST collection.
pub trait Resource: DeserializeOwned + Clone + Send + Sync + 'static {
    /// Which collection the record lives in.
    const KIND: EntityKind;

    /// Record identifier.
    fn id(&self) -> &str;
}

/// A resource supporting create/update/delete.
pub trait Crud: Resource {
    /// POST body
    type Create: Serialize + Validate + Send + Sync;
    /// PUT body
    type Update: Serialize + Validate + Send + Sync;
}

/// Rejects blank strings.
pub(crate) fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(crate::Error::validation_field(
            field,
            format!("{field} is required"),
        ));
    }
    Ok(())
}
