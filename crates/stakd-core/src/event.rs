//! Change-event records and the filter used to listen for them.
//!
//! The backend appends one [`ChangeEvent`] to a shared collection whenever a
//! document changes. Clients never read the events for their content; an
//! event only says "data in this scope is stale".

use serde::{Deserialize, Serialize};

use crate::filter::ToQuery;

/// One entry in the shared change-event collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    /// Organization scope
    pub org_id: String,
    /// Event discriminator, e.g. `contact:update`
    #[serde(rename = "type")]
    pub event_type: String,
    /// Changed document, for per-document listeners
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<String>,
    /// Parent document, for sub-resource listeners
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Epoch milliseconds
    pub timestamp: i64,
}

impl ChangeEvent {
    /// Creates an event stamped with the current time.
    pub fn now(org_id: impl Into<String>, event_type: impl Into<String>) -> Self {
        Self {
            org_id: org_id.into(),
            event_type: event_type.into(),
            doc_id: None,
            parent_id: None,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Sets the document id.
    pub fn with_doc(mut self, doc_id: impl Into<String>) -> Self {
        self.doc_id = Some(doc_id.into());
        self
    }

    /// Sets the parent id.
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Sets the timestamp.
    pub fn at(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Compound filter `{orgId, type, [docId], [parentId]}` ordered by
/// timestamp descending and capped at `limit`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFilter {
    /// Organization scope
    pub org_id: String,
    /// Event discriminator
    #[serde(rename = "type")]
    pub event_type: String,
    /// Restrict to one document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<String>,
    /// Restrict to children of one document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Number of newest events per delivery
    pub limit: usize,
}

impl EventFilter {
    /// Creates a filter on organization and event type.
    pub fn new(org_id: impl Into<String>, event_type: impl Into<String>, limit: usize) -> Self {
        Self {
            org_id: org_id.into(),
            event_type: event_type.into(),
            doc_id: None,
            parent_id: None,
            limit: limit.max(1),
        }
    }

    /// Restricts to one document.
    pub fn doc(mut self, doc_id: impl Into<String>) -> Self {
        self.doc_id = Some(doc_id.into());
        self
    }

    /// Restricts to children of one document.
    pub fn parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Returns `true` if the event satisfies every populated criterion.
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        event.org_id == self.org_id
            && event.event_type == self.event_type
            && self
                .doc_id
                .as_ref()
                .is_none_or(|id| event.doc_id.as_ref() == Some(id))
            && self
                .parent_id
                .as_ref()
                .is_none_or(|id| event.parent_id.as_ref() == Some(id))
    }

    /// Applies the filter to a collection: matching events, newest first,
    /// at most `limit` of them.
    pub fn select<'a, I>(&self, events: I) -> Vec<ChangeEvent>
    where
        I: IntoIterator<Item = &'a ChangeEvent>,
    {
        let mut hits: Vec<ChangeEvent> = events
            .into_iter()
            .filter(|e| self.matches(e))
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        hits.truncate(self.limit);
        hits
    }
}

impl ToQuery for EventFilter {
    fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("orgId".to_string(), self.org_id.clone()),
            ("type".to_string(), self.event_type.clone()),
        ];
        if let Some(doc_id) = &self.doc_id {
            pairs.push(("docId".to_string(), doc_id.clone()));
        }
        if let Some(parent_id) = &self.parent_id {
            pairs.push(("parentId".to_string(), parent_id.clone()));
        }
        pairs.push(("limit".to_string(), self.limit.to_string()));
        pairs
    }
}
