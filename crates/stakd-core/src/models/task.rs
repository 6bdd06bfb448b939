//! Tasks and their assignees.

use serde::{Deserialize, Serialize};

use crate::entity::{Crud, EntityKind, Resource, Validate, require};
use crate::filter::Searchable;
use crate::Result;

/// Task urgency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    /// Urgent
    High,
    /// Normal
    #[default]
    Medium,
    /// Whenever
    Low,
}

/// Task progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    /// Not started
    #[default]
    Pending,
    /// Being worked on
    InProgress,
    /// Done
    Completed,
    /// Dropped
    Cancelled,
}

impl TaskStatus {
    /// Wire value.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

/// A user assigned to a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskAssignee {
    /// User id
    pub id: String,
    /// Display name
    pub name: String,
    /// Email address
    pub email: String,
    /// Avatar URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// A to-do item, optionally tied to a contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Record id
    pub id: String,
    /// Owning organization
    pub org_id: String,
    /// Title
    pub title: String,
    /// Details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// ISO-8601 due date
    pub due_date: String,
    /// Urgency
    #[serde(default)]
    pub priority: TaskPriority,
    /// Progress
    #[serde(default)]
    pub status: TaskStatus,
    /// Completion flag
    #[serde(default)]
    pub completed: bool,
    /// Assigned users
    #[serde(default)]
    pub assignees: Vec<TaskAssignee>,
    /// Related contact
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<String>,
    /// Creating user
    pub created_by: String,
    /// Epoch milliseconds
    pub created_at: i64,
    /// Epoch milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
    /// Epoch milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
    /// Completing user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_by: Option<String>,
}

impl Resource for Task {
    const KIND: EntityKind = EntityKind::Task;

    fn id(&self) -> &str {
        &self.id
    }
}

impl Crud for Task {
    type Create = CreateTask;
    type Update = UpdateTask;
}

impl Searchable for Task {
    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.title.as_str()];
        fields.extend(self.description.as_deref());
        fields
    }

    fn status(&self) -> Option<&str> {
        Some(self.status.as_str())
    }

    fn date(&self) -> Option<&str> {
        Some(&self.due_date)
    }
}

/// POST body for `/tasks`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTask {
    /// Owning organization
    pub org_id: String,
    /// Title
    pub title: String,
    /// Details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// ISO-8601 due date
    pub due_date: String,
    /// Urgency
    #[serde(default)]
    pub priority: TaskPriority,
    /// Progress
    #[serde(default)]
    pub status: TaskStatus,
    /// Assigned users
    #[serde(default)]
    pub assignees: Vec<TaskAssignee>,
    /// Related contact
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<String>,
    /// Creating user
    pub created_by: String,
}

impl Validate for CreateTask {
    fn validate(&self) -> Result<()> {
        require("orgId", &self.org_id)?;
        require("title", &self.title)?;
        require("dueDate", &self.due_date)?;
        require("createdBy", &self.created_by)
    }
}

/// PUT body for `/tasks/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTask {
    /// Title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// ISO-8601 due date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    /// Urgency
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,
    /// Progress
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    /// Completion flag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    /// Related contact
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<String>,
}

impl Validate for UpdateTask {
    fn validate(&self) -> Result<()> {
        if let Some(title) = &self.title {
            require("title", title)?;
        }
        if let Some(due) = &self.due_date {
            require("dueDate", due)?;
        }
        Ok(())
    }
}
