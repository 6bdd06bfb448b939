//! Typed pass-throughs to [`ApiClient::request`], one collection at a time.
//!
//! Reads return the raw [`ApiResponse`]. Mutations validate their input
//! first and return a [`Result`], so a validation failure never reaches the
//! network.

use std::marker::PhantomData;

use serde_json::json;
use stakd_core::models::{
    Contact, ContactActivity, Message, MessageRecipient, Notification, NotificationFilter,
    NotificationPreferences, Task, TaskAssignee, Transaction, UnreadCount,
};
use stakd_core::{ApiResponse, Crud, Error, ListParams, PaginatedResponse, Resource, Result, Validate};

use crate::client::{ApiClient, ApiRequest};

/// REST endpoints for one entity collection.
#[derive(Debug, Clone)]
pub struct EntityApi<R> {
    client: ApiClient,
    _marker: PhantomData<fn() -> R>,
}

impl<R: Resource> EntityApi<R> {
    /// Wraps a transport.
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            _marker: PhantomData,
        }
    }

    /// Underlying transport.
    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// `/{collection}`
    pub fn collection_path() -> String {
        format!("/{}", R::KIND.collection())
    }

    /// `/{collection}/{id}`
    pub fn item_path(id: &str) -> String {
        format!("/{}/{id}", R::KIND.collection())
    }

    /// `GET /{collection}?…` for one page.
    pub async fn list(&self, params: &ListParams) -> ApiResponse<PaginatedResponse<R>> {
        self.client
            .request(ApiRequest::get(Self::collection_path()).query(params))
            .await
    }

    /// `GET /{collection}/{id}`
    pub async fn get(&self, id: &str) -> ApiResponse<R> {
        self.client.request(ApiRequest::get(Self::item_path(id))).await
    }
}

impl<R: Crud> EntityApi<R> {
    /// `POST /{collection}`
    pub async fn create(&self, input: &R::Create) -> Result<R> {
        input.validate()?;
        let req = ApiRequest::post(Self::collection_path()).json(input)?;
        self.client.send(req).await
    }

    /// `PUT /{collection}/{id}`
    pub async fn update(&self, id: &str, input: &R::Update) -> Result<R> {
        require_id(id)?;
        input.validate()?;
        let req = ApiRequest::put(Self::item_path(id)).json(input)?;
        self.client.send(req).await
    }

    /// `DELETE /{collection}/{id}`
    pub async fn delete(&self, id: &str) -> Result<()> {
        require_id(id)?;
        self.client.send(ApiRequest::delete(Self::item_path(id))).await
    }
}

fn require_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(Error::validation_field("id", "id is required"));
    }
    Ok(())
}

impl EntityApi<Contact> {
    /// `GET /contacts/{id}/activities`
    pub async fn activities(&self, id: &str) -> ApiResponse<Vec<ContactActivity>> {
        self.client
            .request(ApiRequest::get(format!("{}/activities", Self::item_path(id))))
            .await
    }

    /// `GET /contacts/{id}/messages`
    pub async fn messages(&self, id: &str) -> ApiResponse<Vec<Message>> {
        self.client
            .request(ApiRequest::get(format!("{}/messages", Self::item_path(id))))
            .await
    }
}

impl EntityApi<Task> {
    /// `GET /tasks/{id}/assignees`
    pub async fn assignees(&self, task_id: &str) -> ApiResponse<Vec<TaskAssignee>> {
        self.client
            .request(ApiRequest::get(format!("{}/assignees", Self::item_path(task_id))))
            .await
    }

    /// `POST /tasks/{id}/assignees`
    pub async fn add_assignee(&self, task_id: &str, user_id: &str) -> Result<()> {
        require_id(task_id)?;
        if user_id.trim().is_empty() {
            return Err(Error::validation_field("userId", "userId is required"));
        }
        let req = ApiRequest::post(format!("{}/assignees", Self::item_path(task_id)))
            .json(&json!({ "userId": user_id }))?;
        self.client.send(req).await
    }

    /// `DELETE /tasks/{id}/assignees/{userId}`
    pub async fn remove_assignee(&self, task_id: &str, user_id: &str) -> Result<()> {
        require_id(task_id)?;
        require_id(user_id)?;
        let path = format!("{}/assignees/{user_id}", Self::item_path(task_id));
        self.client.send(ApiRequest::delete(path)).await
    }

    /// `PUT /tasks/{id}/complete`
    pub async fn complete(&self, task_id: &str) -> Result<Task> {
        require_id(task_id)?;
        let path = format!("{}/complete", Self::item_path(task_id));
        self.client.send(ApiRequest::put(path)).await
    }

    /// `PUT /tasks/{id}/uncomplete`
    pub async fn uncomplete(&self, task_id: &str) -> Result<Task> {
        require_id(task_id)?;
        let path = format!("{}/uncomplete", Self::item_path(task_id));
        self.client.send(ApiRequest::put(path)).await
    }
}

impl EntityApi<Message> {
    /// `GET /messages/{id}/recipients`
    pub async fn recipients(&self, message_id: &str) -> ApiResponse<Vec<MessageRecipient>> {
        self.client
            .request(ApiRequest::get(format!("{}/recipients", Self::item_path(message_id))))
            .await
    }

    async fn put_action(&self, message_id: &str, action: &str) -> Result<()> {
        require_id(message_id)?;
        let path = format!("{}/{action}", Self::item_path(message_id));
        self.client.send(ApiRequest::put(path)).await
    }

    /// `PUT /messages/{id}/read`
    pub async fn mark_read(&self, message_id: &str) -> Result<()> {
        self.put_action(message_id, "read").await
    }

    /// `PUT /messages/{id}/unread`
    pub async fn mark_unread(&self, message_id: &str) -> Result<()> {
        self.put_action(message_id, "unread").await
    }

    /// `PUT /messages/{id}/archive`
    pub async fn archive(&self, message_id: &str) -> Result<()> {
        self.put_action(message_id, "archive").await
    }

    /// `PUT /messages/{id}/unarchive`
    pub async fn unarchive(&self, message_id: &str) -> Result<()> {
        self.put_action(message_id, "unarchive").await
    }
}

impl EntityApi<Notification> {
    /// `GET /notifications?…` with the notification-specific filter.
    pub async fn list_filtered(
        &self,
        filter: &NotificationFilter,
    ) -> ApiResponse<PaginatedResponse<Notification>> {
        self.client
            .request(ApiRequest::get(Self::collection_path()).query(filter))
            .await
    }

    /// `GET /notifications/unread-count`
    pub async fn unread_count(&self) -> ApiResponse<UnreadCount> {
        self.client
            .request(ApiRequest::get("/notifications/unread-count"))
            .await
    }

    /// `PUT /notifications/{id}/read`
    pub async fn mark_read(&self, id: &str) -> Result<()> {
        require_id(id)?;
        let path = format!("{}/read", Self::item_path(id));
        self.client.send(ApiRequest::put(path)).await
    }

    /// `PUT /notifications/read-all`
    pub async fn mark_all_read(&self) -> Result<()> {
        self.client.send(ApiRequest::put("/notifications/read-all")).await
    }

    /// `GET /notifications/preferences`
    pub async fn preferences(&self) -> ApiResponse<NotificationPreferences> {
        self.client
            .request(ApiRequest::get("/notifications/preferences"))
            .await
    }

    /// `PUT /notifications/preferences`
    pub async fn update_preferences(
        &self,
        preferences: &NotificationPreferences,
    ) -> Result<NotificationPreferences> {
        let req = ApiRequest::put("/notifications/preferences").json(preferences)?;
        self.client.send(req).await
    }
}

impl EntityApi<Transaction> {
    /// `GET /transactions?contactId=…`, newest first.
    pub async fn for_contact(&self, contact_id: &str) -> ApiResponse<Vec<Transaction>> {
        self.client
            .request(ApiRequest::get(Self::collection_path()).param("contactId", contact_id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        assert_eq!(EntityApi::<Contact>::collection_path(), "/contacts");
        assert_eq!(EntityApi::<Task>::item_path("t1"), "/tasks/t1");
        assert_eq!(EntityApi::<Transaction>::collection_path(), "/transactions");
    }

    #[test]
    fn test_require_id() {
        assert!(require_id("c1").is_ok());
        assert!(matches!(require_id(""), Err(Error::Validation { .. })));
    }
}
