//! Per-entity sync handles.
//!
//! [`SyncClient`] bundles the transport, the query cache, the change-event
//! feed and the organization scope. [`EntitySync`] mounts views over one
//! collection and runs its mutations. A mutation validates its input, calls
//! the transport, then invalidates the collection prefix and waits for the
//! mounted views to refetch, so a view read right after a mutation already
//! reflects it.

use std::sync::Arc;
use std::time::Duration;

use stakd_client::{ApiClient, ClientConfig, EntityApi};
use stakd_core::entity::sub_events;
use stakd_core::models::{
    Contact, ContactActivity, Message, MessageRecipient, Notification, NotificationFilter,
    NotificationPreferences, Task, TaskAssignee, Transaction, UnreadCount,
};
use stakd_core::{ApiError, Crud, EntityKind, EventFilter, ListParams, PaginatedResponse, Resource, Result};
use tokio::time::MissedTickBehavior;

use crate::cache::{QueryCache, QueryKey};
use crate::feed::EventFeed;
use crate::subscription::{Subscription, SubscriptionConfig};
use crate::views::{DetailView, ListView, QueryView};

/// Kept outside the `[notifications]` prefix so list invalidations and
/// record ids never reach them.
const UNREAD_COUNT: &str = "notification-unread-count";
const PREFERENCES: &str = "notification-preferences";

// ============================================================================
// SyncConfig
// ============================================================================

/// Timing knobs for mounted views.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// A cached value younger than this is not reloaded on mount.
    pub stale_after: Duration,
    /// Periodic refetch for the unread notification count.
    pub unread_refresh: Duration,
    /// Debounce and reconnect settings for every subscription.
    pub subscription: SubscriptionConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            stale_after: Duration::ZERO,
            unread_refresh: Duration::from_secs(30),
            subscription: SubscriptionConfig::default(),
        }
    }
}

impl SyncConfig {
    /// Picks the sync settings out of a client configuration.
    pub fn from_client(config: &ClientConfig) -> Self {
        Self {
            stale_after: config.stale_after(),
            unread_refresh: config.unread_refresh(),
            subscription: SubscriptionConfig::with_debounce(config.debounce()),
        }
    }
}

// ============================================================================
// SyncClient
// ============================================================================

/// Shared entry point for entity views and mutations. Cheap to clone.
#[derive(Clone)]
pub struct SyncClient {
    api: ApiClient,
    cache: QueryCache,
    feed: Arc<dyn EventFeed>,
    org_id: String,
    config: SyncConfig,
}

impl std::fmt::Debug for SyncClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncClient")
            .field("base_url", &self.api.base_url())
            .field("org_id", &self.org_id)
            .field("cache", &self.cache)
            .field("config", &self.config)
            .finish()
    }
}

impl SyncClient {
    /// Creates a client with an empty cache.
    pub fn new(
        api: ApiClient,
        feed: Arc<dyn EventFeed>,
        org_id: impl Into<String>,
        config: SyncConfig,
    ) -> Self {
        Self {
            api,
            cache: QueryCache::new(),
            feed,
            org_id: org_id.into(),
            config,
        }
    }

    /// Transport.
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Shared cache.
    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Organization every subscription is scoped to.
    pub fn org_id(&self) -> &str {
        &self.org_id
    }

    /// View settings.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Handle for any resource type.
    pub fn entity<R: Resource>(&self) -> EntitySync<R> {
        EntitySync {
            sync: self.clone(),
            api: EntityApi::new(self.api.clone()),
        }
    }

    /// `/contacts`
    pub fn contacts(&self) -> EntitySync<Contact> {
        self.entity()
    }

    /// `/tasks`
    pub fn tasks(&self) -> EntitySync<Task> {
        self.entity()
    }

    /// `/messages`
    pub fn messages(&self) -> EntitySync<Message> {
        self.entity()
    }

    /// `/notifications`
    pub fn notifications(&self) -> EntitySync<Notification> {
        self.entity()
    }

    /// `/transactions`
    pub fn transactions(&self) -> EntitySync<Transaction> {
        self.entity()
    }

    fn filter(&self, event_type: &str, limit: usize) -> EventFilter {
        EventFilter::new(self.org_id.clone(), event_type, limit)
    }

    /// Observes `key`, starts a load unless a fresh value exists, and opens
    /// a subscription invalidating `targets` when `filter` is given.
    async fn mount<T, F, Fut>(
        &self,
        key: QueryKey,
        loader: F,
        filter: Option<EventFilter>,
        targets: Vec<QueryKey>,
    ) -> QueryView<T>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<T, ApiError>> + Send + 'static,
    {
        let observer = self.cache.observe(key, loader);
        let loading = observer.ensure_fresh(self.config.stale_after);
        tracing::debug!(key = %observer.key(), loading, "view mounted");

        let subscription = match filter {
            Some(filter) => Some(
                Subscription::open(
                    Arc::clone(&self.feed),
                    filter,
                    self.cache.clone(),
                    targets,
                    self.config.subscription.clone(),
                )
                .await,
            ),
            None => None,
        };
        QueryView::new(observer, subscription)
    }

    /// Invalidates `prefix` and waits for mounted views to refetch.
    async fn settle(&self, prefix: &QueryKey) {
        self.cache.invalidate(prefix).settled().await;
    }
}

// ============================================================================
// EntitySync
// ============================================================================

/// Views and mutations for one collection.
#[derive(Debug, Clone)]
pub struct EntitySync<R> {
    sync: SyncClient,
    api: EntityApi<R>,
}

impl<R: Resource> EntitySync<R> {
    /// Typed REST endpoints.
    pub fn api(&self) -> &EntityApi<R> {
        &self.api
    }

    /// `[collection]`
    pub fn key(&self) -> QueryKey {
        QueryKey::entity(R::KIND)
    }

    /// Mounts one page of the collection.
    ///
    /// Any `<entity>:update` event for the organization invalidates every
    /// cached query of the collection.
    pub async fn list(&self, params: ListParams) -> Result<ListView<R>> {
        let key = self.key().with_params(&params)?;
        let api = self.api.clone();
        let loader = move || {
            let api = api.clone();
            let params = params.clone();
            async move { api.list(&params).await.into_result() }
        };
        let filter = self
            .sync
            .filter(R::KIND.event_type(), R::KIND.list_event_limit());
        let view = self.sync.mount(key, loader, Some(filter), vec![self.key()]).await;
        Ok(ListView::new(view))
    }

    /// Mounts one record.
    pub async fn get(&self, id: &str) -> Result<DetailView<R>> {
        require_id(id)?;
        let key = self.key().push(id);
        let api = self.api.clone();
        let owned = id.to_string();
        let loader = move || {
            let api = api.clone();
            let id = owned.clone();
            async move { api.get(&id).await.into_result() }
        };
        let filter = self
            .sync
            .filter(R::KIND.event_type(), R::KIND.detail_event_limit())
            .doc(id);
        Ok(self.sync.mount(key.clone(), loader, Some(filter), vec![key]).await)
    }

    /// Mounts a sub-resource list such as a task's assignees.
    async fn child_view<T, F, Fut>(
        &self,
        parent_id: &str,
        segment: &str,
        event_type: &str,
        loader: F,
    ) -> Result<QueryView<T>>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<T, ApiError>> + Send + 'static,
    {
        require_id(parent_id)?;
        let key = self.key().push(parent_id).push(segment);
        let filter = self
            .sync
            .filter(event_type, sub_events::LIMIT)
            .parent(parent_id);
        Ok(self.sync.mount(key.clone(), loader, Some(filter), vec![key]).await)
    }

    async fn settle(&self) {
        self.sync.settle(&self.key()).await;
    }
}

impl<R: Crud> EntitySync<R> {
    /// Creates a record and waits for mounted views of the collection to
    /// refetch.
    pub async fn create(&self, input: &R::Create) -> Result<R> {
        let created = self.api.create(input).await?;
        tracing::info!(entity = %R::KIND, id = created.id(), "created");
        self.settle().await;
        Ok(created)
    }

    /// Updates a record and waits for the refetch.
    pub async fn update(&self, id: &str, input: &R::Update) -> Result<R> {
        let updated = self.api.update(id, input).await?;
        tracing::info!(entity = %R::KIND, id, "updated");
        self.settle().await;
        Ok(updated)
    }

    /// Deletes a record and waits for the refetch.
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.api.delete(id).await?;
        tracing::info!(entity = %R::KIND, id, "deleted");
        self.settle().await;
        Ok(())
    }
}

fn require_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(stakd_core::Error::validation_field("id", "id is required"));
    }
    Ok(())
}

// ============================================================================
// Entity-specific views and mutations
// ============================================================================

impl EntitySync<Contact> {
    /// Activity history, cached under `[contacts, id, activities]`.
    pub async fn activities(&self, contact_id: &str) -> Result<Arc<Vec<ContactActivity>>> {
        require_id(contact_id)?;
        let key = self.key().push(contact_id).push("activities");
        let api = self.api.clone();
        let id = contact_id.to_string();
        let value = self
            .sync
            .cache
            .fetch(&key, move || async move { api.activities(&id).await.into_result() })
            .await?;
        Ok(value)
    }

    /// Messages sent to the contact, cached under `[contacts, id, messages]`.
    pub async fn messages(&self, contact_id: &str) -> Result<Arc<Vec<Message>>> {
        require_id(contact_id)?;
        let key = self.key().push(contact_id).push("messages");
        let api = self.api.clone();
        let id = contact_id.to_string();
        let value = self
            .sync
            .cache
            .fetch(&key, move || async move { api.messages(&id).await.into_result() })
            .await?;
        Ok(value)
    }
}

impl EntitySync<Task> {
    /// Mounts the assignee list of a task.
    pub async fn assignees(&self, task_id: &str) -> Result<QueryView<Vec<TaskAssignee>>> {
        let api = self.api.clone();
        let id = task_id.to_string();
        let loader = move || {
            let api = api.clone();
            let id = id.clone();
            async move { api.assignees(&id).await.into_result() }
        };
        self.child_view(task_id, "assignees", sub_events::TASK_ASSIGNEE, loader)
            .await
    }

    /// Assigns a user.
    pub async fn add_assignee(&self, task_id: &str, user_id: &str) -> Result<()> {
        self.api.add_assignee(task_id, user_id).await?;
        tracing::info!(task_id, user_id, "assignee added");
        self.settle().await;
        Ok(())
    }

    /// Unassigns a user.
    pub async fn remove_assignee(&self, task_id: &str, user_id: &str) -> Result<()> {
        self.api.remove_assignee(task_id, user_id).await?;
        tracing::info!(task_id, user_id, "assignee removed");
        self.settle().await;
        Ok(())
    }

    /// Marks a task completed.
    pub async fn complete(&self, task_id: &str) -> Result<Task> {
        let task = self.api.complete(task_id).await?;
        self.settle().await;
        Ok(task)
    }

    /// Reopens a completed task.
    pub async fn uncomplete(&self, task_id: &str) -> Result<Task> {
        let task = self.api.uncomplete(task_id).await?;
        self.settle().await;
        Ok(task)
    }
}

impl EntitySync<Message> {
    /// Mounts the per-recipient delivery list of a message.
    pub async fn recipients(&self, message_id: &str) -> Result<QueryView<Vec<MessageRecipient>>> {
        let api = self.api.clone();
        let id = message_id.to_string();
        let loader = move || {
            let api = api.clone();
            let id = id.clone();
            async move { api.recipients(&id).await.into_result() }
        };
        self.child_view(message_id, "recipients", sub_events::MESSAGE_RECIPIENT, loader)
            .await
    }

    /// Marks a message read.
    pub async fn mark_read(&self, message_id: &str) -> Result<()> {
        self.api.mark_read(message_id).await?;
        self.settle().await;
        Ok(())
    }

    /// Marks a message unread.
    pub async fn mark_unread(&self, message_id: &str) -> Result<()> {
        self.api.mark_unread(message_id).await?;
        self.settle().await;
        Ok(())
    }

    /// Archives a message.
    pub async fn archive(&self, message_id: &str) -> Result<()> {
        self.api.archive(message_id).await?;
        self.settle().await;
        Ok(())
    }

    /// Restores an archived message.
    pub async fn unarchive(&self, message_id: &str) -> Result<()> {
        self.api.unarchive(message_id).await?;
        self.settle().await;
        Ok(())
    }
}

impl EntitySync<Notification> {
    /// Mounts a notification page using the notification filter.
    pub async fn list_filtered(
        &self,
        filter: NotificationFilter,
    ) -> Result<ListView<Notification>> {
        let key = self.key().with_params(&filter)?;
        let api = self.api.clone();
        let loader = move || {
            let api = api.clone();
            let filter = filter.clone();
            async move { api.list_filtered(&filter).await.into_result() }
        };
        let events = self.sync.filter(
            EntityKind::Notification.event_type(),
            EntityKind::Notification.list_event_limit(),
        );
        let view: QueryView<PaginatedResponse<Notification>> = self
            .sync
            .mount(key, loader, Some(events), vec![self.key()])
            .await;
        Ok(ListView::new(view))
    }

    /// Mounts the unread count. Besides the event subscription it refetches
    /// on a fixed interval while mounted.
    pub async fn unread_count(&self) -> QueryView<UnreadCount> {
        let key = QueryKey::new([UNREAD_COUNT]);
        let api = self.api.clone();
        let loader = move || {
            let api = api.clone();
            async move { api.unread_count().await.into_result() }
        };
        let events = self.sync.filter(
            EntityKind::Notification.event_type(),
            EntityKind::Notification.list_event_limit(),
        );
        let view = self
            .sync
            .mount(key.clone(), loader, Some(events), vec![key.clone()])
            .await;

        let period = self.sync.config.unread_refresh;
        if period.is_zero() {
            return view;
        }
        let cache = self.sync.cache.clone();
        let task = tokio::spawn(async move {
            let mut ticks = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                tracing::trace!(%key, "periodic refetch");
                drop(cache.invalidate(&key));
            }
        });
        view.with_refresh(task)
    }

    /// Marks one notification read.
    pub async fn mark_read(&self, id: &str) -> Result<()> {
        self.api.mark_read(id).await?;
        self.settle_read_state().await;
        Ok(())
    }

    /// Marks every notification read.
    pub async fn mark_all_read(&self) -> Result<()> {
        self.api.mark_all_read().await?;
        tracing::info!("all notifications marked read");
        self.settle_read_state().await;
        Ok(())
    }

    async fn settle_read_state(&self) {
        let cache = &self.sync.cache;
        cache
            .invalidate(&self.key())
            .merge(cache.invalidate(&QueryKey::new([UNREAD_COUNT])))
            .settled()
            .await;
    }

    /// Mounts the delivery preferences. No event stream covers them.
    pub async fn preferences(&self) -> QueryView<NotificationPreferences> {
        let api = self.api.clone();
        let loader = move || {
            let api = api.clone();
            async move { api.preferences().await.into_result() }
        };
        self.sync
            .mount(QueryKey::new([PREFERENCES]), loader, None, Vec::new())
            .await
    }

    /// Saves the delivery preferences.
    pub async fn update_preferences(
        &self,
        preferences: &NotificationPreferences,
    ) -> Result<NotificationPreferences> {
        let saved = self.api.update_preferences(preferences).await?;
        self.sync.settle(&QueryKey::new([PREFERENCES])).await;
        Ok(saved)
    }
}

impl EntitySync<Transaction> {
    /// Mounts the transactions of one contact, keyed
    /// `[transactions, by-contact, contactId]`.
    pub async fn for_contact(&self, contact_id: &str) -> Result<QueryView<Vec<Transaction>>> {
        require_id(contact_id)?;
        let key = self.key().push("by-contact").push(contact_id);
        let api = self.api.clone();
        let id = contact_id.to_string();
        let loader = move || {
            let api = api.clone();
            let id = id.clone();
            async move { api.for_contact(&id).await.into_result() }
        };
        let filter = self
            .sync
            .filter(
                EntityKind::Transaction.event_type(),
                EntityKind::Transaction.list_event_limit(),
            )
            .parent(contact_id);
        Ok(self.sync.mount(key.clone(), loader, Some(filter), vec![key]).await)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::feed::MemoryFeed;
    use stakd_client::NoSession;

    fn client() -> SyncClient {
        let api = ApiClient::with_http(
            reqwest::Client::new(),
            "http://127.0.0.1:1/api",
            Arc::new(NoSession),
        );
        SyncClient::new(api, Arc::new(MemoryFeed::new()), "org-1", SyncConfig::default())
    }

    #[test]
    fn test_sync_config_from_client() {
        let config = ClientConfig {
            debounce_ms: 50,
            stale_after_ms: 1_000,
            ..ClientConfig::default()
        };
        let sync = SyncConfig::from_client(&config);
        assert_eq!(sync.subscription.debounce, Duration::from_millis(50));
        assert_eq!(sync.stale_after, Duration::from_secs(1));
        assert_eq!(sync.unread_refresh, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_blank_id_rejected_before_mount() {
        let sync = client();
        let err = sync.contacts().get(" ").await.unwrap_err();
        assert!(matches!(err, stakd_core::Error::Validation { .. }));
        assert_eq!(sync.cache().stats().loads, 0);
    }

    #[tokio::test]
    async fn test_list_key_includes_params() {
        let sync = client();
        let view = sync
            .tasks()
            .list(ListParams::new().page(2, 10))
            .await
            .unwrap();
        assert_eq!(
            view.key().segments(),
            &["tasks".to_string(), r#"{"page":2,"limit":10}"#.to_string()]
        );
        let filter = view.subscription().unwrap().filter();
        assert_eq!(filter.event_type, "task:update");
        assert_eq!(filter.limit, 5);
    }

    #[tokio::test]
    async fn test_detail_subscription_scoped_to_doc() {
        let sync = client();
        let view = sync.messages().get("m1").await.unwrap();
        let filter = view.subscription().unwrap().filter();
        assert_eq!(filter.doc_id.as_deref(), Some("m1"));
        assert_eq!(filter.limit, 1);
    }

    #[tokio::test]
    async fn test_preferences_view_has_no_subscription() {
        let sync = client();
        let view = sync.notifications().preferences().await;
        assert!(view.subscription().is_none());
        assert_eq!(view.key().segments(), &["notification-preferences".to_string()]);
    }

    #[tokio::test]
    async fn test_special_notification_keys_outside_record_namespace() {
        let sync = client();
        let notifications = sync.notifications();
        let records = notifications.key();
        let count = notifications.unread_count().await;
        let prefs = notifications.preferences().await;
        let detail = notifications.get("preferences").await.unwrap();

        assert!(!count.key().starts_with(&records));
        assert!(!prefs.key().starts_with(&records));
        assert_ne!(detail.key(), prefs.key());
        assert!(count.subscription().is_some());
    }
}
