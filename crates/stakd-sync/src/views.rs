//! Mounted views: a cache observer plus the subscription and timers that
//! keep it fresh.
//!
//! A view is the Rust counterpart of a mounted component using a data hook.
//! Dropping it unmounts everything it owns.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use stakd_core::{ApiError, PageInfo, PaginatedResponse};
use tokio::task::JoinHandle;

use crate::cache::{QueryKey, QueryObserver, QuerySnapshot, QueryStatus};
use crate::subscription::{Subscription, SubscriptionState};

/// One observed query with its optional live subscription.
pub struct QueryView<T> {
    // Declared first so the subscription closes before the observer
    // unregisters.
    subscription: Option<Subscription>,
    refresh: Option<JoinHandle<()>>,
    observer: QueryObserver<T>,
}

/// Single-record view from [`EntitySync::get`](crate::EntitySync::get).
pub type DetailView<R> = QueryView<R>;

impl<T: Send + Sync + 'static> QueryView<T> {
    pub(crate) fn new(observer: QueryObserver<T>, subscription: Option<Subscription>) -> Self {
        Self {
            subscription,
            refresh: None,
            observer,
        }
    }

    pub(crate) fn with_refresh(mut self, task: JoinHandle<()>) -> Self {
        self.refresh = Some(task);
        self
    }

    /// Cache key this view reads.
    pub fn key(&self) -> &QueryKey {
        self.observer.key()
    }

    /// Current cache state.
    pub fn snapshot(&self) -> QuerySnapshot<T> {
        self.observer.snapshot()
    }

    /// Last good value.
    pub fn data(&self) -> Option<Arc<T>> {
        self.observer.data()
    }

    /// Error from the most recent load, if it failed.
    pub fn error(&self) -> Option<ApiError> {
        self.snapshot().error
    }

    /// Load status.
    pub fn status(&self) -> QueryStatus {
        self.snapshot().status
    }

    /// `true` while the first load is running.
    pub fn is_loading(&self) -> bool {
        self.snapshot().is_loading()
    }

    /// State of the live subscription, or `None` for views without one.
    pub fn subscription_state(&self) -> Option<SubscriptionState> {
        self.subscription.as_ref().map(Subscription::state)
    }

    /// The live subscription, if any.
    pub fn subscription(&self) -> Option<&Subscription> {
        self.subscription.as_ref()
    }

    /// Waits for the next change to the cache entry.
    pub async fn changed(&mut self) {
        self.observer.changed().await;
    }

    /// Waits until the first load has finished and returns the snapshot.
    pub async fn ready(&mut self) -> QuerySnapshot<T> {
        loop {
            let snap = self.snapshot();
            if snap.data.is_some() || snap.error.is_some() {
                return snap;
            }
            if !snap.is_fetching && !self.observer.ensure_fresh(std::time::Duration::ZERO) {
                return snap;
            }
            self.observer.changed().await;
        }
    }

    /// Forces a reload.
    pub async fn refetch(&self) -> Result<Arc<T>, ApiError> {
        self.observer.refetch().await
    }
}

impl<T> Drop for QueryView<T> {
    fn drop(&mut self) {
        if let Some(task) = self.refresh.take() {
            task.abort();
        }
    }
}

impl<T> std::fmt::Debug for QueryView<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryView")
            .field("observer", &self.observer)
            .field("subscription", &self.subscription)
            .field("refresh", &self.refresh.is_some())
            .finish()
    }
}

/// One page of a collection.
#[derive(Debug)]
pub struct ListView<R> {
    view: QueryView<PaginatedResponse<R>>,
}

impl<R: Clone + Send + Sync + 'static> ListView<R> {
    pub(crate) fn new(view: QueryView<PaginatedResponse<R>>) -> Self {
        Self { view }
    }

    /// Records on the current page, empty until loaded.
    pub fn items(&self) -> Vec<R> {
        self.view
            .data()
            .map(|page| page.data.clone())
            .unwrap_or_default()
    }

    /// Page metadata, `None` until loaded.
    pub fn page_info(&self) -> Option<PageInfo> {
        self.view.data().map(|page| page.page_info())
    }
}

impl<R> Deref for ListView<R> {
    type Target = QueryView<PaginatedResponse<R>>;

    fn deref(&self) -> &Self::Target {
        &self.view
    }
}

impl<R> DerefMut for ListView<R> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.view
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cache::QueryCache;
    use std::time::Duration;
    use tokio::sync::Notify;

    #[tokio::test]
    async fn test_is_loading_only_during_first_load() {
        let cache = QueryCache::new();
        let gate = Arc::new(Notify::new());
        let release = gate.clone();
        let observer = cache.observe(QueryKey::new(["tasks", "{}"]), move || {
            let gate = gate.clone();
            async move {
                gate.notified().await;
                Ok::<_, ApiError>(3u32)
            }
        });
        let mut view = QueryView::new(observer, None);
        assert_eq!(view.status(), QueryStatus::Idle);
        assert!(!view.is_loading());

        assert!(view.observer.ensure_fresh(Duration::ZERO));
        assert!(view.is_loading());

        release.notify_one();
        let snap = view.ready().await;
        assert_eq!(snap.data.as_deref(), Some(&3));
        assert!(!view.is_loading());
    }
}
