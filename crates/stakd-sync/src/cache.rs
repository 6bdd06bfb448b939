//! Keyed query cache.
//!
//! Entries are created on first fetch and live until the process ends; the
//! canonical record always belongs to the remote store. Each key tracks:
//!
//! - the last good value and the last error (stale-while-error),
//! - at most one shared in-flight load (concurrent fetches join it),
//! - a load sequence counter (a result only applies if it is newer than the
//!   last applied one),
//! - the mounted observers, whose loaders are reused for invalidation
//!   refetches.
//!
//! State sits behind a `std::sync::Mutex` that is never held across an
//! `.await`. Loads run as spawned tasks so their results land in the cache
//! even if nobody awaits them.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared, join_all};
use serde::Serialize;
use stakd_core::{ApiError, EntityKind, Result};
use tokio::sync::watch;
use tokio::time::{Duration, Instant};

type AnyValue = Arc<dyn Any + Send + Sync>;
type LoadResult = std::result::Result<AnyValue, ApiError>;
type SharedLoad = Shared<BoxFuture<'static, LoadResult>>;
type Refetcher = Arc<dyn Fn() -> BoxFuture<'static, LoadResult> + Send + Sync>;

// ============================================================================
// QueryKey
// ============================================================================

/// Ordered list of string segments identifying one cached query.
///
/// The first segment is the entity collection; later segments are an id, a
/// sub-resource name or serialized query parameters. Prefix matching is
/// segment-wise, so `[contacts]` matches `[contacts, c1]` but not
/// `[contacts-archive]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    /// Builds a key from segments.
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// `[collection]`
    pub fn entity(kind: EntityKind) -> Self {
        Self(vec![kind.collection().to_string()])
    }

    /// Appends a segment.
    pub fn push(mut self, segment: impl Into<String>) -> Self {
        self.0.push(segment.into());
        self
    }

    /// Appends the JSON serialization of `params` as one segment.
    pub fn with_params<P: Serialize + ?Sized>(self, params: &P) -> Result<Self> {
        let encoded = serde_json::to_string(params)?;
        Ok(self.push(encoded))
    }

    /// Key segments.
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Returns `true` if `prefix` is a segment-wise prefix of this key.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

// ============================================================================
// Snapshots
// ============================================================================

/// Load status of a cached query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// Never loaded.
    Idle,
    /// First load in progress.
    Loading,
    /// Last load succeeded.
    Success,
    /// Last load failed; any previous value is still available.
    Error,
}

/// Point-in-time view of one cache entry.
#[derive(Debug)]
pub struct QuerySnapshot<T> {
    /// Last good value.
    pub data: Option<Arc<T>>,
    /// Error from the most recent applied load, if it failed.
    pub error: Option<ApiError>,
    /// Load status.
    pub status: QueryStatus,
    /// A load is in flight.
    pub is_fetching: bool,
    /// Invalidated since the last successful load.
    pub is_stale: bool,
    /// When the last good value was stored.
    pub updated_at: Option<Instant>,
}

impl<T> Clone for QuerySnapshot<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            error: self.error.clone(),
            status: self.status,
            is_fetching: self.is_fetching,
            is_stale: self.is_stale,
            updated_at: self.updated_at,
        }
    }
}

impl<T> QuerySnapshot<T> {
    fn idle() -> Self {
        Self {
            data: None,
            error: None,
            status: QueryStatus::Idle,
            is_fetching: false,
            is_stale: false,
            updated_at: None,
        }
    }

    /// Returns `true` while the first load is running.
    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }
}

/// Cache counters, mostly for tests and debug logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Loads started.
    pub loads: u64,
    /// Results applied to an entry.
    pub writes: u64,
    /// Results dropped because a newer load had already been applied.
    pub discarded: u64,
    /// Calls to [`QueryCache::invalidate`].
    pub invalidations: u64,
}

#[derive(Default)]
struct Counters {
    loads: AtomicU64,
    writes: AtomicU64,
    discarded: AtomicU64,
    invalidations: AtomicU64,
}

// ============================================================================
// Entries
// ============================================================================

struct Entry {
    value: Option<AnyValue>,
    error: Option<ApiError>,
    updated_at: Option<Instant>,
    stale: bool,
    next_seq: u64,
    applied_seq: u64,
    in_flight: Option<(u64, SharedLoad)>,
    observers: HashMap<u64, Refetcher>,
    version: watch::Sender<u64>,
}

impl Entry {
    fn new() -> Self {
        let (version, _) = watch::channel(0);
        Self {
            value: None,
            error: None,
            updated_at: None,
            stale: false,
            next_seq: 0,
            applied_seq: 0,
            in_flight: None,
            observers: HashMap::new(),
            version,
        }
    }

    fn touch(&self) {
        self.version.send_modify(|v| *v = v.wrapping_add(1));
    }

    fn snapshot<T: Send + Sync + 'static>(&self) -> QuerySnapshot<T> {
        let data = self
            .value
            .clone()
            .and_then(|value| value.downcast::<T>().ok());
        let is_fetching = self.in_flight.is_some();
        let status = if self.error.is_some() {
            QueryStatus::Error
        } else if self.value.is_some() {
            QueryStatus::Success
        } else if is_fetching {
            QueryStatus::Loading
        } else {
            QueryStatus::Idle
        };
        QuerySnapshot {
            data,
            error: self.error.clone(),
            status,
            is_fetching,
            is_stale: self.stale,
            updated_at: self.updated_at,
        }
    }

    fn is_fresh(&self, stale_after: Duration) -> bool {
        !self.stale
            && self.error.is_none()
            && self
                .updated_at
                .is_some_and(|at| at.elapsed() < stale_after)
    }
}

struct CacheInner {
    entries: Mutex<HashMap<QueryKey, Entry>>,
    counters: Counters,
    next_observer: AtomicU64,
}

impl CacheInner {
    fn lock(&self) -> MutexGuard<'_, HashMap<QueryKey, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn complete(&self, key: &QueryKey, seq: u64, result: &LoadResult) {
        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(key) else {
            return;
        };
        if entry.in_flight.as_ref().is_some_and(|(s, _)| *s == seq) {
            entry.in_flight = None;
        }
        if seq <= entry.applied_seq {
            self.counters.discarded.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(%key, seq, applied = entry.applied_seq, "discarding superseded result");
            entry.touch();
            return;
        }
        entry.applied_seq = seq;
        match result {
            Ok(value) => {
                entry.value = Some(value.clone());
                entry.error = None;
                entry.stale = false;
                entry.updated_at = Some(Instant::now());
            }
            Err(err) => {
                tracing::debug!(%key, seq, code = %err.code, "load failed; keeping last good value");
                entry.error = Some(err.clone());
            }
        }
        self.counters.writes.fetch_add(1, Ordering::Relaxed);
        entry.touch();
    }
}

/// Completes a load that never produced a result, so a panicking or
/// aborted loader does not leave its key stuck in flight.
struct LoadGuard {
    inner: Arc<CacheInner>,
    key: QueryKey,
    seq: u64,
    finished: bool,
}

impl LoadGuard {
    fn finish(&mut self, result: &LoadResult) {
        self.finished = true;
        self.inner.complete(&self.key, self.seq, result);
    }
}

impl Drop for LoadGuard {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        tracing::warn!(key = %self.key, seq = self.seq, "load ended without a result");
        let err = ApiError::new(ApiError::UNKNOWN_ERROR, "load ended without a result");
        self.inner.complete(&self.key, self.seq, &Err(err));
    }
}

fn erase<T, Fut>(fut: Fut) -> BoxFuture<'static, LoadResult>
where
    T: Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<T, ApiError>> + Send + 'static,
{
    async move { fut.await.map(|value| Arc::new(value) as AnyValue) }.boxed()
}

async fn typed<T: Send + Sync + 'static>(
    key: QueryKey,
    load: SharedLoad,
) -> std::result::Result<Arc<T>, ApiError> {
    let value = load.await?;
    value.downcast::<T>().map_err(|_| {
        ApiError::decode(format!("cached value for {key} has a different type"))
    })
}

// ============================================================================
// QueryCache
// ============================================================================

/// Shared query cache. Cheap to clone.
///
/// Methods that start loads spawn Tokio tasks and must be called inside a
/// runtime.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<CacheInner>,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCache")
            .field("entries", &self.inner.lock().len())
            .field("stats", &self.stats())
            .finish()
    }
}

impl QueryCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CacheInner {
                entries: Mutex::new(HashMap::new()),
                counters: Counters::default(),
                next_observer: AtomicU64::new(1),
            }),
        }
    }

    /// Current entry state, or `None` if the key was never used.
    pub fn get<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<QuerySnapshot<T>> {
        self.inner.lock().get(key).map(Entry::snapshot)
    }

    /// Loads `key` unless a load is already in flight, in which case the
    /// returned future joins it and `loader` is not called.
    ///
    /// The load starts immediately; the future only waits for it.
    pub fn fetch<T, F, Fut>(
        &self,
        key: &QueryKey,
        loader: F,
    ) -> impl Future<Output = std::result::Result<Arc<T>, ApiError>> + Send + 'static
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, ApiError>> + Send + 'static,
    {
        let load = self.start_load(key, false, move || erase(loader()));
        typed::<T>(key.clone(), load)
    }

    /// Always starts a new load for `key`, superseding any in-flight one.
    pub fn refetch<T, F, Fut>(
        &self,
        key: &QueryKey,
        loader: F,
    ) -> impl Future<Output = std::result::Result<Arc<T>, ApiError>> + Send + 'static
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, ApiError>> + Send + 'static,
    {
        let load = self.start_load(key, true, move || erase(loader()));
        typed::<T>(key.clone(), load)
    }

    /// Registers a mounted consumer of `key`.
    ///
    /// `loader` is kept for as long as the observer lives and is used by
    /// [`QueryObserver::refetch`] and by [`invalidate`](Self::invalidate).
    /// Registering does not load anything; see [`QueryObserver::ensure_fresh`].
    pub fn observe<T, F, Fut>(&self, key: QueryKey, loader: F) -> QueryObserver<T>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<T, ApiError>> + Send + 'static,
    {
        let refetcher: Refetcher = Arc::new(move || erase(loader()));
        let id = self.inner.next_observer.fetch_add(1, Ordering::Relaxed);
        let version = {
            let mut entries = self.inner.lock();
            let entry = entries.entry(key.clone()).or_insert_with(Entry::new);
            entry.observers.insert(id, refetcher);
            entry.version.subscribe()
        };
        tracing::trace!(%key, observer = id, "observer mounted");
        QueryObserver {
            cache: self.clone(),
            key,
            id,
            version,
            _marker: PhantomData,
        }
    }

    /// Marks every entry under `prefix` stale and refetches each one that has
    /// a mounted observer.
    pub fn invalidate(&self, prefix: &QueryKey) -> Invalidation {
        let targets: Vec<(QueryKey, Refetcher)> = {
            let mut entries = self.inner.lock();
            entries
                .iter_mut()
                .filter(|(key, _)| key.starts_with(prefix))
                .filter_map(|(key, entry)| {
                    entry.stale = true;
                    entry.touch();
                    entry
                        .observers
                        .values()
                        .next()
                        .map(|refetch| (key.clone(), refetch.clone()))
                })
                .collect()
        };
        self.inner.counters.invalidations.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(%prefix, refetches = targets.len(), "invalidated");

        let loads = targets
            .into_iter()
            .map(|(key, refetch)| self.start_load(&key, true, move || refetch()))
            .collect();
        Invalidation { loads }
    }

    /// Returns `true` if `key` holds a good value younger than `stale_after`
    /// that has not been invalidated.
    pub fn is_fresh(&self, key: &QueryKey, stale_after: Duration) -> bool {
        self.inner
            .lock()
            .get(key)
            .is_some_and(|entry| entry.is_fresh(stale_after))
    }

    /// Number of mounted observers for `key`.
    pub fn observer_count(&self, key: &QueryKey) -> usize {
        self.inner
            .lock()
            .get(key)
            .map_or(0, |entry| entry.observers.len())
    }

    /// Counter snapshot.
    pub fn stats(&self) -> CacheStats {
        let c = &self.inner.counters;
        CacheStats {
            loads: c.loads.load(Ordering::Relaxed),
            writes: c.writes.load(Ordering::Relaxed),
            discarded: c.discarded.load(Ordering::Relaxed),
            invalidations: c.invalidations.load(Ordering::Relaxed),
        }
    }

    fn start_load<M>(&self, key: &QueryKey, force: bool, make: M) -> SharedLoad
    where
        M: FnOnce() -> BoxFuture<'static, LoadResult>,
    {
        if !force && let Some(load) = self.in_flight(key) {
            return load;
        }

        // Loader closures run outside the lock; futures are lazy, so a
        // losing race just drops an unpolled one.
        let fut = make();
        let mut entries = self.inner.lock();
        let entry = entries.entry(key.clone()).or_insert_with(Entry::new);
        if !force && let Some((_, load)) = &entry.in_flight {
            return load.clone();
        }

        entry.next_seq += 1;
        let seq = entry.next_seq;
        let mut guard = LoadGuard {
            inner: Arc::clone(&self.inner),
            key: key.clone(),
            seq,
            finished: false,
        };
        let handle = tokio::spawn(async move {
            let result = fut.await;
            guard.finish(&result);
            result
        });
        let load = async move {
            handle.await.unwrap_or_else(|e| {
                Err(ApiError::new(
                    ApiError::UNKNOWN_ERROR,
                    format!("load task failed: {e}"),
                ))
            })
        }
        .boxed()
        .shared();

        entry.in_flight = Some((seq, load.clone()));
        entry.touch();
        self.inner.counters.loads.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(%key, seq, force, "load started");
        load
    }

    fn in_flight(&self, key: &QueryKey) -> Option<SharedLoad> {
        self.inner
            .lock()
            .get(key)
            .and_then(|entry| entry.in_flight.as_ref().map(|(_, load)| load.clone()))
    }

    fn ensure_fresh(&self, key: &QueryKey, stale_after: Duration) -> Option<SharedLoad> {
        let refetch = {
            let entries = self.inner.lock();
            let entry = entries.get(key)?;
            if entry.in_flight.is_some() || entry.is_fresh(stale_after) {
                return None;
            }
            entry.observers.values().next()?.clone()
        };
        Some(self.start_load(key, false, move || refetch()))
    }

    fn unregister(&self, key: &QueryKey, id: u64) {
        let mut entries = self.inner.lock();
        if let Some(entry) = entries.get_mut(key) {
            entry.observers.remove(&id);
        }
    }

    fn observer_load(&self, key: &QueryKey, id: u64) -> Option<SharedLoad> {
        let refetch = self.inner.lock().get(key)?.observers.get(&id)?.clone();
        Some(self.start_load(key, true, move || refetch()))
    }
}

// ============================================================================
// Invalidation
// ============================================================================

/// Refetches started by one or more [`QueryCache::invalidate`] calls.
#[must_use = "await `settled()` to wait for the refetches, or drop to let them run in the background"]
pub struct Invalidation {
    loads: Vec<SharedLoad>,
}

impl Invalidation {
    /// No refetches.
    pub fn none() -> Self {
        Self { loads: Vec::new() }
    }

    /// Number of refetches started.
    pub fn len(&self) -> usize {
        self.loads.len()
    }

    /// Returns `true` if no refetch was started.
    pub fn is_empty(&self) -> bool {
        self.loads.is_empty()
    }

    /// Combines two invalidations.
    pub fn merge(mut self, other: Invalidation) -> Self {
        self.loads.extend(other.loads);
        self
    }

    /// Waits for every refetch to finish, successful or not.
    pub async fn settled(self) {
        join_all(self.loads).await;
    }
}

impl fmt::Debug for Invalidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invalidation")
            .field("refetches", &self.loads.len())
            .finish()
    }
}

// ============================================================================
// QueryObserver
// ============================================================================

/// A mounted consumer of one cache key. Unregisters on drop.
pub struct QueryObserver<T> {
    cache: QueryCache,
    key: QueryKey,
    id: u64,
    version: watch::Receiver<u64>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> QueryObserver<T> {
    /// The observed key.
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Current entry state.
    pub fn snapshot(&self) -> QuerySnapshot<T> {
        self.cache
            .get::<T>(&self.key)
            .unwrap_or_else(QuerySnapshot::idle)
    }

    /// Last good value.
    pub fn data(&self) -> Option<Arc<T>> {
        self.snapshot().data
    }

    /// Waits until the entry changes (load started, result applied,
    /// invalidated).
    pub async fn changed(&mut self) {
        if self.version.changed().await.is_err() {
            futures::future::pending::<()>().await;
        }
    }

    /// Loads unless a fresh value or an in-flight load exists.
    ///
    /// Returns `true` if a load was started or joined.
    pub fn ensure_fresh(&self, stale_after: Duration) -> bool {
        self.cache.ensure_fresh(&self.key, stale_after).is_some()
    }

    /// Like [`ensure_fresh`](Self::ensure_fresh) but waits for the result.
    pub async fn load(&self, stale_after: Duration) -> QuerySnapshot<T> {
        if let Some(load) = self.cache.ensure_fresh(&self.key, stale_after) {
            let _ = load.await;
        } else if let Some(load) = self.cache.in_flight(&self.key) {
            let _ = load.await;
        }
        self.snapshot()
    }

    /// Forces a new load with this observer's loader.
    pub async fn refetch(&self) -> std::result::Result<Arc<T>, ApiError> {
        match self.cache.observer_load(&self.key, self.id) {
            Some(load) => typed::<T>(self.key.clone(), load).await,
            None => Err(ApiError::new(
                ApiError::UNKNOWN_ERROR,
                format!("observer for {} is no longer registered", self.key),
            )),
        }
    }
}

impl<T> Drop for QueryObserver<T> {
    fn drop(&mut self) {
        self.cache.unregister(&self.key, self.id);
        tracing::trace!(key = %self.key, observer = self.id, "observer unmounted");
    }
}

impl<T> fmt::Debug for QueryObserver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryObserver")
            .field("key", &self.key)
            .field("id", &self.id)
            .finish()
    }
}
