//! Debounced change-event subscriptions.
//!
//! A [`Subscription`] listens on an [`EventFeed`] and, after each burst of
//! deliveries settles for the debounce window, invalidates its target query
//! keys once. Dropping the handle closes it: the pump task is aborted, any
//! pending debounce timer dies with it, and an activity gate makes sure no
//! invalidation starts after the drop.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBuilder};
use futures::StreamExt;
use stakd_core::EventFilter;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::cache::{QueryCache, QueryKey};
use crate::feed::{EventFeed, EventStream};

/// Default trailing debounce window.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

/// Lifecycle of a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Not listening; terminal once the handle is dropped.
    Closed,
    /// Waiting for the feed to accept the listener.
    Opening,
    /// Receiving deliveries.
    Listening,
    /// The listener failed; cached data is untouched while reconnecting.
    Degraded(String),
}

impl SubscriptionState {
    /// Returns `true` while deliveries are being received.
    pub fn is_listening(&self) -> bool {
        matches!(self, Self::Listening)
    }
}

impl fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Opening => write!(f, "opening"),
            Self::Listening => write!(f, "listening"),
            Self::Degraded(reason) => write!(f, "degraded: {reason}"),
        }
    }
}

/// Timing for a subscription.
#[derive(Debug, Clone)]
pub struct SubscriptionConfig {
    /// Trailing debounce window.
    pub debounce: Duration,
    /// Reconnect schedule after a listener failure. Once it is exhausted the
    /// subscription stays degraded until dropped.
    pub reconnect: ExponentialBuilder,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            reconnect: ExponentialBuilder::default()
                .with_min_delay(Duration::from_millis(500))
                .with_max_delay(Duration::from_secs(30))
                .with_max_times(8),
        }
    }
}

impl SubscriptionConfig {
    /// Default reconnect schedule with a custom debounce window.
    pub fn with_debounce(debounce: Duration) -> Self {
        Self {
            debounce,
            ..Self::default()
        }
    }
}

struct Shared {
    filter: EventFilter,
    cache: QueryCache,
    targets: Vec<QueryKey>,
    state: watch::Sender<SubscriptionState>,
    active: Mutex<bool>,
    fired: AtomicU64,
}

impl Shared {
    fn set_state(&self, state: SubscriptionState) {
        tracing::debug!(event_type = %self.filter.event_type, %state, "subscription state");
        self.state.send_replace(state);
    }

    fn fire(&self) {
        let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if !*active {
            return;
        }
        for target in &self.targets {
            // Refetches run in the background.
            drop(self.cache.invalidate(target));
        }
        self.fired.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            event_type = %self.filter.event_type,
            targets = self.targets.len(),
            "debounced invalidation"
        );
    }
}

/// Handle to a running subscription. Closes on drop.
pub struct Subscription {
    shared: Arc<Shared>,
    task: JoinHandle<()>,
}

impl Subscription {
    /// Listens on `feed` and invalidates `targets` in `cache` after each
    /// debounced burst of deliveries.
    ///
    /// Returns once the first listen attempt has finished, so events
    /// published after `open` returns are never missed. A failed first
    /// attempt leaves the subscription degraded and reconnecting.
    pub async fn open(
        feed: Arc<dyn EventFeed>,
        filter: EventFilter,
        cache: QueryCache,
        targets: Vec<QueryKey>,
        config: SubscriptionConfig,
    ) -> Self {
        let (state, _) = watch::channel(SubscriptionState::Opening);
        let shared = Arc::new(Shared {
            filter,
            cache,
            targets,
            state,
            active: Mutex::new(true),
            fired: AtomicU64::new(0),
        });

        let initial = match feed.listen(shared.filter.clone()).await {
            Ok(stream) => {
                shared.set_state(SubscriptionState::Listening);
                Some(stream)
            }
            Err(err) => {
                tracing::warn!(event_type = %shared.filter.event_type, error = %err, "listener failed to open");
                shared.set_state(SubscriptionState::Degraded(err.to_string()));
                None
            }
        };

        let task = tokio::spawn(pump(Arc::clone(&shared), feed, config, initial));
        Self { shared, task }
    }

    /// The filter this subscription listens with.
    pub fn filter(&self) -> &EventFilter {
        &self.shared.filter
    }

    /// Current state.
    pub fn state(&self) -> SubscriptionState {
        self.shared.state.borrow().clone()
    }

    /// Receiver for state changes.
    pub fn state_changes(&self) -> watch::Receiver<SubscriptionState> {
        self.shared.state.subscribe()
    }

    /// Waits until the state satisfies `predicate`.
    pub async fn wait_until<F>(&self, predicate: F) -> SubscriptionState
    where
        F: FnMut(&SubscriptionState) -> bool,
    {
        let mut rx = self.state_changes();
        match rx.wait_for(predicate).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        }
    }

    /// Number of debounced invalidations fired so far.
    pub fn invalidations(&self) -> u64 {
        self.shared.fired.load(Ordering::Relaxed)
    }

    /// Closes the subscription. Same as dropping it.
    pub fn close(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        *self
            .shared
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = false;
        self.task.abort();
        self.shared.set_state(SubscriptionState::Closed);
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("filter", &self.shared.filter)
            .field("state", &self.state())
            .finish()
    }
}

async fn pump(
    shared: Arc<Shared>,
    feed: Arc<dyn EventFeed>,
    config: SubscriptionConfig,
    initial: Option<EventStream>,
) {
    let mut next = initial;
    loop {
        let (stream, catch_up) = match next.take() {
            Some(stream) => (stream, false),
            None => match reconnect(&shared, feed.as_ref(), &config).await {
                Some(stream) => (stream, true),
                None => {
                    tracing::warn!(
                        event_type = %shared.filter.event_type,
                        "reconnect attempts exhausted; staying degraded"
                    );
                    return;
                }
            },
        };
        let reason = listen(&shared, stream, config.debounce, catch_up).await;
        tracing::warn!(event_type = %shared.filter.event_type, %reason, "listener failed");
        shared.set_state(SubscriptionState::Degraded(reason));
    }
}

/// Runs one listener until it fails or ends. Returns the failure reason.
///
/// With `catch_up` the debounce timer starts armed, so events missed while
/// no listener was open still invalidate the targets once.
async fn listen(
    shared: &Shared,
    mut stream: EventStream,
    debounce: Duration,
    catch_up: bool,
) -> String {
    let mut deadline = catch_up.then(|| Instant::now() + debounce);
    loop {
        let armed = deadline;
        let timer = async move {
            match armed {
                Some(at) => tokio::time::sleep_until(at).await,
                None => futures::future::pending().await,
            }
        };
        tokio::select! {
            item = stream.next() => match item {
                Some(Ok(events)) => {
                    tracing::trace!(event_type = %shared.filter.event_type, events = events.len(), "delivery");
                    deadline = Some(Instant::now() + debounce);
                }
                Some(Err(err)) => {
                    if deadline.is_some() {
                        shared.fire();
                    }
                    return err.to_string();
                }
                None => {
                    if deadline.is_some() {
                        shared.fire();
                    }
                    return "feed closed".to_string();
                }
            },
            () = timer => {
                deadline = None;
                shared.fire();
            }
        }
    }
}

async fn reconnect(
    shared: &Shared,
    feed: &dyn EventFeed,
    config: &SubscriptionConfig,
) -> Option<EventStream> {
    let mut attempt = 0u32;
    for delay in config.reconnect.build() {
        attempt += 1;
        tokio::time::sleep(delay).await;
        match feed.listen(shared.filter.clone()).await {
            Ok(stream) => {
                tracing::info!(event_type = %shared.filter.event_type, attempt, "listener reconnected");
                shared.set_state(SubscriptionState::Listening);
                return Some(stream);
            }
            Err(err) => {
                tracing::warn!(event_type = %shared.filter.event_type, attempt, error = %err, "reconnect failed");
                shared.set_state(SubscriptionState::Degraded(err.to_string()));
            }
        }
    }
    None
}
