//! Change-event feeds.
//!
//! A feed turns an [`EventFilter`] into a stream of snapshots: each item is
//! the newest `limit` matching events, newest first. Consumers only care
//! that a snapshot arrived, not what it contains.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use stakd_client::{ApiClient, ApiRequest};
use stakd_core::{ChangeEvent, Error, EventFilter, Result};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

/// Snapshots delivered by a listener. An `Err` item is a listener failure;
/// the stream may continue or end after it.
pub type EventStream = BoxStream<'static, Result<Vec<ChangeEvent>>>;

/// Source of change-event snapshots.
#[async_trait]
pub trait EventFeed: Send + Sync {
    /// Starts listening. The returned stream ends when the feed goes away.
    async fn listen(&self, filter: EventFilter) -> Result<EventStream>;
}

// ============================================================================
// MemoryFeed
// ============================================================================

#[derive(Debug, Clone)]
enum Signal {
    Published(ChangeEvent),
    Failed(String),
}

/// In-process event collection.
///
/// `publish` appends an event and wakes every listener whose filter it
/// matches. Listeners get no initial snapshot.
#[derive(Debug)]
pub struct MemoryFeed {
    events: Arc<Mutex<Vec<ChangeEvent>>>,
    tx: broadcast::Sender<Signal>,
    failing_listens: AtomicUsize,
}

impl Default for MemoryFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFeed {
    /// Creates an empty feed.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            tx,
            failing_listens: AtomicUsize::new(0),
        }
    }

    /// Appends an event and notifies listeners.
    pub fn publish(&self, event: ChangeEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
        // No receivers is fine.
        let _ = self.tx.send(Signal::Published(event));
    }

    /// Delivers an error to every open listener.
    pub fn fail_listeners(&self, message: impl Into<String>) {
        let _ = self.tx.send(Signal::Failed(message.into()));
    }

    /// Makes the next `n` calls to [`listen`](EventFeed::listen) fail.
    pub fn fail_next_listens(&self, n: usize) {
        self.failing_listens.store(n, Ordering::SeqCst);
    }

    /// Open listeners.
    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Newest matching events, as a listener would see them.
    pub fn snapshot(&self, filter: &EventFilter) -> Vec<ChangeEvent> {
        select(&self.events, filter)
    }
}

fn select(events: &Mutex<Vec<ChangeEvent>>, filter: &EventFilter) -> Vec<ChangeEvent> {
    filter.select(events.lock().unwrap_or_else(PoisonError::into_inner).iter())
}

#[async_trait]
impl EventFeed for MemoryFeed {
    async fn listen(&self, filter: EventFilter) -> Result<EventStream> {
        let failing = self
            .failing_listens
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(Error::subscription("listen rejected"));
        }

        let rx = self.tx.subscribe();
        let events = Arc::clone(&self.events);
        let stream = BroadcastStream::new(rx).filter_map(move |signal| {
            let item = match signal {
                Ok(Signal::Published(event)) if filter.matches(&event) => {
                    Some(Ok(select(&events, &filter)))
                }
                Ok(Signal::Published(_)) => None,
                Ok(Signal::Failed(message)) => Some(Err(Error::subscription(message))),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "memory feed listener lagged");
                    Some(Ok(select(&events, &filter)))
                }
            };
            futures::future::ready(item)
        });
        Ok(stream.boxed())
    }
}

// ============================================================================
// PollingFeed
// ============================================================================

/// Polls `GET /events` through the REST transport.
///
/// The first poll happens inside `listen` and only sets the baseline (a
/// failure there fails `listen`). Later polls yield a snapshot whenever the
/// newest events differ from the previous poll, and yield an error item
/// when a poll fails.
#[derive(Debug, Clone)]
pub struct PollingFeed {
    client: ApiClient,
    interval: Duration,
}

impl PollingFeed {
    /// Creates a feed polling every `interval`.
    pub fn new(client: ApiClient, interval: Duration) -> Self {
        Self { client, interval }
    }

    async fn poll(client: &ApiClient, filter: &EventFilter) -> Result<Vec<ChangeEvent>> {
        let events: Vec<ChangeEvent> = client
            .send(ApiRequest::get("/events").query(filter))
            .await?;
        Ok(filter.select(events.iter()))
    }
}

struct PollState {
    client: ApiClient,
    filter: EventFilter,
    interval: Duration,
    last: Vec<ChangeEvent>,
}

#[async_trait]
impl EventFeed for PollingFeed {
    async fn listen(&self, filter: EventFilter) -> Result<EventStream> {
        let baseline = Self::poll(&self.client, &filter).await?;
        tracing::debug!(
            event_type = %filter.event_type,
            baseline = baseline.len(),
            "polling feed listening"
        );
        let state = PollState {
            client: self.client.clone(),
            filter,
            interval: self.interval,
            last: baseline,
        };
        let stream = stream::unfold(state, |mut state| async move {
            loop {
                tokio::time::sleep(state.interval).await;
                match Self::poll(&state.client, &state.filter).await {
                    Ok(events) if events == state.last => continue,
                    Ok(events) => {
                        state.last = events.clone();
                        return Some((Ok(events), state));
                    }
                    Err(err) => return Some((Err(err), state)),
                }
            }
        });
        Ok(stream.boxed())
    }
}
