#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Stakd Sync
//!
//! Client-side synchronization for Stakd collections: a keyed query cache
//! with in-flight de-duplication and stale-while-error semantics, debounced
//! change-event subscriptions that invalidate it, and per-entity views that
//! wire the two together.
//!
//! ```no_run
//! use std::sync::Arc;
//! use stakd_client::{ApiClient, ClientConfig, StaticToken};
//! use stakd_core::ListParams;
//! use stakd_sync::{PollingFeed, SyncClient, SyncConfig};
//!
//! # async fn run() -> stakd_core::Result<()> {
//! let config = ClientConfig::load(None)?;
//! let api = ApiClient::new(&config, Arc::new(StaticToken::new("token")))?;
//! let feed = Arc::new(PollingFeed::new(api.clone(), config.poll_interval()));
//! let sync = SyncClient::new(api, feed, "org-1", SyncConfig::from_client(&config));
//!
//! let mut contacts = sync.contacts().list(ListParams::new().page(1, 10)).await?;
//! contacts.ready().await;
//! for contact in contacts.items() {
//!     println!("{}", contact.full_name());
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod entity;
pub mod feed;
pub mod subscription;
pub mod views;

pub use cache::{CacheStats, Invalidation, QueryCache, QueryKey, QueryObserver, QuerySnapshot, QueryStatus};
pub use entity::{EntitySync, SyncClient, SyncConfig};
pub use feed::{EventFeed, EventStream, MemoryFeed, PollingFeed};
pub use subscription::{Subscription, SubscriptionConfig, SubscriptionState};
pub use views::{DetailView, ListView, QueryView};
