//! Change events driving refetches.

use std::sync::Arc;
use std::time::Duration;

use stakd_client::{ApiClient, EntityApi, NoSession};
use stakd_core::models::{Contact, CreateContact};
use stakd_core::{ChangeEvent, ListParams};
use stakd_sync::{PollingFeed, SubscriptionState};

use crate::common::{ORG, TestHarness, contacts};

#[tokio::test]
async fn test_event_burst_triggers_one_refetch() {
    let harness = TestHarness::start().await;
    harness.backend.seed("contacts", contacts(3));
    let (sync, feed) = harness.sync_with_memory_feed();

    let mut view = sync.contacts().list(ListParams::new()).await.unwrap();
    view.ready().await;
    assert_eq!(harness.hits("GET", "/contacts").await, 1);

    for i in 0..4 {
        feed.publish(ChangeEvent::now(ORG, "contact:update").with_doc(format!("c{i}")));
    }
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(view.subscription().unwrap().invalidations(), 1);
    assert_eq!(harness.hits("GET", "/contacts").await, 2);
}

#[tokio::test]
async fn test_other_scopes_do_not_refetch() {
    let harness = TestHarness::start().await;
    let (sync, feed) = harness.sync_with_memory_feed();

    let mut view = sync.contacts().list(ListParams::new()).await.unwrap();
    view.ready().await;

    feed.publish(ChangeEvent::now("org-2", "contact:update"));
    feed.publish(ChangeEvent::now(ORG, "task:update"));
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(harness.hits("GET", "/contacts").await, 1);
}

#[tokio::test]
async fn test_no_cache_writes_after_unmount() {
    let harness = TestHarness::start().await;
    let (sync, feed) = harness.sync_with_memory_feed();

    let mut view = sync.contacts().list(ListParams::new()).await.unwrap();
    view.ready().await;
    feed.publish(ChangeEvent::now(ORG, "contact:update"));
    drop(view);

    let writes = sync.cache().stats().writes;
    feed.publish(ChangeEvent::now(ORG, "contact:update"));
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(sync.cache().stats().writes, writes);
    assert_eq!(harness.hits("GET", "/contacts").await, 1);
    assert_eq!(feed.listener_count(), 0);
}

#[tokio::test]
async fn test_polling_feed_picks_up_remote_create() {
    let harness = TestHarness::start().await;
    harness.backend.seed("contacts", contacts(3));
    let feed = Arc::new(PollingFeed::new(harness.api.clone(), Duration::from_millis(50)));
    let sync = harness.sync(feed);

    let mut view = sync.contacts().list(ListParams::new()).await.unwrap();
    view.ready().await;
    assert_eq!(view.subscription_state(), Some(SubscriptionState::Listening));

    // Another client writes straight to the API.
    EntityApi::<Contact>::new(harness.api.clone())
        .create(&CreateContact::new(ORG, "Ada", "Lovelace", "ada@example.com"))
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(3), async {
        while view.items().len() < 4 {
            view.changed().await;
        }
    })
    .await
    .expect("remote create should reach the view");
    assert!(view.items().iter().any(|c| c.first_name == "Ada"));
}

#[tokio::test]
async fn test_unreachable_feed_degrades_without_touching_data() {
    let harness = TestHarness::start().await;
    harness.backend.seed("contacts", contacts(2));
    let dead = ApiClient::with_http(
        reqwest::Client::new(),
        "http://127.0.0.1:1",
        Arc::new(NoSession),
    );
    let sync = harness.sync(Arc::new(PollingFeed::new(dead, Duration::from_millis(50))));

    let mut view = sync.contacts().list(ListParams::new()).await.unwrap();
    assert!(matches!(
        view.subscription_state(),
        Some(SubscriptionState::Degraded(_))
    ));
    view.ready().await;
    assert_eq!(view.items().len(), 2);
}
