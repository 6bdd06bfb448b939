//! Mounting list, detail and sub-resource views.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use stakd_core::ListParams;
use stakd_sync::{MemoryFeed, QueryStatus, SubscriptionState, SyncClient, SyncConfig};

use crate::common::{ORG, TestHarness, contact_json, contacts};

#[tokio::test]
async fn test_second_page_of_fifteen() {
    let harness = TestHarness::start().await;
    harness.backend.seed("contacts", contacts(15));
    let (sync, _feed) = harness.sync_with_memory_feed();

    let mut view = sync
        .contacts()
        .list(ListParams::new().page(2, 10))
        .await
        .unwrap();
    let snap = view.ready().await;
    assert_eq!(snap.status, QueryStatus::Success);

    let items = view.items();
    assert_eq!(items.len(), 5);
    assert_eq!(items[0].id, "c11");
    let info = view.page_info().unwrap();
    assert_eq!(info.total, 15);
    assert_eq!(info.total_pages, 2);
    assert!(!info.has_more);
}

#[tokio::test]
async fn test_search_narrows_list() {
    let harness = TestHarness::start().await;
    harness.backend.seed("contacts", contacts(15));
    harness
        .backend
        .seed("contacts", [contact_json("g1", "Grace", "Hopper")]);
    let (sync, _feed) = harness.sync_with_memory_feed();

    let mut view = sync
        .contacts()
        .list(ListParams::new().search("hopper"))
        .await
        .unwrap();
    view.ready().await;
    let items = view.items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].full_name(), "Grace Hopper");
}

#[tokio::test]
async fn test_list_view_is_listening() {
    let harness = TestHarness::start().await;
    let (sync, feed) = harness.sync_with_memory_feed();

    let view = sync.tasks().list(ListParams::new()).await.unwrap();
    assert_eq!(view.subscription_state(), Some(SubscriptionState::Listening));
    assert_eq!(feed.listener_count(), 1);

    drop(view);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(feed.listener_count(), 0);
}

#[tokio::test]
async fn test_missing_record_reports_not_found() {
    let harness = TestHarness::start().await;
    let (sync, _feed) = harness.sync_with_memory_feed();

    let mut view = sync.contacts().get("nope").await.unwrap();
    let snap = view.ready().await;
    assert_eq!(snap.status, QueryStatus::Error);
    let err = snap.error.unwrap();
    assert_eq!(err.code, "NOT_FOUND");
    assert_eq!(err.status, Some(404));
    assert!(snap.data.is_none());
}

#[tokio::test]
async fn test_fresh_entry_not_refetched_on_remount() {
    let harness = TestHarness::start().await;
    harness.backend.seed("contacts", contacts(3));
    let config = SyncConfig {
        stale_after: Duration::from_secs(60),
        ..SyncConfig::default()
    };
    let sync = SyncClient::new(
        harness.api.clone(),
        Arc::new(MemoryFeed::new()),
        ORG,
        config,
    );

    let mut first = sync.contacts().get("c1").await.unwrap();
    first.ready().await;
    drop(first);

    let second = sync.contacts().get("c1").await.unwrap();
    assert_eq!(second.data().unwrap().id, "c1");
    assert_eq!(harness.hits("GET", "/contacts/c1").await, 1);
}

#[tokio::test]
async fn test_unread_count_refreshes_while_mounted() {
    let harness = TestHarness::start().await;
    harness.backend.seed(
        "notifications",
        [json!({
            "id": "n1",
            "orgId": ORG,
            "type": "system",
            "title": "Welcome",
            "message": "Hello",
            "read": false,
            "createdAt": 1
        })],
    );
    let config = SyncConfig {
        unread_refresh: Duration::from_millis(100),
        ..SyncConfig::default()
    };
    let sync = SyncClient::new(
        harness.api.clone(),
        Arc::new(MemoryFeed::new()),
        ORG,
        config,
    );

    let mut view = sync.notifications().unread_count().await;
    assert_eq!(view.ready().await.data.unwrap().count, 1);

    tokio::time::sleep(Duration::from_millis(350)).await;
    assert!(harness.hits("GET", "/notifications/unread-count").await >= 3);

    drop(view);
    tokio::time::sleep(Duration::from_millis(50)).await;
    let settled = harness.hits("GET", "/notifications/unread-count").await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(harness.hits("GET", "/notifications/unread-count").await, settled);
}

fn unread_notification(id: &str) -> serde_json::Value {
    json!({
        "id": id,
        "orgId": ORG,
        "type": "system",
        "title": "Welcome",
        "message": "Hello",
        "read": false,
        "createdAt": 1
    })
}

#[tokio::test]
async fn test_notification_activity_leaves_preferences_alone() {
    let harness = TestHarness::start().await;
    harness
        .backend
        .seed("notifications", [unread_notification("n1")]);
    let (sync, feed) = harness.sync_with_memory_feed();
    let notifications = sync.notifications();

    let mut prefs = notifications.preferences().await;
    let mut list = notifications.list(ListParams::new()).await.unwrap();
    let mut count = notifications.unread_count().await;
    prefs.ready().await;
    list.ready().await;
    assert_eq!(count.ready().await.data.unwrap().count, 1);

    feed.publish(stakd_core::ChangeEvent::now(ORG, "notification").with_doc("n1"));
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(harness.hits("GET", "/notifications").await, 2);

    notifications.mark_read("n1").await.unwrap();
    assert_eq!(count.data().unwrap().count, 0);
    assert_eq!(harness.hits("GET", "/notifications/preferences").await, 1);
}
