//! Mutations invalidate and refetch before returning.

use stakd_core::models::{
    CreateContact, CreateTask, TaskStatus, UpdateContact, UpdateTransaction,
};
use stakd_core::{Error, ListParams};
use stakd_sync::QueryStatus;

use crate::common::{ORG, TestHarness, contacts};

#[tokio::test]
async fn test_created_contact_visible_when_create_returns() {
    let harness = TestHarness::start().await;
    harness.backend.seed("contacts", contacts(3));
    let (sync, _feed) = harness.sync_with_memory_feed();
    let entity = sync.contacts();

    let mut view = entity.list(ListParams::new().page(1, 50)).await.unwrap();
    view.ready().await;
    assert_eq!(view.items().len(), 3);

    let created = entity
        .create(&CreateContact::new(ORG, "Ada", "Lovelace", "ada@example.com"))
        .await
        .unwrap();

    let items = view.items();
    assert_eq!(items.len(), 4);
    assert!(items.iter().any(|c| c.id == created.id));
    assert_eq!(harness.backend.count("contacts"), 4);
}

#[tokio::test]
async fn test_invalid_create_never_reaches_network() {
    let harness = TestHarness::start().await;
    let (sync, _feed) = harness.sync_with_memory_feed();

    let err = sync
        .contacts()
        .create(&CreateContact::new(ORG, "Ada", "Lovelace", "not-an-email"))
        .await
        .unwrap_err();
    let Error::Validation { field, .. } = err else {
        unreachable!()
    };
    assert_eq!(field.as_deref(), Some("email"));

    let err = sync
        .transactions()
        .update("t1", &UpdateTransaction::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));

    assert_eq!(harness.hits("POST", "/contacts").await, 0);
    assert_eq!(harness.hits("PUT", "/transactions/t1").await, 0);
}

#[tokio::test]
async fn test_update_reflected_in_detail_view() {
    let harness = TestHarness::start().await;
    harness.backend.seed("contacts", contacts(2));
    let (sync, _feed) = harness.sync_with_memory_feed();
    let entity = sync.contacts();

    let mut detail = entity.get("c1").await.unwrap();
    detail.ready().await;
    assert_eq!(detail.data().unwrap().first_name, "Person1");

    let update = UpdateContact {
        first_name: Some("Renamed".to_string()),
        ..UpdateContact::default()
    };
    entity.update("c1", &update).await.unwrap();
    assert_eq!(detail.data().unwrap().first_name, "Renamed");
}

#[tokio::test]
async fn test_delete_keeps_last_good_detail() {
    let harness = TestHarness::start().await;
    harness.backend.seed("contacts", contacts(2));
    let (sync, _feed) = harness.sync_with_memory_feed();
    let entity = sync.contacts();

    let mut list = entity.list(ListParams::new()).await.unwrap();
    let mut detail = entity.get("c2").await.unwrap();
    list.ready().await;
    detail.ready().await;

    entity.delete("c2").await.unwrap();

    assert_eq!(list.items().len(), 1);
    let snap = detail.snapshot();
    assert_eq!(snap.status, QueryStatus::Error);
    assert_eq!(snap.error.unwrap().code, "NOT_FOUND");
    assert_eq!(snap.data.unwrap().id, "c2");
}

#[tokio::test]
async fn test_complete_task_refreshes_list() {
    let harness = TestHarness::start().await;
    let (sync, _feed) = harness.sync_with_memory_feed();
    let tasks = sync.tasks();

    let created = tasks
        .create(&CreateTask {
            org_id: ORG.to_string(),
            title: "Call back".to_string(),
            due_date: "2026-11-01".to_string(),
            created_by: "u1".to_string(),
            ..CreateTask::default()
        })
        .await
        .unwrap();

    let mut view = tasks.list(ListParams::new()).await.unwrap();
    view.ready().await;
    assert_eq!(view.items()[0].status, TaskStatus::Pending);

    let done = tasks.complete(&created.id).await.unwrap();
    assert_eq!(done.status, TaskStatus::Completed);
    assert_eq!(view.items()[0].status, TaskStatus::Completed);
}
