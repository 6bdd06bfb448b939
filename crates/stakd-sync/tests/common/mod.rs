//! Common test utilities for stakd-sync integration tests.
//!
//! [`FakeBackend`] is a stateful REST server on top of wiremock. It stores
//! records as JSON per collection, paginates and filters lists the way the
//! real API does, and appends a change event for every mutation so a
//! polling feed can pick it up.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde_json::{Value, json};
use stakd_client::{ApiClient, NoSession};
use stakd_core::{ChangeEvent, EntityKind, ListParams, PaginatedResponse};
use stakd_sync::{EventFeed, MemoryFeed, SubscriptionConfig, SyncClient, SyncConfig};
use wiremock::matchers::any;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const ORG: &str = "org-1";

#[derive(Default)]
struct Store {
    collections: HashMap<String, Vec<Value>>,
    events: Vec<ChangeEvent>,
}

/// Stateful stand-in for the Stakd REST API.
#[derive(Clone, Default)]
pub struct FakeBackend {
    store: Arc<Mutex<Store>>,
    next_id: Arc<AtomicU64>,
    clock: Arc<AtomicU64>,
}

impl FakeBackend {
    pub fn seed(&self, collection: &str, records: impl IntoIterator<Item = Value>) {
        let mut store = self.lock();
        store
            .collections
            .entry(collection.to_string())
            .or_default()
            .extend(records);
    }

    pub fn count(&self, collection: &str) -> usize {
        self.lock().collections.get(collection).map_or(0, Vec::len)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn tick(&self) -> i64 {
        self.clock.fetch_add(1, Ordering::SeqCst) as i64 + 1
    }

    fn record_event(&self, store: &mut Store, collection: &str, id: &str) {
        let Some(kind) = EntityKind::from_collection(collection) else {
            return;
        };
        let event = ChangeEvent::now(ORG, kind.event_type())
            .with_doc(id)
            .at(self.tick());
        store.events.push(event);
    }

    fn list(&self, collection: &str, request: &Request) -> ResponseTemplate {
        let params = ListParams::from_query_pairs(request.url.query_pairs());
        let store = self.lock();
        let records: Vec<Value> = store
            .collections
            .get(collection)
            .map(|all| {
                all.iter()
                    .filter(|record| matches_params(record, &params))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        let page = PaginatedResponse::paginate(
            records,
            params.page.unwrap_or(1),
            params.limit.unwrap_or(stakd_core::pagination::DEFAULT_PAGE_SIZE),
        );
        ResponseTemplate::new(200).set_body_json(page)
    }

    fn get(&self, collection: &str, id: &str) -> ResponseTemplate {
        let store = self.lock();
        match find(&store, collection, id) {
            Some(record) => ResponseTemplate::new(200).set_body_json(record.clone()),
            None => not_found(collection, id),
        }
    }

    fn create(&self, collection: &str, request: &Request) -> ResponseTemplate {
        let Ok(Value::Object(mut record)) = serde_json::from_slice::<Value>(&request.body) else {
            return bad_request("body must be a JSON object");
        };
        let id = format!("{}-{}", collection, self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let now = self.tick();
        record.insert("id".into(), json!(id));
        record.insert("createdAt".into(), json!(now));
        record.insert("updatedAt".into(), json!(now));
        let record = Value::Object(record);

        let mut store = self.lock();
        store
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(record.clone());
        self.record_event(&mut store, collection, &id);
        ResponseTemplate::new(201).set_body_json(json!({"success": true, "data": record}))
    }

    fn update(&self, collection: &str, id: &str, patch: Value) -> ResponseTemplate {
        let now = self.tick();
        let mut store = self.lock();
        let Some(record) = find_mut(&mut store, collection, id) else {
            return not_found(collection, id);
        };
        if let (Value::Object(record), Value::Object(patch)) = (&mut *record, patch) {
            record.extend(patch);
            record.insert("updatedAt".into(), json!(now));
        }
        let updated = record.clone();
        self.record_event(&mut store, collection, id);
        ResponseTemplate::new(200).set_body_json(updated)
    }

    fn delete(&self, collection: &str, id: &str) -> ResponseTemplate {
        let mut store = self.lock();
        let Some(records) = store.collections.get_mut(collection) else {
            return not_found(collection, id);
        };
        let before = records.len();
        records.retain(|r| r["id"] != id);
        if records.len() == before {
            return not_found(collection, id);
        }
        self.record_event(&mut store, collection, id);
        ResponseTemplate::new(204)
    }

    fn unread_count(&self) -> ResponseTemplate {
        let store = self.lock();
        let count = store
            .collections
            .get("notifications")
            .map_or(0, |all| all.iter().filter(|n| n["read"] == json!(false)).count());
        ResponseTemplate::new(200).set_body_json(json!({"count": count}))
    }
}

impl Respond for FakeBackend {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let segments: Vec<String> = request
            .url
            .path_segments()
            .map(|s| s.filter(|s| !s.is_empty()).map(String::from).collect())
            .unwrap_or_default();
        let segments: Vec<&str> = segments.iter().map(String::as_str).collect();

        match (request.method.as_str(), segments.as_slice()) {
            ("GET", ["events"]) => {
                let events = self.lock().events.clone();
                ResponseTemplate::new(200).set_body_json(events)
            }
            ("GET", ["notifications", "unread-count"]) => self.unread_count(),
            ("GET", [collection]) => self.list(collection, request),
            ("GET", [collection, id]) => self.get(collection, id),
            ("POST", [collection]) => self.create(collection, request),
            ("PUT", [collection, id]) => {
                let patch = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
                self.update(collection, id, patch)
            }
            ("PUT", ["tasks", id, "complete"]) => {
                self.update("tasks", id, json!({"status": "completed", "completed": true}))
            }
            ("PUT", ["notifications", id, "read"]) => {
                self.update("notifications", id, json!({"read": true}))
            }
            ("DELETE", [collection, id]) => self.delete(collection, id),
            _ => ResponseTemplate::new(404),
        }
    }
}

fn find<'a>(store: &'a Store, collection: &str, id: &str) -> Option<&'a Value> {
    store.collections.get(collection)?.iter().find(|r| r["id"] == id)
}

fn find_mut<'a>(store: &'a mut Store, collection: &str, id: &str) -> Option<&'a mut Value> {
    store
        .collections
        .get_mut(collection)?
        .iter_mut()
        .find(|r| r["id"] == id)
}

fn matches_params(record: &Value, params: &ListParams) -> bool {
    if let Some(search) = params.filter.search.as_deref() {
        let needle = search.to_lowercase();
        let hit = record.as_object().is_some_and(|fields| {
            fields
                .values()
                .filter_map(Value::as_str)
                .any(|v| v.to_lowercase().contains(&needle))
        });
        if !hit {
            return false;
        }
    }
    if !params.filter.status.is_empty() {
        let status = record["status"].as_str().unwrap_or_default();
        if !params.filter.status.iter().any(|s| s == status) {
            return false;
        }
    }
    true
}

fn not_found(collection: &str, id: &str) -> ResponseTemplate {
    ResponseTemplate::new(404).set_body_json(json!({
        "success": false,
        "error": {"code": "NOT_FOUND", "message": format!("{collection}/{id} not found")}
    }))
}

fn bad_request(message: &str) -> ResponseTemplate {
    ResponseTemplate::new(400).set_body_json(json!({
        "success": false,
        "error": {"code": "VALIDATION_ERROR", "message": message}
    }))
}

pub fn contact_json(id: &str, first: &str, last: &str) -> Value {
    json!({
        "id": id,
        "orgId": ORG,
        "firstName": first,
        "lastName": last,
        "email": format!("{}@example.com", first.to_lowercase()),
        "status": "active",
        "tags": [],
        "createdAt": 1,
        "updatedAt": 1
    })
}

pub fn contacts(n: usize) -> Vec<Value> {
    (1..=n)
        .map(|i| contact_json(&format!("c{i}"), &format!("Person{i}"), "Tester"))
        .collect()
}

/// Test harness: a running fake backend plus a sync client pointed at it.
pub struct TestHarness {
    pub server: MockServer,
    pub backend: FakeBackend,
    pub api: ApiClient,
}

impl TestHarness {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let backend = FakeBackend::default();
        Mock::given(any())
            .respond_with(backend.clone())
            .mount(&server)
            .await;
        let api = ApiClient::with_http(reqwest::Client::new(), server.uri(), Arc::new(NoSession));
        Self {
            server,
            backend,
            api,
        }
    }

    /// Sync client with a short debounce window.
    pub fn sync(&self, feed: Arc<dyn EventFeed>) -> SyncClient {
        let config = SyncConfig {
            subscription: SubscriptionConfig::with_debounce(Duration::from_millis(50)),
            ..SyncConfig::default()
        };
        SyncClient::new(self.api.clone(), feed, ORG, config)
    }

    /// Sync client over an in-memory feed the test controls.
    pub fn sync_with_memory_feed(&self) -> (SyncClient, Arc<MemoryFeed>) {
        let feed = Arc::new(MemoryFeed::new());
        (self.sync(feed.clone()), feed)
    }

    /// Requests received so far with the given method and path.
    pub async fn hits(&self, method: &str, path: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.method.as_str() == method && r.url.path() == path)
            .count()
    }
}
