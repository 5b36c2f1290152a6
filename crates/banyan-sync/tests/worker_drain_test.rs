//! Integration tests for the queue worker: drain order, failure
//! retention, and audit logging, using a scripted delivery client.
//!
//! The test database is shared, so every assertion filters to the
//! file created by its own test; foreign rows are simply accepted.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use banyan_core::{ActivityEnvelope, LinkRepository, NoteRepository};
use banyan_db::test_fixtures::{
    connect_test_pool, create_test_file, create_test_linked_file, create_test_note,
};
use banyan_db::Database;
use banyan_sync::{DeliveryClient, DeliveryOutcome, SyncWorker, WorkerConfig};

/// Delivery client that records envelopes for one sender file and
/// answers those from a script; everything else is accepted.
struct ScriptedClient {
    sender_file: String,
    delivered: Mutex<Vec<ActivityEnvelope>>,
    outcomes: Mutex<Vec<DeliveryOutcome>>,
}

impl ScriptedClient {
    fn new(sender_file: &str, outcomes: Vec<DeliveryOutcome>) -> Arc<Self> {
        Arc::new(Self {
            sender_file: sender_file.to_string(),
            delivered: Mutex::new(Vec::new()),
            outcomes: Mutex::new(outcomes),
        })
    }

    fn seen(&self) -> Vec<ActivityEnvelope> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliveryClient for ScriptedClient {
    async fn deliver(&self, _base_uri: &str, envelope: &ActivityEnvelope) -> DeliveryOutcome {
        if envelope.sender_file_name != self.sender_file {
            return DeliveryOutcome::Accepted;
        }
        self.delivered.lock().unwrap().push(envelope.clone());
        let mut outcomes = self.outcomes.lock().unwrap();
        if outcomes.is_empty() {
            DeliveryOutcome::Accepted
        } else {
            outcomes.remove(0)
        }
    }
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
async fn test_drain_delivers_in_order_and_empties_queue() {
    let pool = connect_test_pool().await;
    let file = create_test_file(&pool, "wk-ord").await;
    let lf = create_test_linked_file(&pool, &file, "wk-peer-a", true).await;
    let db = Database::new(pool);

    let base = create_test_note(&db.notes, file.id, 0, "first", "b1").await.unwrap();
    create_test_note(&db.notes, file.id, base.id, "second", "b2").await.unwrap();

    let client = ScriptedClient::new(&file.name, Vec::new());
    let worker = SyncWorker::with_client(db.clone(), WorkerConfig::default(), client.clone());

    worker.drain_once().await.unwrap();

    let seen = client.seen();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].activity, banyan_core::LinkAction::CreateBase);
    assert_eq!(seen[1].activity, banyan_core::LinkAction::CreateResponse);
    // The response names its thread root by the base note's GUID.
    let base_guid = db.notes.get_header(base.id).await.unwrap().link_guid;
    assert_eq!(seen[1].note.as_ref().unwrap().base_link_guid, base_guid);

    let remaining: Vec<_> = db
        .links
        .pending(500)
        .await
        .unwrap()
        .into_iter()
        .filter(|e| e.linked_file_id == lf.id)
        .collect();
    assert!(remaining.is_empty());
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
async fn test_failure_keeps_row_and_stops_group() {
    let pool = connect_test_pool().await;
    let file = create_test_file(&pool, "wk-fail").await;
    let lf = create_test_linked_file(&pool, &file, "wk-peer-b", true).await;
    let db = Database::new(pool);

    let base = create_test_note(&db.notes, file.id, 0, "one", "b").await.unwrap();
    create_test_note(&db.notes, file.id, base.id, "two", "b").await.unwrap();

    // First delivery for this file fails; the second row must not be
    // attempted in the same pass.
    let client = ScriptedClient::new(
        &file.name,
        vec![DeliveryOutcome::Failed("connection refused".to_string())],
    );
    let worker = SyncWorker::with_client(db.clone(), WorkerConfig::default(), client.clone());

    worker.drain_once().await.unwrap();
    assert_eq!(client.seen().len(), 1);

    // Both rows still pending, original order intact.
    let remaining: Vec<_> = db
        .links
        .pending(500)
        .await
        .unwrap()
        .into_iter()
        .filter(|e| e.linked_file_id == lf.id)
        .collect();
    assert_eq!(remaining.len(), 2);
    assert_eq!(remaining[0].activity, "create_base");

    // The next pass retries from the failed row: at-least-once delivery.
    worker.drain_once().await.unwrap();
    assert_eq!(client.seen().len(), 3);
    let remaining: Vec<_> = db
        .links
        .pending(500)
        .await
        .unwrap()
        .into_iter()
        .filter(|e| e.linked_file_id == lf.id)
        .collect();
    assert!(remaining.is_empty());
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
async fn test_outcomes_land_in_link_log() {
    let pool = connect_test_pool().await;
    let file = create_test_file(&pool, "wk-log").await;
    create_test_linked_file(&pool, &file, "wk-peer-c", true).await;
    let db = Database::new(pool);

    create_test_note(&db.notes, file.id, 0, "logged", "b").await.unwrap();

    let client = ScriptedClient::new(
        &file.name,
        vec![
            DeliveryOutcome::Failed("timeout".to_string()),
            DeliveryOutcome::Accepted,
        ],
    );
    let worker = SyncWorker::with_client(db.clone(), WorkerConfig::default(), client);

    worker.drain_once().await.unwrap();
    worker.drain_once().await.unwrap();

    let log = db.links.list_log(50).await.unwrap();
    assert!(log.iter().any(|e| e.event_type == "out-fail" && e.event.contains("timeout")));
    assert!(log.iter().any(|e| e.event_type == "out-ok"));
}
