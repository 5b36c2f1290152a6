//! Integration tests for replication enqueueing: queue rows written with
//! note commits, stable link GUIDs, and per-linked-file ordering.

use banyan_core::{EditNoteRequest, LinkRepository, NoteRepository};
use banyan_db::test_fixtures::{
    connect_test_pool, create_test_file, create_test_linked_file, create_test_note,
};
use banyan_db::Database;

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
async fn test_create_in_linked_file_enqueues_with_minted_guid() {
    let pool = connect_test_pool().await;
    let file = create_test_file(&pool, "rq-mint").await;
    let lf = create_test_linked_file(&pool, &file, "mirror-a", true).await;
    let db = Database::new(pool);

    let h = create_test_note(&db.notes, file.id, 0, "linked", "body").await.unwrap();

    // The GUID is minted during the create and persisted on the header.
    let stored = db.notes.get_header(h.id).await.unwrap();
    let guid = stored.link_guid.expect("linked create should mint a GUID");

    let pending = db.links.pending(100).await.unwrap();
    let row = pending
        .iter()
        .find(|e| e.linked_file_id == lf.id && e.link_guid == guid)
        .expect("queue row for the new note");
    assert_eq!(row.activity, "create_base");
    assert_eq!(row.base_uri, lf.remote_base_uri);
    assert!(!row.enqueued);
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
async fn test_unlinked_file_gets_no_guid_and_no_queue() {
    let pool = connect_test_pool().await;
    let file = create_test_file(&pool, "rq-none").await;
    let db = Database::new(pool.clone());

    let h = create_test_note(&db.notes, file.id, 0, "plain", "body").await.unwrap();
    assert!(h.link_guid.is_none());

    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM link_queue q
         JOIN linked_file lf ON lf.id = q.linked_file_id
         WHERE lf.home_file_id = $1",
    )
    .bind(file.id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
async fn test_edit_reuses_the_stable_guid() {
    // Spec scenario: link a file, edit a note, expect one queue row with
    // activity=edit carrying the note's existing GUID.
    let pool = connect_test_pool().await;
    let file = create_test_file(&pool, "rq-edit").await;
    let lf = create_test_linked_file(&pool, &file, "mirror-b", true).await;
    let db = Database::new(pool);

    let h = create_test_note(&db.notes, file.id, 0, "subject", "body").await.unwrap();
    let guid = db.notes.get_header(h.id).await.unwrap().link_guid.unwrap();

    db.notes
        .edit(EditNoteRequest {
            header_id: h.id,
            subject: "subject 2".to_string(),
            body: "body 2".to_string(),
            tag_line: String::new(),
            director_message: None,
        })
        .await
        .unwrap();

    // GUID unchanged by the edit.
    assert_eq!(db.notes.get_header(h.id).await.unwrap().link_guid, Some(guid));

    let pending = db.links.pending(100).await.unwrap();
    let edits: Vec<_> = pending
        .iter()
        .filter(|e| e.linked_file_id == lf.id && e.activity == "edit")
        .collect();
    assert_eq!(edits.len(), 1);
    assert_eq!(edits[0].link_guid, guid);
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
async fn test_fan_out_one_row_per_linked_file() {
    let pool = connect_test_pool().await;
    let file = create_test_file(&pool, "rq-fan").await;
    let lf1 = create_test_linked_file(&pool, &file, "mirror-c1", true).await;
    let lf2 = create_test_linked_file(&pool, &file, "mirror-c2", true).await;
    // send_to = false: configured for inbound only, never enqueued.
    let lf3 = create_test_linked_file(&pool, &file, "mirror-c3", false).await;
    let db = Database::new(pool);

    let h = create_test_note(&db.notes, file.id, 0, "fan", "body").await.unwrap();
    let guid = db.notes.get_header(h.id).await.unwrap().link_guid.unwrap();

    let pending = db.links.pending(100).await.unwrap();
    let ours: Vec<_> = pending.iter().filter(|e| e.link_guid == guid).collect();
    assert_eq!(ours.len(), 2);
    assert!(ours.iter().any(|e| e.linked_file_id == lf1.id));
    assert!(ours.iter().any(|e| e.linked_file_id == lf2.id));
    assert!(!ours.iter().any(|e| e.linked_file_id == lf3.id));
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
async fn test_delete_enqueues_after_create_in_order() {
    let pool = connect_test_pool().await;
    let file = create_test_file(&pool, "rq-ord").await;
    let lf = create_test_linked_file(&pool, &file, "mirror-d", true).await;
    let db = Database::new(pool);

    let h = create_test_note(&db.notes, file.id, 0, "doomed", "body").await.unwrap();
    db.notes.delete(h.id).await.unwrap();

    let pending = db.links.pending(100).await.unwrap();
    let ours: Vec<_> = pending
        .iter()
        .filter(|e| e.linked_file_id == lf.id)
        .collect();
    assert_eq!(ours.len(), 2);
    assert_eq!(ours[0].activity, "create_base");
    assert_eq!(ours[1].activity, "delete");
    assert_eq!(ours[0].link_guid, ours[1].link_guid);
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
async fn test_response_mints_base_guid_for_correlation() {
    let pool = connect_test_pool().await;
    let file = create_test_file(&pool, "rq-base").await;

    let db = Database::new(pool.clone());
    // Base created before the link exists: no GUID yet.
    let base = create_test_note(&db.notes, file.id, 0, "base", "body").await.unwrap();
    assert!(base.link_guid.is_none());

    create_test_linked_file(&pool, &file, "mirror-e", true).await;
    create_test_note(&db.notes, file.id, base.id, "re", "reply").await.unwrap();

    // Enqueueing the response back-fills the base note's GUID so the
    // receiver can anchor the thread.
    let base_now = db.notes.get_header(base.id).await.unwrap();
    assert!(base_now.link_guid.is_some());
}
