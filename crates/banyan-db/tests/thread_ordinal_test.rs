//! Integration tests for the Thread/Ordinal Manager: ordinal density,
//! response counting, version archiving, and soft delete.
//!
//! Run with a live PostgreSQL (schema from migrations/ applied):
//! `DATABASE_URL=postgres://localhost/banyan_test cargo test -- --ignored`

use banyan_core::{EditNoteRequest, HeaderSelector, NoteRepository};
use banyan_db::test_fixtures::{connect_test_pool, create_test_file, create_test_note};
use banyan_db::{Database, PgNoteRepository};

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
async fn test_base_notes_get_dense_ordinals() {
    let pool = connect_test_pool().await;
    let file = create_test_file(&pool, "ord-dense").await;
    let notes = PgNoteRepository::new(pool);

    for i in 1..=4 {
        let h = create_test_note(&notes, file.id, 0, &format!("note {i}"), "body")
            .await
            .unwrap();
        assert_eq!(h.note_ordinal, i);
        assert_eq!(h.response_ordinal, 0);
        assert_eq!(h.base_note_id, 0);
    }

    let bases = notes
        .list_headers(file.id, 0, HeaderSelector::BasesOnly)
        .await
        .unwrap();
    let ordinals: Vec<i32> = bases.iter().map(|h| h.note_ordinal).collect();
    assert_eq!(ordinals, vec![1, 2, 3, 4]);
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
async fn test_responses_number_densely_and_bump_count() {
    let pool = connect_test_pool().await;
    let file = create_test_file(&pool, "ord-resp").await;
    let notes = PgNoteRepository::new(pool);

    let base = create_test_note(&notes, file.id, 0, "base", "body").await.unwrap();

    for i in 1..=3 {
        let r = create_test_note(&notes, file.id, base.id, &format!("re {i}"), "reply")
            .await
            .unwrap();
        assert_eq!(r.note_ordinal, base.note_ordinal);
        assert_eq!(r.response_ordinal, i);
        assert_eq!(r.base_note_id, base.id);
    }

    let base_now = notes.get_header(base.id).await.unwrap();
    assert_eq!(base_now.response_count, 3);
    assert!(base_now.thread_last_edited > base.thread_last_edited);

    // Non-deleted version-0 response ordinals are exactly 1..=count.
    let thread = notes
        .list_headers(file.id, 0, HeaderSelector::Thread { note_ordinal: base.note_ordinal })
        .await
        .unwrap();
    let response_ordinals: Vec<i32> = thread
        .iter()
        .filter(|h| h.response_ordinal > 0)
        .map(|h| h.response_ordinal)
        .collect();
    assert_eq!(response_ordinals, vec![1, 2, 3]);
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
async fn test_response_to_missing_base_is_integrity_error() {
    let pool = connect_test_pool().await;
    let file = create_test_file(&pool, "ord-nobase").await;
    let notes = PgNoteRepository::new(pool);

    let err = create_test_note(&notes, file.id, 999_999_999, "re", "reply")
        .await
        .unwrap_err();
    assert!(matches!(err, banyan_core::Error::NoteNotFound(_)));
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
async fn test_edit_archives_prior_version() {
    let pool = connect_test_pool().await;
    let file = create_test_file(&pool, "ver-edit").await;
    let db = Database::new(pool);

    let h = create_test_note(&db.notes, file.id, 0, "v0 subject", "first body")
        .await
        .unwrap();

    db.notes
        .edit(EditNoteRequest {
            header_id: h.id,
            subject: "edited subject".to_string(),
            body: "second body".to_string(),
            tag_line: "edited".to_string(),
            director_message: None,
        })
        .await
        .unwrap();

    // Version 0 reflects the new body.
    let current = db.notes.get_header(h.id).await.unwrap();
    assert_eq!(current.version, 0);
    assert_eq!(current.subject, "edited subject");
    assert_eq!(db.notes.get_content(h.id).await.unwrap().body, "second body");

    // The prior body survives as version 1.
    let versions = db
        .notes
        .get_versions(file.id, 0, h.note_ordinal, 0)
        .await
        .unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].version, 1);
    assert_eq!(versions[0].subject, "v0 subject");
    let old_body = db.notes.get_content(versions[0].id).await.unwrap();
    assert_eq!(old_body.body, "first body");

    // Versions list oldest -> newest.
    db.notes
        .edit(EditNoteRequest {
            header_id: h.id,
            subject: "third subject".to_string(),
            body: "third body".to_string(),
            tag_line: String::new(),
            director_message: None,
        })
        .await
        .unwrap();
    let versions = db
        .notes
        .get_versions(file.id, 0, h.note_ordinal, 0)
        .await
        .unwrap();
    let nums: Vec<i32> = versions.iter().map(|v| v.version).collect();
    assert_eq!(nums, vec![1, 2]);
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
async fn test_inhibit_versions_skips_archiving() {
    let pool = connect_test_pool().await;
    let file = create_test_file(&pool, "ver-inh").await;
    let db = Database::new(pool);
    use banyan_core::FileRepository;
    db.files.set_inhibit_versions(file.id, true).await.unwrap();

    let h = create_test_note(&db.notes, file.id, 0, "s", "body").await.unwrap();
    db.notes
        .edit(EditNoteRequest {
            header_id: h.id,
            subject: "s2".to_string(),
            body: "body2".to_string(),
            tag_line: String::new(),
            director_message: None,
        })
        .await
        .unwrap();

    let versions = db.notes.get_versions(file.id, 0, h.note_ordinal, 0).await.unwrap();
    assert!(versions.is_empty());
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
async fn test_soft_delete_keeps_content_and_tags() {
    let pool = connect_test_pool().await;
    let file = create_test_file(&pool, "del-soft").await;
    let db = Database::new(pool);

    let base = create_test_note(&db.notes, file.id, 0, "base", "body").await.unwrap();
    let resp = create_test_note(&db.notes, file.id, base.id, "re", "reply body")
        .await
        .unwrap();

    db.notes.delete(resp.id).await.unwrap();

    // Excluded from active enumerations...
    let thread = db
        .notes
        .list_headers(file.id, 0, HeaderSelector::Thread { note_ordinal: base.note_ordinal })
        .await
        .unwrap();
    assert_eq!(thread.len(), 1);
    assert_eq!(thread[0].id, base.id);

    // ...but content is retained and the header still exists, flagged.
    let deleted = db.notes.get_header(resp.id).await.unwrap();
    assert!(deleted.is_deleted);
    assert_eq!(db.notes.get_content(resp.id).await.unwrap().body, "reply body");

    // Ordinals are not renumbered: a new response takes ordinal 2.
    let r2 = create_test_note(&db.notes, file.id, base.id, "re 2", "again")
        .await
        .unwrap();
    assert_eq!(r2.response_ordinal, 2);
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
async fn test_end_to_end_hello_thread() {
    // Spec scenario: create base "Hello" (ordinal 1/0), respond (1/1,
    // count 1), delete the response, active enumeration shows only the base.
    let pool = connect_test_pool().await;
    let file = create_test_file(&pool, "e2e-hello").await;
    let db = Database::new(pool);

    let base = create_test_note(&db.notes, file.id, 0, "Hello", "Hello world")
        .await
        .unwrap();
    assert_eq!((base.note_ordinal, base.response_ordinal), (1, 0));

    let resp = create_test_note(&db.notes, file.id, base.id, "Re: Hello", "hi")
        .await
        .unwrap();
    assert_eq!((resp.note_ordinal, resp.response_ordinal), (1, 1));
    assert_eq!(db.notes.get_header(base.id).await.unwrap().response_count, 1);

    db.notes.delete(resp.id).await.unwrap();

    let active = db
        .notes
        .list_headers(file.id, 0, HeaderSelector::Thread { note_ordinal: 1 })
        .await
        .unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, base.id);
    assert_eq!(db.notes.base_note_count(file.id, 0).await.unwrap(), 1);
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
async fn test_copy_whole_thread_rehomes_and_banners() {
    let pool = connect_test_pool().await;
    let source = create_test_file(&pool, "cp-src").await;
    let target = create_test_file(&pool, "cp-dst").await;
    let db = Database::new(pool);

    let base = create_test_note(&db.notes, source.id, 0, "origin", "original body")
        .await
        .unwrap();
    create_test_note(&db.notes, source.id, base.id, "re", "response body")
        .await
        .unwrap();

    let copied = db
        .notes
        .copy(base.id, target.id, true, "copier", "Copier Name")
        .await
        .unwrap();

    assert_eq!(copied.file_id, target.id);
    assert_eq!(copied.note_ordinal, 1);
    assert_eq!(copied.author_id, "copier");
    assert!(copied.link_guid.is_none());

    let body = db.notes.get_content(copied.id).await.unwrap().body;
    assert!(body.starts_with("<div class=\"copiednote\">From: "));
    assert!(body.contains(&source.name));
    assert!(body.ends_with("original body"));

    let copied_thread = db
        .notes
        .list_headers(target.id, 0, HeaderSelector::Thread { note_ordinal: 1 })
        .await
        .unwrap();
    assert_eq!(copied_thread.len(), 2);
    assert_eq!(copied_thread[1].response_ordinal, 1);
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
async fn test_cascade_delete_removes_dependents() {
    let pool = connect_test_pool().await;
    let file = create_test_file(&pool, "casc").await;
    let db = Database::new(pool.clone());
    use banyan_core::FileRepository;

    let base = create_test_note(&db.notes, file.id, 0, "s", "body").await.unwrap();
    create_test_note(&db.notes, file.id, base.id, "re", "r").await.unwrap();

    db.files.delete(file.id).await.unwrap();

    let (headers,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM note_header WHERE file_id = $1")
            .bind(file.id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(headers, 0);
    let (access,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM note_access WHERE file_id = $1")
            .bind(file.id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(access, 0);
    assert!(matches!(
        db.files.get(file.id).await.unwrap_err(),
        banyan_core::Error::FileNotFound(_)
    ));
}
