//! Test fixtures for integration tests.
//!
//! Always compiled so integration tests (in tests/) can use
//! `DEFAULT_TEST_DATABASE_URL` and the seeding helpers. Everything here
//! panics on failure: a broken fixture is a broken test environment, not
//! a condition to handle.

use sqlx::PgPool;
use uuid::Uuid;

use banyan_core::{
    CreateNoteRequest, FileRepository, LinkedFile, NoteFile, NoteHeader, NoteRepository, Result,
};

use crate::files::PgFileRepository;
use crate::notes::PgNoteRepository;

/// Connection string used when DATABASE_URL is not set.
pub const DEFAULT_TEST_DATABASE_URL: &str = "postgres://localhost/banyan_test";

/// Connect to the test database.
pub async fn connect_test_pool() -> PgPool {
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_TEST_DATABASE_URL.to_string());
    crate::create_pool(&database_url)
        .await
        .expect("Failed to connect to test DB")
}

/// Create a note file with a unique name derived from `prefix`.
///
/// File names cap at 20 characters; keep prefixes short.
pub async fn create_test_file(pool: &PgPool, prefix: &str) -> NoteFile {
    let suffix = Uuid::new_v4().simple().to_string();
    let name = format!("{}-{}", prefix, &suffix[..6]);
    assert!(name.len() <= 20, "test file name too long: {name}");

    PgFileRepository::new(pool.clone())
        .create("test-owner", &name, "Integration test file")
        .await
        .expect("Failed to create test file")
}

/// Create a base note (base_id == 0) or response in a test file.
pub async fn create_test_note(
    repo: &PgNoteRepository,
    file_id: i32,
    base_id: i64,
    subject: &str,
    body: &str,
) -> Result<NoteHeader> {
    let req = CreateNoteRequest {
        file_id,
        archive_id: 0,
        base_header_id: base_id,
        subject: subject.to_string(),
        author_id: "test-author".to_string(),
        author_name: "Test Author".to_string(),
        body: body.to_string(),
        tag_line: String::new(),
        director_message: None,
        link_guid: None,
        ref_id: 0,
        created_at: None,
    };
    if base_id == 0 {
        repo.create_base(req).await
    } else {
        repo.create_response(req).await
    }
}

/// Register a linked file mirroring `file` to a fictional peer.
pub async fn create_test_linked_file(
    pool: &PgPool,
    file: &NoteFile,
    remote_name: &str,
    send_to: bool,
) -> LinkedFile {
    sqlx::query_as::<_, LinkedFile>(
        "INSERT INTO linked_file (home_file_id, home_file_name, remote_file_name,
             remote_base_uri, accept_from, send_to, secret)
         VALUES ($1, $2, $3, $4, true, $5, NULL)
         RETURNING id, home_file_id, home_file_name, remote_file_name, remote_base_uri,
             accept_from, send_to, secret",
    )
    .bind(file.id)
    .bind(&file.name)
    .bind(remote_name)
    .bind(format!("http://peer.test/{remote_name}"))
    .bind(send_to)
    .fetch_one(pool)
    .await
    .expect("Failed to create test linked file")
}
