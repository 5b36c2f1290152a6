//! Core traits for banyan abstractions.
//!
//! These traits define the storage interfaces the engine is written
//! against, enabling pluggable backends and testability. The PostgreSQL
//! implementations live in `banyan-db`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// REQUEST TYPES
// =============================================================================

/// Request for creating a base note or a response.
///
/// `base_header_id == 0` creates a base note; otherwise the id of the
/// thread root the response attaches to.
#[derive(Debug, Clone)]
pub struct CreateNoteRequest {
    pub file_id: i32,
    pub archive_id: i32,
    pub base_header_id: i64,
    pub subject: String,
    pub author_id: String,
    pub author_name: String,
    pub body: String,
    pub tag_line: String,
    pub director_message: Option<String>,
    /// Supplied by the replication acceptor so imported notes keep their
    /// cross-instance identity; locally-created notes leave this None and
    /// a GUID is minted on first enqueue.
    pub link_guid: Option<Uuid>,
    /// Remote-side header id recorded when imported via a link.
    pub ref_id: i64,
    /// Timestamps to preserve on import; None means "now".
    pub created_at: Option<DateTime<Utc>>,
}

/// Request for editing a note in place.
#[derive(Debug, Clone)]
pub struct EditNoteRequest {
    pub header_id: i64,
    pub subject: String,
    pub body: String,
    pub tag_line: String,
    pub director_message: Option<String>,
}

/// Which headers of a (file, archive) to list.
///
/// Every selector filters to active rows (not deleted, version 0) and
/// orders by (note ordinal, response ordinal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderSelector {
    /// All base notes and responses.
    All,
    /// Base notes and responses with note ordinal in the range (inclusive).
    OrdinalRange { min: i32, max: i32 },
    /// Base notes only.
    BasesOnly,
    /// One thread: the base note plus all its responses.
    Thread { note_ordinal: i32 },
    /// One specific note.
    Single { note_ordinal: i32, response_ordinal: i32 },
}

/// Request for content search within a (file, archive).
#[derive(Debug, Clone)]
pub struct ContentSearchRequest {
    pub file_id: i32,
    pub archive_id: i32,
    pub text: String,
    pub case_sensitive: bool,
    pub whole_words: bool,
}

// =============================================================================
// REPOSITORY TRAITS
// =============================================================================

/// Repository for note-file administration.
#[async_trait]
pub trait FileRepository: Send + Sync {
    /// Create a file and its base access entries ("Other" no-access plus
    /// owner full-access) in one transaction.
    async fn create(&self, owner_id: &str, name: &str, title: &str) -> Result<NoteFile>;

    /// Fetch a file by id.
    async fn get(&self, file_id: i32) -> Result<NoteFile>;

    /// Fetch a file by its short name.
    async fn get_by_name(&self, name: &str) -> Result<Option<NoteFile>>;

    /// List all files ordered by name.
    async fn list(&self) -> Result<Vec<NoteFile>>;

    /// Update name and title.
    async fn update(&self, file_id: i32, name: &str, title: &str) -> Result<NoteFile>;

    /// Point the file's policy at a note header (0 clears it).
    async fn set_policy(&self, file_id: i32, header_id: i64) -> Result<()>;

    /// Set whether edits skip version archiving.
    async fn set_inhibit_versions(&self, file_id: i32, inhibit: bool) -> Result<()>;

    /// Delete a file and everything hanging off it, in dependency order:
    /// tags, content, headers, access, linked-file config and queue,
    /// sequencers, marks, then the file row.
    async fn delete(&self, file_id: i32) -> Result<()>;
}

/// Resolver and editor for access tokens.
#[async_trait]
pub trait AccessRepository: Send + Sync {
    /// Effective token for (user, file, archive): the user's own row,
    /// else the "Other" row, else all-false.
    async fn resolve(&self, user_id: &str, file_id: i32, archive_id: i32) -> Result<AccessToken>;

    /// The user's own row only, else all-false. Used when editing a
    /// specific user's grant.
    async fn resolve_exact(
        &self,
        user_id: &str,
        file_id: i32,
        archive_id: i32,
    ) -> Result<AccessToken>;

    /// All tokens for a (file, archive).
    async fn list_for_file(&self, file_id: i32, archive_id: i32) -> Result<Vec<AccessToken>>;

    /// Insert a token row.
    async fn add(&self, token: &AccessToken) -> Result<()>;

    /// Replace a token row's capabilities.
    async fn update(&self, token: &AccessToken) -> Result<()>;

    /// Remove a token row.
    async fn remove(&self, user_id: &str, file_id: i32, archive_id: i32) -> Result<()>;

    /// Capability check for inbound replication: does a LinkedFile row
    /// accept from this remote file name, with a matching secret when one
    /// is configured? Returns the matching rows (empty = rejected).
    async fn test_link_access(
        &self,
        remote_file_name: &str,
        secret: Option<&str>,
    ) -> Result<Vec<LinkedFile>>;
}

/// The Thread/Ordinal Manager's storage contract.
#[async_trait]
pub trait NoteRepository: Send + Sync {
    /// Create a base note: allocates the next note ordinal in the
    /// (file, archive), persists header + content + tags, touches the
    /// file's last-edited time, and enqueues replication for linked files.
    async fn create_base(&self, req: CreateNoteRequest) -> Result<NoteHeader>;

    /// Create a response: allocates the next response ordinal, bumps the
    /// base note's response count and thread-last-edited, persists, and
    /// enqueues replication.
    async fn create_response(&self, req: CreateNoteRequest) -> Result<NoteHeader>;

    /// Edit in place. Unless the file inhibits versions, the current
    /// version-0 row is first cloned to the next archived version.
    async fn edit(&self, req: EditNoteRequest) -> Result<NoteHeader>;

    /// Soft-delete: sets the deleted flag, leaves content, tags and
    /// ordinals untouched, and enqueues replication.
    async fn delete(&self, header_id: i64) -> Result<()>;

    /// Re-home a note (or its whole thread) into another file, stripping
    /// file-local identity and prefixing a provenance banner.
    async fn copy(&self, header_id: i64, target_file_id: i32, whole_thread: bool,
        copier_id: &str, copier_name: &str) -> Result<NoteHeader>;

    /// Fetch one header by id (any version, deleted or not).
    async fn get_header(&self, header_id: i64) -> Result<NoteHeader>;

    /// Fetch the header holding a link GUID, if any.
    async fn get_header_by_guid(&self, guid: Uuid) -> Result<Option<NoteHeader>>;

    /// Fetch a note's body.
    async fn get_content(&self, header_id: i64) -> Result<NoteContent>;

    /// Tags on one header.
    async fn tags_for_header(&self, header_id: i64) -> Result<Vec<Tag>>;

    /// Active headers of a (file, archive) per the selector.
    async fn list_headers(
        &self,
        file_id: i32,
        archive_id: i32,
        selector: HeaderSelector,
    ) -> Result<Vec<NoteHeader>>;

    /// Archived versions (version > 0) of one note, oldest first.
    async fn get_versions(
        &self,
        file_id: i32,
        archive_id: i32,
        note_ordinal: i32,
        response_ordinal: i32,
    ) -> Result<Vec<NoteHeader>>;

    /// Number of active base notes in a (file, archive).
    async fn base_note_count(&self, file_id: i32, archive_id: i32) -> Result<i64>;
}

/// Storage for linked-file configuration, the outbox queue, and the
/// audit log.
#[async_trait]
pub trait LinkRepository: Send + Sync {
    /// Mirror configurations whose home file is `file_id`.
    async fn linked_files_for(&self, file_id: i32) -> Result<Vec<LinkedFile>>;

    /// One linked-file row.
    async fn get_linked_file(&self, id: i32) -> Result<LinkedFile>;

    /// Register a mirror relationship.
    async fn create_linked_file(&self, lf: &LinkedFile) -> Result<LinkedFile>;

    /// Remove a mirror relationship and its pending queue rows.
    async fn delete_linked_file(&self, id: i32) -> Result<()>;

    /// Append an outbox row.
    async fn enqueue(
        &self,
        linked_file_id: i32,
        guid: Uuid,
        activity: &str,
        base_uri: &str,
        secret: Option<&str>,
        old_guid: Option<Uuid>,
    ) -> Result<i64>;

    /// Pending (un-claimed) rows in insertion order, across all linked files.
    async fn pending(&self, limit: i64) -> Result<Vec<LinkQueueEntry>>;

    /// Claim a row before attempting delivery.
    async fn mark_enqueued(&self, id: i64) -> Result<()>;

    /// Delivery succeeded: drop the row.
    async fn complete(&self, id: i64) -> Result<()>;

    /// Delivery failed: release the claim so the row retries next pass.
    async fn release(&self, id: i64) -> Result<()>;

    /// Release every claimed row; called at worker startup so rows
    /// orphaned by a crash become retryable.
    async fn release_stale(&self) -> Result<u64>;

    /// Append to the audit trail.
    async fn log(&self, event_type: &str, event: &str) -> Result<()>;

    /// Most recent audit entries, newest first.
    async fn list_log(&self, limit: i64) -> Result<Vec<LinkLogEntry>>;
}

/// Storage for per-user sequencer cursors.
#[async_trait]
pub trait SequencerRepository: Send + Sync {
    /// A user's sequencers in personal order.
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Sequencer>>;

    /// One sequencer row, if present.
    async fn get(&self, user_id: &str, file_id: i32) -> Result<Option<Sequencer>>;

    /// Append a file to the user's sequence (ordinal = max + 1).
    async fn create(&self, user_id: &str, file_id: i32) -> Result<Sequencer>;

    /// Remove a file from the user's sequence.
    async fn delete(&self, user_id: &str, file_id: i32) -> Result<()>;

    /// Reorder / move the cursor explicitly.
    async fn update_position(
        &self,
        user_id: &str,
        file_id: i32,
        ordinal: i32,
        last_time: DateTime<Utc>,
    ) -> Result<()>;

    /// Begin a pass over one file: stamp start time, mark active, and
    /// return the candidate headers (active rows edited at or after the
    /// stored high-water mark, in thread order).
    async fn start_pass(&self, user_id: &str, file_id: i32) -> Result<Vec<NoteHeader>>;

    /// Complete a pass: advance the high-water mark to the pass start
    /// time (never backwards) and clear the active flag.
    async fn complete_pass(&self, user_id: &str, file_id: i32) -> Result<()>;
}

/// Storage for saved thread bookmarks.
#[async_trait]
pub trait MarkRepository: Send + Sync {
    /// A user's marks in one file, in mark order.
    async fn list(&self, user_id: &str, file_id: i32) -> Result<Vec<Mark>>;

    /// Append a mark (mark ordinal = max + 1).
    async fn add(&self, mark: &Mark) -> Result<Mark>;

    /// Remove one mark.
    async fn remove(&self, user_id: &str, file_id: i32, mark_ordinal: i32) -> Result<()>;

    /// Remove all of a user's marks in a file.
    async fn clear(&self, user_id: &str, file_id: i32) -> Result<()>;
}
