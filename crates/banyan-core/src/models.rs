//! Core data models for banyan.
//!
//! These types are shared across all banyan crates and represent the
//! persistent entities: note files, headers, content, tags, access
//! tokens, linked-file mirroring configuration, and per-user cursors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::defaults::OTHER_USER_ID;

// =============================================================================
// NOTE FILE
// =============================================================================

/// A named, titled container of note threads.
///
/// `num_archives` counts rolled-over partitions; live notes are archive 0
/// and archive ids run `0..=num_archives`. `policy_header_id` optionally
/// points at a note displayed as the file's policy (0 = none).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct NoteFile {
    pub id: i32,
    pub owner_id: String,
    pub name: String,
    pub title: String,
    pub num_archives: i32,
    pub last_edited: DateTime<Utc>,
    pub policy_header_id: i64,
    pub inhibit_versions: bool,
}

// =============================================================================
// NOTE HEADER / CONTENT / TAGS
// =============================================================================

/// One node in a thread.
///
/// Base notes have `response_ordinal == 0` and `base_note_id == 0`;
/// responses carry the id of their thread root. `version == 0` is the
/// current row; `version > 0` rows are frozen prior revisions created on
/// edit. Within a (file, archive) the tuple
/// (note_ordinal, response_ordinal, version) is unique.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct NoteHeader {
    pub id: i64,
    pub file_id: i32,
    pub archive_id: i32,
    pub base_note_id: i64,
    pub note_ordinal: i32,
    pub response_ordinal: i32,
    pub response_count: i32,
    pub subject: String,
    pub author_id: String,
    pub author_name: String,
    pub created_at: DateTime<Utc>,
    pub last_edited: DateTime<Utc>,
    pub thread_last_edited: DateTime<Utc>,
    pub link_guid: Option<Uuid>,
    pub ref_id: i64,
    pub is_deleted: bool,
    pub version: i32,
    pub director_message: Option<String>,
}

impl NoteHeader {
    /// True for the root of a thread.
    pub fn is_base(&self) -> bool {
        self.response_ordinal == 0
    }

    /// True for the live row readers should see.
    pub fn is_active(&self) -> bool {
        !self.is_deleted && self.version == 0
    }
}

/// Body text, 1:1 with a NoteHeader.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct NoteContent {
    pub header_id: i64,
    pub body: String,
}

/// One tag on one header, denormalized with file/archive for scoped lookup.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tag {
    pub tag: String,
    pub header_id: i64,
    pub file_id: i32,
    pub archive_id: i32,
}

// =============================================================================
// ACCESS
// =============================================================================

/// The seven-capability permission token for a (user, file, archive).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AccessToken {
    pub user_id: String,
    pub file_id: i32,
    pub archive_id: i32,
    pub can_read: bool,
    pub can_respond: bool,
    pub can_write: bool,
    pub can_set_tag: bool,
    pub can_delete_edit: bool,
    pub can_view_access: bool,
    pub can_edit_access: bool,
}

impl AccessToken {
    /// The fail-closed token: every capability denied.
    pub fn none(user_id: &str, file_id: i32, archive_id: i32) -> Self {
        Self {
            user_id: user_id.to_string(),
            file_id,
            archive_id,
            can_read: false,
            can_respond: false,
            can_write: false,
            can_set_tag: false,
            can_delete_edit: false,
            can_view_access: false,
            can_edit_access: false,
        }
    }

    /// The owner token: every capability granted.
    pub fn full(user_id: &str, file_id: i32, archive_id: i32) -> Self {
        Self {
            can_read: true,
            can_respond: true,
            can_write: true,
            can_set_tag: true,
            can_delete_edit: true,
            can_view_access: true,
            can_edit_access: true,
            ..Self::none(user_id, file_id, archive_id)
        }
    }

    /// The default "Other" row created with every file: no access.
    pub fn other_default(file_id: i32, archive_id: i32) -> Self {
        Self::none(OTHER_USER_ID, file_id, archive_id)
    }

    /// True when any capability that makes the file visible is granted.
    pub fn any_visible(&self) -> bool {
        self.can_read || self.can_write || self.can_view_access
    }
}

// =============================================================================
// LINKED FILES / REPLICATION
// =============================================================================

/// A standing mirror relationship between a local file and a remote one.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LinkedFile {
    pub id: i32,
    pub home_file_id: i32,
    pub home_file_name: String,
    pub remote_file_name: String,
    pub remote_base_uri: String,
    pub accept_from: bool,
    pub send_to: bool,
    pub secret: Option<String>,
}

/// A durable outbox entry awaiting delivery to one linked file.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LinkQueueEntry {
    pub id: i64,
    pub linked_file_id: i32,
    pub link_guid: Uuid,
    pub activity: String,
    pub base_uri: String,
    pub enqueued: bool,
    pub secret: Option<String>,
    pub old_link_guid: Option<Uuid>,
}

/// Append-only audit record of replication outcomes.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LinkLogEntry {
    pub id: i64,
    pub event_type: String,
    pub event_time: DateTime<Utc>,
    pub event: String,
}

// =============================================================================
// SEQUENCER
// =============================================================================

/// Per-(user, file) cursor for reading only notes written since the
/// user's last completed pass.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Sequencer {
    pub user_id: String,
    pub file_id: i32,
    pub ordinal: i32,
    pub last_time: DateTime<Utc>,
    pub start_time: DateTime<Utc>,
    pub active: bool,
}

impl Sequencer {
    /// Begin a pass: mark active and stamp the start time.
    ///
    /// `last_time` is untouched; notes arriving after `now` are the next
    /// pass's business.
    pub fn begin_pass(&mut self, now: DateTime<Utc>) {
        self.active = true;
        self.start_time = now;
    }

    /// Complete a pass: advance the high-water mark to the pass start.
    ///
    /// The mark never moves backwards, so a stale `start_time` (clock
    /// skew, replayed request) cannot lose notes.
    pub fn complete_pass(&mut self) {
        self.active = false;
        if self.start_time > self.last_time {
            self.last_time = self.start_time;
        }
    }

    /// Whether a header edited at `edited` belongs to the current pass.
    pub fn is_candidate(&self, edited: DateTime<Utc>) -> bool {
        edited >= self.last_time
    }
}

// =============================================================================
// MARKS
// =============================================================================

/// A saved pointer into a thread, used to bookmark output selections.
///
/// `response_ordinal` of -1 marks the whole thread, 0 the base note only,
/// and >0 one specific response.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Mark {
    pub user_id: String,
    pub file_id: i32,
    pub archive_id: i32,
    pub mark_ordinal: i32,
    pub note_ordinal: i32,
    pub header_id: i64,
    pub response_ordinal: i32,
}
