//! Wire types and decision logic for cross-instance note mirroring.
//!
//! A change to a note in a linked file is serialized as an
//! [`ActivityEnvelope`] and delivered to each peer's accept endpoint.
//! Delivery is at-least-once: the receiver deduplicates by link GUID, so
//! the same envelope arriving twice converges to one logical note.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// The kind of change being propagated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkAction {
    CreateBase,
    CreateResponse,
    Edit,
    Delete,
}

impl LinkAction {
    /// Stable string form stored in the LinkQueue table.
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkAction::CreateBase => "create_base",
            LinkAction::CreateResponse => "create_response",
            LinkAction::Edit => "edit",
            LinkAction::Delete => "delete",
        }
    }

    /// Parse the stored string form.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "create_base" => Ok(LinkAction::CreateBase),
            "create_response" => Ok(LinkAction::CreateResponse),
            "edit" => Ok(LinkAction::Edit),
            "delete" => Ok(LinkAction::Delete),
            other => Err(Error::InvalidInput(format!("unknown link action: {other}"))),
        }
    }
}

/// The note data carried with a create or edit activity.
///
/// Deletes carry no payload; the GUID is enough.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotePayload {
    pub subject: String,
    pub author_id: String,
    pub author_name: String,
    pub body: String,
    pub tag_line: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub director_message: Option<String>,
    /// For responses: the link GUID of the thread's base note, which the
    /// receiver resolves to its local base header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_link_guid: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub last_edited: DateTime<Utc>,
}

/// One replication call, outbound or inbound.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEnvelope {
    pub activity: LinkAction,
    pub link_guid: Uuid,
    /// Present when a GUID must be re-mapped after a local note was
    /// deleted and re-created on the sending side.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_link_guid: Option<Uuid>,
    /// The sender's home file name; the receiver matches it against its
    /// LinkedFile rows' remote file names.
    pub sender_file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<NotePayload>,
}

/// What the receiver should do with an incoming activity, decided purely
/// from which GUIDs it already holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportDisposition {
    /// No local header with either GUID: insert a new note.
    Insert,
    /// A header with the incoming GUID exists: apply the activity to it
    /// (a duplicate create is treated as an edit, not a second insert).
    ApplyToExisting,
    /// A header with the old GUID exists: rewrite its stored GUID to the
    /// incoming one, then apply the activity to it.
    RemapAndApply,
    /// Edit/delete of a GUID this instance has never seen: drop it.
    /// Replying "missing" would only trigger retry storms under
    /// at-least-once delivery.
    Reject,
}

impl ImportDisposition {
    /// Classify an incoming activity.
    ///
    /// `guid_known` / `old_guid_known` say whether a local header exists
    /// with the envelope's link GUID / old link GUID respectively.
    pub fn classify(action: LinkAction, guid_known: bool, old_guid_known: bool) -> Self {
        if guid_known {
            return ImportDisposition::ApplyToExisting;
        }
        if old_guid_known {
            return ImportDisposition::RemapAndApply;
        }
        match action {
            LinkAction::CreateBase | LinkAction::CreateResponse => ImportDisposition::Insert,
            LinkAction::Edit | LinkAction::Delete => ImportDisposition::Reject,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_string_round_trip() {
        for action in [
            LinkAction::CreateBase,
            LinkAction::CreateResponse,
            LinkAction::Edit,
            LinkAction::Delete,
        ] {
            assert_eq!(LinkAction::parse(action.as_str()).unwrap(), action);
        }
    }

    #[test]
    fn test_action_parse_rejects_unknown() {
        assert!(LinkAction::parse("truncate").is_err());
    }

    #[test]
    fn test_duplicate_create_applies_to_existing() {
        let d = ImportDisposition::classify(LinkAction::CreateBase, true, false);
        assert_eq!(d, ImportDisposition::ApplyToExisting);
    }

    #[test]
    fn test_fresh_create_inserts() {
        let d = ImportDisposition::classify(LinkAction::CreateResponse, false, false);
        assert_eq!(d, ImportDisposition::Insert);
    }

    #[test]
    fn test_edit_of_unknown_guid_rejected() {
        assert_eq!(
            ImportDisposition::classify(LinkAction::Edit, false, false),
            ImportDisposition::Reject
        );
        assert_eq!(
            ImportDisposition::classify(LinkAction::Delete, false, false),
            ImportDisposition::Reject
        );
    }

    #[test]
    fn test_old_guid_triggers_remap() {
        let d = ImportDisposition::classify(LinkAction::Edit, false, true);
        assert_eq!(d, ImportDisposition::RemapAndApply);
    }

    #[test]
    fn test_known_guid_wins_over_old_guid() {
        let d = ImportDisposition::classify(LinkAction::Edit, true, true);
        assert_eq!(d, ImportDisposition::ApplyToExisting);
    }

    #[test]
    fn test_envelope_json_round_trip() {
        let env = ActivityEnvelope {
            activity: LinkAction::CreateBase,
            link_guid: Uuid::new_v4(),
            old_link_guid: None,
            sender_file_name: "gossip".to_string(),
            secret: Some("s3cret".to_string()),
            note: Some(NotePayload {
                subject: "Hello".to_string(),
                author_id: "u1".to_string(),
                author_name: "User One".to_string(),
                body: "First post".to_string(),
                tag_line: "greetings".to_string(),
                director_message: None,
                base_link_guid: None,
                created_at: Utc::now(),
                last_edited: Utc::now(),
            }),
        };

        let json = serde_json::to_string(&env).unwrap();
        let back: ActivityEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back.activity, LinkAction::CreateBase);
        assert_eq!(back.link_guid, env.link_guid);
        assert_eq!(back.sender_file_name, "gossip");
        assert_eq!(back.note.unwrap().subject, "Hello");
    }

    #[test]
    fn test_delete_envelope_omits_payload_fields() {
        let env = ActivityEnvelope {
            activity: LinkAction::Delete,
            link_guid: Uuid::new_v4(),
            old_link_guid: None,
            sender_file_name: "gossip".to_string(),
            secret: None,
            note: None,
        };
        let json = serde_json::to_string(&env).unwrap();
        assert!(!json.contains("old_link_guid"));
        assert!(!json.contains("\"note\""));
        assert!(json.contains("\"activity\":\"delete\""));
    }
}
