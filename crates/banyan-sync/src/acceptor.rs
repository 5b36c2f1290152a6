//! Inbound replication: validate the shared secret, deduplicate by link
//! GUID, and apply the activity to the local store.
//!
//! Imported changes are not re-propagated to this instance's own linked
//! files; fan-out happens at the origin, which prevents echo loops
//! between mutually-linked files.

use tracing::{info, warn};

use banyan_core::{
    AccessRepository, ActivityEnvelope, CreateNoteRequest, EditNoteRequest, Error,
    ImportDisposition, LinkAction, LinkRepository, NoteHeader, NoteRepository, Result,
};
use banyan_db::Database;

/// What an accepted activity did locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptOutcome {
    /// A new note was inserted.
    Created(i64),
    /// An existing note was updated (including a deduplicated create).
    Updated(i64),
    /// An existing note was soft-deleted.
    Deleted(i64),
    /// The activity was dropped (unknown GUID for an edit/delete).
    Ignored,
}

/// Applies inbound activities from remote peers.
pub struct SyncAcceptor {
    db: Database,
}

impl SyncAcceptor {
    /// Create a new acceptor over the given database.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Validate and apply one inbound activity.
    ///
    /// Fails with `Forbidden` when no accepting LinkedFile row matches the
    /// sender's file name and secret; this is a capability check, not
    /// identity.
    pub async fn accept(&self, envelope: ActivityEnvelope) -> Result<AcceptOutcome> {
        let matches = self
            .db
            .access
            .test_link_access(&envelope.sender_file_name, envelope.secret.as_deref())
            .await?;

        let Some(link) = matches.first() else {
            self.db
                .links
                .log(
                    "in-reject",
                    &format!(
                        "refused {} from file '{}': no accepting link or bad secret",
                        envelope.activity.as_str(),
                        envelope.sender_file_name
                    ),
                )
                .await?;
            return Err(Error::Forbidden(format!(
                "no accepting link for remote file '{}'",
                envelope.sender_file_name
            )));
        };
        if matches.len() > 1 {
            warn!(
                subsystem = "sync",
                component = "acceptor",
                result_count = matches.len(),
                sender_file = %envelope.sender_file_name,
                "Multiple accepting links match; using the first"
            );
        }

        let existing = self.db.notes.get_header_by_guid(envelope.link_guid).await?;
        let old_existing = match envelope.old_link_guid {
            Some(old) => self.db.notes.get_header_by_guid(old).await?,
            None => None,
        };

        let disposition = ImportDisposition::classify(
            envelope.activity,
            existing.is_some(),
            old_existing.is_some(),
        );

        let outcome = match disposition {
            ImportDisposition::Insert => {
                self.insert_new(&envelope, link.home_file_id).await?
            }
            ImportDisposition::ApplyToExisting => {
                // Unwrap is safe: classify returned ApplyToExisting only
                // because `existing` is Some.
                let header = existing.ok_or_else(|| {
                    Error::Internal("disposition/lookup mismatch".to_string())
                })?;
                self.apply_to(&envelope, header).await?
            }
            ImportDisposition::RemapAndApply => {
                let header = old_existing.ok_or_else(|| {
                    Error::Internal("disposition/lookup mismatch".to_string())
                })?;
                self.db.notes.remap_guid(header.id, envelope.link_guid).await?;
                self.db
                    .links
                    .log(
                        "in-ok",
                        &format!(
                            "remapped guid {} -> {} on header {}",
                            envelope.old_link_guid.unwrap_or_default(),
                            envelope.link_guid,
                            header.id
                        ),
                    )
                    .await?;
                self.apply_to(&envelope, header).await?
            }
            ImportDisposition::Reject => {
                self.db
                    .links
                    .log(
                        "in-reject",
                        &format!(
                            "dropped {} for unknown guid {}",
                            envelope.activity.as_str(),
                            envelope.link_guid
                        ),
                    )
                    .await?;
                AcceptOutcome::Ignored
            }
        };

        info!(
            subsystem = "sync",
            component = "acceptor",
            op = "accept",
            link_guid = %envelope.link_guid,
            activity = envelope.activity.as_str(),
            "Inbound activity processed"
        );
        Ok(outcome)
    }

    async fn insert_new(
        &self,
        envelope: &ActivityEnvelope,
        home_file_id: i32,
    ) -> Result<AcceptOutcome> {
        let note = envelope.note.as_ref().ok_or_else(|| {
            Error::Integrity(format!(
                "create activity for guid {} carries no payload",
                envelope.link_guid
            ))
        })?;

        let base_header_id = match envelope.activity {
            LinkAction::CreateBase => 0,
            LinkAction::CreateResponse => {
                let base_guid = note.base_link_guid.ok_or_else(|| {
                    Error::Integrity(format!(
                        "response {} names no base note guid",
                        envelope.link_guid
                    ))
                })?;
                let base = self.db.notes.get_header_by_guid(base_guid).await?;
                match base {
                    Some(base) => base.id,
                    None => {
                        self.db
                            .links
                            .log(
                                "in-reject",
                                &format!(
                                    "response {} references unknown base guid {}",
                                    envelope.link_guid, base_guid
                                ),
                            )
                            .await?;
                        return Err(Error::Integrity(format!(
                            "unknown base note guid {base_guid}"
                        )));
                    }
                }
            }
            // classify() only routes creates here.
            LinkAction::Edit | LinkAction::Delete => {
                return Err(Error::Internal(
                    "insert disposition for non-create activity".to_string(),
                ))
            }
        };

        let header = self
            .db
            .notes
            .import_create(CreateNoteRequest {
                file_id: home_file_id,
                archive_id: 0,
                base_header_id,
                subject: note.subject.clone(),
                author_id: note.author_id.clone(),
                author_name: note.author_name.clone(),
                body: note.body.clone(),
                tag_line: note.tag_line.clone(),
                director_message: note.director_message.clone(),
                link_guid: Some(envelope.link_guid),
                ref_id: 0,
                created_at: Some(note.created_at),
            })
            .await?;

        self.db
            .links
            .log(
                "in-ok",
                &format!(
                    "imported {} as header {} (guid {})",
                    envelope.activity.as_str(),
                    header.id,
                    envelope.link_guid
                ),
            )
            .await?;
        Ok(AcceptOutcome::Created(header.id))
    }

    async fn apply_to(
        &self,
        envelope: &ActivityEnvelope,
        header: NoteHeader,
    ) -> Result<AcceptOutcome> {
        match envelope.activity {
            LinkAction::Delete => {
                self.db.notes.import_delete(header.id).await?;
                self.db
                    .links
                    .log(
                        "in-ok",
                        &format!("deleted header {} (guid {})", header.id, envelope.link_guid),
                    )
                    .await?;
                Ok(AcceptOutcome::Deleted(header.id))
            }
            // A re-delivered create lands here too: last processed wins.
            LinkAction::CreateBase | LinkAction::CreateResponse | LinkAction::Edit => {
                let note = envelope.note.as_ref().ok_or_else(|| {
                    Error::Integrity(format!(
                        "{} activity for guid {} carries no payload",
                        envelope.activity.as_str(),
                        envelope.link_guid
                    ))
                })?;
                let updated = self
                    .db
                    .notes
                    .import_edit(EditNoteRequest {
                        header_id: header.id,
                        subject: note.subject.clone(),
                        body: note.body.clone(),
                        tag_line: note.tag_line.clone(),
                        director_message: note.director_message.clone(),
                    })
                    .await?;
                self.db
                    .links
                    .log(
                        "in-ok",
                        &format!(
                            "applied {} to header {} (guid {})",
                            envelope.activity.as_str(),
                            updated.id,
                            envelope.link_guid
                        ),
                    )
                    .await?;
                Ok(AcceptOutcome::Updated(updated.id))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use banyan_core::NotePayload;
    use banyan_db::test_fixtures::{
        connect_test_pool, create_test_file, create_test_linked_file,
    };
    use chrono::Utc;
    use uuid::Uuid;

    fn envelope(
        action: LinkAction,
        guid: Uuid,
        sender: &str,
        body: &str,
        base_guid: Option<Uuid>,
    ) -> ActivityEnvelope {
        ActivityEnvelope {
            activity: action,
            link_guid: guid,
            old_link_guid: None,
            sender_file_name: sender.to_string(),
            secret: None,
            note: Some(NotePayload {
                subject: "imported".to_string(),
                author_id: "remote-user".to_string(),
                author_name: "Remote User".to_string(),
                body: body.to_string(),
                tag_line: String::new(),
                director_message: None,
                base_link_guid: base_guid,
                created_at: Utc::now(),
                last_edited: Utc::now(),
            }),
        }
    }

    #[tokio::test]
    #[ignore = "requires a PostgreSQL test database"]
    async fn test_duplicate_create_is_idempotent() {
        let pool = connect_test_pool().await;
        let file = create_test_file(&pool, "acc-dup").await;
        let lf = create_test_linked_file(&pool, &file, &file.name, false).await;
        let db = Database::new(pool);
        let acceptor = SyncAcceptor::new(db.clone());

        let guid = Uuid::new_v4();
        let env = envelope(LinkAction::CreateBase, guid, &lf.remote_file_name, "hello", None);

        let first = acceptor.accept(env.clone()).await.unwrap();
        let AcceptOutcome::Created(id) = first else {
            panic!("first delivery should create");
        };

        // Same GUID again: one logical note, treated as an edit.
        let second = acceptor.accept(env).await.unwrap();
        assert_eq!(second, AcceptOutcome::Updated(id));

        let count = db.notes.base_note_count(file.id, 0).await.unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    #[ignore = "requires a PostgreSQL test database"]
    async fn test_secret_mismatch_is_forbidden() {
        let pool = connect_test_pool().await;
        let file = create_test_file(&pool, "acc-sec").await;
        let lf = create_test_linked_file(&pool, &file, &file.name, false).await;
        sqlx::query("UPDATE linked_file SET secret = 'right' WHERE id = $1")
            .bind(lf.id)
            .execute(&pool)
            .await
            .unwrap();
        let acceptor = SyncAcceptor::new(Database::new(pool));

        let mut env =
            envelope(LinkAction::CreateBase, Uuid::new_v4(), &lf.remote_file_name, "x", None);
        env.secret = Some("wrong".to_string());

        let err = acceptor.accept(env).await.unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
    }

    #[tokio::test]
    #[ignore = "requires a PostgreSQL test database"]
    async fn test_response_threads_under_imported_base() {
        let pool = connect_test_pool().await;
        let file = create_test_file(&pool, "acc-thr").await;
        let lf = create_test_linked_file(&pool, &file, &file.name, false).await;
        let db = Database::new(pool);
        let acceptor = SyncAcceptor::new(db.clone());

        let base_guid = Uuid::new_v4();
        acceptor
            .accept(envelope(
                LinkAction::CreateBase,
                base_guid,
                &lf.remote_file_name,
                "base body",
                None,
            ))
            .await
            .unwrap();

        let resp_guid = Uuid::new_v4();
        let outcome = acceptor
            .accept(envelope(
                LinkAction::CreateResponse,
                resp_guid,
                &lf.remote_file_name,
                "reply body",
                Some(base_guid),
            ))
            .await
            .unwrap();

        let AcceptOutcome::Created(resp_id) = outcome else {
            panic!("response should be created");
        };
        let resp = db.notes.get_header(resp_id).await.unwrap();
        assert_eq!(resp.response_ordinal, 1);

        let base = db.notes.get_header_by_guid(base_guid).await.unwrap().unwrap();
        assert_eq!(resp.base_note_id, base.id);
        assert_eq!(db.notes.get_header(base.id).await.unwrap().response_count, 1);
    }

    #[tokio::test]
    #[ignore = "requires a PostgreSQL test database"]
    async fn test_edit_for_unknown_guid_is_ignored() {
        let pool = connect_test_pool().await;
        let file = create_test_file(&pool, "acc-unk").await;
        let lf = create_test_linked_file(&pool, &file, &file.name, false).await;
        let acceptor = SyncAcceptor::new(Database::new(pool));

        let outcome = acceptor
            .accept(envelope(
                LinkAction::Edit,
                Uuid::new_v4(),
                &lf.remote_file_name,
                "edit of nothing",
                None,
            ))
            .await
            .unwrap();
        assert_eq!(outcome, AcceptOutcome::Ignored);
    }

    #[tokio::test]
    #[ignore = "requires a PostgreSQL test database"]
    async fn test_old_guid_remaps_then_applies() {
        let pool = connect_test_pool().await;
        let file = create_test_file(&pool, "acc-rem").await;
        let lf = create_test_linked_file(&pool, &file, &file.name, false).await;
        let db = Database::new(pool);
        let acceptor = SyncAcceptor::new(db.clone());

        let old_guid = Uuid::new_v4();
        acceptor
            .accept(envelope(
                LinkAction::CreateBase,
                old_guid,
                &lf.remote_file_name,
                "original",
                None,
            ))
            .await
            .unwrap();

        // Sender re-created the note locally: new GUID, old one attached.
        let new_guid = Uuid::new_v4();
        let mut env = envelope(LinkAction::Edit, new_guid, &lf.remote_file_name, "rewritten", None);
        env.old_link_guid = Some(old_guid);

        let outcome = acceptor.accept(env).await.unwrap();
        let AcceptOutcome::Updated(id) = outcome else {
            panic!("remap should apply the edit");
        };

        // The stored GUID now follows the sender's new identity.
        let header = db.notes.get_header(id).await.unwrap();
        assert_eq!(header.link_guid, Some(new_guid));
        assert!(db.notes.get_header_by_guid(old_guid).await.unwrap().is_none());
        assert_eq!(db.notes.get_content(id).await.unwrap().body, "rewritten");
    }
}
