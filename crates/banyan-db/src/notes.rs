//! Thread/Ordinal Manager: note and response creation, in-place edit with
//! version archiving, soft delete, thread copy, and the header query
//! surface.
//!
//! Ordinal allocation is serialized by the unique index on
//! (file, archive, note_ordinal, response_ordinal, version): concurrent
//! creators race, the loser recomputes and retries once.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use banyan_core::defaults::ORDINAL_RETRIES;
use banyan_core::{
    parse_tag_line, CreateNoteRequest, EditNoteRequest, Error, HeaderSelector, LinkAction,
    NoteContent, NoteHeader, NoteRepository, Result, Tag,
};

/// PostgreSQL implementation of NoteRepository.
pub struct PgNoteRepository {
    pool: Pool<Postgres>,
}

pub(crate) const HEADER_COLUMNS: &str = "id, file_id, archive_id, base_note_id, note_ordinal, \
     response_ordinal, response_count, subject, author_id, author_name, created_at, \
     last_edited, thread_last_edited, link_guid, ref_id, is_deleted, version, director_message";

impl PgNoteRepository {
    /// Create a new PgNoteRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    // =========================================================================
    // TRANSACTION HELPERS
    // =========================================================================

    async fn fetch_header_tx(
        tx: &mut Transaction<'_, Postgres>,
        header_id: i64,
        for_update: bool,
    ) -> Result<NoteHeader> {
        let suffix = if for_update { " FOR UPDATE" } else { "" };
        sqlx::query_as::<_, NoteHeader>(&format!(
            "SELECT {HEADER_COLUMNS} FROM note_header WHERE id = $1{suffix}"
        ))
        .bind(header_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?
        .ok_or(Error::NoteNotFound(header_id))
    }

    async fn insert_header_tx(
        tx: &mut Transaction<'_, Postgres>,
        template: &NoteHeader,
    ) -> Result<NoteHeader> {
        sqlx::query_as::<_, NoteHeader>(&format!(
            "INSERT INTO note_header (file_id, archive_id, base_note_id, note_ordinal,
                 response_ordinal, response_count, subject, author_id, author_name,
                 created_at, last_edited, thread_last_edited, link_guid, ref_id,
                 is_deleted, version, director_message)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
             RETURNING {HEADER_COLUMNS}"
        ))
        .bind(template.file_id)
        .bind(template.archive_id)
        .bind(template.base_note_id)
        .bind(template.note_ordinal)
        .bind(template.response_ordinal)
        .bind(template.response_count)
        .bind(&template.subject)
        .bind(&template.author_id)
        .bind(&template.author_name)
        .bind(template.created_at)
        .bind(template.last_edited)
        .bind(template.thread_last_edited)
        .bind(template.link_guid)
        .bind(template.ref_id)
        .bind(template.is_deleted)
        .bind(template.version)
        .bind(&template.director_message)
        .fetch_one(&mut **tx)
        .await
        .map_err(Error::Database)
    }

    async fn write_content_tx(
        tx: &mut Transaction<'_, Postgres>,
        header_id: i64,
        body: &str,
    ) -> Result<()> {
        sqlx::query("INSERT INTO note_content (header_id, body) VALUES ($1, $2)")
            .bind(header_id)
            .bind(body)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn set_tags_tx(
        tx: &mut Transaction<'_, Postgres>,
        header: &NoteHeader,
        tag_line: &str,
    ) -> Result<()> {
        sqlx::query("DELETE FROM tag WHERE header_id = $1")
            .bind(header.id)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;

        for tag in parse_tag_line(tag_line) {
            sqlx::query(
                "INSERT INTO tag (tag, header_id, file_id, archive_id) VALUES ($1, $2, $3, $4)",
            )
            .bind(&tag)
            .bind(header.id)
            .bind(header.file_id)
            .bind(header.archive_id)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        }
        Ok(())
    }

    async fn touch_file_tx(
        tx: &mut Transaction<'_, Postgres>,
        file_id: i32,
        now: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query("UPDATE note_file SET last_edited = $2 WHERE id = $1")
            .bind(file_id)
            .bind(now)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    /// Ensure the header carries a link GUID, minting and persisting one
    /// when absent. Returns the GUID.
    async fn ensure_guid_tx(
        tx: &mut Transaction<'_, Postgres>,
        header: &mut NoteHeader,
    ) -> Result<Uuid> {
        if let Some(guid) = header.link_guid {
            return Ok(guid);
        }
        let guid = Uuid::new_v4();
        sqlx::query("UPDATE note_header SET link_guid = $2 WHERE id = $1")
            .bind(header.id)
            .bind(guid)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        header.link_guid = Some(guid);
        Ok(guid)
    }

    /// Enqueue one LinkQueue row per send-to linked file of the header's
    /// file, inside the committing transaction. Notes in unlinked files
    /// never receive a GUID and nothing is enqueued.
    async fn enqueue_links_tx(
        tx: &mut Transaction<'_, Postgres>,
        header: &mut NoteHeader,
        action: LinkAction,
    ) -> Result<()> {
        let links: Vec<(i32, String, Option<String>)> = sqlx::query_as(
            "SELECT id, remote_base_uri, secret FROM linked_file
             WHERE home_file_id = $1 AND send_to",
        )
        .bind(header.file_id)
        .fetch_all(&mut **tx)
        .await
        .map_err(Error::Database)?;

        if links.is_empty() {
            return Ok(());
        }

        let guid = Self::ensure_guid_tx(tx, header).await?;

        // A response references its thread root on the remote side by the
        // base note's GUID; mint it here so the payload can be built.
        if !header.is_base() {
            let mut base = Self::fetch_header_tx(tx, header.base_note_id, false).await?;
            Self::ensure_guid_tx(tx, &mut base).await?;
        }

        for (linked_file_id, base_uri, secret) in links {
            sqlx::query(
                "INSERT INTO link_queue (linked_file_id, link_guid, activity, base_uri, secret)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(linked_file_id)
            .bind(guid)
            .bind(action.as_str())
            .bind(&base_uri)
            .bind(&secret)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;

            debug!(
                subsystem = "db",
                component = "notes",
                op = "enqueue",
                linked_file_id = linked_file_id,
                link_guid = %guid,
                activity = action.as_str(),
                "Replication activity enqueued"
            );
        }
        Ok(())
    }

    // =========================================================================
    // CREATE PATHS (with ordinal-conflict retry)
    // =========================================================================

    async fn create_base_attempt(
        &self,
        req: &CreateNoteRequest,
        replicate: bool,
    ) -> Result<NoteHeader> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let now = Utc::now();
        let created = req.created_at.unwrap_or(now);

        let (max_ordinal,): (Option<i32>,) = sqlx::query_as(
            "SELECT MAX(note_ordinal) FROM note_header WHERE file_id = $1 AND archive_id = $2",
        )
        .bind(req.file_id)
        .bind(req.archive_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let template = NoteHeader {
            id: 0,
            file_id: req.file_id,
            archive_id: req.archive_id,
            base_note_id: 0,
            note_ordinal: max_ordinal.unwrap_or(0) + 1,
            response_ordinal: 0,
            response_count: 0,
            subject: req.subject.clone(),
            author_id: req.author_id.clone(),
            author_name: req.author_name.clone(),
            created_at: created,
            last_edited: created,
            thread_last_edited: created,
            link_guid: req.link_guid,
            ref_id: req.ref_id,
            is_deleted: false,
            version: 0,
            director_message: req.director_message.clone(),
        };

        let mut header = Self::insert_header_tx(&mut tx, &template).await?;
        Self::write_content_tx(&mut tx, header.id, &req.body).await?;
        Self::set_tags_tx(&mut tx, &header, &req.tag_line).await?;
        Self::touch_file_tx(&mut tx, req.file_id, now).await?;
        if replicate {
            Self::enqueue_links_tx(&mut tx, &mut header, LinkAction::CreateBase).await?;
        }

        tx.commit().await.map_err(Error::Database)?;
        Ok(header)
    }

    async fn create_response_attempt(
        &self,
        req: &CreateNoteRequest,
        replicate: bool,
    ) -> Result<NoteHeader> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let now = Utc::now();
        let created = req.created_at.unwrap_or(now);

        // Lock the base row so concurrent responders serialize on the
        // response count.
        let base = Self::fetch_header_tx(&mut tx, req.base_header_id, true).await?;
        if !base.is_base() || base.version != 0 {
            return Err(Error::Integrity(format!(
                "header {} is not a current base note",
                req.base_header_id
            )));
        }
        if base.file_id != req.file_id || base.archive_id != req.archive_id {
            return Err(Error::Integrity(format!(
                "base note {} belongs to a different file or archive",
                base.id
            )));
        }

        let template = NoteHeader {
            id: 0,
            file_id: req.file_id,
            archive_id: req.archive_id,
            base_note_id: base.id,
            note_ordinal: base.note_ordinal,
            response_ordinal: base.response_count + 1,
            response_count: 0,
            subject: req.subject.clone(),
            author_id: req.author_id.clone(),
            author_name: req.author_name.clone(),
            created_at: created,
            last_edited: created,
            thread_last_edited: created,
            link_guid: req.link_guid,
            ref_id: req.ref_id,
            is_deleted: false,
            version: 0,
            director_message: req.director_message.clone(),
        };

        let mut header = Self::insert_header_tx(&mut tx, &template).await?;
        Self::write_content_tx(&mut tx, header.id, &req.body).await?;
        Self::set_tags_tx(&mut tx, &header, &req.tag_line).await?;

        sqlx::query(
            "UPDATE note_header SET response_count = $2, thread_last_edited = $3 WHERE id = $1",
        )
        .bind(base.id)
        .bind(header.response_ordinal)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        Self::touch_file_tx(&mut tx, req.file_id, now).await?;
        if replicate {
            Self::enqueue_links_tx(&mut tx, &mut header, LinkAction::CreateResponse).await?;
        }

        tx.commit().await.map_err(Error::Database)?;
        Ok(header)
    }

    async fn create_base_retrying(
        &self,
        req: &CreateNoteRequest,
        replicate: bool,
    ) -> Result<NoteHeader> {
        let mut tries = 0;
        loop {
            match self.create_base_attempt(req, replicate).await {
                Ok(header) => return Ok(header),
                Err(e) if e.is_unique_violation() && tries < ORDINAL_RETRIES => {
                    tries += 1;
                    debug!(
                        subsystem = "db",
                        component = "notes",
                        op = "ordinal_retry",
                        file_id = req.file_id,
                        "Lost ordinal race, recomputing"
                    );
                }
                Err(e) if e.is_unique_violation() => {
                    return Err(Error::OrdinalConflict {
                        file_id: req.file_id,
                        detail: "retry exhausted".to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn create_response_retrying(
        &self,
        req: &CreateNoteRequest,
        replicate: bool,
    ) -> Result<NoteHeader> {
        let mut tries = 0;
        loop {
            match self.create_response_attempt(req, replicate).await {
                Ok(header) => return Ok(header),
                Err(e) if e.is_unique_violation() && tries < ORDINAL_RETRIES => {
                    tries += 1;
                    debug!(
                        subsystem = "db",
                        component = "notes",
                        op = "ordinal_retry",
                        file_id = req.file_id,
                        "Lost response ordinal race, recomputing"
                    );
                }
                Err(e) if e.is_unique_violation() => {
                    return Err(Error::OrdinalConflict {
                        file_id: req.file_id,
                        detail: "retry exhausted".to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }

    // =========================================================================
    // IMPORT PATHS (used by the replication acceptor)
    // =========================================================================
    //
    // Imported activities are not re-propagated: fan-out happens at the
    // origin instance, which prevents echo loops between mutually-linked
    // files.

    /// Insert an imported base note or response without enqueueing.
    pub async fn import_create(&self, req: CreateNoteRequest) -> Result<NoteHeader> {
        if req.base_header_id == 0 {
            self.create_base_retrying(&req, false).await
        } else {
            self.create_response_retrying(&req, false).await
        }
    }

    /// Apply an imported edit without enqueueing.
    pub async fn import_edit(&self, req: EditNoteRequest) -> Result<NoteHeader> {
        self.edit_inner(req, false).await
    }

    /// Apply an imported delete without enqueueing.
    pub async fn import_delete(&self, header_id: i64) -> Result<()> {
        self.delete_inner(header_id, false).await
    }

    /// Rewrite a header's link GUID (the local-recreation re-mapping case).
    pub async fn remap_guid(&self, header_id: i64, new_guid: Uuid) -> Result<()> {
        let result = sqlx::query("UPDATE note_header SET link_guid = $2 WHERE id = $1")
            .bind(header_id)
            .bind(new_guid)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        if result.rows_affected() == 0 {
            return Err(Error::NoteNotFound(header_id));
        }
        Ok(())
    }

    // =========================================================================
    // EDIT / DELETE INNER
    // =========================================================================

    async fn edit_inner(&self, req: EditNoteRequest, replicate: bool) -> Result<NoteHeader> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let now = Utc::now();

        let header = Self::fetch_header_tx(&mut tx, req.header_id, true).await?;
        if header.version != 0 {
            return Err(Error::InvalidInput(format!(
                "header {} is an archived version and cannot be edited",
                header.id
            )));
        }

        let (inhibit_versions,): (bool,) =
            sqlx::query_as("SELECT inhibit_versions FROM note_file WHERE id = $1")
                .bind(header.file_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(Error::Database)?
                .ok_or(Error::FileNotFound(header.file_id))?;

        if !inhibit_versions {
            // Freeze the current revision: clone header and body to the
            // next version number before updating version 0 in place.
            let (max_version,): (Option<i32>,) = sqlx::query_as(
                "SELECT MAX(version) FROM note_header
                 WHERE file_id = $1 AND archive_id = $2
                   AND note_ordinal = $3 AND response_ordinal = $4",
            )
            .bind(header.file_id)
            .bind(header.archive_id)
            .bind(header.note_ordinal)
            .bind(header.response_ordinal)
            .fetch_one(&mut *tx)
            .await
            .map_err(Error::Database)?;

            let frozen = NoteHeader {
                id: 0,
                version: max_version.unwrap_or(0) + 1,
                link_guid: None,
                ..header.clone()
            };
            let frozen = Self::insert_header_tx(&mut tx, &frozen).await?;

            let old_body: (String,) =
                sqlx::query_as("SELECT body FROM note_content WHERE header_id = $1")
                    .bind(header.id)
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(Error::Database)?;
            Self::write_content_tx(&mut tx, frozen.id, &old_body.0).await?;
        }

        let mut updated = sqlx::query_as::<_, NoteHeader>(&format!(
            "UPDATE note_header
             SET subject = $2, director_message = $3, last_edited = $4, thread_last_edited = $4
             WHERE id = $1
             RETURNING {HEADER_COLUMNS}"
        ))
        .bind(header.id)
        .bind(&req.subject)
        .bind(&req.director_message)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::Database)?;

        // A response's change bubbles up to the thread root.
        if !updated.is_base() {
            sqlx::query("UPDATE note_header SET thread_last_edited = $2 WHERE id = $1")
                .bind(updated.base_note_id)
                .bind(now)
                .execute(&mut *tx)
                .await
                .map_err(Error::Database)?;
        }

        sqlx::query("UPDATE note_content SET body = $2 WHERE header_id = $1")
            .bind(header.id)
            .bind(&req.body)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        Self::set_tags_tx(&mut tx, &updated, &req.tag_line).await?;
        Self::touch_file_tx(&mut tx, updated.file_id, now).await?;
        if replicate {
            Self::enqueue_links_tx(&mut tx, &mut updated, LinkAction::Edit).await?;
        }

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "notes",
            op = "edit",
            header_id = updated.id,
            file_id = updated.file_id,
            "Note edited"
        );
        Ok(updated)
    }

    async fn delete_inner(&self, header_id: i64, replicate: bool) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let now = Utc::now();

        let mut header = Self::fetch_header_tx(&mut tx, header_id, true).await?;
        if header.version != 0 {
            return Err(Error::InvalidInput(format!(
                "header {header_id} is an archived version and cannot be deleted"
            )));
        }

        sqlx::query("UPDATE note_header SET is_deleted = true WHERE id = $1")
            .bind(header_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        if !header.is_base() {
            sqlx::query("UPDATE note_header SET thread_last_edited = $2 WHERE id = $1")
                .bind(header.base_note_id)
                .bind(now)
                .execute(&mut *tx)
                .await
                .map_err(Error::Database)?;
        }

        Self::touch_file_tx(&mut tx, header.file_id, now).await?;
        if replicate {
            Self::enqueue_links_tx(&mut tx, &mut header, LinkAction::Delete).await?;
        }

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "notes",
            op = "delete",
            header_id = header_id,
            file_id = header.file_id,
            "Note soft-deleted"
        );
        Ok(())
    }

    /// Format the provenance banner prefixed to copied note bodies.
    fn copy_banner(file_name: &str, header: &NoteHeader) -> String {
        format!(
            "<div class=\"copiednote\">From: {} - {} - {} - {}</div>\n",
            file_name,
            header.subject,
            header.author_name,
            header.created_at.format("%Y-%m-%d")
        )
    }
}

#[async_trait]
impl NoteRepository for PgNoteRepository {
    async fn create_base(&self, req: CreateNoteRequest) -> Result<NoteHeader> {
        if req.base_header_id != 0 {
            return Err(Error::InvalidInput(
                "create_base called with a base_header_id".to_string(),
            ));
        }
        self.create_base_retrying(&req, true).await
    }

    async fn create_response(&self, req: CreateNoteRequest) -> Result<NoteHeader> {
        if req.base_header_id == 0 {
            return Err(Error::Integrity(
                "create_response requires a base note id".to_string(),
            ));
        }
        self.create_response_retrying(&req, true).await
    }

    async fn edit(&self, req: EditNoteRequest) -> Result<NoteHeader> {
        self.edit_inner(req, true).await
    }

    async fn delete(&self, header_id: i64) -> Result<()> {
        self.delete_inner(header_id, true).await
    }

    async fn copy(
        &self,
        header_id: i64,
        target_file_id: i32,
        whole_thread: bool,
        copier_id: &str,
        copier_name: &str,
    ) -> Result<NoteHeader> {
        let source = self.get_header(header_id).await?;

        let (source_file_name,): (String,) =
            sqlx::query_as("SELECT name FROM note_file WHERE id = $1")
                .bind(source.file_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(Error::Database)?
                .ok_or(Error::FileNotFound(source.file_id))?;

        // Copying a thread always starts from its base note.
        let root = if whole_thread && !source.is_base() {
            self.get_header(source.base_note_id).await?
        } else {
            source
        };

        let content = self.get_content(root.id).await?;
        let tags = self.tags_for_header(root.id).await?;
        let tag_line = tags.iter().map(|t| t.tag.clone()).collect::<Vec<_>>().join(" ");

        let make_request = |header: &NoteHeader, body: String, tag_line: String, base: i64| {
            CreateNoteRequest {
                file_id: target_file_id,
                archive_id: 0,
                base_header_id: base,
                subject: header.subject.clone(),
                author_id: copier_id.to_string(),
                author_name: copier_name.to_string(),
                body,
                tag_line,
                director_message: header.director_message.clone(),
                link_guid: None,
                ref_id: 0,
                created_at: None,
            }
        };

        let body = Self::copy_banner(&source_file_name, &root) + &content.body;
        let new_base = self
            .create_base(make_request(&root, body, tag_line, 0))
            .await?;

        if whole_thread {
            for ordinal in 1..=root.response_count {
                let response = sqlx::query_as::<_, NoteHeader>(&format!(
                    "SELECT {HEADER_COLUMNS} FROM note_header
                     WHERE file_id = $1 AND archive_id = $2 AND note_ordinal = $3
                       AND response_ordinal = $4 AND version = 0 AND NOT is_deleted"
                ))
                .bind(root.file_id)
                .bind(root.archive_id)
                .bind(root.note_ordinal)
                .bind(ordinal)
                .fetch_optional(&self.pool)
                .await
                .map_err(Error::Database)?;

                let Some(response) = response else {
                    continue; // deleted responses leave ordinal gaps
                };

                let content = self.get_content(response.id).await?;
                let tags = self.tags_for_header(response.id).await?;
                let tag_line =
                    tags.iter().map(|t| t.tag.clone()).collect::<Vec<_>>().join(" ");
                let body = Self::copy_banner(&source_file_name, &response) + &content.body;

                self.create_response(make_request(&response, body, tag_line, new_base.id))
                    .await?;
            }
        }

        info!(
            subsystem = "db",
            component = "notes",
            op = "copy",
            header_id = header_id,
            file_id = target_file_id,
            whole_thread = whole_thread,
            "Note copied"
        );
        Ok(new_base)
    }

    async fn get_header(&self, header_id: i64) -> Result<NoteHeader> {
        sqlx::query_as::<_, NoteHeader>(&format!(
            "SELECT {HEADER_COLUMNS} FROM note_header WHERE id = $1"
        ))
        .bind(header_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .ok_or(Error::NoteNotFound(header_id))
    }

    async fn get_header_by_guid(&self, guid: Uuid) -> Result<Option<NoteHeader>> {
        let header = sqlx::query_as::<_, NoteHeader>(&format!(
            "SELECT {HEADER_COLUMNS} FROM note_header WHERE link_guid = $1 AND version = 0"
        ))
        .bind(guid)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(header)
    }

    async fn get_content(&self, header_id: i64) -> Result<NoteContent> {
        sqlx::query_as::<_, NoteContent>(
            "SELECT header_id, body FROM note_content WHERE header_id = $1",
        )
        .bind(header_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .ok_or_else(|| Error::NotFound(format!("content for header {header_id}")))
    }

    async fn tags_for_header(&self, header_id: i64) -> Result<Vec<Tag>> {
        let tags = sqlx::query_as::<_, Tag>(
            "SELECT tag, header_id, file_id, archive_id FROM tag
             WHERE header_id = $1 ORDER BY tag",
        )
        .bind(header_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(tags)
    }

    async fn list_headers(
        &self,
        file_id: i32,
        archive_id: i32,
        selector: HeaderSelector,
    ) -> Result<Vec<NoteHeader>> {
        let base = format!(
            "SELECT {HEADER_COLUMNS} FROM note_header
             WHERE file_id = $1 AND archive_id = $2 AND NOT is_deleted AND version = 0"
        );

        let rows = match selector {
            HeaderSelector::All => {
                sqlx::query_as::<_, NoteHeader>(&format!(
                    "{base} ORDER BY note_ordinal, response_ordinal"
                ))
                .bind(file_id)
                .bind(archive_id)
                .fetch_all(&self.pool)
                .await
            }
            HeaderSelector::OrdinalRange { min, max } => {
                sqlx::query_as::<_, NoteHeader>(&format!(
                    "{base} AND note_ordinal >= $3 AND note_ordinal <= $4
                     ORDER BY note_ordinal, response_ordinal"
                ))
                .bind(file_id)
                .bind(archive_id)
                .bind(min)
                .bind(max)
                .fetch_all(&self.pool)
                .await
            }
            HeaderSelector::BasesOnly => {
                sqlx::query_as::<_, NoteHeader>(&format!(
                    "{base} AND response_ordinal = 0 ORDER BY note_ordinal"
                ))
                .bind(file_id)
                .bind(archive_id)
                .fetch_all(&self.pool)
                .await
            }
            HeaderSelector::Thread { note_ordinal } => {
                sqlx::query_as::<_, NoteHeader>(&format!(
                    "{base} AND note_ordinal = $3 ORDER BY response_ordinal"
                ))
                .bind(file_id)
                .bind(archive_id)
                .bind(note_ordinal)
                .fetch_all(&self.pool)
                .await
            }
            HeaderSelector::Single {
                note_ordinal,
                response_ordinal,
            } => {
                sqlx::query_as::<_, NoteHeader>(&format!(
                    "{base} AND note_ordinal = $3 AND response_ordinal = $4"
                ))
                .bind(file_id)
                .bind(archive_id)
                .bind(note_ordinal)
                .bind(response_ordinal)
                .fetch_all(&self.pool)
                .await
            }
        };

        rows.map_err(Error::Database)
    }

    async fn get_versions(
        &self,
        file_id: i32,
        archive_id: i32,
        note_ordinal: i32,
        response_ordinal: i32,
    ) -> Result<Vec<NoteHeader>> {
        let versions = sqlx::query_as::<_, NoteHeader>(&format!(
            "SELECT {HEADER_COLUMNS} FROM note_header
             WHERE file_id = $1 AND archive_id = $2
               AND note_ordinal = $3 AND response_ordinal = $4 AND version != 0
             ORDER BY version"
        ))
        .bind(file_id)
        .bind(archive_id)
        .bind(note_ordinal)
        .bind(response_ordinal)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(versions)
    }

    async fn base_note_count(&self, file_id: i32, archive_id: i32) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM note_header
             WHERE file_id = $1 AND archive_id = $2 AND response_ordinal = 0
               AND NOT is_deleted AND version = 0",
        )
        .bind(file_id)
        .bind(archive_id)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_banner_format() {
        let header = NoteHeader {
            id: 1,
            file_id: 7,
            archive_id: 0,
            base_note_id: 0,
            note_ordinal: 1,
            response_ordinal: 0,
            response_count: 0,
            subject: "Weekly plan".to_string(),
            author_id: "u1".to_string(),
            author_name: "Ada".to_string(),
            created_at: chrono::DateTime::parse_from_rfc3339("2026-03-05T10:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            last_edited: Utc::now(),
            thread_last_edited: Utc::now(),
            link_guid: None,
            ref_id: 0,
            is_deleted: false,
            version: 0,
            director_message: None,
        };
        let banner = PgNoteRepository::copy_banner("planning", &header);
        assert_eq!(
            banner,
            "<div class=\"copiednote\">From: planning - Weekly plan - Ada - 2026-03-05</div>\n"
        );
    }
}
