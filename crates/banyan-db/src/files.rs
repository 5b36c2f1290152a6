//! Note-file repository: creation (with base access entries), renaming,
//! policy notes, and explicit ordered cascade deletion.

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use tracing::info;

use banyan_core::defaults::{FILE_NAME_MAX, FILE_TITLE_MAX};
use banyan_core::{Error, FileRepository, NoteFile, Result};

use crate::access::PgAccessRepository;

/// PostgreSQL implementation of FileRepository.
pub struct PgFileRepository {
    pool: Pool<Postgres>,
}

const FILE_COLUMNS: &str =
    "id, owner_id, name, title, num_archives, last_edited, policy_header_id, inhibit_versions";

impl PgFileRepository {
    /// Create a new PgFileRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn validate_name(name: &str, title: &str) -> Result<()> {
        if name.is_empty() || name.len() > FILE_NAME_MAX {
            return Err(Error::InvalidInput(format!(
                "file name must be 1..={FILE_NAME_MAX} characters"
            )));
        }
        if name.chars().any(char::is_whitespace) {
            return Err(Error::InvalidInput(
                "file name must not contain whitespace".to_string(),
            ));
        }
        if title.is_empty() || title.len() > FILE_TITLE_MAX {
            return Err(Error::InvalidInput(format!(
                "file title must be 1..={FILE_TITLE_MAX} characters"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl FileRepository for PgFileRepository {
    async fn create(&self, owner_id: &str, name: &str, title: &str) -> Result<NoteFile> {
        Self::validate_name(name, title)?;

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let file = sqlx::query_as::<_, NoteFile>(&format!(
            "INSERT INTO note_file (owner_id, name, title)
             VALUES ($1, $2, $3)
             RETURNING {FILE_COLUMNS}"
        ))
        .bind(owner_id)
        .bind(name)
        .bind(title)
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::Database)?;

        // Every file starts with an "Other" no-access row and an owner
        // full-access row.
        PgAccessRepository::create_base_entries_tx(&mut tx, owner_id, file.id).await?;

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "files",
            op = "create",
            file_id = file.id,
            name = %file.name,
            "Note file created"
        );
        Ok(file)
    }

    async fn get(&self, file_id: i32) -> Result<NoteFile> {
        sqlx::query_as::<_, NoteFile>(&format!(
            "SELECT {FILE_COLUMNS} FROM note_file WHERE id = $1"
        ))
        .bind(file_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .ok_or(Error::FileNotFound(file_id))
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<NoteFile>> {
        let file = sqlx::query_as::<_, NoteFile>(&format!(
            "SELECT {FILE_COLUMNS} FROM note_file WHERE name = $1"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(file)
    }

    async fn list(&self) -> Result<Vec<NoteFile>> {
        let files = sqlx::query_as::<_, NoteFile>(&format!(
            "SELECT {FILE_COLUMNS} FROM note_file ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(files)
    }

    async fn update(&self, file_id: i32, name: &str, title: &str) -> Result<NoteFile> {
        Self::validate_name(name, title)?;

        sqlx::query_as::<_, NoteFile>(&format!(
            "UPDATE note_file SET name = $2, title = $3 WHERE id = $1
             RETURNING {FILE_COLUMNS}"
        ))
        .bind(file_id)
        .bind(name)
        .bind(title)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .ok_or(Error::FileNotFound(file_id))
    }

    async fn set_policy(&self, file_id: i32, header_id: i64) -> Result<()> {
        let result = sqlx::query("UPDATE note_file SET policy_header_id = $2 WHERE id = $1")
            .bind(file_id)
            .bind(header_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        if result.rows_affected() == 0 {
            return Err(Error::FileNotFound(file_id));
        }
        Ok(())
    }

    async fn set_inhibit_versions(&self, file_id: i32, inhibit: bool) -> Result<()> {
        let result = sqlx::query("UPDATE note_file SET inhibit_versions = $2 WHERE id = $1")
            .bind(file_id)
            .bind(inhibit)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        if result.rows_affected() == 0 {
            return Err(Error::FileNotFound(file_id));
        }
        Ok(())
    }

    async fn delete(&self, file_id: i32) -> Result<()> {
        // Explicit cascade in dependency order. The schema carries no
        // ON DELETE actions, so getting this order wrong fails loudly on
        // a foreign key instead of silently orphaning rows.
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let exists: Option<(i32,)> = sqlx::query_as("SELECT id FROM note_file WHERE id = $1")
            .bind(file_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(Error::Database)?;
        if exists.is_none() {
            return Err(Error::FileNotFound(file_id));
        }

        sqlx::query("DELETE FROM tag WHERE file_id = $1")
            .bind(file_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        sqlx::query(
            "DELETE FROM note_content
             WHERE header_id IN (SELECT id FROM note_header WHERE file_id = $1)",
        )
        .bind(file_id)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;
        sqlx::query("DELETE FROM note_header WHERE file_id = $1")
            .bind(file_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        sqlx::query("DELETE FROM note_access WHERE file_id = $1")
            .bind(file_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        sqlx::query(
            "DELETE FROM link_queue
             WHERE linked_file_id IN (SELECT id FROM linked_file WHERE home_file_id = $1)",
        )
        .bind(file_id)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;
        sqlx::query("DELETE FROM linked_file WHERE home_file_id = $1")
            .bind(file_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        sqlx::query("DELETE FROM sequencer WHERE file_id = $1")
            .bind(file_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        sqlx::query("DELETE FROM mark WHERE file_id = $1")
            .bind(file_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        sqlx::query("DELETE FROM note_file WHERE id = $1")
            .bind(file_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "files",
            op = "delete",
            file_id = file_id,
            "Note file deleted with cascade"
        );
        Ok(())
    }
}
