//! Tag repository: scoped tag listing.
//!
//! Tag rows are written by the note paths (create/edit set them from the
//! tag line); this repository covers the read side.

use sqlx::{Pool, Postgres};

use banyan_core::{Error, Result, Tag};

/// PostgreSQL tag repository.
pub struct PgTagRepository {
    pool: Pool<Postgres>,
}

impl PgTagRepository {
    /// Create a new PgTagRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// All tags in a (file, archive), ordered for display.
    pub async fn list_for_file(&self, file_id: i32, archive_id: i32) -> Result<Vec<Tag>> {
        let tags = sqlx::query_as::<_, Tag>(
            "SELECT tag, header_id, file_id, archive_id FROM tag
             WHERE file_id = $1 AND archive_id = $2
             ORDER BY tag, header_id",
        )
        .bind(file_id)
        .bind(archive_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(tags)
    }

    /// Headers in a (file, archive) carrying a given tag.
    pub async fn headers_with_tag(
        &self,
        file_id: i32,
        archive_id: i32,
        tag: &str,
    ) -> Result<Vec<i64>> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            "SELECT header_id FROM tag
             WHERE file_id = $1 AND archive_id = $2 AND tag = $3
             ORDER BY header_id",
        )
        .bind(file_id)
        .bind(archive_id)
        .bind(tag)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }
}
