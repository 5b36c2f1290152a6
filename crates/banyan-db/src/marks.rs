//! Mark repository: saved pointers into threads, used to bookmark
//! output selections.

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use banyan_core::{Error, Mark, MarkRepository, Result};

/// PostgreSQL implementation of MarkRepository.
pub struct PgMarkRepository {
    pool: Pool<Postgres>,
}

const MARK_COLUMNS: &str =
    "user_id, file_id, archive_id, mark_ordinal, note_ordinal, header_id, response_ordinal";

impl PgMarkRepository {
    /// Create a new PgMarkRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MarkRepository for PgMarkRepository {
    async fn list(&self, user_id: &str, file_id: i32) -> Result<Vec<Mark>> {
        let rows = sqlx::query_as::<_, Mark>(&format!(
            "SELECT {MARK_COLUMNS} FROM mark
             WHERE user_id = $1 AND file_id = $2
             ORDER BY mark_ordinal"
        ))
        .bind(user_id)
        .bind(file_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows)
    }

    async fn add(&self, mark: &Mark) -> Result<Mark> {
        if mark.response_ordinal < -1 {
            return Err(Error::InvalidInput(
                "mark response ordinal must be -1, 0, or positive".to_string(),
            ));
        }
        let row = sqlx::query_as::<_, Mark>(&format!(
            "INSERT INTO mark (user_id, file_id, archive_id, mark_ordinal, note_ordinal,
                 header_id, response_ordinal)
             SELECT $1, $2, $3, COALESCE(MAX(mark_ordinal), 0) + 1, $4, $5, $6
             FROM mark WHERE user_id = $1 AND file_id = $2
             RETURNING {MARK_COLUMNS}"
        ))
        .bind(&mark.user_id)
        .bind(mark.file_id)
        .bind(mark.archive_id)
        .bind(mark.note_ordinal)
        .bind(mark.header_id)
        .bind(mark.response_ordinal)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(row)
    }

    async fn remove(&self, user_id: &str, file_id: i32, mark_ordinal: i32) -> Result<()> {
        let result = sqlx::query(
            "DELETE FROM mark WHERE user_id = $1 AND file_id = $2 AND mark_ordinal = $3",
        )
        .bind(user_id)
        .bind(file_id)
        .bind(mark_ordinal)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!(
                "mark {mark_ordinal} for user {user_id} on file {file_id}"
            )));
        }
        Ok(())
    }

    async fn clear(&self, user_id: &str, file_id: i32) -> Result<()> {
        sqlx::query("DELETE FROM mark WHERE user_id = $1 AND file_id = $2")
            .bind(user_id)
            .bind(file_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }
}
