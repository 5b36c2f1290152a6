//! Sequencer repository: per-user cursors over note files and the pass
//! queries that make "show me only what's new" safe under concurrent
//! writes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use tracing::debug;

use banyan_core::{Error, NoteHeader, Result, Sequencer, SequencerRepository};

use crate::notes::HEADER_COLUMNS;

/// PostgreSQL implementation of SequencerRepository.
pub struct PgSequencerRepository {
    pool: Pool<Postgres>,
}

const SEQ_COLUMNS: &str = "user_id, file_id, ordinal, last_time, start_time, active";

impl PgSequencerRepository {
    /// Create a new PgSequencerRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SequencerRepository for PgSequencerRepository {
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Sequencer>> {
        let rows = sqlx::query_as::<_, Sequencer>(&format!(
            "SELECT {SEQ_COLUMNS} FROM sequencer
             WHERE user_id = $1
             ORDER BY ordinal, last_time"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows)
    }

    async fn get(&self, user_id: &str, file_id: i32) -> Result<Option<Sequencer>> {
        let row = sqlx::query_as::<_, Sequencer>(&format!(
            "SELECT {SEQ_COLUMNS} FROM sequencer WHERE user_id = $1 AND file_id = $2"
        ))
        .bind(user_id)
        .bind(file_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(row)
    }

    async fn create(&self, user_id: &str, file_id: i32) -> Result<Sequencer> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, Sequencer>(&format!(
            "INSERT INTO sequencer (user_id, file_id, ordinal, last_time, start_time, active)
             SELECT $1, $2, COALESCE(MAX(ordinal), 0) + 1, $3, $3, true
             FROM sequencer WHERE user_id = $1
             RETURNING {SEQ_COLUMNS}"
        ))
        .bind(user_id)
        .bind(file_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(row)
    }

    async fn delete(&self, user_id: &str, file_id: i32) -> Result<()> {
        let result = sqlx::query("DELETE FROM sequencer WHERE user_id = $1 AND file_id = $2")
            .bind(user_id)
            .bind(file_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!(
                "sequencer for user {user_id} on file {file_id}"
            )));
        }
        Ok(())
    }

    async fn update_position(
        &self,
        user_id: &str,
        file_id: i32,
        ordinal: i32,
        last_time: DateTime<Utc>,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE sequencer SET ordinal = $3, last_time = $4
             WHERE user_id = $1 AND file_id = $2",
        )
        .bind(user_id)
        .bind(file_id)
        .bind(ordinal)
        .bind(last_time)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!(
                "sequencer for user {user_id} on file {file_id}"
            )));
        }
        Ok(())
    }

    async fn start_pass(&self, user_id: &str, file_id: i32) -> Result<Vec<NoteHeader>> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let now = Utc::now();

        // Stamp the start time first; anything created from here on is
        // the next pass's business, which is what makes the high-water
        // advance in complete_pass safe.
        let last_time: Option<(DateTime<Utc>,)> = sqlx::query_as(
            "UPDATE sequencer SET active = true, start_time = $3
             WHERE user_id = $1 AND file_id = $2
             RETURNING last_time",
        )
        .bind(user_id)
        .bind(file_id)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let (last_time,) = last_time.ok_or_else(|| {
            Error::NotFound(format!("sequencer for user {user_id} on file {file_id}"))
        })?;

        let candidates = sqlx::query_as::<_, NoteHeader>(&format!(
            "SELECT {HEADER_COLUMNS} FROM note_header
             WHERE file_id = $1 AND archive_id = 0
               AND NOT is_deleted AND version = 0
               AND last_edited >= $2
             ORDER BY note_ordinal, response_ordinal"
        ))
        .bind(file_id)
        .bind(last_time)
        .fetch_all(&mut *tx)
        .await
        .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "sequencer",
            op = "start_pass",
            user_id = user_id,
            file_id = file_id,
            result_count = candidates.len(),
            "Sequencer pass started"
        );
        Ok(candidates)
    }

    async fn complete_pass(&self, user_id: &str, file_id: i32) -> Result<()> {
        // GREATEST keeps the invariant last_time <= start_time monotone
        // even against a replayed or out-of-order completion.
        let result = sqlx::query(
            "UPDATE sequencer
             SET active = false, last_time = GREATEST(last_time, start_time)
             WHERE user_id = $1 AND file_id = $2",
        )
        .bind(user_id)
        .bind(file_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!(
                "sequencer for user {user_id} on file {file_id}"
            )));
        }
        Ok(())
    }
}
