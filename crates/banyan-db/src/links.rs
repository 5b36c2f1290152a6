//! Linked-file configuration, the durable replication outbox, and the
//! append-only audit log.

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use banyan_core::{Error, LinkLogEntry, LinkQueueEntry, LinkRepository, LinkedFile, Result};

/// PostgreSQL implementation of LinkRepository.
pub struct PgLinkRepository {
    pool: Pool<Postgres>,
}

const LINKED_FILE_COLUMNS: &str = "id, home_file_id, home_file_name, remote_file_name, \
     remote_base_uri, accept_from, send_to, secret";

const QUEUE_COLUMNS: &str =
    "id, linked_file_id, link_guid, activity, base_uri, enqueued, secret, old_link_guid";

impl PgLinkRepository {
    /// Create a new PgLinkRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LinkRepository for PgLinkRepository {
    async fn linked_files_for(&self, file_id: i32) -> Result<Vec<LinkedFile>> {
        let rows = sqlx::query_as::<_, LinkedFile>(&format!(
            "SELECT {LINKED_FILE_COLUMNS} FROM linked_file WHERE home_file_id = $1 ORDER BY id"
        ))
        .bind(file_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows)
    }

    async fn get_linked_file(&self, id: i32) -> Result<LinkedFile> {
        sqlx::query_as::<_, LinkedFile>(&format!(
            "SELECT {LINKED_FILE_COLUMNS} FROM linked_file WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .ok_or_else(|| Error::NotFound(format!("linked file {id}")))
    }

    async fn create_linked_file(&self, lf: &LinkedFile) -> Result<LinkedFile> {
        let row = sqlx::query_as::<_, LinkedFile>(&format!(
            "INSERT INTO linked_file (home_file_id, home_file_name, remote_file_name,
                 remote_base_uri, accept_from, send_to, secret)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {LINKED_FILE_COLUMNS}"
        ))
        .bind(lf.home_file_id)
        .bind(&lf.home_file_name)
        .bind(&lf.remote_file_name)
        .bind(&lf.remote_base_uri)
        .bind(lf.accept_from)
        .bind(lf.send_to)
        .bind(&lf.secret)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(row)
    }

    async fn delete_linked_file(&self, id: i32) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        sqlx::query("DELETE FROM link_queue WHERE linked_file_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        sqlx::query("DELETE FROM linked_file WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    async fn enqueue(
        &self,
        linked_file_id: i32,
        guid: Uuid,
        activity: &str,
        base_uri: &str,
        secret: Option<&str>,
        old_guid: Option<Uuid>,
    ) -> Result<i64> {
        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO link_queue (linked_file_id, link_guid, activity, base_uri, secret,
                 old_link_guid)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id",
        )
        .bind(linked_file_id)
        .bind(guid)
        .bind(activity)
        .bind(base_uri)
        .bind(secret)
        .bind(old_guid)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(id)
    }

    async fn pending(&self, limit: i64) -> Result<Vec<LinkQueueEntry>> {
        let rows = sqlx::query_as::<_, LinkQueueEntry>(&format!(
            "SELECT {QUEUE_COLUMNS} FROM link_queue
             WHERE NOT enqueued
             ORDER BY linked_file_id, id
             LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows)
    }

    async fn mark_enqueued(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE link_queue SET enqueued = true WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn complete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM link_queue WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn release(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE link_queue SET enqueued = false WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn release_stale(&self) -> Result<u64> {
        let result = sqlx::query("UPDATE link_queue SET enqueued = false WHERE enqueued")
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }

    async fn log(&self, event_type: &str, event: &str) -> Result<()> {
        sqlx::query("INSERT INTO link_log (event_type, event) VALUES ($1, $2)")
            .bind(event_type)
            .bind(event)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn list_log(&self, limit: i64) -> Result<Vec<LinkLogEntry>> {
        let rows = sqlx::query_as::<_, LinkLogEntry>(
            "SELECT id, event_type, event_time, event FROM link_log
             ORDER BY id DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows)
    }
}
