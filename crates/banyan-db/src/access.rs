//! Access token repository: the two-level (exact, then "Other") resolver
//! and access-list editing.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Transaction};

use banyan_core::defaults::OTHER_USER_ID;
use banyan_core::{AccessRepository, AccessToken, Error, LinkedFile, Result};

/// PostgreSQL implementation of AccessRepository.
pub struct PgAccessRepository {
    pool: Pool<Postgres>,
}

const TOKEN_COLUMNS: &str = "user_id, file_id, archive_id, can_read, can_respond, can_write, \
     can_set_tag, can_delete_edit, can_view_access, can_edit_access";

impl PgAccessRepository {
    /// Create a new PgAccessRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn fetch_row(
        &self,
        user_id: &str,
        file_id: i32,
        archive_id: i32,
    ) -> Result<Option<AccessToken>> {
        let row = sqlx::query_as::<_, AccessToken>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM note_access
             WHERE user_id = $1 AND file_id = $2 AND archive_id = $3"
        ))
        .bind(user_id)
        .bind(file_id)
        .bind(archive_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(row)
    }

    /// Insert a token row within an open transaction.
    pub async fn add_tx(tx: &mut Transaction<'_, Postgres>, token: &AccessToken) -> Result<()> {
        sqlx::query(
            "INSERT INTO note_access (user_id, file_id, archive_id, can_read, can_respond,
                 can_write, can_set_tag, can_delete_edit, can_view_access, can_edit_access)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(&token.user_id)
        .bind(token.file_id)
        .bind(token.archive_id)
        .bind(token.can_read)
        .bind(token.can_respond)
        .bind(token.can_write)
        .bind(token.can_set_tag)
        .bind(token.can_delete_edit)
        .bind(token.can_view_access)
        .bind(token.can_edit_access)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    /// Create the standard entries for a new file inside its creation
    /// transaction: "Other" with no access, the owner with full access.
    pub async fn create_base_entries_tx(
        tx: &mut Transaction<'_, Postgres>,
        owner_id: &str,
        file_id: i32,
    ) -> Result<()> {
        Self::add_tx(tx, &AccessToken::other_default(file_id, 0)).await?;
        Self::add_tx(tx, &AccessToken::full(owner_id, file_id, 0)).await?;
        Ok(())
    }
}

#[async_trait]
impl AccessRepository for PgAccessRepository {
    async fn resolve(&self, user_id: &str, file_id: i32, archive_id: i32) -> Result<AccessToken> {
        if let Some(token) = self.fetch_row(user_id, file_id, archive_id).await? {
            return Ok(token);
        }
        // No user-specific row: fall back to the file's "Other" token,
        // then fail closed.
        if let Some(other) = self.fetch_row(OTHER_USER_ID, file_id, archive_id).await? {
            return Ok(AccessToken {
                user_id: user_id.to_string(),
                ..other
            });
        }
        Ok(AccessToken::none(user_id, file_id, archive_id))
    }

    async fn resolve_exact(
        &self,
        user_id: &str,
        file_id: i32,
        archive_id: i32,
    ) -> Result<AccessToken> {
        Ok(self
            .fetch_row(user_id, file_id, archive_id)
            .await?
            .unwrap_or_else(|| AccessToken::none(user_id, file_id, archive_id)))
    }

    async fn list_for_file(&self, file_id: i32, archive_id: i32) -> Result<Vec<AccessToken>> {
        let rows = sqlx::query_as::<_, AccessToken>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM note_access
             WHERE file_id = $1 AND archive_id = $2
             ORDER BY user_id"
        ))
        .bind(file_id)
        .bind(archive_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows)
    }

    async fn add(&self, token: &AccessToken) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        Self::add_tx(&mut tx, token).await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    async fn update(&self, token: &AccessToken) -> Result<()> {
        let result = sqlx::query(
            "UPDATE note_access SET can_read = $4, can_respond = $5, can_write = $6,
                 can_set_tag = $7, can_delete_edit = $8, can_view_access = $9,
                 can_edit_access = $10
             WHERE user_id = $1 AND file_id = $2 AND archive_id = $3",
        )
        .bind(&token.user_id)
        .bind(token.file_id)
        .bind(token.archive_id)
        .bind(token.can_read)
        .bind(token.can_respond)
        .bind(token.can_write)
        .bind(token.can_set_tag)
        .bind(token.can_delete_edit)
        .bind(token.can_view_access)
        .bind(token.can_edit_access)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!(
                "access token for {} on file {}",
                token.user_id, token.file_id
            )));
        }
        Ok(())
    }

    async fn remove(&self, user_id: &str, file_id: i32, archive_id: i32) -> Result<()> {
        sqlx::query(
            "DELETE FROM note_access
             WHERE user_id = $1 AND file_id = $2 AND archive_id = $3",
        )
        .bind(user_id)
        .bind(file_id)
        .bind(archive_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn test_link_access(
        &self,
        remote_file_name: &str,
        secret: Option<&str>,
    ) -> Result<Vec<LinkedFile>> {
        let rows = match secret {
            // A configured secret must match; rows without one accept any caller.
            Some(s) => sqlx::query_as::<_, LinkedFile>(
                "SELECT id, home_file_id, home_file_name, remote_file_name, remote_base_uri,
                        accept_from, send_to, secret
                 FROM linked_file
                 WHERE remote_file_name = $1 AND accept_from
                   AND (secret IS NULL OR secret = $2)",
            )
            .bind(remote_file_name)
            .bind(s)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?,
            None => sqlx::query_as::<_, LinkedFile>(
                "SELECT id, home_file_id, home_file_name, remote_file_name, remote_base_uri,
                        accept_from, send_to, secret
                 FROM linked_file
                 WHERE remote_file_name = $1 AND accept_from AND secret IS NULL",
            )
            .bind(remote_file_name)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?,
        };
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{connect_test_pool, create_test_file};

    #[tokio::test]
    #[ignore = "requires a PostgreSQL test database"]
    async fn test_resolve_falls_back_to_other() {
        let pool = connect_test_pool().await;
        let file = create_test_file(&pool, "acc-fb").await;
        let repo = PgAccessRepository::new(pool.clone());

        // No row for this user: the "Other" token (all false) applies.
        let token = repo.resolve("stranger", file.id, 0).await.unwrap();
        assert_eq!(token.user_id, "stranger");
        assert!(!token.can_read);

        // Open "Other" up; the stranger inherits read.
        let mut other = repo.resolve_exact(OTHER_USER_ID, file.id, 0).await.unwrap();
        other.can_read = true;
        repo.update(&other).await.unwrap();

        let token = repo.resolve("stranger", file.id, 0).await.unwrap();
        assert!(token.can_read);
        assert!(!token.can_write);
    }

    #[tokio::test]
    #[ignore = "requires a PostgreSQL test database"]
    async fn test_resolve_exact_ignores_other() {
        let pool = connect_test_pool().await;
        let file = create_test_file(&pool, "acc-ex").await;
        let repo = PgAccessRepository::new(pool.clone());

        let mut other = repo.resolve_exact(OTHER_USER_ID, file.id, 0).await.unwrap();
        other.can_read = true;
        repo.update(&other).await.unwrap();

        // Exact lookup for a user with no row fails closed even though
        // "Other" would grant read.
        let token = repo.resolve_exact("stranger", file.id, 0).await.unwrap();
        assert!(!token.can_read);
    }

    #[tokio::test]
    #[ignore = "requires a PostgreSQL test database"]
    async fn test_missing_file_resolves_all_false() {
        let pool = connect_test_pool().await;
        let repo = PgAccessRepository::new(pool);

        let token = repo.resolve("anyone", -1, 0).await.unwrap();
        assert!(!token.any_visible());
    }

    #[tokio::test]
    #[ignore = "requires a PostgreSQL test database"]
    async fn test_base_entries_created_with_file() {
        let pool = connect_test_pool().await;
        let file = create_test_file(&pool, "acc-base").await;
        let repo = PgAccessRepository::new(pool);

        let list = repo.list_for_file(file.id, 0).await.unwrap();
        assert_eq!(list.len(), 2);
        assert!(list.iter().any(|t| t.user_id == OTHER_USER_ID && !t.can_read));
        assert!(list.iter().any(|t| t.user_id == file.owner_id && t.can_edit_access));
    }
}
