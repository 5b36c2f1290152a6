//! Content search over note bodies.
//!
//! The body column uses the "C" collation, so LIKE is case-sensitive
//! natively; the case-insensitive variants lower both sides. Whole-word
//! matching follows the space-padding convention: the search term is
//! wrapped in single spaces before matching.

use sqlx::{Pool, Postgres};

use banyan_core::{ContentSearchRequest, Error, NoteHeader, Result};

use crate::escape_like;
use crate::notes::HEADER_COLUMNS;

/// PostgreSQL content search over (file, archive) note bodies.
pub struct PgContentSearch {
    pool: Pool<Postgres>,
}

impl PgContentSearch {
    /// Create a new PgContentSearch with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Headers of active notes whose body matches the request.
    pub async fn search(&self, req: &ContentSearchRequest) -> Result<Vec<NoteHeader>> {
        let text = req.text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let needle = if req.whole_words {
            format!(" {} ", escape_like(text))
        } else {
            escape_like(text)
        };

        let condition = if req.case_sensitive {
            "c.body LIKE '%' || $3 || '%' ESCAPE '\\'"
        } else {
            "LOWER(c.body) LIKE '%' || LOWER($3) || '%' ESCAPE '\\'"
        };

        let headers = sqlx::query_as::<_, NoteHeader>(&format!(
            "SELECT {HEADER_COLUMNS} FROM note_header h
             JOIN note_content c ON c.header_id = h.id
             WHERE h.file_id = $1 AND h.archive_id = $2
               AND NOT h.is_deleted AND h.version = 0
               AND {condition}
             ORDER BY h.note_ordinal, h.response_ordinal"
        ))
        .bind(req.file_id)
        .bind(req.archive_id)
        .bind(&needle)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{connect_test_pool, create_test_file, create_test_note};
    use banyan_core::{NoteRepository, Result as CoreResult};

    async fn seed(pool: &sqlx::PgPool, file_name: &str) -> CoreResult<i32> {
        let file = create_test_file(pool, file_name).await;
        let repo = crate::PgNoteRepository::new(pool.clone());
        create_test_note(&repo, file.id, 0, "Hello", "The Word stands alone").await?;
        create_test_note(&repo, file.id, 0, "Second", "wording is not a word-boundary").await?;
        Ok(file.id)
    }

    #[tokio::test]
    #[ignore = "requires a PostgreSQL test database"]
    async fn test_whole_word_excludes_substrings() {
        let pool = connect_test_pool().await;
        let file_id = seed(&pool, "srch-ww").await.unwrap();
        let search = PgContentSearch::new(pool);

        let hits = search
            .search(&ContentSearchRequest {
                file_id,
                archive_id: 0,
                text: "Word".to_string(),
                case_sensitive: true,
                whole_words: true,
            })
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].subject, "Hello");
    }

    #[tokio::test]
    #[ignore = "requires a PostgreSQL test database"]
    async fn test_case_insensitive_matches_both() {
        let pool = connect_test_pool().await;
        let file_id = seed(&pool, "srch-ci").await.unwrap();
        let search = PgContentSearch::new(pool);

        let hits = search
            .search(&ContentSearchRequest {
                file_id,
                archive_id: 0,
                text: "word".to_string(),
                case_sensitive: false,
                whole_words: false,
            })
            .await
            .unwrap();

        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    #[ignore = "requires a PostgreSQL test database"]
    async fn test_case_sensitive_is_exact() {
        let pool = connect_test_pool().await;
        let file_id = seed(&pool, "srch-cs").await.unwrap();
        let search = PgContentSearch::new(pool.clone());

        let hits = search
            .search(&ContentSearchRequest {
                file_id,
                archive_id: 0,
                text: "word".to_string(),
                case_sensitive: true,
                whole_words: false,
            })
            .await
            .unwrap();

        // "Word" (capitalized) must not match a lowercase search.
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].subject, "Second");
    }

    #[tokio::test]
    #[ignore = "requires a PostgreSQL test database"]
    async fn test_deleted_notes_excluded_from_search() {
        let pool = connect_test_pool().await;
        let file_id = seed(&pool, "srch-del").await.unwrap();
        let repo = crate::PgNoteRepository::new(pool.clone());
        let search = PgContentSearch::new(pool);

        let all = repo
            .list_headers(file_id, 0, banyan_core::HeaderSelector::BasesOnly)
            .await
            .unwrap();
        repo.delete(all[0].id).await.unwrap();

        let hits = search
            .search(&ContentSearchRequest {
                file_id,
                archive_id: 0,
                text: "Word".to_string(),
                case_sensitive: true,
                whole_words: false,
            })
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }
}
