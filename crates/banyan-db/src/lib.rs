//! # banyan-db
//!
//! PostgreSQL storage layer for banyan.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for all core entities
//! - The Thread/Ordinal Manager (create/respond/edit/delete/copy with
//!   ordinal-conflict retry and version archiving)
//! - The two-level access resolver
//! - The replication outbox and audit log
//! - Per-user sequencer cursors and marks
//!
//! ## Example
//!
//! ```rust,ignore
//! use banyan_db::Database;
//! use banyan_core::{CreateNoteRequest, NoteRepository};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/banyan").await?;
//!     let file = db.files.create("admin", "gossip", "Town gossip").await?;
//!     println!("Created file: {}", file.id);
//!     Ok(())
//! }
//! ```

pub mod access;
pub mod files;
pub mod links;
pub mod marks;
pub mod notes;
pub mod pool;
pub mod search;
pub mod sequencer;
pub mod tags;

// Test fixtures for integration tests
// Note: Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

// Re-export core types
pub use banyan_core::*;

/// Escape LIKE/ILIKE wildcard characters (`%`, `_`, `\`) in user input.
pub fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

// Re-export repository implementations
pub use access::PgAccessRepository;
pub use files::PgFileRepository;
pub use links::PgLinkRepository;
pub use marks::PgMarkRepository;
pub use notes::PgNoteRepository;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use search::PgContentSearch;
pub use sequencer::PgSequencerRepository;
pub use tags::PgTagRepository;

/// Combined database context with all repositories.
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Note-file administration.
    pub files: PgFileRepository,
    /// Access token resolution and editing.
    pub access: PgAccessRepository,
    /// Thread/ordinal operations on notes.
    pub notes: PgNoteRepository,
    /// Tag read surface.
    pub tags: PgTagRepository,
    /// Content search.
    pub search: PgContentSearch,
    /// Linked files, replication queue, audit log.
    pub links: PgLinkRepository,
    /// Per-user sequencer cursors.
    pub sequencers: PgSequencerRepository,
    /// Saved thread bookmarks.
    pub marks: PgMarkRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            files: PgFileRepository::new(pool.clone()),
            access: PgAccessRepository::new(pool.clone()),
            notes: PgNoteRepository::new(pool.clone()),
            tags: PgTagRepository::new(pool.clone()),
            search: PgContentSearch::new(pool.clone()),
            links: PgLinkRepository::new(pool.clone()),
            sequencers: PgSequencerRepository::new(pool.clone()),
            marks: PgMarkRepository::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self::new(self.pool.clone())
    }
}
