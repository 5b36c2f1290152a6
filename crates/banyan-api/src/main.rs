//! banyan-api - HTTP API server for the banyan note engine.

mod error;
mod handlers;
mod state;

use std::net::SocketAddr;

use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use banyan_db::Database;
use banyan_sync::{SyncWorker, WorkerConfig};

use state::AppState;

fn router(state: AppState) -> Router {
    Router::new()
        // Files
        .route("/files", post(handlers::files::create_file).get(handlers::files::list_files))
        .route(
            "/files/:id",
            get(handlers::files::get_file)
                .patch(handlers::files::update_file)
                .delete(handlers::files::delete_file),
        )
        .route(
            "/files/:id/policy",
            put(handlers::files::set_policy).delete(handlers::files::clear_policy),
        )
        .route("/files/:id/index", get(handlers::files::file_index))
        // Notes
        .route("/notes", post(handlers::notes::create_note))
        .route(
            "/notes/:id",
            get(handlers::notes::get_note)
                .patch(handlers::notes::update_note)
                .delete(handlers::notes::delete_note),
        )
        .route("/notes/:id/copy", post(handlers::notes::copy_note))
        .route("/files/:id/headers", get(handlers::notes::list_headers))
        .route("/files/:id/versions", get(handlers::notes::get_versions))
        .route("/files/:id/search", get(handlers::notes::content_search))
        .route("/files/:id/count", get(handlers::notes::note_count))
        // Access lists
        .route(
            "/files/:id/access",
            get(handlers::access::list_access)
                .post(handlers::access::add_access)
                .patch(handlers::access::update_access)
                .delete(handlers::access::remove_access),
        )
        // Sequencers
        .route(
            "/sequencers",
            get(handlers::sequencers::list_sequencers).post(handlers::sequencers::create_sequencer),
        )
        .route(
            "/sequencers/:file_id",
            delete(handlers::sequencers::delete_sequencer)
                .patch(handlers::sequencers::update_sequencer),
        )
        .route("/sequencers/:file_id/start", post(handlers::sequencers::start_pass))
        .route("/sequencers/:file_id/complete", post(handlers::sequencers::complete_pass))
        // Marks
        .route(
            "/files/:id/marks",
            get(handlers::marks::list_marks)
                .post(handlers::marks::add_mark)
                .delete(handlers::marks::clear_marks),
        )
        .route("/files/:id/marks/:ordinal", delete(handlers::marks::remove_mark))
        // Replication
        .route("/sync/accept", post(handlers::sync::accept))
        .route("/sync/log", get(handlers::sync::list_log))
        // Health
        .route("/health", get(|| async { "ok" }))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "banyan_api=info,banyan_db=info,banyan_sync=info,tower_http=info".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgres://localhost/banyan".to_string());
    let db = Database::connect(&database_url).await?;
    db.migrate().await?;

    let worker = SyncWorker::new(db.clone(), WorkerConfig::from_env())?;
    let worker_handle = worker.start();

    let listen_addr: SocketAddr = std::env::var("BANYAN_LISTEN_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        .parse()?;

    let app = router(AppState { db });

    info!(
        subsystem = "api",
        op = "startup",
        addr = %listen_addr,
        "banyan-api listening"
    );

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!(subsystem = "api", op = "shutdown", "Shutdown signal received");
        })
        .await?;

    worker_handle.shutdown().await.ok();
    Ok(())
}
