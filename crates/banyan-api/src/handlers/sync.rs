//! Inbound replication surface for remote peers.
//!
//! `/sync/accept` carries no user identity; the shared secret inside the
//! envelope is the capability, checked by the acceptor.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use banyan_core::{ActivityEnvelope, LinkLogEntry, LinkRepository};
use banyan_sync::{AcceptOutcome, SyncAcceptor};

use crate::error::ApiResult;
use crate::state::{AppState, Caller};

#[derive(Debug, Deserialize)]
pub struct LogQuery {
    #[serde(default = "default_log_limit")]
    pub limit: i64,
}

fn default_log_limit() -> i64 {
    100
}

/// POST /sync/accept — apply one activity from a remote peer.
pub async fn accept(
    State(state): State<AppState>,
    Json(envelope): Json<ActivityEnvelope>,
) -> ApiResult<Json<serde_json::Value>> {
    let acceptor = SyncAcceptor::new(state.db.clone());
    let outcome = acceptor.accept(envelope).await?;

    let body = match outcome {
        AcceptOutcome::Created(id) => serde_json::json!({ "outcome": "created", "header_id": id }),
        AcceptOutcome::Updated(id) => serde_json::json!({ "outcome": "updated", "header_id": id }),
        AcceptOutcome::Deleted(id) => serde_json::json!({ "outcome": "deleted", "header_id": id }),
        AcceptOutcome::Ignored => serde_json::json!({ "outcome": "ignored" }),
    };
    Ok(Json(body))
}

/// GET /sync/log — the replication audit trail (admin only).
pub async fn list_log(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<LogQuery>,
) -> ApiResult<Json<Vec<LinkLogEntry>>> {
    caller.require_admin()?;
    Ok(Json(state.db.links.list_log(query.limit).await?))
}
