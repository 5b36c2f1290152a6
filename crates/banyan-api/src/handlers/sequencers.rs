//! Sequencer endpoints: the per-user "show me what's new" cursor.

use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use banyan_core::{AccessRepository, NoteHeader, Sequencer, SequencerRepository};

use crate::error::ApiResult;
use crate::state::{AppState, Caller};

#[derive(Debug, Deserialize)]
pub struct CreateSequencerBody {
    pub file_id: i32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSequencerBody {
    pub ordinal: i32,
    pub last_time: DateTime<Utc>,
}

/// GET /sequencers — the caller's sequencers, filtered to files they can
/// still read.
pub async fn list_sequencers(
    State(state): State<AppState>,
    caller: Caller,
) -> ApiResult<Json<Vec<Sequencer>>> {
    let mine = state.db.sequencers.list_for_user(&caller.user_id).await?;

    let mut readable = Vec::new();
    for seq in mine {
        let token = state
            .db
            .access
            .resolve(&caller.user_id, seq.file_id, 0)
            .await?;
        if token.can_read {
            readable.push(seq);
        }
    }
    Ok(Json(readable))
}

/// POST /sequencers — track another file (appended to the personal order).
pub async fn create_sequencer(
    State(state): State<AppState>,
    caller: Caller,
    Json(body): Json<CreateSequencerBody>,
) -> ApiResult<Json<Sequencer>> {
    let seq = state
        .db
        .sequencers
        .create(&caller.user_id, body.file_id)
        .await?;
    Ok(Json(seq))
}

/// DELETE /sequencers/:file_id
pub async fn delete_sequencer(
    State(state): State<AppState>,
    caller: Caller,
    Path(file_id): Path<i32>,
) -> ApiResult<Json<serde_json::Value>> {
    state.db.sequencers.delete(&caller.user_id, file_id).await?;
    Ok(Json(serde_json::json!({ "deleted": file_id })))
}

/// PATCH /sequencers/:file_id — reorder or move the cursor explicitly.
pub async fn update_sequencer(
    State(state): State<AppState>,
    caller: Caller,
    Path(file_id): Path<i32>,
    Json(body): Json<UpdateSequencerBody>,
) -> ApiResult<Json<serde_json::Value>> {
    state
        .db
        .sequencers
        .update_position(&caller.user_id, file_id, body.ordinal, body.last_time)
        .await?;
    Ok(Json(serde_json::json!({ "updated": file_id })))
}

/// POST /sequencers/:file_id/start — begin a pass; returns the notes
/// written since the last completed pass, in thread order.
pub async fn start_pass(
    State(state): State<AppState>,
    caller: Caller,
    Path(file_id): Path<i32>,
) -> ApiResult<Json<Vec<NoteHeader>>> {
    let token = state.db.access.resolve(&caller.user_id, file_id, 0).await?;
    if !token.can_read {
        return Err(banyan_core::Error::Forbidden("no read access".to_string()).into());
    }
    let candidates = state
        .db
        .sequencers
        .start_pass(&caller.user_id, file_id)
        .await?;
    Ok(Json(candidates))
}

/// POST /sequencers/:file_id/complete — finish the pass, advancing the
/// high-water mark.
pub async fn complete_pass(
    State(state): State<AppState>,
    caller: Caller,
    Path(file_id): Path<i32>,
) -> ApiResult<Json<serde_json::Value>> {
    state
        .db
        .sequencers
        .complete_pass(&caller.user_id, file_id)
        .await?;
    Ok(Json(serde_json::json!({ "completed": file_id })))
}
