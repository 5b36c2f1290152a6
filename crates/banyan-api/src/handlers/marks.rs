//! Mark endpoints: saved pointers into threads.

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use banyan_core::{Mark, MarkRepository};

use crate::error::ApiResult;
use crate::state::{AppState, Caller};

#[derive(Debug, Deserialize)]
pub struct AddMarkBody {
    #[serde(default)]
    pub archive_id: i32,
    pub note_ordinal: i32,
    pub header_id: i64,
    /// -1 = whole thread, 0 = base note only, >0 = one response.
    pub response_ordinal: i32,
}

/// GET /files/:id/marks
pub async fn list_marks(
    State(state): State<AppState>,
    caller: Caller,
    Path(file_id): Path<i32>,
) -> ApiResult<Json<Vec<Mark>>> {
    Ok(Json(state.db.marks.list(&caller.user_id, file_id).await?))
}

/// POST /files/:id/marks
pub async fn add_mark(
    State(state): State<AppState>,
    caller: Caller,
    Path(file_id): Path<i32>,
    Json(body): Json<AddMarkBody>,
) -> ApiResult<Json<Mark>> {
    let mark = state
        .db
        .marks
        .add(&Mark {
            user_id: caller.user_id.clone(),
            file_id,
            archive_id: body.archive_id,
            mark_ordinal: 0, // assigned by the store
            note_ordinal: body.note_ordinal,
            header_id: body.header_id,
            response_ordinal: body.response_ordinal,
        })
        .await?;
    Ok(Json(mark))
}

/// DELETE /files/:id/marks/:ordinal
pub async fn remove_mark(
    State(state): State<AppState>,
    caller: Caller,
    Path((file_id, mark_ordinal)): Path<(i32, i32)>,
) -> ApiResult<Json<serde_json::Value>> {
    state
        .db
        .marks
        .remove(&caller.user_id, file_id, mark_ordinal)
        .await?;
    Ok(Json(serde_json::json!({ "removed": mark_ordinal })))
}

/// DELETE /files/:id/marks
pub async fn clear_marks(
    State(state): State<AppState>,
    caller: Caller,
    Path(file_id): Path<i32>,
) -> ApiResult<Json<serde_json::Value>> {
    state.db.marks.clear(&caller.user_id, file_id).await?;
    Ok(Json(serde_json::json!({ "cleared": file_id })))
}
