//! Access-list viewing and editing.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use banyan_core::{AccessRepository, AccessToken, Error};

use crate::error::ApiResult;
use crate::state::{AppState, Caller};

#[derive(Debug, Deserialize)]
pub struct ArchiveQuery {
    #[serde(default)]
    pub archive: i32,
}

#[derive(Debug, Deserialize)]
pub struct RemoveQuery {
    pub user: String,
    #[serde(default)]
    pub archive: i32,
}

#[derive(Debug, Deserialize)]
pub struct TokenBody {
    pub user_id: String,
    #[serde(default)]
    pub archive_id: i32,
    pub can_read: bool,
    pub can_respond: bool,
    pub can_write: bool,
    pub can_set_tag: bool,
    pub can_delete_edit: bool,
    pub can_view_access: bool,
    pub can_edit_access: bool,
}

impl TokenBody {
    fn into_token(self, file_id: i32) -> AccessToken {
        AccessToken {
            user_id: self.user_id,
            file_id,
            archive_id: self.archive_id,
            can_read: self.can_read,
            can_respond: self.can_respond,
            can_write: self.can_write,
            can_set_tag: self.can_set_tag,
            can_delete_edit: self.can_delete_edit,
            can_view_access: self.can_view_access,
            can_edit_access: self.can_edit_access,
        }
    }
}

async fn require_edit_access(
    state: &AppState,
    caller: &Caller,
    file_id: i32,
    archive_id: i32,
) -> ApiResult<()> {
    let token = state
        .db
        .access
        .resolve(&caller.user_id, file_id, archive_id)
        .await?;
    if !caller.is_admin && !token.can_edit_access {
        return Err(Error::Forbidden("cannot edit the access list".to_string()).into());
    }
    Ok(())
}

/// GET /files/:id/access?archive=
pub async fn list_access(
    State(state): State<AppState>,
    caller: Caller,
    Path(file_id): Path<i32>,
    Query(query): Query<ArchiveQuery>,
) -> ApiResult<Json<Vec<AccessToken>>> {
    let token = state
        .db
        .access
        .resolve(&caller.user_id, file_id, query.archive)
        .await?;
    if !caller.is_admin && !token.can_view_access {
        return Err(Error::Forbidden("cannot view the access list".to_string()).into());
    }
    Ok(Json(state.db.access.list_for_file(file_id, query.archive).await?))
}

/// POST /files/:id/access — add a grant.
pub async fn add_access(
    State(state): State<AppState>,
    caller: Caller,
    Path(file_id): Path<i32>,
    Json(body): Json<TokenBody>,
) -> ApiResult<Json<AccessToken>> {
    require_edit_access(&state, &caller, file_id, body.archive_id).await?;
    let token = body.into_token(file_id);
    state.db.access.add(&token).await?;
    Ok(Json(token))
}

/// PATCH /files/:id/access — replace a grant's capabilities.
pub async fn update_access(
    State(state): State<AppState>,
    caller: Caller,
    Path(file_id): Path<i32>,
    Json(body): Json<TokenBody>,
) -> ApiResult<Json<AccessToken>> {
    require_edit_access(&state, &caller, file_id, body.archive_id).await?;
    let token = body.into_token(file_id);
    state.db.access.update(&token).await?;
    Ok(Json(token))
}

/// DELETE /files/:id/access?user=&archive=
pub async fn remove_access(
    State(state): State<AppState>,
    caller: Caller,
    Path(file_id): Path<i32>,
    Query(query): Query<RemoveQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    require_edit_access(&state, &caller, file_id, query.archive).await?;
    state
        .db
        .access
        .remove(&query.user, file_id, query.archive)
        .await?;
    Ok(Json(serde_json::json!({ "removed": query.user })))
}
