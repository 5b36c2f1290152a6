//! Note-file administration and the per-file index.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use banyan_core::{
    AccessRepository, AccessToken, Error, FileRepository, HeaderSelector, LinkRepository,
    NoteFile, NoteHeader, NoteRepository, Tag,
};

use crate::error::ApiResult;
use crate::state::{AppState, Caller};

#[derive(Debug, Deserialize)]
pub struct CreateFileBody {
    pub name: String,
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateFileBody {
    pub name: String,
    pub title: String,
    pub inhibit_versions: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ArchiveQuery {
    #[serde(default)]
    pub archive: i32,
}

#[derive(Debug, Serialize)]
pub struct FileIndex {
    pub file: NoteFile,
    pub access: AccessToken,
    pub headers: Vec<NoteHeader>,
    pub bases: Vec<NoteHeader>,
    pub tags: Vec<Tag>,
    pub linked: bool,
    pub policy: Option<NoteHeader>,
}

/// POST /files — admin creates a file; the creator becomes its owner.
pub async fn create_file(
    State(state): State<AppState>,
    caller: Caller,
    Json(body): Json<CreateFileBody>,
) -> ApiResult<Json<NoteFile>> {
    caller.require_admin()?;
    let file = state.db.files.create(&caller.user_id, &body.name, &body.title).await?;
    Ok(Json(file))
}

/// GET /files — files the caller can see at all.
pub async fn list_files(
    State(state): State<AppState>,
    caller: Caller,
) -> ApiResult<Json<Vec<NoteFile>>> {
    let all = state.db.files.list().await?;
    if caller.is_admin {
        return Ok(Json(all));
    }

    let mut visible = Vec::new();
    for file in all {
        let token = state.db.access.resolve(&caller.user_id, file.id, 0).await?;
        if token.any_visible() {
            visible.push(file);
        }
    }
    Ok(Json(visible))
}

/// GET /files/:id
pub async fn get_file(
    State(state): State<AppState>,
    caller: Caller,
    Path(file_id): Path<i32>,
) -> ApiResult<Json<NoteFile>> {
    let token = state.db.access.resolve(&caller.user_id, file_id, 0).await?;
    if !caller.is_admin && !(token.can_read || token.can_write || token.can_respond) {
        return Err(Error::Forbidden("no access to this file".to_string()).into());
    }
    Ok(Json(state.db.files.get(file_id).await?))
}

/// PATCH /files/:id — admin rename/retitle.
pub async fn update_file(
    State(state): State<AppState>,
    caller: Caller,
    Path(file_id): Path<i32>,
    Json(body): Json<UpdateFileBody>,
) -> ApiResult<Json<NoteFile>> {
    caller.require_admin()?;
    let file = state.db.files.update(file_id, &body.name, &body.title).await?;
    if let Some(inhibit) = body.inhibit_versions {
        state.db.files.set_inhibit_versions(file_id, inhibit).await?;
    }
    Ok(Json(state.db.files.get(file.id).await?))
}

/// DELETE /files/:id — admin, cascades.
pub async fn delete_file(
    State(state): State<AppState>,
    caller: Caller,
    Path(file_id): Path<i32>,
) -> ApiResult<Json<serde_json::Value>> {
    caller.require_admin()?;
    state.db.files.delete(file_id).await?;
    Ok(Json(serde_json::json!({ "deleted": file_id })))
}

#[derive(Debug, Deserialize)]
pub struct PolicyBody {
    pub header_id: i64,
}

/// PUT /files/:id/policy
pub async fn set_policy(
    State(state): State<AppState>,
    caller: Caller,
    Path(file_id): Path<i32>,
    Json(body): Json<PolicyBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let token = state.db.access.resolve(&caller.user_id, file_id, 0).await?;
    if !caller.is_admin && !token.can_edit_access {
        return Err(Error::Forbidden("cannot edit file policy".to_string()).into());
    }
    state.db.files.set_policy(file_id, body.header_id).await?;
    Ok(Json(serde_json::json!({ "policy_header_id": body.header_id })))
}

/// DELETE /files/:id/policy
pub async fn clear_policy(
    State(state): State<AppState>,
    caller: Caller,
    Path(file_id): Path<i32>,
) -> ApiResult<Json<serde_json::Value>> {
    let token = state.db.access.resolve(&caller.user_id, file_id, 0).await?;
    if !caller.is_admin && !token.can_edit_access {
        return Err(Error::Forbidden("cannot edit file policy".to_string()).into());
    }
    state.db.files.set_policy(file_id, 0).await?;
    Ok(Json(serde_json::json!({ "policy_header_id": 0 })))
}

/// GET /files/:id/index?archive= — everything needed to display a file.
pub async fn file_index(
    State(state): State<AppState>,
    caller: Caller,
    Path(file_id): Path<i32>,
    Query(query): Query<ArchiveQuery>,
) -> ApiResult<Json<FileIndex>> {
    let mut access = state
        .db
        .access
        .resolve(&caller.user_id, file_id, query.archive)
        .await?;
    if caller.is_admin {
        // Admins can always inspect the access list.
        access.can_view_access = true;
    }
    if !access.can_read && !access.can_write {
        return Err(Error::Forbidden("no access to this file".to_string()).into());
    }

    let file = state.db.files.get(file_id).await?;
    let headers = state
        .db
        .notes
        .list_headers(file_id, query.archive, HeaderSelector::All)
        .await?;
    let bases = headers
        .iter()
        .filter(|h| h.is_base() && h.id != file.policy_header_id)
        .cloned()
        .collect();
    let tags = state.db.tags.list_for_file(file_id, query.archive).await?;
    let linked = !state.db.links.linked_files_for(file_id).await?.is_empty();

    let policy = if file.policy_header_id > 0 {
        headers.iter().find(|h| h.id == file.policy_header_id).cloned()
    } else {
        None
    };

    Ok(Json(FileIndex {
        file,
        access,
        headers,
        bases,
        tags,
        linked,
        policy,
    }))
}
