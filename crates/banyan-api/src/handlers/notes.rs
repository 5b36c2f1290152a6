//! Note operations: create, read, edit, delete, copy, versions, search.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use banyan_core::{
    AccessRepository, AccessToken, ContentSearchRequest, CreateNoteRequest, EditNoteRequest,
    Error, HeaderSelector, NoteHeader, NoteRepository, Tag,
};

use crate::error::ApiResult;
use crate::state::{AppState, Caller};

#[derive(Debug, Deserialize)]
pub struct CreateNoteBody {
    pub file_id: i32,
    #[serde(default)]
    pub archive_id: i32,
    /// 0 (default) creates a base note; otherwise the thread root to
    /// respond to.
    #[serde(default)]
    pub base_header_id: i64,
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub tag_line: String,
    pub director_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateNoteBody {
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub tag_line: String,
    pub director_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CopyNoteBody {
    pub target_file_id: i32,
    #[serde(default)]
    pub whole_thread: bool,
}

#[derive(Debug, Serialize)]
pub struct NoteView {
    pub header: NoteHeader,
    pub body: String,
    pub tags: Vec<Tag>,
    pub access: AccessToken,
    pub can_edit: bool,
}

#[derive(Debug, Deserialize)]
pub struct VersionQuery {
    #[serde(default)]
    pub archive: i32,
    pub note_ordinal: i32,
    #[serde(default)]
    pub response_ordinal: i32,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub archive: i32,
    pub text: String,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default)]
    pub whole_words: bool,
}

#[derive(Debug, Deserialize)]
pub struct CountQuery {
    #[serde(default)]
    pub archive: i32,
}

/// POST /notes — create a base note or a response.
pub async fn create_note(
    State(state): State<AppState>,
    caller: Caller,
    Json(body): Json<CreateNoteBody>,
) -> ApiResult<Json<NoteHeader>> {
    let token = state
        .db
        .access
        .resolve(&caller.user_id, body.file_id, body.archive_id)
        .await?;

    let request = CreateNoteRequest {
        file_id: body.file_id,
        archive_id: body.archive_id,
        base_header_id: body.base_header_id,
        subject: body.subject,
        author_id: caller.user_id.clone(),
        author_name: caller.user_id.clone(),
        body: body.body,
        tag_line: body.tag_line,
        director_message: body.director_message,
        link_guid: None,
        ref_id: 0,
        created_at: None,
    };

    let header = if request.base_header_id == 0 {
        if !token.can_write {
            return Err(Error::Forbidden("no write access".to_string()).into());
        }
        state.db.notes.create_base(request).await?
    } else {
        if !token.can_respond && !token.can_write {
            return Err(Error::Forbidden("no respond access".to_string()).into());
        }
        state.db.notes.create_response(request).await?
    };
    Ok(Json(header))
}

/// GET /notes/:id
pub async fn get_note(
    State(state): State<AppState>,
    caller: Caller,
    Path(header_id): Path<i64>,
) -> ApiResult<Json<NoteView>> {
    let header = state.db.notes.get_header(header_id).await?;
    let access = state
        .db
        .access
        .resolve(&caller.user_id, header.file_id, header.archive_id)
        .await?;
    if !caller.is_admin && !access.can_read {
        return Err(Error::Forbidden("no read access".to_string()).into());
    }

    let body = state.db.notes.get_content(header_id).await?.body;
    let tags = state.db.notes.tags_for_header(header_id).await?;
    let can_edit = caller.is_admin || header.author_id == caller.user_id;

    Ok(Json(NoteView {
        header,
        body,
        tags,
        access,
        can_edit,
    }))
}

/// PATCH /notes/:id — author or admin.
pub async fn update_note(
    State(state): State<AppState>,
    caller: Caller,
    Path(header_id): Path<i64>,
    Json(body): Json<UpdateNoteBody>,
) -> ApiResult<Json<NoteHeader>> {
    let header = state.db.notes.get_header(header_id).await?;
    if !caller.is_admin && header.author_id != caller.user_id {
        return Err(Error::Forbidden("only the author or an admin may edit".to_string()).into());
    }

    let updated = state
        .db
        .notes
        .edit(EditNoteRequest {
            header_id,
            subject: body.subject,
            body: body.body,
            tag_line: body.tag_line,
            director_message: body.director_message,
        })
        .await?;
    Ok(Json(updated))
}

/// DELETE /notes/:id — requires the delete/edit capability.
pub async fn delete_note(
    State(state): State<AppState>,
    caller: Caller,
    Path(header_id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    let header = state.db.notes.get_header(header_id).await?;
    let token = state
        .db
        .access
        .resolve(&caller.user_id, header.file_id, header.archive_id)
        .await?;
    if !caller.is_admin && !token.can_delete_edit {
        return Err(Error::Forbidden("no delete access".to_string()).into());
    }

    state.db.notes.delete(header_id).await?;
    Ok(Json(serde_json::json!({ "deleted": header_id })))
}

/// POST /notes/:id/copy — read on source, write on target.
pub async fn copy_note(
    State(state): State<AppState>,
    caller: Caller,
    Path(header_id): Path<i64>,
    Json(body): Json<CopyNoteBody>,
) -> ApiResult<Json<NoteHeader>> {
    let source = state.db.notes.get_header(header_id).await?;
    let source_token = state
        .db
        .access
        .resolve(&caller.user_id, source.file_id, source.archive_id)
        .await?;
    if !source_token.can_read {
        return Err(Error::Forbidden("no read access on source".to_string()).into());
    }
    let target_token = state
        .db
        .access
        .resolve(&caller.user_id, body.target_file_id, 0)
        .await?;
    if !target_token.can_write {
        return Err(Error::Forbidden("no write access on target".to_string()).into());
    }

    let copied = state
        .db
        .notes
        .copy(
            header_id,
            body.target_file_id,
            body.whole_thread,
            &caller.user_id,
            &caller.user_id,
        )
        .await?;
    Ok(Json(copied))
}

/// GET /files/:id/versions — archived revisions, oldest first.
pub async fn get_versions(
    State(state): State<AppState>,
    caller: Caller,
    Path(file_id): Path<i32>,
    Query(query): Query<VersionQuery>,
) -> ApiResult<Json<Vec<NoteHeader>>> {
    let token = state
        .db
        .access
        .resolve(&caller.user_id, file_id, query.archive)
        .await?;
    if !token.can_read {
        return Err(Error::Forbidden("no read access".to_string()).into());
    }

    let versions = state
        .db
        .notes
        .get_versions(file_id, query.archive, query.note_ordinal, query.response_ordinal)
        .await?;
    Ok(Json(versions))
}

/// GET /files/:id/search — content search.
pub async fn content_search(
    State(state): State<AppState>,
    caller: Caller,
    Path(file_id): Path<i32>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<NoteHeader>>> {
    let token = state
        .db
        .access
        .resolve(&caller.user_id, file_id, query.archive)
        .await?;
    if !token.can_read {
        return Err(Error::Forbidden("no read access".to_string()).into());
    }

    let hits = state
        .db
        .search
        .search(&ContentSearchRequest {
            file_id,
            archive_id: query.archive,
            text: query.text,
            case_sensitive: query.case_sensitive,
            whole_words: query.whole_words,
        })
        .await?;
    Ok(Json(hits))
}

/// GET /files/:id/count — active base notes.
pub async fn note_count(
    State(state): State<AppState>,
    caller: Caller,
    Path(file_id): Path<i32>,
    Query(query): Query<CountQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let token = state
        .db
        .access
        .resolve(&caller.user_id, file_id, query.archive)
        .await?;
    if !token.can_read {
        return Err(Error::Forbidden("no read access".to_string()).into());
    }

    let count = state.db.notes.base_note_count(file_id, query.archive).await?;
    Ok(Json(serde_json::json!({ "count": count })))
}

/// GET /files/:id/headers — header listing for a thread or range.
#[derive(Debug, Deserialize)]
pub struct HeadersQuery {
    #[serde(default)]
    pub archive: i32,
    pub note_ordinal: Option<i32>,
    pub response_ordinal: Option<i32>,
    pub min: Option<i32>,
    pub max: Option<i32>,
    #[serde(default)]
    pub bases_only: bool,
}

pub async fn list_headers(
    State(state): State<AppState>,
    caller: Caller,
    Path(file_id): Path<i32>,
    Query(query): Query<HeadersQuery>,
) -> ApiResult<Json<Vec<NoteHeader>>> {
    let token = state
        .db
        .access
        .resolve(&caller.user_id, file_id, query.archive)
        .await?;
    if !token.can_read {
        return Err(Error::Forbidden("no read access".to_string()).into());
    }

    let selector = match (query.note_ordinal, query.response_ordinal) {
        (Some(n), Some(r)) => HeaderSelector::Single {
            note_ordinal: n,
            response_ordinal: r,
        },
        (Some(n), None) => HeaderSelector::Thread { note_ordinal: n },
        (None, _) => match (query.min, query.max) {
            (Some(min), Some(max)) => HeaderSelector::OrdinalRange { min, max },
            _ if query.bases_only => HeaderSelector::BasesOnly,
            _ => HeaderSelector::All,
        },
    };

    let headers = state
        .db
        .notes
        .list_headers(file_id, query.archive, selector)
        .await?;
    Ok(Json(headers))
}
