use std::time::Duration;

use axum::extract::{Json, Multipart, Path, State};
use axum::http::StatusCode;
use diesel::prelude::*;
use serde::Serialize;
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::audit::{self, ACTION_DOCUMENT_DELETED};
use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::models::{Document, NewDocument};
use crate::routes::applications::to_iso;
use crate::schema::documents;
use crate::state::AppState;
use crate::storage::object_key;

const PRESIGNED_URL_EXPIRY_SECONDS: u64 = 300;

#[derive(Serialize)]
pub struct DocumentResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub application_id: Option<Uuid>,
    pub doc_type: String,
    pub storage_path: String,
    pub mime_type: Option<String>,
    pub size_bytes: i64,
    pub uploaded_at: String,
}

#[derive(Serialize)]
pub struct DocumentDownloadResponse {
    pub url: String,
    pub expires_in: u64,
    pub storage_path: String,
    pub mime_type: Option<String>,
    pub size_bytes: i64,
}

fn to_document_response(document: Document) -> DocumentResponse {
    DocumentResponse {
        id: document.id,
        user_id: document.user_id,
        application_id: document.application_id,
        doc_type: document.doc_type,
        storage_path: document.storage_path,
        mime_type: document.mime_type,
        size_bytes: document.size_bytes,
        uploaded_at: to_iso(document.uploaded_at),
    }
}

fn inline_content_disposition(filename: &str) -> Option<String> {
    if filename.is_empty() {
        return None;
    }

    let sanitized: String = filename
        .chars()
        .map(|ch| match ch {
            '"' | '\\' => '_',
            _ => ch,
        })
        .collect();

    let encoded =
        percent_encoding::utf8_percent_encode(&sanitized, percent_encoding::NON_ALPHANUMERIC);
    Some(format!(
        "inline; filename=\"{}\"; filename*=UTF-8''{}",
        sanitized, encoded
    ))
}

/// Upload a standalone document: multipart with `doc_type`, a `file` and an
/// optional `application_id` linking it to one of the caller's applications.
pub async fn upload_document(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<DocumentResponse>)> {
    let mut doc_type: Option<String> = None;
    let mut application_id: Option<Uuid> = None;
    let mut file_bytes: Option<Vec<u8>> = None;
    let mut filename: Option<String> = None;
    let mut content_type: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        error!(error = %err, "invalid multipart data");
        AppError::validation(format!("invalid multipart data: {err}"))
    })? {
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("file") => {
                filename = field.file_name().map(|n| n.to_string());
                content_type = field.content_type().map(|mime| mime.to_string());
                let data = field.bytes().await.map_err(|err| {
                    error!(error = %err, "failed to read file bytes");
                    AppError::validation(format!("failed to read file bytes: {err}"))
                })?;
                file_bytes = Some(data.to_vec());
            }
            Some("doc_type") => {
                let value = field
                    .text()
                    .await
                    .map_err(|err| AppError::validation(format!("invalid doc_type: {err}")))?;
                doc_type = Some(value.trim().to_lowercase());
            }
            Some("application_id") => {
                let value = field.text().await.map_err(|err| {
                    AppError::validation(format!("invalid application_id: {err}"))
                })?;
                if !value.trim().is_empty() {
                    application_id = Some(
                        Uuid::parse_str(value.trim())
                            .map_err(|_| AppError::validation("application_id must be a valid UUID"))?,
                    );
                }
            }
            _ => {}
        }
    }

    let doc_type = doc_type
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::validation("doc_type is required"))?;
    let file_bytes = file_bytes.ok_or_else(|| AppError::validation("file field is required"))?;
    if file_bytes.is_empty() {
        return Err(AppError::validation("file field must not be empty"));
    }
    let filename = filename.ok_or_else(|| AppError::validation("filename is required"))?;
    let content_type =
        content_type.or_else(|| mime_guess::from_path(&filename).first().map(|m| m.to_string()));

    if let Some(application_id) = application_id {
        use crate::schema::applications;
        let mut conn = state.db()?;
        let owner: Option<Uuid> = applications::table
            .find(application_id)
            .select(applications::user_id)
            .first(&mut conn)
            .optional()?;
        match owner {
            Some(owner) if owner == user.user_id => {}
            Some(_) => return Err(AppError::forbidden()),
            None => return Err(AppError::not_found()),
        }
    }

    let key = object_key("documents", user.user_id, &filename);
    let size = file_bytes.len() as i64;
    state
        .storage
        .put_object(
            &key,
            file_bytes,
            content_type.clone(),
            inline_content_disposition(&filename),
        )
        .await
        .map_err(AppError::transient)?;

    let new_document = NewDocument {
        id: Uuid::new_v4(),
        user_id: user.user_id,
        application_id,
        doc_type,
        storage_path: key,
        mime_type: content_type,
        size_bytes: size,
    };

    let mut conn = state.db()?;
    diesel::insert_into(documents::table)
        .values(&new_document)
        .execute(&mut conn)?;

    let document: Document = documents::table.find(new_document.id).first(&mut conn)?;

    info!(
        document_id = %document.id,
        user_id = %user.user_id,
        doc_type = %document.doc_type,
        "document uploaded"
    );

    Ok((StatusCode::CREATED, Json(to_document_response(document))))
}

pub async fn list_my_documents(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<DocumentResponse>>> {
    let mut conn = state.db()?;

    let rows: Vec<Document> = documents::table
        .filter(documents::user_id.eq(user.user_id))
        .order(documents::uploaded_at.desc())
        .load(&mut conn)?;

    Ok(Json(rows.into_iter().map(to_document_response).collect()))
}

pub async fn delete_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;

    let document: Document = documents::table
        .find(document_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;

    if document.user_id != user.user_id && !user.is_admin() {
        return Err(AppError::forbidden());
    }

    diesel::delete(documents::table.find(document_id)).execute(&mut conn)?;
    drop(conn);

    // The row is the source of truth; a leftover object is only storage.
    if let Err(err) = state.storage.delete_object(&document.storage_path).await {
        warn!(error = %err, key = %document.storage_path, "failed to delete stored object");
    }

    if user.is_admin() && document.user_id != user.user_id {
        let mut conn = state.db()?;
        if let Err(err) = audit::record_action(
            &mut conn,
            user.user_id,
            document.application_id,
            ACTION_DOCUMENT_DELETED,
            None,
            json!({ "document_id": document_id }),
        ) {
            error!(error = %err, document_id = %document_id, "failed to record admin action");
        }
    }

    info!(document_id = %document_id, user_id = %user.user_id, "document deleted");

    Ok(StatusCode::NO_CONTENT)
}

pub async fn download_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<DocumentDownloadResponse>> {
    let mut conn = state.db()?;

    let document: Document = documents::table
        .find(document_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;

    if document.user_id != user.user_id && !user.is_admin() {
        return Err(AppError::not_found());
    }

    drop(conn);

    let presigned_url = state
        .storage
        .presign_get_object(
            &document.storage_path,
            Duration::from_secs(PRESIGNED_URL_EXPIRY_SECONDS),
        )
        .await
        .map_err(AppError::transient)?;

    Ok(Json(DocumentDownloadResponse {
        url: presigned_url,
        expires_in: PRESIGNED_URL_EXPIRY_SECONDS,
        storage_path: document.storage_path,
        mime_type: document.mime_type,
        size_bytes: document.size_bytes,
    }))
}
