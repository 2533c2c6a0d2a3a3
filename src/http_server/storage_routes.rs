//! Storage HTTP Routes
//!
//! File and folder endpoints. Every handler authenticates the bearer token and
//! runs the operation in the caller's own bucket.

use std::io::Read;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::ApiError;
use super::state::{blocking, AppState};
use crate::file_storage::{ObjectInfo, DEFAULT_CONTENT_TYPE};

/// Multipart framing allowance on top of the file itself
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

pub fn storage_routes(state: AppState) -> Router {
    let body_limit = state
        .files
        .max_upload_bytes()
        .saturating_add(MULTIPART_OVERHEAD)
        .try_into()
        .unwrap_or(usize::MAX);

    Router::new()
        .route("/files/list", get(list_files_handler))
        .route("/files/download/:filename", get(download_file_handler))
        .route(
            "/files/upload",
            post(upload_file_handler).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/files/:filename", delete(delete_file_handler))
        .route("/folders/list", get(list_folders_handler))
        .route("/folders/create", post(create_folder_handler))
        .route("/folders/:foldername", delete(delete_folder_handler))
        .with_state(state)
}

// ==================
// Request/Response Types
// ==================

#[derive(Debug, Default, Deserialize)]
pub struct ListFilesQuery {
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub recursive: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListFoldersQuery {
    #[serde(default)]
    pub prefix: String,
}

#[derive(Debug, Serialize)]
pub struct FileResponse {
    pub name: String,
    pub size: u64,
    pub etag: String,
    pub content_type: String,
    pub last_modified: DateTime<Utc>,
}

impl From<ObjectInfo> for FileResponse {
    fn from(info: ObjectInfo) -> Self {
        Self {
            name: info.key,
            size: info.size,
            etag: info.etag,
            content_type: info.content_type,
            last_modified: info.last_modified,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListFilesResponse {
    pub files: Vec<FileResponse>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub object_name: String,
    pub etag: String,
    pub size: u64,
}

#[derive(Debug, Serialize)]
pub struct DeleteFileResponse {
    pub message: String,
    pub filename: String,
}

#[derive(Debug, Serialize)]
pub struct FolderEntry {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct ListFoldersResponse {
    pub folders: Vec<FolderEntry>,
}

#[derive(Debug, Deserialize)]
pub struct CreateFolderRequest {
    #[serde(default)]
    pub folder_name: String,
}

#[derive(Debug, Serialize)]
pub struct FolderResponse {
    pub message: String,
    pub foldername: String,
}

/// Object key for an upload: optional folder path plus the file name
fn upload_key(path: &str, file_name: &str) -> String {
    let path = path.trim_start_matches('/');
    if path.is_empty() || path.ends_with('/') {
        format!("{}{}", path, file_name)
    } else {
        format!("{}/{}", path, file_name)
    }
}

// ==================
// Handlers
// ==================

async fn list_files_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListFilesQuery>,
) -> Result<Json<ListFilesResponse>, ApiError> {
    let claims = state.authenticate(&headers)?;

    let files = blocking(move || {
        state
            .files
            .list_files(claims.user_id, &query.prefix, query.recursive)
            .map_err(ApiError::from)
    })
    .await?;

    Ok(Json(ListFilesResponse {
        files: files.into_iter().map(FileResponse::from).collect(),
    }))
}

async fn download_file_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let claims = state.authenticate(&headers)?;

    let key = filename.clone();
    let (content_type, data) = blocking(move || {
        let mut reader = state
            .files
            .get_file(claims.user_id, &key)
            .map_err(ApiError::from)?;
        let content_type = reader.content_type().to_string();
        let mut data = Vec::with_capacity(reader.size() as usize);
        reader
            .read_to_end(&mut data)
            .map_err(|_| ApiError::internal())?;
        Ok((content_type, data))
    })
    .await?;

    let content_type = HeaderValue::from_str(&content_type)
        .unwrap_or(HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
    let base_name = filename.rsplit('/').next().unwrap_or(&filename);
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", base_name))
        .unwrap_or(HeaderValue::from_static("attachment"));

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Bytes::from(data),
    )
        .into_response())
}

async fn upload_file_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let claims = state.authenticate(&headers)?;

    let mut path = String::new();
    let mut file: Option<(String, Option<String>, Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.to_string()))?
    {
        match field.name() {
            Some("path") => {
                path = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(e.to_string()))?;
            }
            Some("file") => {
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| ApiError::bad_request("file has no name"))?;
                let content_type = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(e.to_string()))?;
                file = Some((file_name, content_type, data));
            }
            _ => {}
        }
    }

    let (file_name, content_type, data) =
        file.ok_or_else(|| ApiError::bad_request("No file provided"))?;
    let key = upload_key(&path, &file_name);

    let info = blocking(move || {
        state
            .files
            .upload_file(
                claims.user_id,
                &key,
                &mut &data[..],
                data.len() as u64,
                content_type.as_deref(),
            )
            .map_err(ApiError::from)
    })
    .await?;

    Ok(Json(UploadResponse {
        message: "File uploaded".to_string(),
        object_name: info.key,
        etag: info.etag,
        size: info.size,
    }))
}

async fn delete_file_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(filename): Path<String>,
) -> Result<Json<DeleteFileResponse>, ApiError> {
    let claims = state.authenticate(&headers)?;

    let key = filename.clone();
    blocking(move || {
        state
            .files
            .delete_file(claims.user_id, &key)
            .map_err(ApiError::from)
    })
    .await?;

    Ok(Json(DeleteFileResponse {
        message: "File deleted".to_string(),
        filename,
    }))
}

async fn list_folders_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListFoldersQuery>,
) -> Result<Json<ListFoldersResponse>, ApiError> {
    let claims = state.authenticate(&headers)?;

    let folders = blocking(move || {
        state
            .files
            .list_folders(claims.user_id, &query.prefix)
            .map_err(ApiError::from)
    })
    .await?;

    Ok(Json(ListFoldersResponse {
        folders: folders.into_iter().map(|name| FolderEntry { name }).collect(),
    }))
}

async fn create_folder_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateFolderRequest>,
) -> Result<Json<FolderResponse>, ApiError> {
    let claims = state.authenticate(&headers)?;
    if request.folder_name.is_empty() {
        return Err(ApiError::bad_request("folder_name is required"));
    }

    let name = request.folder_name.clone();
    blocking(move || {
        state
            .files
            .create_folder(claims.user_id, &name)
            .map_err(ApiError::from)
    })
    .await?;

    Ok(Json(FolderResponse {
        message: "Folder created".to_string(),
        foldername: request.folder_name,
    }))
}

async fn delete_folder_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(foldername): Path<String>,
) -> Result<Json<FolderResponse>, ApiError> {
    let claims = state.authenticate(&headers)?;

    let name = foldername.clone();
    blocking(move || {
        state
            .files
            .delete_folder(claims.user_id, &name)
            .map_err(ApiError::from)
    })
    .await?;

    Ok(Json(FolderResponse {
        message: "Folder deleted".to_string(),
        foldername,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_key() {
        assert_eq!(upload_key("", "a.txt"), "a.txt");
        assert_eq!(upload_key("docs", "a.txt"), "docs/a.txt");
        assert_eq!(upload_key("docs/", "a.txt"), "docs/a.txt");
        assert_eq!(upload_key("/docs/2024", "a.txt"), "docs/2024/a.txt");
    }

    #[test]
    fn test_list_query_defaults() {
        let query: ListFilesQuery = serde_json::from_str("{}").unwrap();
        assert!(query.prefix.is_empty());
        assert!(!query.recursive);
    }
}
