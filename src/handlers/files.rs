// handlers/files.rs - /api/v1/files handlers

use axum::extract::{Multipart, State};

use crate::config;
use crate::error::ApiError;
use crate::extract::ValidJson;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::file_service::{DeleteFileInput, UploadedFile};
use crate::services::FileService;
use crate::state::AppState;

fn service(state: &AppState) -> FileService {
    FileService::new(state.storage.clone(), config::config().api.max_upload_bytes)
}

/// POST /files/upload - multipart field `file`
pub async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> ApiResult<UploadedFile> {
    let files = service(&state);

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("file").to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await?;

        let uploaded = files.upload(&file_name, content_type.as_deref(), bytes.to_vec()).await?;
        return Ok(ApiResponse::success("File uploaded successfully", uploaded));
    }

    Err(ApiError::bad_request("No file uploaded"))
}

/// DELETE /files/delete - body `{ "fileUrl": ... }`
pub async fn delete(State(state): State<AppState>, ValidJson(input): ValidJson<DeleteFileInput>) -> ApiResult<()> {
    service(&state).delete(&input.file_url).await?;
    Ok(ApiResponse::message("File deleted successfully"))
}
