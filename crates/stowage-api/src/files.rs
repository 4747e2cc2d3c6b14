use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use stowage_types::models::{StoredFile, User};

use crate::auth::AppState;
use crate::error::ApiError;

/// POST /files/upload — multipart, one or more files, quota checked per file.
///
/// The quota is enforced against bytes actually received, aborting as soon
/// as a file crosses the plan limit: a client cannot bypass it by declaring
/// a smaller size than it sends. Nothing touches the blob store or the
/// database for a rejected file. If metadata persistence fails after the
/// blob was written, the blob stays behind as an orphan — harmless in a
/// content-addressed store and left to an external reaper.
pub async fn upload(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    mut multipart: Multipart,
) -> Result<Json<Vec<StoredFile>>, ApiError> {
    let limit = state.quotas.limit_for(user.plan);
    let mut files = Vec::new();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("malformed multipart body: {e}")))?
    {
        // Non-file form fields are ignored.
        let Some(file_name) = field.file_name().map(str::to_owned) else {
            continue;
        };

        let mut data: Vec<u8> = Vec::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| ApiError::Validation(format!("malformed multipart body: {e}")))?
        {
            if let Some(limit) = limit {
                if (data.len() + chunk.len()) as u64 > limit {
                    return Err(ApiError::QuotaExceeded);
                }
            }
            data.extend_from_slice(&chunk);
        }

        if data.is_empty() {
            return Err(ApiError::Validation(format!("file {file_name} is empty")));
        }

        let hash = state.blobs.store(&data).await?;
        let size = data.len() as i64;
        let metadata = json!({ "name": file_name, "size": size }).to_string();

        let row = state.db.insert_file(
            &Uuid::new_v4().to_string(),
            user.id,
            &hash,
            size,
            &metadata,
        )?;

        info!(
            "stored {file_name} ({size} bytes, hash {hash}) for user {}",
            user.id
        );
        files.push(row.into_model()?);
    }

    if files.is_empty() {
        return Err(ApiError::Validation("no files in upload".into()));
    }

    Ok(Json(files))
}

/// GET /files — the caller's file records, oldest first.
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<StoredFile>>, ApiError> {
    let files = state
        .db
        .list_files(user.id)?
        .into_iter()
        .map(|row| row.into_model())
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(Json(files))
}

/// POST /files/{id}/unpin — end retention for one of the caller's files.
/// Already-unpinned files resolve like absent ones, so repeating the call
/// is a 404 and the original retention-end timestamp stands. The blob
/// itself is collected later by an external reaper once nothing pinned
/// references it.
pub async fn unpin(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> Result<Json<StoredFile>, ApiError> {
    let id = Uuid::parse_str(&id).map_err(|_| ApiError::NotFound)?;

    let row = state
        .db
        .unpin_file(user.id, &id.to_string())?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(row.into_model()?))
}
