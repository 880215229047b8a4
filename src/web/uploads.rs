use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::{ApiError, AppState};
use crate::auth::RequireUser;
use crate::db;
use crate::storage::ImageStore;

/// 5 MiB cap on image uploads.
const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    filename: String,
}

fn images(state: &AppState) -> Result<&ImageStore, ApiError> {
    state
        .images
        .as_ref()
        .ok_or(ApiError::Unavailable("Uploads are not configured"))
}

fn check_upload(filename: &str, data: &Bytes) -> Result<(), ApiError> {
    if data.is_empty() {
        return Err(ApiError::BadRequest("Empty upload".into()));
    }
    if data.len() > MAX_UPLOAD_BYTES {
        return Err(ApiError::BadRequest("Upload exceeds 5 MiB limit".into()));
    }

    let extension = filename.rsplit('.').next().unwrap_or("").to_lowercase();
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(ApiError::BadRequest(
            "Only png, jpg, jpeg, gif, and webp uploads are accepted".into(),
        ));
    }

    Ok(())
}

/// POST /uploads/avatar?filename= — stores the image and points the
/// caller's profile at it.
pub async fn upload_avatar(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Query(query): Query<UploadQuery>,
    data: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let store = images(&state)?;
    check_upload(&query.filename, &data)?;

    let key = store.store_image("avatars", &query.filename, &data).await?;
    db::set_profile_avatar(state.db.pool(), user.id, &key).await?;

    info!(user_id = user.id, key = %key, "Avatar uploaded");

    Ok(Json(json!({ "key": key, "url": store.public_url(&key) })))
}

/// POST /uploads/cover?filename= — stores a post cover image and returns
/// its key for use in a subsequent post create/update.
pub async fn upload_cover(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Query(query): Query<UploadQuery>,
    data: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let store = images(&state)?;
    check_upload(&query.filename, &data)?;

    let key = store.store_image("covers", &query.filename, &data).await?;

    info!(user_id = user.id, key = %key, "Cover image uploaded");

    Ok(Json(json!({ "key": key, "url": store.public_url(&key) })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_upload_rejects_bad_extension() {
        let data = Bytes::from_static(b"content");
        assert!(check_upload("malware.exe", &data).is_err());
        assert!(check_upload("photo.png", &data).is_ok());
        assert!(check_upload("PHOTO.JPG", &data).is_ok());
    }

    #[test]
    fn test_check_upload_rejects_empty() {
        assert!(check_upload("photo.png", &Bytes::new()).is_err());
    }
}
