//! Image upload

use std::path::Path;
use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::routing::post;
use axum::Router;
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::http::error::ApiError;
use crate::http::extractors::CurrentUser;
use crate::http::response::{ok, ApiResult};
use crate::http::server::AppState;

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

/// Multipart field carrying the file
const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize)]
pub struct Uploaded {
    pub url: String,
}

/// Lowercased extension of an accepted image file name.
fn image_extension(file_name: &str) -> Option<String> {
    let ext = Path::new(file_name).extension()?.to_str()?.to_ascii_lowercase();
    IMAGE_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// `<timestamp>-<random>.<ext>`
fn stored_name(ext: &str) -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("{}-{}.{}", Utc::now().format("%Y%m%d%H%M%S"), &random[..8], ext)
}

/// POST /upload/image
async fn upload_image(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Uploaded> {
    let mut multipart = multipart.map_err(|e| ApiError::bad_request(e.body_text()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let ext = field
            .file_name()
            .and_then(image_extension)
            .ok_or_else(|| ApiError::bad_request("only jpg, jpeg, png, gif and webp images are accepted"))?;
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        if data.is_empty() {
            return Err(ApiError::bad_request("uploaded file is empty"));
        }

        let name = stored_name(&ext);
        tokio::fs::write(state.upload_dir.join(&name), &data)
            .await
            .map_err(ApiError::internal)?;
        tracing::info!(user_id = user.id, file = %name, bytes = data.len(), "image uploaded");

        return ok(Uploaded {
            url: format!("{}/{}", state.upload_url, name),
        });
    }

    Err(ApiError::bad_request("missing multipart field 'file'"))
}

pub fn user_routes() -> Router<Arc<AppState>> {
    Router::new().route("/upload/image", post(upload_image))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_known_image_extensions() {
        assert_eq!(image_extension("logo.PNG").as_deref(), Some("png"));
        assert_eq!(image_extension("a.b.jpeg").as_deref(), Some("jpeg"));
        assert_eq!(image_extension("cat.webp").as_deref(), Some("webp"));
    }

    #[test]
    fn rejects_other_files() {
        assert!(image_extension("notes.txt").is_none());
        assert!(image_extension("no_extension").is_none());
        assert!(image_extension("").is_none());
    }

    #[test]
    fn stored_name_keeps_extension() {
        let name = stored_name("gif");
        assert!(name.ends_with(".gif"));
        // 14 digit timestamp, dash, 8 random chars
        assert_eq!(name.len(), 14 + 1 + 8 + 4);
    }
}
