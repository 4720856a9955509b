use std::path::Path;

use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::utils::extract::AppJson;

const PASSWORD_ROUTE_MESSAGE: &str =
    "This route is not for password updates. Please use /updateMyPassword.";

/// An uploaded profile photo that passed the image type check.
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub extension: String,
    pub bytes: Bytes,
}

impl PhotoUpload {
    pub fn new(content_type: &str, bytes: Bytes) -> AppResult<Self> {
        Ok(Self {
            extension: image_extension(content_type)?,
            bytes,
        })
    }
}

/// Body of `PATCH /users/updateMe`: either a multipart form (with an optional
/// `photo` file) or a JSON object. Fields other than name and email are
/// dropped; password fields are refused.
#[derive(Debug, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub photo: Option<PhotoUpload>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileFields {
    name: Option<String>,
    email: Option<String>,
    password: Option<serde_json::Value>,
    password_confirm: Option<serde_json::Value>,
}

impl<S> FromRequest<S> for ProfileUpdate
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("multipart/form-data"));

        if !is_multipart {
            let AppJson(fields) = AppJson::<ProfileFields>::from_request(req, state).await?;
            if fields.password.is_some() || fields.password_confirm.is_some() {
                return Err(AppError::BadRequest(PASSWORD_ROUTE_MESSAGE.to_string()));
            }
            return Ok(ProfileUpdate {
                name: fields.name,
                email: fields.email,
                photo: None,
            });
        }

        let mut multipart = Multipart::from_request(req, state).await?;
        let mut update = ProfileUpdate::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "photo" => {
                    let content_type = field.content_type().unwrap_or_default().to_string();
                    let bytes = field.bytes().await?;
                    // Browsers send an empty part when no file was picked.
                    if !bytes.is_empty() {
                        update.photo = Some(PhotoUpload::new(&content_type, bytes)?);
                    }
                }
                "name" => update.name = Some(field.text().await?),
                "email" => update.email = Some(field.text().await?),
                "password" | "passwordConfirm" => {
                    return Err(AppError::BadRequest(PASSWORD_ROUTE_MESSAGE.to_string()));
                }
                _ => {}
            }
        }

        Ok(update)
    }
}

/// File extension for an `image/*` content type; anything else is refused.
pub fn image_extension(content_type: &str) -> AppResult<String> {
    let not_image =
        || AppError::BadRequest("Not an image! Please upload only images.".to_string());

    let subtype = content_type
        .trim()
        .to_ascii_lowercase()
        .strip_prefix("image/")
        .map(str::to_string)
        .ok_or_else(not_image)?;

    let extension: String = subtype
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect();

    if extension.is_empty() {
        return Err(not_image());
    }

    Ok(extension)
}

pub fn photo_filename(user_id: Uuid, extension: &str) -> String {
    format!(
        "user-{}-{}.{}",
        user_id,
        Utc::now().timestamp_millis(),
        extension
    )
}

/// Write the photo into `dir` and return the stored file name.
pub async fn store_photo(dir: &str, user_id: Uuid, photo: &PhotoUpload) -> AppResult<String> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to create upload directory: {}", e)))?;

    let filename = photo_filename(user_id, &photo.extension);
    tokio::fs::write(Path::new(dir).join(&filename), &photo.bytes)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to store photo: {}", e)))?;

    tracing::debug!(user_id = %user_id, file = %filename, bytes = photo.bytes.len(), "Stored profile photo");

    Ok(filename)
}
