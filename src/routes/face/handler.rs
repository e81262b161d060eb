use axum::{
    Extension,
    extract::{Json, Multipart, State, multipart::MultipartRejection},
    http::StatusCode,
};
use axum::body::Bytes;
use image::ImageError;

use crate::{
    AppState,
    detection::decode_grayscale,
    error::{AppError, AppResult},
    middleware::CurrentUser,
};

use super::model::{DetectFaceResponse, IMAGE_FIELD};

/// Pulls the first `image` field out of the form. Other fields are skipped.
async fn read_image_field(mut multipart: Multipart) -> AppResult<Option<Bytes>> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Ok(None),
            Err(e) => return Err(multipart_error(e.status(), e.body_text())),
        };
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        return field
            .bytes()
            .await
            .map(Some)
            .map_err(|e| multipart_error(e.status(), e.body_text()));
    }
}

fn multipart_error(status: StatusCode, detail: String) -> AppError {
    tracing::debug!(%status, "multipart read failed: {}", detail);
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge
    } else {
        AppError::bad_request("No image uploaded")
    }
}

fn decode_error(e: ImageError) -> AppError {
    tracing::debug!("undecodable upload: {}", e);
    match e {
        ImageError::Limits(_) => AppError::bad_request("Image dimensions too large"),
        _ => AppError::bad_request("Invalid image data"),
    }
}

#[axum::debug_handler]
pub async fn detect_face(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<DetectFaceResponse>> {
    let multipart = multipart.map_err(|_| AppError::bad_request("No image uploaded"))?;
    let bytes = read_image_field(multipart)
        .await?
        .ok_or_else(|| AppError::bad_request("No image uploaded"))?;

    let detector = state.detector.clone();
    let max_dimension = state.config.max_image_dimension;
    let faces = tokio::task::spawn_blocking(move || {
        decode_grayscale(&bytes, max_dimension).map(|image| detector.detect(&image))
    })
    .await
    .map_err(|e| AppError::internal(format!("face detection task failed: {}", e)))?
    .map_err(decode_error)?;

    tracing::debug!(username = %user.username, faces = faces.len(), "faces detected");
    Ok(Json(DetectFaceResponse {
        faces_detected: faces.len(),
        user: user.username,
        faces,
    }))
}
