use serde::Serialize;

use crate::detection::FaceRect;

/// Multipart field carrying the uploaded picture.
pub const IMAGE_FIELD: &str = "image";

#[derive(Debug, Serialize)]
pub struct DetectFaceResponse {
    pub faces_detected: usize,
    pub user: String,
    pub faces: Vec<FaceRect>,
}
