use axum::{
    Extension,
    extract::{Json, State, rejection::JsonRejection},
};

use crate::{
    AppState,
    error::{AppError, AppResult},
    middleware::CurrentUser,
};

use super::model::{DetectTextRequest, DetectTextResponse};

#[axum::debug_handler]
pub async fn detect_text(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    body: Result<Json<DetectTextRequest>, JsonRejection>,
) -> AppResult<Json<DetectTextResponse>> {
    let Json(req) = body.map_err(|_| AppError::bad_request("Text not provided"))?;

    let found = state.screen.scan(&req.text);
    if !found.is_empty() {
        // never log the text itself
        tracing::info!(username = %user.username, keywords = ?found, "flagged text");
    }

    Ok(Json(DetectTextResponse::from_matches(found)))
}
