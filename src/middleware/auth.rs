use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;

use crate::{AppState, error::AppError, utils::verify_token};

pub const SESSION_COOKIE: &str = "session";
const BEARER_PREFIX: &str = "Bearer ";

/// The logged-in user behind a request on a protected route.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub username: String,
    pub session_id: String,
}

/// Resolves a session token to its user. The signature and expiry must
/// check out, the session must still be live, and the user must exist.
pub fn resolve_session(state: &AppState, token: &str) -> Result<CurrentUser, AppError> {
    let claims = verify_token(token, &state.config).map_err(|e| {
        tracing::debug!("rejected session token: {}", e);
        AppError::Unauthorized
    })?;

    let session = state
        .sessions
        .get(&claims.sid)
        .ok_or(AppError::Unauthorized)?;
    if session.username != claims.sub || !state.users.contains(&session.username) {
        return Err(AppError::Unauthorized);
    }

    Ok(CurrentUser {
        username: session.username,
        session_id: session.session_id,
    })
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    // the cookie wins when both carriers are present
    let token = jar
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .or_else(|| {
            request
                .headers()
                .get(AUTHORIZATION)
                .and_then(|h| h.to_str().ok())
                .and_then(|h| h.strip_prefix(BEARER_PREFIX))
                .map(|token| token.trim().to_string())
        })
        .ok_or(AppError::Unauthorized)?;

    let current_user = resolve_session(&state, &token)?;
    request.extensions_mut().insert(current_user);

    Ok(next.run(request).await)
}
