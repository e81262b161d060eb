use axum::{
    Extension,
    extract::{Json, State, rejection::JsonRejection},
};
use axum_extra::extract::{
    CookieJar,
    cookie::{Cookie, SameSite},
};

use crate::{
    AppState,
    error::{AppError, AppResult},
    middleware::{CurrentUser, SESSION_COOKIE},
    utils::{generate_token, hash_password, verify_password},
};

use super::model::{CredentialsRequest, MessageResponse};

fn parse_body(body: Result<Json<CredentialsRequest>, JsonRejection>) -> AppResult<CredentialsRequest> {
    body.map(|Json(req)| req).map_err(|e| {
        tracing::debug!("rejected credentials body: {}", e.body_text());
        AppError::bad_request("Invalid JSON body")
    })
}

fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

#[axum::debug_handler]
pub async fn signup(
    State(state): State<AppState>,
    body: Result<Json<CredentialsRequest>, JsonRejection>,
) -> AppResult<Json<MessageResponse>> {
    let req = parse_body(body)?;
    let (username, password) = req
        .complete()
        .ok_or_else(|| AppError::bad_request("Username and password are required"))?;

    // skips hashing for taken names; insert_new has the final say
    if state.users.contains(username) {
        return Err(AppError::Conflict("Username already exists".into()));
    }

    let password_hash = hash_password(password, state.config.bcrypt_cost)?;
    if !state.users.insert_new(username, password_hash) {
        return Err(AppError::Conflict("Username already exists".into()));
    }

    tracing::info!(username, "user registered");
    Ok(Json(MessageResponse::new(format!(
        "User {} registered successfully!",
        username
    ))))
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Result<Json<CredentialsRequest>, JsonRejection>,
) -> AppResult<(CookieJar, Json<MessageResponse>)> {
    let req = parse_body(body)?;
    let (username, password) = req.complete().ok_or(AppError::InvalidCredentials)?;

    let verified = match state.users.password_hash(username) {
        Some(hash) => verify_password(password, &hash)?,
        None => false,
    };
    if !verified {
        tracing::warn!(username, "failed login");
        return Err(AppError::InvalidCredentials);
    }

    let session = state.sessions.create(username, state.config.session_ttl());
    let (token, _) = generate_token(username, &session.session_id, &state.config)?;

    tracing::info!(username, session_id = %session.session_id, "user logged in");
    Ok((
        jar.add(session_cookie(token, state.config.cookie_secure)),
        Json(MessageResponse::new(format!("Logged in as {}!", username))),
    ))
}

#[axum::debug_handler]
pub async fn logout(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    jar: CookieJar,
) -> (CookieJar, Json<MessageResponse>) {
    state.sessions.remove(&user.session_id);
    tracing::info!(username = %user.username, "user logged out");

    (
        jar.remove(Cookie::build(SESSION_COOKIE).path("/")),
        Json(MessageResponse::new("Logged out!")),
    )
}
