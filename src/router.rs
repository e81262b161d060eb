use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

use crate::{
    AppState,
    middleware::{auth_middleware, log_errors},
    routes,
};

// open to anonymous callers
fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(routes::health::health))
        .route("/signup", post(routes::user::signup))
        .route("/login", post(routes::user::login))
}

// need a live session
fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/logout", get(routes::user::logout))
        .route("/detect_face", post(routes::face::detect_face))
        .route("/detect_text", post(routes::text::detect_text))
        .layer(axum::middleware::from_fn_with_state(state, auth_middleware))
}

pub fn create_router(state: AppState) -> Router {
    let router = Router::new()
        .merge(public_routes())
        .merge(protected_routes(state.clone()))
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(axum::middleware::from_fn(log_errors));

    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding permissive CORS layer for development");
        router.layer(tower_http::cors::CorsLayer::permissive())
    };

    router.with_state(state)
}
