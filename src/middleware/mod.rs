mod auth;
mod error_handler;

pub use auth::{CurrentUser, SESSION_COOKIE, auth_middleware, resolve_session};
pub use error_handler::log_errors;
