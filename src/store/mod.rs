//! In-process state shared by the request handlers. Nothing here survives a
//! restart.

mod sessions;
mod users;

pub use sessions::{Session, SessionStore};
pub use users::UserStore;
