mod handler;
mod model;

pub use handler::{login, logout, signup};
pub use model::{CredentialsRequest, MessageResponse};
