mod handler;
mod model;

pub use handler::detect_text;
pub use model::{DetectTextRequest, DetectTextResponse};
