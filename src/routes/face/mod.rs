mod handler;
mod model;

pub use handler::detect_face;
pub use model::DetectFaceResponse;
