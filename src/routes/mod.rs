pub mod face;
pub mod health;
pub mod text;
pub mod user;
