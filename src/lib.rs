use std::sync::Arc;

use config::Config;
use detection::FaceDetector;
use screening::KeywordScreen;
use store::{SessionStore, UserStore};

pub mod config;
pub mod detection;
pub mod error;
pub mod middleware;
pub mod router;
pub mod routes;
pub mod screening;
pub mod store;
pub mod utils;

pub use router::create_router;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub users: Arc<UserStore>,
    pub sessions: Arc<SessionStore>,
    pub detector: Arc<dyn FaceDetector>,
    pub screen: Arc<KeywordScreen>,
}

impl AppState {
    /// Fresh state with empty user and session tables.
    pub fn new(config: Config, detector: Arc<dyn FaceDetector>) -> Self {
        let screen = KeywordScreen::new(&config.flagged_keywords);
        Self {
            config,
            users: Arc::new(UserStore::new()),
            sessions: Arc::new(SessionStore::new()),
            detector,
            screen: Arc::new(screen),
        }
    }
}
