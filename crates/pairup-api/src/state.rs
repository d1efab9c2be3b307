use std::sync::Arc;

use pairup_engine::Engine;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub engine: Arc<Engine>,
    /// HS256 secret shared with the identity service that mints tokens.
    pub jwt_secret: String,
}

impl AppStateInner {
    pub fn new(engine: Arc<Engine>, jwt_secret: impl Into<String>) -> AppState {
        Arc::new(Self {
            engine,
            jwt_secret: jwt_secret.into(),
        })
    }
}
