use std::sync::Arc;

use config::Config;
use database::repositories::Repository;
use lifecycle::SegmentLifecycle;

pub mod config;
pub mod database;
pub mod error;
pub mod lifecycle;
pub mod middleware;
pub mod router;
pub mod routes;
pub mod utils;

pub use router::build_router;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub repo: Arc<dyn Repository>,
    pub lifecycle: SegmentLifecycle<dyn Repository>,
}

impl AppState {
    pub fn new(config: Config, repo: Arc<dyn Repository>) -> Self {
        let lifecycle = SegmentLifecycle::new(Arc::clone(&repo));
        Self {
            config,
            repo,
            lifecycle,
        }
    }
}
