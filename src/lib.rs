pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod store;

use std::sync::Arc;

use crate::app::feed::FeedConfig;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub feed: FeedConfig,
    pub session_ttl_hours: u64,
}
