use std::sync::Arc;

use adslot_engine::FeaturedEngine;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: adslot_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Admission, sweep, and cancellation over `pool`.
    pub engine: FeaturedEngine,
}
