use axum::{extract::State, Json};
use serde::Serialize;

use crate::cache::CacheStats;
use crate::http::server::AppState;
use crate::lifecycle::SweepReport;
use crate::security::LimiterStats;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
}

#[derive(Serialize)]
pub struct ClearedCache {
    pub removed: usize,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

pub async fn get_cache(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.pipeline.cache().stats())
}

pub async fn clear_cache(State(state): State<AppState>) -> Json<ClearedCache> {
    let removed = state.pipeline.cache().clear();
    tracing::info!(removed, "Cache cleared via admin API");
    Json(ClearedCache { removed })
}

pub async fn get_limiter(State(state): State<AppState>) -> Json<LimiterStats> {
    Json(state.pipeline.limiter().stats())
}

pub async fn run_sweep(State(state): State<AppState>) -> Json<SweepReport> {
    Json(state.reaper.sweep())
}
