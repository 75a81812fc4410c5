//! # Health Endpoint
//!
//! Liveness probe for deployment orchestration. Connection and session
//! counts come straight from the shared state, so the numbers reflect what
//! the WebSocket layer is actually holding.

use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;

pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let config = state.get_config();

    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": state.get_uptime_seconds(),
        "service": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "host": config.server.host,
            "port": config.server.port
        },
        "connections": {
            "active": state.active_connections(),
            "interviews_in_progress": state.registry.active_count()
        },
        "storage": {
            "uploads_enabled": state.storage.is_some()
        }
    }))
}
