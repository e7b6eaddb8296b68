use axum::response::Json;
use serde_json::{json, Value};

pub const POSTCRAFT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Service name reported by the health probes.
pub const SERVICE_NAME: &str = "PostCraft Gateway";

pub async fn health_handler() -> Json<Value> {
    Json(json!({"status": "ok"}))
}
