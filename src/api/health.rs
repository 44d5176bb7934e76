use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};

use super::AppState;

#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub store: String,
    pub timestamp: i64,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Store is unreachable", body = HealthResponse)
    )
)]
pub async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let store_ok = state.store.fetch_app_settings().await.is_ok();
    let body = HealthResponse {
        status: if store_ok { "healthy" } else { "degraded" }.to_string(),
        service: "peer-evaluation-service".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: if store_ok { "ok" } else { "unreachable" }.to_string(),
        timestamp: chrono::Utc::now().timestamp(),
    };

    if store_ok {
        HttpResponse::Ok().json(body)
    } else {
        log::warn!("⚠️  Health check: store unreachable");
        HttpResponse::ServiceUnavailable().json(body)
    }
}
