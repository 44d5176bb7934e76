use actix_web::{web, HttpResponse};
use serde::Serialize;

use super::AppState;

/// Settings as clients see them. The reset marker stays server-side.
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublicSettings {
    pub is_open: bool,
    pub is_debug: bool,
    pub evaluation_period_id: String,
}

#[utoipa::path(
    get,
    path = "/api/v1/settings",
    tag = "Settings",
    responses(
        (status = 200, description = "Current app settings", body = PublicSettings)
    )
)]
pub async fn get_settings(state: web::Data<AppState>) -> HttpResponse {
    let settings = state.current_settings();
    HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "settings": PublicSettings {
            is_open: settings.is_open,
            is_debug: settings.is_debug,
            evaluation_period_id: settings.period_id().to_string(),
        }
    }))
}
