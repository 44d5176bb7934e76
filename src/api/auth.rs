use actix_web::{web, HttpResponse};

use super::AppState;
use crate::{
    services::{
        auth_service::{Claims, LoginRequest},
        evaluation_service, settings_service,
    },
    utils::AppError,
    views::DashboardView,
};

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful, returns token and dashboard", body = DashboardView),
        (status = 400, description = "Empty code"),
        (status = 401, description = "Invalid code or user not found"),
        (status = 500, description = "Login failed")
    )
)]
pub async fn login(
    state: web::Data<AppState>,
    request: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    log::info!("🔐 POST /auth/login");

    let settings = state.current_settings();
    let outcome = evaluation_service::handle_login(
        state.store.as_ref(),
        &state.sessions,
        &state.jwt,
        &settings,
        &request.code,
    )
    .await
    .map_err(|e| {
        log::warn!("❌ Login failed: {}", e);
        e
    })?;

    let dashboard = {
        let mut session = outcome.session.lock().await;
        // Settings published while the session was being built never reached it.
        settings_service::reconcile_session(
            &mut session,
            state.store.as_ref(),
            &state.current_settings(),
        )
        .await;
        let notice = session.take_notice();
        DashboardView::build(&session, notice)
    };

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "token": outcome.token,
        "session_id": outcome.session_id,
        "user": outcome.user,
        "dashboard": dashboard
    })))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    tag = "Auth",
    responses(
        (status = 200, description = "Session closed"),
        (status = 401, description = "Missing or invalid token")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn logout(state: web::Data<AppState>, user: web::ReqData<Claims>) -> HttpResponse {
    log::info!("🚪 POST /auth/logout - user: {}", user.sub);
    let removed = state.sessions.remove(&user.sid).await;

    HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "session_closed": removed,
        "dashboard": DashboardView::login(state.current_settings().is_open, None)
    }))
}
