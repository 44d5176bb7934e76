use actix_web::{web, HttpResponse};

use super::AppState;
use crate::{
    services::{
        auth_service::Claims,
        evaluation_service::{self, SubmitEvaluationRequest},
    },
    session::NoticeKind,
    utils::AppError,
    views::{DashboardView, EvaluationFormView, PeerStatsView},
};

#[utoipa::path(
    get,
    path = "/api/v1/evaluation/dashboard",
    tag = "Evaluation",
    responses(
        (status = 200, description = "Current screen for this session", body = DashboardView),
        (status = 401, description = "Session expired")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_dashboard(
    state: web::Data<AppState>,
    user: web::ReqData<Claims>,
) -> Result<HttpResponse, AppError> {
    let session = state.session_for(&user).await?;
    let mut session = session.lock().await;
    session.touch();
    let notice = session.take_notice();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "dashboard": DashboardView::build(&session, notice)
    })))
}

#[utoipa::path(
    post,
    path = "/api/v1/evaluation/refresh",
    tag = "Evaluation",
    responses(
        (status = 200, description = "Data reloaded; a failed reload is reported in the notice", body = DashboardView),
        (status = 401, description = "Session expired")
    ),
    security(("bearer_auth" = []))
)]
pub async fn refresh(
    state: web::Data<AppState>,
    user: web::ReqData<Claims>,
) -> Result<HttpResponse, AppError> {
    log::info!("🔄 POST /evaluation/refresh - user: {}", user.sub);
    let session = state.session_for(&user).await?;
    let mut session = session.lock().await;
    session.touch();

    if let Err(e) = evaluation_service::setup_evaluation(&mut session, state.store.as_ref()).await {
        session.set_notice(NoticeKind::Error, e.user_message());
    }
    let notice = session.take_notice();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "dashboard": DashboardView::build(&session, notice)
    })))
}

#[utoipa::path(
    get,
    path = "/api/v1/evaluation/peers/{peer_id}/form",
    tag = "Evaluation",
    params(("peer_id" = String, Path, description = "Peer user id")),
    responses(
        (status = 200, description = "Evaluation form for the peer", body = EvaluationFormView),
        (status = 400, description = "Questions missing"),
        (status = 403, description = "Evaluations are closed"),
        (status = 404, description = "Unknown peer"),
        (status = 409, description = "Peer already evaluated")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_form(
    state: web::Data<AppState>,
    user: web::ReqData<Claims>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let peer_id = path.into_inner();
    let session = state.session_for(&user).await?;
    let mut session = session.lock().await;
    session.touch();

    let peer = evaluation_service::load_evaluation_form(&mut session, &peer_id)?;
    let form = EvaluationFormView::build(
        &peer,
        session.categorized_questions(),
        session.is_debug_mode(),
    );

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "form": form
    })))
}

#[utoipa::path(
    get,
    path = "/api/v1/evaluation/peers/{peer_id}/stats",
    tag = "Evaluation",
    params(("peer_id" = String, Path, description = "Peer user id")),
    responses(
        (status = 200, description = "Averages of this session's evaluation of the peer", body = PeerStatsView),
        (status = 404, description = "No stats available")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_peer_stats(
    state: web::Data<AppState>,
    user: web::ReqData<Claims>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let peer_id = path.into_inner();
    let session = state.session_for(&user).await?;
    let mut session = session.lock().await;
    session.touch();

    let averages = evaluation_service::peer_averages_from_state(&session, &peer_id)
        .ok_or_else(|| AppError::NotFound("No stats available.".to_string()))?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "stats": PeerStatsView::build(&peer_id, &averages)
    })))
}

#[utoipa::path(
    post,
    path = "/api/v1/evaluation/submit",
    tag = "Evaluation",
    request_body = SubmitEvaluationRequest,
    responses(
        (status = 200, description = "Evaluation stored", body = DashboardView),
        (status = 400, description = "Incomplete form or missing peer"),
        (status = 403, description = "Evaluations are closed"),
        (status = 500, description = "Write failed or data integrity issue")
    ),
    security(("bearer_auth" = []))
)]
pub async fn submit(
    state: web::Data<AppState>,
    user: web::ReqData<Claims>,
    request: web::Json<SubmitEvaluationRequest>,
) -> Result<HttpResponse, AppError> {
    log::info!("📝 POST /evaluation/submit - user: {}", user.sub);
    let session = state.session_for(&user).await?;
    let mut session = session.lock().await;
    session.touch();

    let outcome =
        evaluation_service::submit_evaluation(&mut session, state.store.as_ref(), &request).await?;
    let notice = session.take_notice();
    let message = notice.as_ref().map(|n| n.text.clone());

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": message,
        "outcome": outcome,
        "dashboard": DashboardView::build(&session, notice)
    })))
}

#[utoipa::path(
    post,
    path = "/api/v1/evaluation/re-evaluate",
    tag = "Evaluation",
    responses(
        (status = 200, description = "Back to the peer list", body = DashboardView),
        (status = 403, description = "Evaluations are closed")
    ),
    security(("bearer_auth" = []))
)]
pub async fn re_evaluate(
    state: web::Data<AppState>,
    user: web::ReqData<Claims>,
) -> Result<HttpResponse, AppError> {
    let session = state.session_for(&user).await?;
    let mut session = session.lock().await;
    session.touch();

    evaluation_service::request_re_evaluation(&mut session)?;
    let notice = session.take_notice();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "dashboard": DashboardView::build(&session, notice)
    })))
}

#[utoipa::path(
    get,
    path = "/api/v1/evaluation/form/random-scores",
    tag = "Evaluation",
    responses(
        (status = 200, description = "Random 1-5 answers for the open form"),
        (status = 400, description = "No form is open"),
        (status = 403, description = "Debug mode is off")
    ),
    security(("bearer_auth" = []))
)]
pub async fn random_scores(
    state: web::Data<AppState>,
    user: web::ReqData<Claims>,
) -> Result<HttpResponse, AppError> {
    let session = state.session_for(&user).await?;
    let mut session = session.lock().await;
    session.touch();

    let scores = evaluation_service::random_scores(&session, &mut rand::thread_rng())?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "scores": scores
    })))
}
