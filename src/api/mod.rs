pub mod auth;
pub mod evaluation;
pub mod health;
pub mod metrics;
pub mod settings;
pub mod swagger;

use actix_web::web;
use std::sync::Arc;
use tokio::sync::watch;

use crate::{
    config::JwtConfig,
    middleware::AuthMiddleware,
    models::AppSettings,
    services::{auth_service::Claims, settings_service},
    session::{SessionRegistry, SharedSession},
    store::SharedStore,
    utils::AppError,
};

/// Shared handler state.
pub struct AppState {
    pub store: SharedStore,
    pub sessions: Arc<SessionRegistry>,
    pub jwt: JwtConfig,
    pub settings: watch::Receiver<AppSettings>,
}

impl AppState {
    pub fn new(
        store: SharedStore,
        sessions: Arc<SessionRegistry>,
        jwt: JwtConfig,
        settings: watch::Receiver<AppSettings>,
    ) -> Self {
        Self {
            store,
            sessions,
            jwt,
            settings,
        }
    }

    /// Latest settings published by the watcher.
    pub fn current_settings(&self) -> AppSettings {
        self.settings.borrow().clone()
    }

    /// Resolves the session a token points at and applies any settings
    /// change it has not seen yet.
    pub async fn session_for(&self, claims: &Claims) -> Result<SharedSession, AppError> {
        let expired = || AppError::Unauthorized("Session expired. Please log in again.".to_string());
        let session = self.sessions.get(&claims.sid).await.ok_or_else(expired)?;

        {
            let mut state = session.lock().await;
            if state.current_user_id().as_deref() != Some(claims.sub.as_str()) {
                log::warn!("🔒 Token user {} does not own session {}", claims.sub, claims.sid);
                return Err(expired());
            }
            settings_service::reconcile_session(
                &mut state,
                self.store.as_ref(),
                &self.current_settings(),
            )
            .await;
        }
        Ok(session)
    }
}

/// Every route except Swagger UI.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health::health_check))
        .route("/metrics", web::get().to(metrics::get_metrics))
        .service(
            web::scope("/api/v1/auth")
                .route("/login", web::post().to(auth::login))
                .service(
                    web::resource("/logout")
                        .wrap(AuthMiddleware)
                        .route(web::post().to(auth::logout)),
                ),
        )
        .route("/api/v1/settings", web::get().to(settings::get_settings))
        .service(
            web::scope("/api/v1/evaluation")
                .wrap(AuthMiddleware)
                .route("/dashboard", web::get().to(evaluation::get_dashboard))
                .route("/refresh", web::post().to(evaluation::refresh))
                .route("/peers/{peer_id}/form", web::get().to(evaluation::get_form))
                .route("/peers/{peer_id}/stats", web::get().to(evaluation::get_peer_stats))
                .route("/submit", web::post().to(evaluation::submit))
                .route("/re-evaluate", web::post().to(evaluation::re_evaluate))
                .route("/form/random-scores", web::get().to(evaluation::random_scores)),
        );
}
