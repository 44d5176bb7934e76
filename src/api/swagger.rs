use utoipa::OpenApi;
use utoipa::openapi::security::{SecurityScheme, HttpAuthScheme, HttpBuilder};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Peer Evaluation Service API",
        version = "1.0.0",
        description = "Peer evaluation backend. Users log in with a personal code, rate every peer on a 1-5 scale per question, and see averaged summaries once done.\n\n**Authentication:** evaluation endpoints require the JWT Bearer token returned by login."
    ),
    paths(
        // Auth
        crate::api::auth::login,
        crate::api::auth::logout,

        // Health & Metrics
        crate::api::health::health_check,
        crate::api::metrics::get_metrics,

        // Settings
        crate::api::settings::get_settings,

        // Evaluation
        crate::api::evaluation::get_dashboard,
        crate::api::evaluation::refresh,
        crate::api::evaluation::get_form,
        crate::api::evaluation::get_peer_stats,
        crate::api::evaluation::submit,
        crate::api::evaluation::re_evaluate,
        crate::api::evaluation::random_scores,
    ),
    components(
        schemas(
            // Auth
            crate::services::auth_service::LoginRequest,
            crate::models::UserInfo,

            // Health & Metrics
            crate::api::health::HealthResponse,
            crate::api::metrics::MetricsResponse,

            // Settings
            crate::api::settings::PublicSettings,

            // Evaluation
            crate::services::evaluation_service::SubmitEvaluationRequest,
            crate::services::evaluation_service::SubmitOutcome,
            crate::services::evaluation_service::CompletionChange,
            crate::services::scoring::PeerAverages,
            crate::services::scoring::CategoryAverage,
            crate::session::Notice,
            crate::session::NoticeKind,
            crate::views::DashboardView,
            crate::views::Screen,
            crate::views::PeerListItem,
            crate::views::EvaluationFormView,
            crate::views::CategoryView,
            crate::views::QuestionView,
            crate::views::SummaryTable,
            crate::views::SummaryRow,
            crate::views::ChartData,
            crate::views::ChartSeries,
            crate::views::SeriesKind,
            crate::views::PeerStatsView,
            crate::views::CategoryStat,
        )
    ),
    tags(
        (name = "Auth", description = "Code login and logout."),
        (name = "Health", description = "Health check and metrics."),
        (name = "Settings", description = "Evaluation period settings as seen by clients."),
        (name = "Evaluation", description = "Peer list, evaluation forms, submissions and summaries for the logged-in user."),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Token returned by /api/v1/auth/login"))
                        .build()
                ),
            );
        }
    }
}
