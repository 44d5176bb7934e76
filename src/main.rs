use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use peer_evaluation::{
    api::{self, AppState},
    config::{AppConfig, StoreBackend},
    database, jobs, middleware, seeds,
    session::SessionRegistry,
    store::{MemoryStore, MongoStore, SharedStore},
};
use std::sync::Arc;
use tokio::sync::watch;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = AppConfig::from_env()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    log::info!("🚀 Starting Peer Evaluation Service...");

    let store: SharedStore = match config.store_backend {
        StoreBackend::MongoDB => {
            let database_url = config.database_url.clone().unwrap_or_default();
            log::info!("📊 Database: {}", database_url);
            let db = database::MongoDB::new(&database_url).await.map_err(|e| {
                log::error!("❌ Failed to connect to MongoDB: {}", e);
                std::io::Error::new(std::io::ErrorKind::ConnectionRefused, e.to_string())
            })?;
            log::info!("✅ MongoDB connected successfully");
            Arc::new(MongoStore::new(db))
        }
        StoreBackend::Memory => {
            log::warn!("⚠️  Using the in-memory store. Data is lost on restart.");
            let memory = MemoryStore::new();
            seeds::questions_seed::seed_memory_store(&memory);
            Arc::new(memory)
        }
    };

    // Settings snapshot and background watcher
    let initial_settings = jobs::settings_watcher::load_initial_settings(store.as_ref()).await;
    log::info!(
        "⚙️  Evaluations are {} (period: {})",
        if initial_settings.is_open { "OPEN" } else { "CLOSED" },
        initial_settings.period_id()
    );
    let (settings_tx, settings_rx) = watch::channel(initial_settings);
    let sessions = Arc::new(SessionRegistry::new());

    log::info!("📅 Starting background jobs...");
    jobs::settings_watcher::start_settings_watcher(
        store.clone(),
        sessions.clone(),
        settings_tx,
        config.settings_poll_interval_secs,
        chrono::Duration::hours(config.jwt.ttl_hours),
    );
    log::info!("✅ Background jobs started");

    let app_state = web::Data::new(AppState::new(
        store,
        sessions,
        config.jwt.clone(),
        settings_rx,
    ));

    let host = config.host.clone();
    let port = config.port;
    log::info!("🌐 Server starting on {}:{}", host, port);
    log::info!("📚 Swagger UI available at: http://{}:{}/swagger-ui/", host, port);
    log::info!("📄 OpenAPI spec at: http://{}:{}/api-docs/openapi.json", host, port);

    let allowed_origins = config.cors_allowed_origins.clone();

    // Start HTTP server
    HttpServer::new(move || {
        let cors = allowed_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![
                actix_web::http::header::AUTHORIZATION,
                actix_web::http::header::CONTENT_TYPE,
                actix_web::http::header::ACCEPT,
            ])
            .expose_headers(vec![actix_web::http::header::CONTENT_TYPE])
            .supports_credentials()
            .max_age(3600);

        // Generate OpenAPI specification
        let openapi = api::swagger::ApiDoc::openapi();

        App::new()
            .app_data(app_state.clone())
            .wrap(cors)
            .wrap(middleware::SecurityHeaders)
            .wrap(Logger::default())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi.clone())
            )
            .configure(api::configure_routes)
    })
    .bind(format!("{}:{}", host, port))?
    .run()
    .await
}
