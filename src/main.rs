use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use facelens::config::Settings;
use facelens::routes::{self, AppState};
use facelens::{GeminiClient, UploadPolicy};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    // Initialize logging
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_level(true);

    if log_format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.json().init();
    }

    info!("Starting Facelens analysis service...");

    // Load configuration
    let settings = Settings::load().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    info!("Configuration loaded (environment: {})", settings.environment);

    // Build the model client once; every worker shares it read-only
    let gemini = if settings.gemini.has_api_key() {
        let client = GeminiClient::from_settings(&settings.gemini).map_err(|e| {
            error!("Failed to initialize Gemini client: {}", e);
            std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
        })?;
        info!(
            "Gemini client initialized (model: {}, timeout: {}s, retries: {})",
            settings.gemini.model, settings.gemini.timeout_secs, settings.gemini.max_retries
        );
        Some(Arc::new(client))
    } else {
        error!("GEMINI_API_KEY is not set; /analyze will answer 500 until it is configured");
        None
    };

    let upload_policy = UploadPolicy::new(settings.upload.max_files, settings.upload.max_file_bytes);

    if settings.expose_error_details() {
        warn!("Verbose error details are enabled for this deployment");
    }

    // Build application state
    let app_state = AppState {
        gemini,
        upload_policy,
        expose_error_details: settings.expose_error_details(),
    };

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
