//! Ingress API - HTTP server
//!
//! Exits 0 on graceful shutdown, 1 on fatal configuration or dependency
//! init failure.

use std::io;
use std::sync::Arc;
use std::time::Instant;

use actix_cors::Cors;
use actix_web::http::header;
use actix_web::{web, App, HttpServer};
use ingress_api::middleware::{JwtAuthMiddleware, LoginRateLimiter, MetricsMiddleware, RequestIdMiddleware};
use ingress_api::{handlers, metrics, ApiConfig, AppState};
use jwt_security::JwtManager;
use metadata_store::VideoRepository;
use otel_config::TracingConfig;
use s3_utils::S3Client;
use sqs_utils::SqsClient;
use tokio::sync::Mutex;
use tracing::info;
use tracing_actix_web::TracingLogger;

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();

    let config = match ApiConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            std::process::exit(1);
        }
    };

    let tracing_config = TracingConfig::from_env(&config.environment);
    if let Err(err) = otel_config::init_tracing("ingress-api", &tracing_config) {
        eprintln!("tracing init failed: {err}");
        std::process::exit(1);
    }

    let jwt = match JwtManager::new(&config.jwt_secret, config.is_production()) {
        Ok(manager) => Arc::new(manager),
        Err(err) => {
            eprintln!("JWT secret rejected: {err}");
            std::process::exit(1);
        }
    };

    let aws_config = aws_config::load_from_env().await;
    let state = AppState {
        s3: S3Client::from_client(aws_sdk_s3::Client::new(&aws_config)),
        queue: SqsClient::from_client(
            aws_sdk_sqs::Client::new(&aws_config),
            config.queue_url.clone(),
        ),
        repo: VideoRepository::from_client(
            aws_sdk_dynamodb::Client::new(&aws_config),
            config.metadata_table.clone(),
        ),
        jwt: jwt.clone(),
        login_limiter: LoginRateLimiter::new(),
        deep_health_last: Arc::new(Mutex::new(None::<Instant>)),
        config: config.clone(),
    };

    let bind_address = ("0.0.0.0", config.port);
    info!(port = config.port, env = %config.environment, "ingress API starting");

    let server_state = state.clone();
    let server = HttpServer::new(move || {
        let mut cors = Cors::default()
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE])
            .max_age(3600);
        for origin in &server_state.config.cors_allowed_origins {
            cors = cors.allowed_origin(origin);
        }

        App::new()
            .app_data(web::Data::new(server_state.clone()))
            .app_data(web::JsonConfig::default().limit(server_state.config.max_body_bytes))
            .wrap(MetricsMiddleware)
            .wrap(TracingLogger::default())
            .wrap(RequestIdMiddleware)
            .wrap(cors)
            .route("/login", web::post().to(handlers::auth::login))
            .service(
                web::scope("/upload")
                    .wrap(JwtAuthMiddleware::new(server_state.jwt.clone()))
                    .route("/init", web::post().to(handlers::uploads::init_upload))
                    .route(
                        "/complete",
                        web::post().to(handlers::uploads::complete_upload),
                    ),
            )
            .route("/latest", web::get().to(handlers::videos::latest_video))
            .route("/videos", web::get().to(handlers::videos::list_videos))
            .route("/health", web::get().to(handlers::health::health))
            .route("/health/deep", web::get().to(handlers::health::deep_health))
            .route("/metrics", web::get().to(metrics::serve_metrics))
    })
    .client_request_timeout(config.header_timeout)
    .client_disconnect_timeout(config.write_timeout)
    .keep_alive(config.idle_timeout)
    .shutdown_timeout(config.shutdown_timeout.as_secs())
    .bind(bind_address)?
    .run();

    let result = server.await;

    state.login_limiter.stop();
    otel_config::shutdown_tracing();
    info!("ingress API stopped");

    result
}
