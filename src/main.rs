use actix_cors::Cors;
use actix_web::{http::header, middleware::NormalizePath, web, App, HttpServer};
use deadpool_redis::{Config as RedisConfig, Runtime};
use tracing_actix_web::TracingLogger;

use image_service::{
    background_task::start_outcome_listener,
    db::postgres::{create_pool, run_migrations},
    graceful_shutdown::shutdown_signal,
    middlewares::auth::AuthMiddleware,
    queue::RedisQueue,
    routes::configure_routes,
    settings::{AppConfig, AppEnvironment},
    storage::LocalBlobStorage,
    telemetry::init_tracing,
    AppState,
};

fn build_cors(origins: &[String]) -> Cors {
    let cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "OPTIONS"])
        .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .max_age(3600);

    if origins.iter().any(|o| o == "*") {
        return cors.allow_any_origin();
    }

    origins
        .iter()
        .fold(cors, |cors, origin| cors.allowed_origin(origin))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let env = AppEnvironment::from_env().unwrap_or(AppEnvironment::Development);
    init_tracing(&env);

    let config = match AppConfig::new() {
        Ok(cfg) => {
            tracing::info!("Loaded configuration: {:?}", cfg);
            cfg
        },
        Err(e) => {
            tracing::error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let pool = match create_pool(&config.database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Failed to create database connection pool: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run_migrations(&pool).await {
        tracing::error!("Database migration failed: {}", e);
        std::process::exit(1);
    }

    let redis_pool = match RedisConfig::from_url(config.redis_url.as_str()).create_pool(Some(Runtime::Tokio1)) {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Failed to create Redis pool: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = LocalBlobStorage::init(config.storage_root.clone()).await {
        tracing::error!("Storage root is not usable: {}", e);
        std::process::exit(1);
    }

    let app_state = web::Data::new(AppState::new(&config, pool.clone(), redis_pool.clone()));

    let outcomes = RedisQueue::new(
        redis_pool,
        config.outcome_queue.clone(),
        config.queue_pop_timeout(),
    );
    let listener = tokio::spawn(start_outcome_listener(
        app_state.transform_handler.image_repo.clone(),
        outcomes,
    ));

    let server_addr = format!("{}:{}", config.host, config.port);
    let cors_origins = config.cors_origins();

    tracing::info!(
        "🚀 Starting {} v{} on {} with {} workers",
        config.name,
        env!("CARGO_PKG_VERSION"),
        server_addr,
        config.worker_count
    );

    let server = HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(AuthMiddleware)
            .wrap(NormalizePath::trim())
            .wrap(build_cors(&cors_origins))
            .wrap(TracingLogger::default())
            .configure(configure_routes)
    })
    .workers(config.worker_count)
    .bind(server_addr)?
    .run();

    let result = tokio::select! {
        res = server => res,
        _ = shutdown_signal() => Ok(()),
    };

    listener.abort();
    tracing::info!("Server stopped");
    result
}
