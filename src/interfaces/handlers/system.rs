use actix_web::{get, web, HttpResponse, Responder};
use chrono::Utc;
use deadpool_redis::redis;
use humantime::format_duration;
use serde::Serialize;
use std::time::Duration;

use crate::{
    constants::START_TIME,
    queue::Queue,
    repositories::image::ImageRepository,
    AppState,
};

#[derive(Serialize)]
struct HealthCheckResponse {
    status: &'static str,
    uptime: String,
    timestamp: String,
    start_at: String,
    version: &'static str,
    database: &'static str,
    redis_status: &'static str,
    job_queue_depth: Option<u64>,
}

async fn redis_status(state: &AppState) -> &'static str {
    let mut conn = match state.redis_pool.get().await {
        Ok(conn) => conn,
        Err(_) => return "Unavailable",
    };

    let pong: redis::RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
    match pong {
        Ok(pong) if pong == "PONG" => "OK",
        _ => "Unavailable",
    }
}

#[get("/health")]
pub async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let now_utc = Utc::now();
    let uptime = now_utc.signed_duration_since(*START_TIME).num_seconds().max(0) as u64;

    let database = match state.transform_handler.image_repo.check_connection().await {
        Ok(_) => "OK",
        Err(_) => "Unavailable",
    };
    let redis_status = redis_status(&state).await;
    let job_queue_depth = state.transform_handler.job_queue.depth().await.ok();

    let healthy = database == "OK" && redis_status == "OK";
    let response = HealthCheckResponse {
        status: if healthy { "healthy" } else { "degraded" },
        uptime: format_duration(Duration::from_secs(uptime)).to_string(),
        timestamp: now_utc.to_rfc3339(),
        start_at: START_TIME.to_rfc3339(),
        version: env!("CARGO_PKG_VERSION"),
        database,
        redis_status,
        job_queue_depth,
    };

    if healthy {
        HttpResponse::Ok().json(response)
    } else {
        HttpResponse::ServiceUnavailable().json(response)
    }
}
