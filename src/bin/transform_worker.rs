use anyhow::Context;
use deadpool_redis::{Config as RedisConfig, Runtime};
use tokio::sync::watch;

use image_service::{
    graceful_shutdown::shutdown_signal,
    queue::RedisQueue,
    settings::{AppEnvironment, WorkerConfig},
    storage::LocalBlobStorage,
    telemetry::init_tracing,
    worker::TransformWorker,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = AppEnvironment::from_env().unwrap_or(AppEnvironment::Development);
    init_tracing(&env);

    let config = WorkerConfig::new().context("invalid worker configuration")?;
    tracing::info!(
        concurrency = config.concurrency,
        job_queue = %config.job_queue,
        "Starting transform worker"
    );

    let redis_pool = RedisConfig::from_url(config.redis_url.as_str())
        .create_pool(Some(Runtime::Tokio1))
        .context("failed to create Redis pool")?;

    let storage = LocalBlobStorage::init(config.storage_root.clone())
        .await
        .context("storage root is not usable")?;

    let jobs = RedisQueue::new(redis_pool.clone(), config.job_queue.clone(), config.queue_pop_timeout());
    let outcomes = RedisQueue::new(redis_pool, config.outcome_queue.clone(), config.queue_pop_timeout());

    let worker = TransformWorker::new(storage, jobs, outcomes, config.concurrency, config.job_timeout());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let running = tokio::spawn(worker.run(shutdown_rx));

    shutdown_signal().await;
    tracing::info!("Waiting for in-flight jobs to finish");
    let _ = shutdown_tx.send(true);

    running.await.context("worker task panicked")?;
    Ok(())
}
