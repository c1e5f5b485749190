use deadpool_redis::Pool as RedisPool;

mod domain;
mod interfaces;
mod infrastructure;
pub mod errors;
pub mod settings;
pub mod constants;
pub mod graceful_shutdown;
pub mod background_task;
pub mod telemetry;
pub mod codec;
pub mod worker;

pub use domain::{entities, use_cases};
pub use interfaces::{handlers, repositories, middlewares, routes};
pub use infrastructure::{auth, db, queue, storage};

use auth::jwt::JwtService;
use entities::job::TransformJob;
use queue::RedisQueue;
use repositories::sqlx_repo::{SqlxImageRepo, SqlxUserRepo};
use storage::LocalBlobStorage;
use use_cases::{auth::AuthHandler, images::ImageHandler, transform::TransformHandler};

pub struct AppState {
    pub auth_handler: AppAuthHandler,
    pub image_handler: AppImageHandler,
    pub transform_handler: AppTransformHandler,
    pub redis_pool: RedisPool,
}

pub type AppAuthHandler = AuthHandler<SqlxUserRepo, JwtService>;
pub type AppImageHandler = ImageHandler<SqlxImageRepo, LocalBlobStorage>;
pub type AppTransformHandler = TransformHandler<SqlxImageRepo, RedisQueue<TransformJob>>;

impl AppState {
    pub fn new(config: &settings::AppConfig, pool: sqlx::PgPool, redis_pool: RedisPool) -> Self {
        let jwt_service = JwtService::new(config);
        let auth_handler = AuthHandler::new(SqlxUserRepo::new(pool.clone()), jwt_service);

        let image_handler = ImageHandler::new(
            SqlxImageRepo::new(pool.clone()),
            LocalBlobStorage::new(config.storage_root.clone()),
            config.max_upload_bytes,
        );

        let job_queue = RedisQueue::new(
            redis_pool.clone(),
            config.job_queue.clone(),
            config.queue_pop_timeout(),
        );
        let transform_handler = TransformHandler::new(SqlxImageRepo::new(pool), job_queue);

        AppState {
            auth_handler,
            image_handler,
            transform_handler,
            redis_pool,
        }
    }
}
