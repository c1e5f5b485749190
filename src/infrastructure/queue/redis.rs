use std::{marker::PhantomData, time::Duration};

use async_trait::async_trait;
use deadpool_redis::{redis::AsyncCommands, Connection, Pool};

use super::{decode, encode, Queue, QueueMessage};
use crate::errors::QueueError;

/// Redis list used as a queue: producers `LPUSH`, consumers `BRPOP`.
pub struct RedisQueue<M> {
    pool: Pool,
    key: String,
    pop_timeout: Duration,
    _message: PhantomData<fn() -> M>,
}

impl<M> Clone for RedisQueue<M> {
    fn clone(&self) -> Self {
        RedisQueue {
            pool: self.pool.clone(),
            key: self.key.clone(),
            pop_timeout: self.pop_timeout,
            _message: PhantomData,
        }
    }
}

impl<M> RedisQueue<M> {
    pub fn new(pool: Pool, key: impl Into<String>, pop_timeout: Duration) -> Self {
        RedisQueue {
            pool,
            key: key.into(),
            pop_timeout,
            _message: PhantomData,
        }
    }

    async fn connection(&self) -> Result<Connection, QueueError> {
        self.pool
            .get()
            .await
            .map_err(|e| QueueError::Connection(e.to_string()))
    }
}

#[async_trait]
impl<M: QueueMessage> Queue<M> for RedisQueue<M> {
    async fn push(&self, message: &M) -> Result<(), QueueError> {
        let payload = encode(message)?;
        let mut conn = self.connection().await?;

        conn.lpush::<_, _, ()>(&self.key, payload)
            .await
            .map_err(|e| QueueError::Operation(e.to_string()))
    }

    async fn pop(&self) -> Result<Option<M>, QueueError> {
        let mut conn = self.connection().await?;

        let reply: Option<(String, String)> = conn
            .brpop(&self.key, self.pop_timeout.as_secs_f64())
            .await
            .map_err(|e| QueueError::Operation(e.to_string()))?;

        match reply {
            Some((_key, payload)) => decode(&payload).map(Some),
            None => Ok(None),
        }
    }

    async fn depth(&self) -> Result<u64, QueueError> {
        let mut conn = self.connection().await?;

        conn.llen(&self.key)
            .await
            .map_err(|e| QueueError::Operation(e.to_string()))
    }
}
