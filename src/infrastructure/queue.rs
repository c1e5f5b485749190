//! Work queues between the API and the transform worker.
//!
//! Two queues exist in a deployment: jobs (API → worker) and outcomes
//! (worker → API). Both carry JSON and are FIFO.

mod memory;
mod redis;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use crate::errors::QueueError;

pub use self::memory::MemoryQueue;
pub use self::redis::RedisQueue;

pub trait QueueMessage: Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> QueueMessage for T where T: Serialize + DeserializeOwned + Send + Sync + 'static {}

#[async_trait]
pub trait Queue<M: QueueMessage>: Send + Sync {
    async fn push(&self, message: &M) -> Result<(), QueueError>;

    /// Blocks up to the queue's pop timeout; `Ok(None)` when nothing arrived.
    /// A payload that cannot be decoded is consumed and reported as
    /// [`QueueError::Malformed`] so it is never redelivered.
    async fn pop(&self) -> Result<Option<M>, QueueError>;

    /// Number of messages waiting.
    async fn depth(&self) -> Result<u64, QueueError>;
}

#[async_trait]
impl<M, Q> Queue<M> for Arc<Q>
where
    M: QueueMessage,
    Q: Queue<M> + ?Sized,
{
    async fn push(&self, message: &M) -> Result<(), QueueError> {
        (**self).push(message).await
    }

    async fn pop(&self) -> Result<Option<M>, QueueError> {
        (**self).pop().await
    }

    async fn depth(&self) -> Result<u64, QueueError> {
        (**self).depth().await
    }
}

fn encode<M: QueueMessage>(message: &M) -> Result<String, QueueError> {
    serde_json::to_string(message).map_err(|e| QueueError::Serialization(e.to_string()))
}

fn decode<M: QueueMessage>(payload: &str) -> Result<M, QueueError> {
    serde_json::from_str(payload).map_err(|e| QueueError::Malformed(e.to_string()))
}
