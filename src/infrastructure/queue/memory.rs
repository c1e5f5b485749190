use std::{collections::VecDeque, marker::PhantomData, time::Duration};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::{sync::Notify, time::Instant};

use super::{decode, encode, Queue, QueueMessage};
use crate::errors::QueueError;

/// In-process queue with the same JSON framing as [`super::RedisQueue`].
/// Used by tests and single-process setups.
pub struct MemoryQueue<M> {
    items: Mutex<VecDeque<String>>,
    notify: Notify,
    pop_timeout: Duration,
    _message: PhantomData<fn() -> M>,
}

impl<M> MemoryQueue<M> {
    pub fn new(pop_timeout: Duration) -> Self {
        MemoryQueue {
            items: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            pop_timeout,
            _message: PhantomData,
        }
    }

    /// Enqueues an already-encoded payload, bypassing serialization.
    pub fn push_raw(&self, payload: impl Into<String>) {
        self.items.lock().push_back(payload.into());
        self.notify.notify_one();
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

impl<M: QueueMessage> MemoryQueue<M> {
    /// Removes and decodes everything currently queued, oldest first.
    pub fn drain(&self) -> Vec<M> {
        self.items
            .lock()
            .drain(..)
            .filter_map(|payload| decode(&payload).ok())
            .collect()
    }
}

#[async_trait]
impl<M: QueueMessage> Queue<M> for MemoryQueue<M> {
    async fn push(&self, message: &M) -> Result<(), QueueError> {
        let payload = encode(message)?;
        self.push_raw(payload);
        Ok(())
    }

    async fn pop(&self) -> Result<Option<M>, QueueError> {
        let deadline = Instant::now() + self.pop_timeout;

        loop {
            let next = self.items.lock().pop_front();
            if let Some(payload) = next {
                return decode(&payload).map(Some);
            }

            if tokio::time::timeout_at(deadline, self.notify.notified()).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn depth(&self) -> Result<u64, QueueError> {
        Ok(self.len() as u64)
    }
}
