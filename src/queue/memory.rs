//! In-memory queue implementation for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{QueueClient, QueueError, QueueMessage, QueueSender, Result};

#[derive(Default)]
struct Shared {
    queues: RwLock<HashMap<String, Vec<QueueMessage>>>,
    open_senders: AtomicUsize,
    fail_on_send: RwLock<bool>,
}

/// In-memory queue.
///
/// Tracks open senders so tests can check that every sender is released.
#[derive(Clone, Default)]
pub struct InMemoryQueue {
    shared: Arc<Shared>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_send(&self, fail: bool) {
        *self.shared.fail_on_send.write().await = fail;
    }

    /// Messages published to `queue`, in send order.
    pub async fn messages(&self, queue: &str) -> Vec<QueueMessage> {
        self.shared
            .queues
            .read()
            .await
            .get(queue)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of senders acquired and not yet released.
    pub fn open_senders(&self) -> usize {
        self.shared.open_senders.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueueClient for InMemoryQueue {
    async fn create_sender(&self, queue: &str) -> Result<Box<dyn QueueSender>> {
        self.shared.open_senders.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(InMemorySender {
            shared: Arc::clone(&self.shared),
            queue: queue.to_string(),
            released: false,
        }))
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

struct InMemorySender {
    shared: Arc<Shared>,
    queue: String,
    released: bool,
}

impl InMemorySender {
    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.shared.open_senders.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl QueueSender for InMemorySender {
    async fn send(&mut self, message: QueueMessage) -> Result<()> {
        if self.released {
            return Err(QueueError::Closed);
        }
        if *self.shared.fail_on_send.read().await {
            return Err(QueueError::Send("In-memory send failure".to_string()));
        }
        self.shared
            .queues
            .write()
            .await
            .entry(self.queue.clone())
            .or_default()
            .push(message);
        Ok(())
    }

    async fn close(mut self: Box<Self>) -> Result<()> {
        self.release();
        Ok(())
    }
}

impl Drop for InMemorySender {
    fn drop(&mut self) {
        self.release();
    }
}
