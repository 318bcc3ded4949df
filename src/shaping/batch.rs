//! Batch Manager
//!
//! Groups requests issued under one batch key within a short window and runs
//! them in fixed-size chunks. Requests are identified by id: a second request
//! with an id already waiting in the open batch does not run again but
//! receives the first request's outcome.
//!
//! Per batch key the queue moves through
//! `empty -> accumulating (flush scheduled) -> flushing -> empty`.
//! Requests that arrive while a batch is flushing start the next batch once
//! the flush settles.

use std::collections::HashMap;
use std::future::Future;
use std::mem;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{join_all, BoxFuture, FutureExt};
use tokio::sync::{oneshot, Mutex};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::CallError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    /// Accumulation window before a flush
    pub delay: Duration,
    /// Requests run concurrently per chunk
    pub chunk_size: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(100),
            chunk_size: 5,
        }
    }
}

type Producer<T, E> = Box<dyn FnOnce() -> BoxFuture<'static, Result<T, E>> + Send>;

struct QueuedRequest<T, E> {
    id: String,
    producer: Producer<T, E>,
    waiters: Vec<oneshot::Sender<Result<T, E>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchState {
    Accumulating,
    Flushing,
}

struct BatchQueue<T, E> {
    state: BatchState,
    /// Distinguishes this queue from one recreated under the same key
    epoch: u64,
    pending: Vec<QueuedRequest<T, E>>,
}

struct Queues<T, E> {
    next_epoch: u64,
    by_key: HashMap<String, BatchQueue<T, E>>,
}

// == Batch Manager ==
pub struct BatchManager<T, E> {
    config: BatchConfig,
    queues: Arc<Mutex<Queues<T, E>>>,
}

impl<T, E> Clone for BatchManager<T, E> {
    fn clone(&self) -> Self {
        Self {
            config: self.config,
            queues: Arc::clone(&self.queues),
        }
    }
}

impl<T, E> BatchManager<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Creates a manager. A chunk size of zero is raised to one.
    pub fn new(mut config: BatchConfig) -> Self {
        config.chunk_size = config.chunk_size.max(1);
        Self {
            config,
            queues: Arc::new(Mutex::new(Queues {
                next_epoch: 0,
                by_key: HashMap::new(),
            })),
        }
    }

    pub fn config(&self) -> BatchConfig {
        self.config
    }

    // == Add To Batch ==
    /// Queues `producer` under `batch_key` and waits for its outcome.
    ///
    /// If a request with the same `request_id` is already waiting in the open
    /// batch, `producer` is discarded and the caller shares that request's
    /// outcome.
    pub async fn add_to_batch<F, Fut>(
        &self,
        batch_key: &str,
        request_id: &str,
        producer: F,
    ) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();

        {
            let mut queues = self.queues.lock().await;
            let Queues { next_epoch, by_key } = &mut *queues;

            let queue = by_key.entry(batch_key.to_string()).or_insert_with(|| {
                *next_epoch += 1;
                let queue = BatchQueue {
                    state: BatchState::Accumulating,
                    epoch: *next_epoch,
                    pending: Vec::new(),
                };
                self.schedule_flush(batch_key.to_string(), queue.epoch);
                queue
            });

            match queue.pending.iter_mut().find(|req| req.id == request_id) {
                Some(existing) => {
                    debug!(batch_key, request_id, "duplicate request joins queued one");
                    existing.waiters.push(tx);
                }
                None => queue.pending.push(QueuedRequest {
                    id: request_id.to_string(),
                    producer: Box::new(move || producer().boxed()),
                    waiters: vec![tx],
                }),
            }
        }

        match rx.await {
            Ok(result) => result.map_err(CallError::Producer),
            Err(_) => Err(CallError::Dropped(request_id.to_string())),
        }
    }

    // == Clear ==
    /// Discards the queued requests of `batch_key`. Their callers receive
    /// [`CallError::Dropped`]. Requests already running are unaffected.
    pub async fn clear_batch(&self, batch_key: &str) -> usize {
        let removed = self.queues.lock().await.by_key.remove(batch_key);
        removed.map(|queue| queue.pending.len()).unwrap_or(0)
    }

    /// Discards every queued request.
    pub async fn clear_all(&self) -> usize {
        let drained: Vec<BatchQueue<T, E>> =
            self.queues.lock().await.by_key.drain().map(|(_, q)| q).collect();
        drained.iter().map(|queue| queue.pending.len()).sum()
    }

    /// Number of requests waiting for a flush under `batch_key`.
    pub async fn queued(&self, batch_key: &str) -> usize {
        self.queues
            .lock()
            .await
            .by_key
            .get(batch_key)
            .map(|queue| queue.pending.len())
            .unwrap_or(0)
    }

    fn schedule_flush(&self, batch_key: String, epoch: u64) {
        let manager = self.clone();
        tokio::spawn(async move {
            sleep(manager.config.delay).await;
            manager.flush(batch_key, epoch).await;
        });
    }

    async fn flush(&self, batch_key: String, epoch: u64) {
        let requests = {
            let mut queues = self.queues.lock().await;
            match queues.by_key.get_mut(&batch_key) {
                Some(queue) if queue.epoch == epoch => {
                    queue.state = BatchState::Flushing;
                    mem::take(&mut queue.pending)
                }
                _ => return,
            }
        };

        info!(batch_key = %batch_key, requests = requests.len(), "processing batch");

        let mut requests = requests.into_iter();
        loop {
            let chunk: Vec<QueuedRequest<T, E>> =
                requests.by_ref().take(self.config.chunk_size).collect();
            if chunk.is_empty() {
                break;
            }
            join_all(chunk.into_iter().map(run_request)).await;
        }

        let mut queues = self.queues.lock().await;
        let Some(queue) = queues.by_key.get_mut(&batch_key) else {
            return;
        };
        if queue.epoch != epoch || queue.state != BatchState::Flushing {
            return;
        }
        if queue.pending.is_empty() {
            queues.by_key.remove(&batch_key);
        } else {
            queue.state = BatchState::Accumulating;
            self.schedule_flush(batch_key, epoch);
        }
    }
}

/// Runs one queued request and settles its waiters. A panicking producer
/// drops its waiters, which then see [`CallError::Dropped`], and leaves the
/// rest of the chunk and the queue state untouched.
async fn run_request<T: Clone, E: Clone>(request: QueuedRequest<T, E>) {
    let QueuedRequest {
        id,
        producer,
        waiters,
    } = request;
    let outcome = AssertUnwindSafe(async move { producer().await })
        .catch_unwind()
        .await;

    match outcome {
        Ok(result) => {
            for waiter in waiters {
                let _ = waiter.send(result.clone());
            }
        }
        Err(_) => warn!(request_id = %id, waiters = waiters.len(), "batched request panicked"),
    }
}
