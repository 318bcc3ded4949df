//! Keyed Debouncer
//!
//! Collapses a burst of calls under one key into a single deferred call. Each
//! call waits out the delay; a newer call under the same key during that wait
//! supersedes it, so only the last call of a burst runs its producer.
//! Superseded and cancelled callers are settled with an error rather than
//! left pending.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::sleep;
use tracing::debug;

use crate::error::CallError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    Superseded,
    Cancelled,
}

#[derive(Debug)]
struct Slot {
    generation: u64,
    interrupt: oneshot::Sender<Interrupt>,
}

type Slots = HashMap<String, Slot>;

/// Clears a caller's slot when its future is dropped while still waiting.
struct SlotGuard<'a> {
    slots: &'a Mutex<Slots>,
    key: &'a str,
    generation: u64,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        let mut slots = lock(self.slots);
        if slots
            .get(self.key)
            .is_some_and(|slot| slot.generation == self.generation)
        {
            slots.remove(self.key);
        }
    }
}

fn lock(slots: &Mutex<Slots>) -> MutexGuard<'_, Slots> {
    slots.lock().unwrap_or_else(PoisonError::into_inner)
}

// == Debouncer ==
/// Slots are only touched in short synchronous sections, never across an
/// await, so a std mutex guards them.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    slots: Mutex<Slots>,
    next_generation: AtomicU64,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            slots: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(0),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    // == Debounce ==
    /// Runs `producer` after the default delay unless a newer call under `key`
    /// arrives first.
    pub async fn debounce<T, E, F, Fut>(&self, key: &str, producer: F) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.debounce_with_delay(key, self.delay, producer).await
    }

    /// Like [`debounce`](Self::debounce) with a delay for this call only.
    pub async fn debounce_with_delay<T, E, F, Fut>(
        &self,
        key: &str,
        delay: Duration,
        producer: F,
    ) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();

        {
            let mut slots = lock(&self.slots);
            let previous = slots.insert(
                key.to_string(),
                Slot {
                    generation,
                    interrupt: tx,
                },
            );
            if let Some(previous) = previous {
                debug!(key, "superseding pending debounced call");
                let _ = previous.interrupt.send(Interrupt::Superseded);
            }
        }
        let guard = SlotGuard {
            slots: &self.slots,
            key,
            generation,
        };

        tokio::select! {
            biased;
            interrupt = rx => {
                return Err(match interrupt {
                    Ok(Interrupt::Cancelled) => CallError::Cancelled(key.to_string()),
                    // A dropped sender only happens when the slot was replaced.
                    Ok(Interrupt::Superseded) | Err(_) => CallError::Superseded(key.to_string()),
                });
            }
            _ = sleep(delay) => {}
        }

        {
            let mut slots = lock(&self.slots);
            match slots.get(key) {
                Some(slot) if slot.generation == generation => {
                    slots.remove(key);
                }
                _ => return Err(CallError::Superseded(key.to_string())),
            }
        }
        drop(guard);

        producer().await.map_err(CallError::Producer)
    }

    // == Cancel ==
    /// Cancels the pending call under `key`. Returns whether one was pending.
    pub async fn cancel(&self, key: &str) -> bool {
        let slot = lock(&self.slots).remove(key);
        match slot {
            Some(slot) => {
                let _ = slot.interrupt.send(Interrupt::Cancelled);
                true
            }
            None => false,
        }
    }

    /// Cancels every pending call. Returns how many were pending.
    pub async fn cancel_all(&self) -> usize {
        let slots: Vec<Slot> = lock(&self.slots).drain().map(|(_, slot)| slot).collect();
        let count = slots.len();
        for slot in slots {
            let _ = slot.interrupt.send(Interrupt::Cancelled);
        }
        count
    }

    /// Number of keys with a call waiting to fire.
    pub async fn pending(&self) -> usize {
        lock(&self.slots).len()
    }
}
