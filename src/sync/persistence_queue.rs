use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// What a persistence call writes on the server. Calls sharing a key are
/// sent one after another, in enqueue order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PersistKey {
    Class(u64),
    Occupant(u64),
}

/// Per-key FIFO of spawned persistence calls.
///
/// Each task waits for the previous task with the same key to finish before
/// running. The slot is claimed synchronously in [`PersistenceQueue::enqueue`],
/// so the order is the order of the calls, not of task scheduling.
#[derive(Debug, Clone, Default)]
pub struct PersistenceQueue {
    tails: Arc<Mutex<HashMap<PersistKey, oneshot::Receiver<()>>>>,
}

impl PersistenceQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue<F>(&self, key: PersistKey, task: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel::<()>();
        let previous = self
            .tails
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, done_rx);

        tokio::spawn(async move {
            if let Some(previous) = previous {
                tracing::debug!("Waiting for earlier write on {:?}", key);
                // Err means the earlier task finished (or panicked) and dropped its sender.
                let _ = previous.await;
            }
            let output = task.await;
            drop(done_tx);
            output
        })
    }
}
