//! FIFO serializer for read-modify-write cycles against the bound CSV.
//!
//! One actor task drains the queue and runs each job to completion before
//! admitting the next. Jobs run as their own tasks, so a job that fails or
//! panics only fails its caller, and a caller that stops waiting does not stop
//! a write already admitted.

use std::{future::Future, pin::Pin};

use anyhow::anyhow;
use tokio::sync::{mpsc, oneshot};

use crate::log_error;

const ENABLE_LOGS: bool = true;

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

#[derive(Clone)]
pub struct WriteQueue {
    sender: mpsc::UnboundedSender<Job>,
}

impl WriteQueue {
    /// Start the queue actor. Must be called from inside a tokio runtime.
    pub fn new() -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();

        tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                if let Err(err) = tokio::spawn(job).await {
                    log_error!("queued write aborted: {err}");
                }
            }
        });

        Self { sender }
    }

    /// Admit `task` behind everything already queued and await its result.
    pub async fn enqueue<F, T, E>(&self, task: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: From<anyhow::Error> + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job = Box::pin(async move {
            // The caller may have stopped waiting; the write still happened.
            let _ = reply_tx.send(task.await);
        });

        self.sender
            .send(job)
            .map_err(|_| anyhow!("write queue is closed"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("queued write terminated without a result"))?
    }
}

impl Default for WriteQueue {
    fn default() -> Self {
        Self::new()
    }
}
