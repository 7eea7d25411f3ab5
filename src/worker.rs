//! Single-thread serial executor.
//!
//! A worker thread owns some state `S` and runs submitted closures against it
//! one at a time, in submission order. Callers await the result through a
//! oneshot channel. A task that fails or panics only fails its own caller; the
//! worker keeps draining the queue.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::{mpsc, Arc, Mutex, PoisonError},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use log::{error, info};
use tokio::sync::oneshot;

type Task<S> = Box<dyn FnOnce(&mut S) + Send + 'static>;

enum Command<S> {
    Execute(Task<S>),
    Shutdown,
}

struct WorkerInner<S> {
    name: String,
    sender: mpsc::Sender<Command<S>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<S> Drop for WorkerInner<S> {
    fn drop(&mut self) {
        let mut guard = self.worker.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(Command::Shutdown) {
                error!("Failed to send shutdown to {} thread: {err}", self.name);
            }
            // Dropping from inside a task would join the current thread.
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join {} thread: {join_err:?}", self.name);
            }
        }
    }
}

pub struct SerialWorker<S> {
    inner: Arc<WorkerInner<S>>,
}

impl<S> Clone for SerialWorker<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: 'static> SerialWorker<S> {
    /// Spawn the worker. `init` runs on the worker thread and builds the state;
    /// its failure is returned here and no worker is left running.
    pub fn spawn<F>(name: &str, init: F) -> Result<Self>
    where
        F: FnOnce() -> Result<S> + Send + 'static,
    {
        let (command_tx, command_rx) = mpsc::channel::<Command<S>>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
        let thread_name = name.to_string();

        let worker = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                let mut state = match init() {
                    Ok(state) => state,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };

                if ready_tx.send(Ok(())).is_err() {
                    error!("{thread_name} receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        Command::Execute(task) => {
                            let outcome =
                                panic::catch_unwind(AssertUnwindSafe(|| task(&mut state)));
                            if outcome.is_err() {
                                error!("{thread_name} task panicked; continuing with next task");
                            }
                        }
                        Command::Shutdown => break,
                    }
                }

                info!("{thread_name} thread shutting down");
            })
            .with_context(|| format!("failed to spawn {name} worker thread"))?;

        ready_rx
            .recv()
            .with_context(|| format!("{name} worker exited before signaling readiness"))??;

        Ok(Self {
            inner: Arc::new(WorkerInner {
                name: name.to_string(),
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
        })
    }

    /// Queue `task` behind everything already submitted and await its result.
    pub async fn execute<F, T, E>(&self, task: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut S) -> std::result::Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<anyhow::Error> + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let name = self.inner.name.clone();

        let command = Command::Execute(Box::new(move |state: &mut S| {
            let result = task(state);
            if reply_tx.send(result).is_err() {
                error!("{name} caller dropped before receiving result");
            }
        }));

        self.inner
            .sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to {} thread: {err}", self.inner.name))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("{} task terminated without a result", self.inner.name))?
    }
}
