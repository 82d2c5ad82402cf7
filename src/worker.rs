//! Dedicated worker threads.
//!
//! A worker owns its state on a named thread and processes commands from an
//! unbounded mailbox in the order they were sent. Requests that need an answer
//! carry a one-slot reply channel. Once a worker is destroyed, or has stopped
//! after a panic, every request resolves to `None`.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};

use crate::error::{ErrorHandler, PipelineError, panic_message};

type Job<S> = Box<dyn FnOnce(&mut S) + Send>;

enum WorkerCommand<S> {
    Run(Job<S>),
    Shutdown,
}

/// Handle to a worker thread owning a value of type `S`.
pub(crate) struct Worker<S> {
    name: &'static str,
    tx: Option<Sender<WorkerCommand<S>>>,
    handle: Option<JoinHandle<()>>,
}

impl<S: Send + 'static> Worker<S> {
    /// Start a worker owning `state`.
    pub(crate) fn spawn(
        name: &'static str,
        state: S,
        on_error: ErrorHandler,
    ) -> Result<Self, PipelineError> {
        let (tx, rx) = channel::unbounded();
        let handle = thread::Builder::new()
            .name(format!("tsplot-{name}"))
            .spawn(move || run_worker_loop(name, state, rx, on_error))
            .map_err(|source| PipelineError::WorkerSpawn {
                worker: name,
                source,
            })?;
        tracing::debug!(worker = name, "worker started");
        Ok(Self {
            name,
            tx: Some(tx),
            handle: Some(handle),
        })
    }

    /// Queue a command without waiting for it.
    ///
    /// Returns `false` when the worker is gone.
    pub(crate) fn post(&self, job: impl FnOnce(&mut S) + Send + 'static) -> bool {
        let Some(tx) = self.tx.as_ref() else {
            return false;
        };
        tx.send(WorkerCommand::Run(Box::new(job))).is_ok()
    }

    /// Run a command after every previously queued one and wait for its answer.
    pub(crate) fn query<R>(&self, job: impl FnOnce(&mut S) -> R + Send + 'static) -> Option<R>
    where
        R: Send + 'static,
    {
        let (reply_tx, reply_rx) = channel::bounded(1);
        let sent = self.post(move |state| {
            let _ = reply_tx.send(job(state));
        });
        if !sent {
            return None;
        }
        reply_rx.recv().ok()
    }

    /// Whether [`destroy`](Self::destroy) has not been called yet.
    pub(crate) fn is_alive(&self) -> bool {
        self.tx.is_some()
    }

    /// Stop the worker after the commands already queued, and wait for it.
    pub(crate) fn destroy(&mut self) {
        let Some(tx) = self.tx.take() else {
            return;
        };
        let _ = tx.send(WorkerCommand::Shutdown);
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            tracing::warn!(worker = self.name, "worker thread exited abnormally");
        }
        tracing::debug!(worker = self.name, "worker destroyed");
    }
}

impl<S> Drop for Worker<S> {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(WorkerCommand::Shutdown);
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl<S> std::fmt::Debug for Worker<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("name", &self.name)
            .field("alive", &self.tx.is_some())
            .finish()
    }
}

fn run_worker_loop<S>(
    name: &'static str,
    mut state: S,
    rx: Receiver<WorkerCommand<S>>,
    on_error: ErrorHandler,
) {
    while let Ok(command) = rx.recv() {
        match command {
            WorkerCommand::Run(job) => {
                if let Err(payload) = catch_unwind(AssertUnwindSafe(|| job(&mut state))) {
                    let message = panic_message(payload.as_ref());
                    tracing::error!(worker = name, %message, "worker panicked, stopping");
                    on_error(PipelineError::WorkerPanicked {
                        worker: name,
                        message,
                    });
                    return;
                }
            }
            WorkerCommand::Shutdown => break,
        }
    }
    tracing::trace!(worker = name, "worker loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn no_errors() -> ErrorHandler {
        Arc::new(|err| panic!("unexpected worker error: {err}"))
    }

    #[test]
    fn commands_run_in_send_order() {
        let worker = Worker::spawn("order", Vec::new(), no_errors()).unwrap();
        for value in 0..100 {
            assert!(worker.post(move |state: &mut Vec<i32>| state.push(value)));
        }
        let seen = worker.query(|state| state.clone()).unwrap();
        assert_eq!(seen, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn destroyed_worker_answers_none() {
        let mut worker = Worker::spawn("destroy", 0_u32, no_errors()).unwrap();
        worker.post(|state| *state += 1);
        worker.destroy();
        assert!(!worker.is_alive());
        assert!(!worker.post(|state| *state += 1));
        assert_eq!(worker.query(|state| *state), None);
        worker.destroy();
    }

    #[test]
    fn panic_is_reported_once_and_stops_the_worker() {
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        let on_error: ErrorHandler = Arc::new(move |err| {
            sink.lock().unwrap().push(err.to_string());
        });
        let mut worker = Worker::spawn("panics", (), on_error).unwrap();
        let answer: Option<()> = worker.query(|_| panic!("boom"));
        assert_eq!(answer, None);
        assert_eq!(worker.query(|_| 1), None);
        worker.destroy();
        let errors = errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("boom"));
    }
}
