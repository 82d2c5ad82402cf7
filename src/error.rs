//! Error types.

use std::sync::Arc;

use thiserror::Error;

/// Errors surfaced by the pipeline's workers and configuration layer.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A worker thread could not be started.
    #[error("failed to spawn {worker} worker: {source}")]
    WorkerSpawn {
        worker: &'static str,
        #[source]
        source: std::io::Error,
    },
    /// A worker panicked while handling a command and has stopped.
    #[error("{worker} worker panicked: {message}")]
    WorkerPanicked {
        worker: &'static str,
        message: String,
    },
    /// The persisted plot settings could not be decoded.
    #[error("invalid plot config: {0}")]
    Config(#[from] serde_json::Error),
    /// CSV export failed.
    #[error("csv export failed: {0}")]
    Csv(#[from] csv::Error),
}

/// Callback receiving errors raised off the calling thread.
///
/// Panels treat these as fatal: a broken worker cannot recover on its own.
pub type ErrorHandler = Arc<dyn Fn(PipelineError) + Send + Sync>;

/// Message path syntax errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathParseError {
    #[error("message path is empty")]
    Empty,
    #[error("message path {0:?} does not start with a topic name")]
    MissingTopic(String),
    #[error("unexpected {found:?} at offset {offset} in {path:?}")]
    Unexpected {
        path: String,
        offset: usize,
        found: char,
    },
    #[error("unterminated {what} in {path:?}")]
    Unterminated { path: String, what: &'static str },
    #[error("invalid {what} {text:?} in {path:?}")]
    Invalid {
        path: String,
        what: &'static str,
        text: String,
    },
}

/// A math modifier name that is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown math modifier {0:?}")]
pub struct UnknownMathFunction(pub String);

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
