//! Error types for sciworker.

use thiserror::Error;

use crate::model::{Fault, WorkerState};

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition { from: WorkerState, to: WorkerState },

    #[error("invalid work request: {0}")]
    InvalidRequest(String),

    #[error("{hook} failed: {message}")]
    Hook { hook: &'static str, message: String },

    #[error("worker has no {0} hook registered")]
    MissingHook(&'static str),

    #[error("worker is source-only and has no input queue")]
    NoInputQueue,

    #[error("input queue full")]
    QueueFull,

    #[error("{0} disconnected")]
    Disconnected(&'static str),

    #[error("worker died: {0}")]
    WorkerDied(String),

    #[error("worker fault in {}: {}", .0.hook, .0.message)]
    Fault(Fault),

    #[error("timed out waiting for worker to terminate")]
    JoinTimeout,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a hook error from anything displayable.
    pub fn hook(hook: &'static str, message: impl std::fmt::Display) -> Self {
        Self::Hook {
            hook,
            message: message.to_string(),
        }
    }

    /// Configuration errors are fatal to the worker; everything a hook
    /// returns otherwise is a local, per-iteration fault.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Config(_) | Error::MissingHook(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
