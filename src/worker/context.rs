//! What a hook can see and do from inside the run loop.

use chrono::Utc;
use crossbeam_channel::Sender;

use crate::error::{Error, Result};
use crate::model::{Fault, FAULT_CATEGORY, Payload, ResultItem, WorkerId, WorkerState};

/// Handed to every hook. Emits results tagged with the worker's identity.
pub struct WorkerContext<R> {
    worker: WorkerId,
    output: Sender<ResultItem<R>>,
    pub(crate) iteration: u64,
    pub(crate) state: WorkerState,
}

impl<R> WorkerContext<R> {
    pub(crate) fn new(worker: WorkerId, output: Sender<ResultItem<R>>) -> Self {
        Self {
            worker,
            output,
            iteration: 0,
            state: WorkerState::Created,
        }
    }

    pub fn worker(&self) -> &WorkerId {
        &self.worker
    }

    /// Current loop iteration, starting at 0.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Push a result onto the output queue under `category`.
    pub fn emit(&self, category: impl Into<String>, data: R) -> Result<()> {
        self.send(category.into(), Payload::Data(data))
    }

    pub(crate) fn emit_fault(&self, fault: Fault) -> Result<()> {
        self.send(FAULT_CATEGORY.to_string(), Payload::Fault(fault))
    }

    fn send(&self, category: String, payload: Payload<R>) -> Result<()> {
        self.output
            .send(ResultItem {
                producer: self.worker.clone(),
                category,
                payload,
                produced_at: Utc::now(),
            })
            .map_err(|_| Error::Disconnected("output queue"))
    }
}
