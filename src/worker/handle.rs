//! Controller-side handle to a running worker.
//!
//! The handle never touches worker state directly. It sends control
//! messages, feeds the input queue, polls results, and observes the
//! lifecycle channel.

use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::{ControlMessage, ResultItem, StateChange, WorkerId, WorkerState};
use crate::worker::hooks::Specialization;
use crate::worker::queue::{InputQueue, ResultQueue};
use crate::worker::run_loop::panic_message;

pub struct WorkerHandle<S: Specialization> {
    id: WorkerId,
    control: Sender<ControlMessage<S::Message>>,
    input: Option<InputQueue<S::Item>>,
    results: ResultQueue<S::Output>,
    lifecycle: Receiver<StateChange>,
    state: WorkerState,
    transitions: Vec<StateChange>,
    join: Option<JoinHandle<()>>,
}

impl<S: Specialization> WorkerHandle<S> {
    pub(crate) fn new(
        id: WorkerId,
        control: Sender<ControlMessage<S::Message>>,
        input: Option<InputQueue<S::Item>>,
        results: ResultQueue<S::Output>,
        lifecycle: Receiver<StateChange>,
        join: JoinHandle<()>,
    ) -> Self {
        Self {
            id,
            control,
            input,
            results,
            lifecycle,
            state: WorkerState::Created,
            transitions: Vec::new(),
            join: Some(join),
        }
    }

    pub fn id(&self) -> &WorkerId {
        &self.id
    }

    // -- control plane ------------------------------------------------------

    pub fn start(&self) -> Result<()> {
        self.send_control(ControlMessage::Start)
    }

    pub fn pause(&self) -> Result<()> {
        self.send_control(ControlMessage::Pause)
    }

    /// Ask the worker to stop. Idempotent: stopping a worker that already
    /// exited is not an error.
    pub fn stop(&self) -> Result<()> {
        if self.control.send(ControlMessage::Stop).is_err() {
            debug!(worker = %self.id, "stop sent to a worker that already exited");
        }
        Ok(())
    }

    /// Send an application-defined message, delivered to the worker's
    /// message hook in order with the other control messages.
    pub fn send(&self, message: S::Message) -> Result<()> {
        self.send_control(ControlMessage::App(message))
    }

    fn send_control(&self, message: ControlMessage<S::Message>) -> Result<()> {
        self.control
            .send(message)
            .map_err(|_| Error::Disconnected("control channel"))
    }

    // -- data plane ---------------------------------------------------------

    /// Queue a work item. See [`InputQueue::submit`] for the overflow policy.
    pub fn submit(&self, item: S::Item) -> Result<Option<S::Item>> {
        match &self.input {
            Some(queue) => queue.submit(item),
            None => Err(Error::NoInputQueue),
        }
    }

    pub fn input(&self) -> Option<&InputQueue<S::Item>> {
        self.input.as_ref()
    }

    /// Results available so far. Never blocks.
    pub fn results(&self) -> impl Iterator<Item = ResultItem<S::Output>> + '_ {
        self.results.poll()
    }

    pub fn result_queue(&self) -> &ResultQueue<S::Output> {
        &self.results
    }

    // -- lifecycle ----------------------------------------------------------

    /// Apply every pending lifecycle event and return the latest known state.
    pub fn poll_state(&mut self) -> WorkerState {
        while let Ok(change) = self.lifecycle.try_recv() {
            self.record(change);
        }
        self.state
    }

    /// Every transition observed so far, oldest first.
    pub fn transitions(&self) -> &[StateChange] {
        &self.transitions
    }

    /// Wait until the worker is in `target`, or enters it in a transition not
    /// yet observed by this handle. History already recorded by an earlier
    /// poll does not count. Returns `false` on timeout or if the worker exits
    /// without reaching it.
    pub fn wait_for_state(&mut self, target: WorkerState, timeout: Duration) -> bool {
        let before = self.transitions.len();
        self.poll_state();
        if self.transitions[before..].iter().any(|c| c.to == target) || self.state == target {
            return true;
        }

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.lifecycle.recv_timeout(remaining) {
                Ok(change) => {
                    let reached = change.to == target;
                    self.record(change);
                    if reached {
                        return true;
                    }
                }
                Err(RecvTimeoutError::Timeout) => return false,
                Err(RecvTimeoutError::Disconnected) => return self.state == target,
            }
        }
    }

    /// Whether the worker's thread is still running.
    pub fn is_alive(&self) -> bool {
        self.join.as_ref().is_some_and(|join| !join.is_finished())
    }

    /// Fail with `WorkerDied` once the worker is shutting down or gone,
    /// whatever the reason. Never blocks.
    pub fn check_alive(&mut self) -> Result<()> {
        let state = self.poll_state();
        if matches!(state, WorkerState::Stopping | WorkerState::Terminated) || !self.is_alive() {
            return Err(Error::WorkerDied(format!(
                "worker {} exited (last state {state})",
                self.id
            )));
        }
        Ok(())
    }

    /// Wait up to `timeout` for the worker to terminate and join its thread.
    ///
    /// Fails with `JoinTimeout` if it is still running (the handle stays
    /// joinable), or `WorkerDied` if its thread panicked.
    pub fn join(&mut self, timeout: Duration) -> Result<()> {
        if self.join.is_none() {
            return Ok(());
        }

        let deadline = Instant::now() + timeout;
        self.poll_state();
        while !self.state.is_terminal() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.lifecycle.recv_timeout(remaining) {
                Ok(change) => self.record(change),
                Err(RecvTimeoutError::Timeout) => return Err(Error::JoinTimeout),
                // Sender dropped: the thread is on its way out.
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        let Some(join) = self.join.take() else {
            return Ok(());
        };
        join.join().map_err(|panic| {
            let message = panic_message(panic.as_ref());
            warn!(worker = %self.id, "worker thread panicked: {message}");
            Error::WorkerDied(message)
        })
    }

    /// Stop the worker and join it.
    pub fn shutdown(&mut self, timeout: Duration) -> Result<()> {
        self.stop()?;
        self.join(timeout)
    }

    fn record(&mut self, change: StateChange) {
        self.state = change.to;
        self.transitions.push(change);
    }
}

impl<S: Specialization> Drop for WorkerHandle<S> {
    fn drop(&mut self) {
        if self.join.is_some() {
            // Detach; the worker sees Stop (or the closed channel) and
            // cleans up on its own.
            let _ = self.control.send(ControlMessage::Stop);
        }
    }
}
