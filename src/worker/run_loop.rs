//! The worker run loop.
//!
//! Each iteration: wait for control if paused, drain the control channel,
//! bail out on stop, hand application messages to the message hook, then
//! pull at most one work item with a bounded wait. Cleanup runs exactly
//! once after the loop exits, however it exits.

use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Histogram};
use tracing::{Span, debug, error, info, warn};

use crate::config::WorkerConfig;
use crate::error::{Error, Result};
use crate::model::{ControlMessage, Fault, StateChange, WorkerId, WorkerState};
use crate::telemetry::metrics;
use crate::telemetry::worker::{record_fault, record_state_transition};
use crate::worker::context::WorkerContext;
use crate::worker::hooks::{Hooks, Leftovers, Specialization};
use crate::worker::queue::{Dequeue, WorkSource};

pub(crate) struct RunLoop<S: Specialization> {
    pub(crate) id: WorkerId,
    pub(crate) inner: S,
    pub(crate) hooks: Hooks<S>,
    pub(crate) config: WorkerConfig,
    pub(crate) control: Receiver<ControlMessage<S::Message>>,
    /// `None` for a source-only worker.
    pub(crate) input: Option<Box<dyn WorkSource<S::Item>>>,
    pub(crate) lifecycle: Sender<StateChange>,
    pub(crate) ctx: WorkerContext<S::Output>,
    pub(crate) span: Span,
    pub(crate) state: WorkerState,
    pub(crate) abort: bool,
    pub(crate) initialized: bool,
    pub(crate) messages: Vec<S::Message>,
    pub(crate) instruments: Instruments,
}

/// Metric instruments, built once per worker.
pub(crate) struct Instruments {
    iterations: Counter<u64>,
    faults: Counter<u64>,
    transitions: Counter<u64>,
    hook_duration: Histogram<f64>,
}

impl Instruments {
    pub(crate) fn new() -> Self {
        Self {
            iterations: metrics::worker_iterations(),
            faults: metrics::worker_faults(),
            transitions: metrics::worker_state_transitions(),
            hook_duration: metrics::hook_duration_ms(),
        }
    }
}

impl<S: Specialization> RunLoop<S> {
    /// Thread entry point.
    pub(crate) fn run(mut self) {
        let span = self.span.clone();
        let _entered = span.enter();

        self.transition(WorkerState::Paused);
        info!("worker entered run loop");

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run_until_stopped()));
        if outcome.is_err() {
            error!("worker run loop panicked, cleaning up");
            // The source may be what panicked; don't drain it.
            self.input = None;
        }

        if self.state != WorkerState::Stopping {
            self.transition(WorkerState::Stopping);
        }
        self.cleanup();
        self.transition(WorkerState::Terminated);
        info!(iterations = self.ctx.iteration, "worker terminated");

        if let Err(panic) = outcome {
            panic::resume_unwind(panic);
        }
    }

    fn run_until_stopped(&mut self) {
        loop {
            // Idle: the only unbounded wait.
            if self.state == WorkerState::Paused && self.control.is_empty() {
                match self.control.recv() {
                    Ok(message) => self.apply_control(message),
                    Err(_) => self.controller_gone(),
                }
            }

            self.drain_control();
            if self.abort {
                break;
            }

            if !self.messages.is_empty() {
                self.process_messages();
                if self.abort {
                    break;
                }
            }

            self.poll_data();
            if self.abort {
                break;
            }

            self.ctx.iteration += 1;
            self.instruments
                .iterations
                .add(1, &[KeyValue::new("worker", self.id.to_string())]);
        }
    }

    fn drain_control(&mut self) {
        loop {
            match self.control.try_recv() {
                Ok(message) => self.apply_control(message),
                Err(TryRecvError::Empty) => return,
                Err(TryRecvError::Disconnected) => {
                    self.controller_gone();
                    return;
                }
            }
        }
    }

    fn controller_gone(&mut self) {
        if !self.abort {
            warn!("control channel closed, stopping");
            self.abort = true;
        }
    }

    fn apply_control(&mut self, message: ControlMessage<S::Message>) {
        match message {
            ControlMessage::Stop => {
                if !self.abort {
                    info!("stop received");
                    self.abort = true;
                }
            }
            ControlMessage::Pause => {
                if self.state == WorkerState::Running && !self.abort {
                    self.transition(WorkerState::Paused);
                }
            }
            ControlMessage::Start => {
                if self.abort || self.state != WorkerState::Paused {
                    return;
                }
                if !self.initialized {
                    self.initialized = true;
                    if let Some(hook) = self.hooks.initialize {
                        if let Err(e) = self.invoke("initialize", hook) {
                            // A worker that cannot initialize never runs.
                            self.fault("initialize", &e);
                            self.abort = true;
                            return;
                        }
                    }
                }
                self.transition(WorkerState::Running);
                if let Some(hook) = self.hooks.start_hardware {
                    if let Err(e) = self.invoke("start_hardware", hook) {
                        self.fault("start_hardware", &e);
                    }
                }
            }
            ControlMessage::App(message) => self.messages.push(message),
        }
    }

    fn process_messages(&mut self) {
        let Some(hook) = self.hooks.process_messages else {
            let e = Error::MissingHook("process_messages");
            self.fault("process_messages", &e);
            return;
        };
        let messages = std::mem::take(&mut self.messages);
        if let Err(e) = self.invoke("process_messages", |inner, ctx| hook(inner, messages, ctx)) {
            self.fault("process_messages", &e);
        }
    }

    fn poll_data(&mut self) {
        if self.state != WorkerState::Running {
            return;
        }

        let input = match self.input.as_mut() {
            Some(source) => match source.get(self.config.poll_interval()) {
                Dequeue::Item(item) => Some(item),
                Dequeue::Empty => return,
                Dequeue::Closed => {
                    info!("input queue closed, stopping");
                    self.abort = true;
                    return;
                }
            },
            // Source-only: free-run while not paused.
            None => None,
        };

        let hook = self.hooks.process_data;
        if let Err(e) = self.invoke("process_data", |inner, ctx| hook(inner, input, ctx)) {
            self.fault("process_data", &e);
        }

        if self.config.oneshot && !self.abort {
            info!("oneshot worker done");
            self.abort = true;
        }
    }

    fn cleanup(&mut self) {
        let leftovers = self.collect_leftovers();
        match self.hooks.cleanup {
            Some(hook) => {
                if let Err(e) = self.invoke("cleanup", |inner, ctx| hook(inner, leftovers, ctx)) {
                    self.fault("cleanup", &e);
                }
            }
            None if !leftovers.is_empty() => {
                debug!(
                    items = leftovers.items.len(),
                    messages = leftovers.messages.len(),
                    "discarding unprocessed work"
                );
            }
            None => {}
        }
    }

    /// Everything queued on either plane when cleanup begins. Never blocks,
    /// and never waits out a producer that keeps submitting.
    fn collect_leftovers(&mut self) -> Leftovers<S::Item, S::Message> {
        let mut messages = std::mem::take(&mut self.messages);
        let queued = self.control.len();
        for message in self.control.try_iter().take(queued) {
            if let ControlMessage::App(message) = message {
                messages.push(message);
            }
        }

        let mut items = Vec::new();
        if let Some(source) = self.input.as_mut() {
            let pending = source.pending();
            while items.len() < pending {
                match source.get(std::time::Duration::ZERO) {
                    Dequeue::Item(item) => items.push(item),
                    Dequeue::Empty | Dequeue::Closed => break,
                }
            }
        }

        Leftovers { items, messages }
    }

    /// Run a hook, turning a panic into an error and timing the call.
    fn invoke<F>(&mut self, hook: &'static str, f: F) -> Result<()>
    where
        F: FnOnce(&mut S, &mut WorkerContext<S::Output>) -> Result<()>,
    {
        let started = Instant::now();
        let inner = &mut self.inner;
        let ctx = &mut self.ctx;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| f(inner, ctx)));
        self.instruments.hook_duration.record(
            started.elapsed().as_secs_f64() * 1000.0,
            &[KeyValue::new("hook", hook)],
        );
        match outcome {
            Ok(result) => result,
            Err(panic) => Err(Error::hook(
                hook,
                format!("panicked: {}", panic_message(panic.as_ref())),
            )),
        }
    }

    /// Report a hook failure. The loop keeps going unless the error is a
    /// configuration error.
    fn fault(&mut self, hook: &'static str, err: &Error) {
        let fault = Fault {
            hook: hook.to_string(),
            message: err.to_string(),
            iteration: self.ctx.iteration,
        };
        record_fault(&self.span, &fault);
        self.instruments.faults.add(
            1,
            &[
                KeyValue::new("worker", self.id.to_string()),
                KeyValue::new("hook", hook),
            ],
        );
        if self.config.report_faults {
            if let Err(e) = self.ctx.emit_fault(fault) {
                warn!("could not report fault: {e}");
            }
        }
        if err.is_fatal() && !self.abort {
            error!(hook, "fatal worker error: {err}");
            self.abort = true;
        }
    }

    fn transition(&mut self, to: WorkerState) {
        if let Err(e) = self.try_transition(to) {
            error!("{e}");
        }
    }

    fn try_transition(&mut self, to: WorkerState) -> Result<()> {
        let from = self.state;
        if !from.can_transition_to(to) {
            return Err(Error::InvalidTransition { from, to });
        }
        self.state = to;
        self.ctx.state = to;
        record_state_transition(&self.span, from, to);
        self.instruments.transitions.add(
            1,
            &[
                KeyValue::new("from", from.to_string()),
                KeyValue::new("to", to.to_string()),
            ],
        );
        // The controller may already be gone; nobody to tell.
        let _ = self.lifecycle.send(StateChange {
            worker: self.id.clone(),
            from,
            to,
        });
        Ok(())
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
