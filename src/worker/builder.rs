//! Worker construction.
//!
//! The builder only exists for types that can process data, so a
//! specialization missing its mandatory capability fails to compile rather
//! than failing at runtime. Optional capabilities are registered explicitly
//! and default to no-ops.

use tracing::info;

use crate::config::WorkerConfig;
use crate::error::Result;
use crate::model::{WorkerId, WorkerState};
use crate::telemetry::worker::start_worker_span;
use crate::worker::context::WorkerContext;
use crate::worker::handle::WorkerHandle;
use crate::worker::hooks::{
    Cleaner, DataProcessor, HardwareStarter, Hooks, Initializer, MessageProcessor, Specialization,
};
use crate::worker::queue::{InputQueue, ResultQueue, WorkSource};
use crate::worker::run_loop::{Instruments, RunLoop};

enum Input<T> {
    /// A queue owned by the handle; `submit` feeds it.
    Queue,
    /// No input at all: the worker free-runs while not paused.
    SourceOnly,
    /// An externally supplied source.
    Custom(Box<dyn WorkSource<T>>),
}

pub struct WorkerBuilder<S: Specialization> {
    id: WorkerId,
    inner: S,
    hooks: Hooks<S>,
    config: WorkerConfig,
    input: Input<S::Item>,
    output: Option<ResultQueue<S::Output>>,
}

impl<S: DataProcessor> WorkerBuilder<S> {
    pub fn new(name: impl AsRef<str>, inner: S) -> Self {
        Self {
            id: WorkerId::new(name),
            inner,
            hooks: Hooks::new(),
            config: WorkerConfig::default(),
            input: Input::Queue,
            output: None,
        }
    }
}

impl<S: Specialization> WorkerBuilder<S> {
    pub fn with_message_processor(mut self) -> Self
    where
        S: MessageProcessor,
    {
        self.hooks.process_messages = Some(<S as MessageProcessor>::process_messages);
        self
    }

    pub fn with_initializer(mut self) -> Self
    where
        S: Initializer,
    {
        self.hooks.initialize = Some(<S as Initializer>::initialize);
        self
    }

    pub fn with_hardware_starter(mut self) -> Self
    where
        S: HardwareStarter,
    {
        self.hooks.start_hardware = Some(<S as HardwareStarter>::start_hardware);
        self
    }

    pub fn with_cleaner(mut self) -> Self
    where
        S: Cleaner,
    {
        self.hooks.cleanup = Some(<S as Cleaner>::cleanup);
        self
    }

    pub fn config(mut self, config: WorkerConfig) -> Self {
        self.config = config;
        self
    }

    /// No input queue: `process_data` is called with `None` on every
    /// iteration while running.
    pub fn source_only(mut self) -> Self {
        self.input = Input::SourceOnly;
        self
    }

    /// Pull work from `source` instead of a handle-owned queue. The handle's
    /// `submit` is unavailable in this mode.
    pub fn with_work_source(mut self, source: impl WorkSource<S::Item> + 'static) -> Self {
        self.input = Input::Custom(Box::new(source));
        self
    }

    /// Deliver results to a (possibly shared) queue instead of a private one.
    pub fn output(mut self, queue: ResultQueue<S::Output>) -> Self {
        self.output = Some(queue);
        self
    }

    /// Validate the configuration and start the worker's thread. The worker
    /// comes up paused and waits for `Start`.
    pub fn spawn(self) -> Result<WorkerHandle<S>> {
        self.config.validate()?;

        let (control_tx, control_rx) = crossbeam_channel::unbounded();
        let (lifecycle_tx, lifecycle_rx) = crossbeam_channel::unbounded();
        let results = self.output.unwrap_or_default();

        let (input_queue, source) = match self.input {
            Input::Queue => {
                let queue = InputQueue::new(self.config.input_capacity, self.config.overflow);
                let rx: Box<dyn WorkSource<S::Item>> = Box::new(queue.receiver());
                (Some(queue), Some(rx))
            }
            Input::SourceOnly => (None, None),
            Input::Custom(source) => (None, Some(source)),
        };

        let span = start_worker_span(&self.id);
        let run_loop = RunLoop {
            id: self.id.clone(),
            inner: self.inner,
            hooks: self.hooks,
            config: self.config,
            control: control_rx,
            input: source,
            lifecycle: lifecycle_tx,
            ctx: WorkerContext::new(self.id.clone(), results.sender()),
            span,
            state: WorkerState::Created,
            abort: false,
            initialized: false,
            messages: Vec::new(),
            instruments: Instruments::new(),
        };

        let join = std::thread::Builder::new()
            .name(format!("sciworker-{}", self.id))
            .spawn(move || run_loop.run())?;

        info!(worker = %self.id, "worker spawned");

        Ok(WorkerHandle::new(
            self.id,
            control_tx,
            input_queue,
            results,
            lifecycle_rx,
            join,
        ))
    }
}
