//! Worker: a long-lived, interruptible unit of work on its own thread.
//!
//! A controller builds a worker from a specialization, then drives it over
//! the control plane (`start`/`pause`/`stop`/app messages) and the data
//! plane (`submit` in, `results` out). The run loop owns the worker state;
//! the handle only observes it.

pub mod builder;
pub mod context;
pub mod handle;
pub mod hooks;
pub mod queue;
mod run_loop;

pub use builder::WorkerBuilder;
pub use context::WorkerContext;
pub use handle::WorkerHandle;
pub use hooks::{
    Cleaner, DataProcessor, HardwareStarter, Initializer, Leftovers, MessageProcessor,
    Specialization,
};
pub use queue::{Dequeue, InputQueue, ResultQueue, WorkSource};
