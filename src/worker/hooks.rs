//! Capability traits a worker specialization implements.
//!
//! `DataProcessor` is mandatory: `WorkerBuilder::new` only accepts types that
//! implement it. The other capabilities are opt-in on the builder and default
//! to no-ops, except `MessageProcessor`, whose absence is a configuration
//! error the first time an application message needs processing.

use crate::error::Result;
use crate::worker::context::WorkerContext;

/// The types flowing through a worker's planes.
pub trait Specialization: Send + 'static {
    /// Work item pulled from the input queue.
    type Item: Send + 'static;
    /// Application-defined control message.
    type Message: Send + 'static;
    /// Payload of the results this worker emits.
    type Output: Send + 'static;
}

pub trait DataProcessor: Specialization {
    /// Called once per dequeued item, or once per running iteration with
    /// `None` for a source-only worker.
    fn process_data(
        &mut self,
        input: Option<Self::Item>,
        ctx: &mut WorkerContext<Self::Output>,
    ) -> Result<()>;
}

pub trait MessageProcessor: Specialization {
    /// Receives the application messages drained this iteration, in order.
    fn process_messages(
        &mut self,
        messages: Vec<Self::Message>,
        ctx: &mut WorkerContext<Self::Output>,
    ) -> Result<()>;
}

pub trait Initializer: Specialization {
    /// Runs once, on the first `Start`.
    fn initialize(&mut self, ctx: &mut WorkerContext<Self::Output>) -> Result<()>;
}

pub trait HardwareStarter: Specialization {
    /// Runs on every `Paused -> Running` transition.
    fn start_hardware(&mut self, ctx: &mut WorkerContext<Self::Output>) -> Result<()>;
}

pub trait Cleaner: Specialization {
    /// Runs exactly once, after the loop exits. Receives whatever was still
    /// queued so it can flush or discard it.
    fn cleanup(
        &mut self,
        leftovers: Leftovers<Self::Item, Self::Message>,
        ctx: &mut WorkerContext<Self::Output>,
    ) -> Result<()>;
}

/// Work the loop never got to: input items still queued and application
/// messages not yet processed when it stopped.
#[derive(Debug)]
pub struct Leftovers<T, M> {
    pub items: Vec<T>,
    pub messages: Vec<M>,
}

impl<T, M> Leftovers<T, M> {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.messages.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Registered hooks
// ---------------------------------------------------------------------------

type Item<S> = <S as Specialization>::Item;
type Message<S> = <S as Specialization>::Message;
type Ctx<S> = WorkerContext<<S as Specialization>::Output>;

pub(crate) type DataHook<S> = fn(&mut S, Option<Item<S>>, &mut Ctx<S>) -> Result<()>;
pub(crate) type MessageHook<S> = fn(&mut S, Vec<Message<S>>, &mut Ctx<S>) -> Result<()>;
pub(crate) type LifecycleHook<S> = fn(&mut S, &mut Ctx<S>) -> Result<()>;
pub(crate) type CleanupHook<S> =
    fn(&mut S, Leftovers<Item<S>, Message<S>>, &mut Ctx<S>) -> Result<()>;

/// The capability set resolved at build time.
pub(crate) struct Hooks<S: Specialization> {
    pub(crate) process_data: DataHook<S>,
    pub(crate) process_messages: Option<MessageHook<S>>,
    pub(crate) initialize: Option<LifecycleHook<S>>,
    pub(crate) start_hardware: Option<LifecycleHook<S>>,
    pub(crate) cleanup: Option<CleanupHook<S>>,
}

impl<S: DataProcessor> Hooks<S> {
    pub(crate) fn new() -> Self {
        Self {
            process_data: <S as DataProcessor>::process_data,
            process_messages: None,
            initialize: None,
            start_hardware: None,
            cleanup: None,
        }
    }
}
