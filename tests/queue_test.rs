//! Integration tests for the data-plane queues and submit overflow policies.

use std::convert::Infallible;
use std::time::Duration;

use sciworker::config::{OverflowPolicy, WorkerConfig};
use sciworker::error::{Error, Result};
use sciworker::worker::{
    DataProcessor, Dequeue, InputQueue, ResultQueue, Specialization, WorkSource, WorkerBuilder,
    WorkerContext,
};

#[test]
fn unbounded_queue_never_displaces() {
    let queue = InputQueue::unbounded();
    for n in 0..1000 {
        assert!(queue.submit(n).unwrap().is_none());
    }
    assert_eq!(queue.len(), 1000);
    assert_eq!(queue.capacity(), None);
}

#[test]
fn drop_oldest_returns_the_displaced_item() {
    let queue = InputQueue::new(Some(2), OverflowPolicy::DropOldest);
    assert_eq!(queue.submit("a").unwrap(), None);
    assert_eq!(queue.submit("b").unwrap(), None);
    assert_eq!(queue.submit("c").unwrap(), Some("a"));
    assert_eq!(queue.submit("d").unwrap(), Some("b"));
    assert_eq!(queue.len(), 2);
}

#[test]
fn channel_source_reports_what_is_ready() {
    let (tx, mut rx) = crossbeam_channel::unbounded();
    assert_eq!(rx.pending(), 0);
    tx.send(1).unwrap();
    tx.send(2).unwrap();
    assert_eq!(rx.pending(), 2);

    assert_eq!(rx.get(Duration::ZERO), Dequeue::Item(1));
    assert_eq!(rx.pending(), 1);
    drop(tx);
    assert_eq!(rx.get(Duration::ZERO), Dequeue::Item(2));
    assert_eq!(rx.get(Duration::ZERO), Dequeue::Closed);
}

#[test]
fn block_policy_times_out_with_queue_full() {
    let queue = InputQueue::new(
        Some(1),
        OverflowPolicy::Block {
            block_timeout_ms: 20,
        },
    );
    queue.submit(1).unwrap();
    assert!(matches!(queue.submit(2), Err(Error::QueueFull)));
    assert_eq!(queue.len(), 1);
}

#[test]
fn result_queue_poll_never_blocks() {
    let queue: ResultQueue<u8> = ResultQueue::new();
    assert_eq!(queue.poll().count(), 0);
    assert!(queue.recv_timeout(Duration::from_millis(10)).is_none());
    assert!(queue.is_empty());
}

/// Emits nothing; only here to own a bounded input queue.
struct Sink;

impl Specialization for Sink {
    type Item = u32;
    type Message = Infallible;
    type Output = ();
}

impl DataProcessor for Sink {
    fn process_data(&mut self, _input: Option<u32>, _ctx: &mut WorkerContext<()>) -> Result<()> {
        Ok(())
    }
}

#[test]
fn handle_submit_applies_the_configured_policy() {
    let config = WorkerConfig::default().with_input_capacity(2, OverflowPolicy::DropOldest);
    let mut handle = WorkerBuilder::new("bounded", Sink)
        .config(config)
        .spawn()
        .unwrap();

    // Paused: nothing is consumed.
    handle.submit(1).unwrap();
    handle.submit(2).unwrap();
    assert_eq!(handle.submit(3).unwrap(), Some(1));
    assert_eq!(handle.input().map(InputQueue::len), Some(2));

    handle.shutdown(Duration::from_secs(5)).unwrap();
}

#[test]
fn source_only_worker_has_no_input_queue() {
    let mut handle = WorkerBuilder::new("generator", Sink)
        .source_only()
        .spawn()
        .unwrap();

    assert!(handle.input().is_none());
    assert!(matches!(handle.submit(1), Err(Error::NoInputQueue)));
    handle.shutdown(Duration::from_secs(5)).unwrap();
}

#[test]
fn invalid_config_is_rejected_at_spawn() {
    let config = WorkerConfig {
        poll_interval_ms: 0,
        ..WorkerConfig::default()
    };
    let result = WorkerBuilder::new("broken", Sink).config(config).spawn();
    assert!(matches!(result, Err(Error::Config(_))));
}
