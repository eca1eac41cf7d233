//! End-to-end tests for the Mandelbrot computation worker.

use std::time::Duration;

use sciworker::config::WorkerConfig;
use sciworker::error::Error;
use sciworker::mandelbrot::{
    Bounds, ComputeRequest, Dive, DiveOutcome, MANDELBROT_CATEGORY, MandelbrotWorker,
};
use sciworker::model::{Payload, WorkerState};
use sciworker::worker::WorkerHandle;

const WAIT: Duration = Duration::from_secs(5);

fn fast() -> WorkerConfig {
    WorkerConfig::default().with_poll_interval(Duration::from_millis(10))
}

#[test]
fn computes_one_frame_per_request() {
    let mut handle = MandelbrotWorker::new(4, 4)
        .unwrap()
        .builder("mandelbrot")
        .config(fast())
        .spawn()
        .unwrap();

    handle.start().unwrap();
    handle
        .submit(ComputeRequest::from((-2.0, 1.0, -1.0, 1.0, 10)))
        .unwrap();

    let item = handle.result_queue().recv_timeout(WAIT).unwrap();
    assert_eq!(item.category, MANDELBROT_CATEGORY);
    assert_eq!(item.producer, "mandelbrot");
    let frame = item.into_data().unwrap();
    assert_eq!(frame.image.shape(), (4, 4));
    assert_eq!(frame.bounds.extent(), [-2.0, 1.0, -1.0, 1.0]);
    assert_eq!(frame.maxiter, 10);
    assert!(frame.image.values().iter().all(|v| v.is_finite()));

    handle.stop().unwrap();
    handle.join(WAIT).unwrap();
    assert_eq!(handle.results().count(), 0);
}

#[test]
fn frame_rows_run_top_to_bottom() {
    let worker = MandelbrotWorker::new(3, 5).unwrap();
    // Asymmetric in y so the flip is observable.
    let request = ComputeRequest::new(Bounds::new(-2.0, 1.0, 0.0, 2.0), 20);
    let frame = worker.compute(&request).unwrap();

    let unflipped = sciworker::mandelbrot::mandelbrot_image(&request.bounds, 3, 5, 20, 2.0).unwrap();
    for row in 0..5 {
        assert_eq!(frame.image.row(row), unflipped.row(4 - row));
    }
    assert_eq!(frame.image.row(5), None);
}

#[test]
fn invalid_request_is_a_fault_not_a_crash() {
    let mut handle = MandelbrotWorker::new(4, 4)
        .unwrap()
        .builder("mandelbrot")
        .config(fast())
        .spawn()
        .unwrap();

    handle.start().unwrap();
    handle
        .submit(ComputeRequest::from((1.0, -2.0, -1.0, 1.0, 10)))
        .unwrap();
    handle
        .submit(ComputeRequest::from((-2.0, 1.0, -1.0, 1.0, 10)))
        .unwrap();

    let first = handle.result_queue().recv_timeout(WAIT).unwrap();
    assert!(matches!(&first.payload, Payload::Fault(f) if f.hook == "process_data"));
    let second = handle.result_queue().recv_timeout(WAIT).unwrap();
    assert_eq!(second.category, MANDELBROT_CATEGORY);
    assert_eq!(handle.poll_state(), WorkerState::Running);

    handle.shutdown(WAIT).unwrap();
}

#[test]
fn dive_converges_on_the_anchor() {
    let worker = MandelbrotWorker::new(8, 8).unwrap();
    let anchor = (-0.75, 0.1);
    let mut bounds = Bounds::new(-2.25, 0.75, -1.25, 1.25);

    for _ in 0..20 {
        let frame = worker.compute(&ComputeRequest::new(bounds, 50)).unwrap();
        assert_eq!(frame.image.shape(), (8, 8));
        bounds = bounds.zoom_toward(anchor, 0.2).unwrap();
    }

    let (xc, yc) = bounds.center();
    assert!((xc - anchor.0).abs() < 0.01);
    assert!((yc - anchor.1).abs() < 0.01);
    assert!(bounds.span().0 < 0.05);
}

#[tokio::test]
async fn async_controller_drives_a_dive() {
    let mut handle = MandelbrotWorker::new(6, 4)
        .unwrap()
        .builder("dive")
        .config(fast())
        .spawn()
        .unwrap();
    handle.start().unwrap();

    let anchor = (-0.75, 0.1);
    let mut bounds = Bounds::new(-2.25, 0.75, -1.25, 1.25);
    handle.submit(ComputeRequest::new(bounds, 30)).unwrap();

    let mut extents = Vec::new();
    let mut tick = tokio::time::interval(Duration::from_millis(10));
    let deadline = tokio::time::Instant::now() + WAIT;
    while extents.len() < 3 && tokio::time::Instant::now() < deadline {
        tick.tick().await;
        let batch: Vec<_> = handle.results().collect();
        for item in batch {
            let frame = item.into_data().unwrap();
            extents.push(frame.bounds.extent());
            bounds = bounds.zoom_toward(anchor, 0.5).unwrap();
            handle.submit(ComputeRequest::new(bounds, 30)).unwrap();
        }
    }
    assert_eq!(extents.len(), 3);
    assert!(extents[1][1] - extents[1][0] < extents[0][1] - extents[0][0]);

    handle.stop().unwrap();
    tokio::task::spawn_blocking(move || handle.join(WAIT))
        .await
        .unwrap()
        .unwrap();
}

/// Never resolves; the dive runs until it finishes or fails.
async fn never() {
    std::future::pending::<()>().await
}

fn spawn_dive_worker(worker: MandelbrotWorker, config: WorkerConfig) -> WorkerHandle<MandelbrotWorker> {
    let handle = worker.builder("dive").config(config).spawn().unwrap();
    handle.start().unwrap();
    handle
}

#[tokio::test]
async fn dive_runs_to_the_last_frame() {
    let mut handle = spawn_dive_worker(MandelbrotWorker::new(6, 4).unwrap(), fast());
    let dive = Dive::new(30, 3, 0.5, (-0.75, 0.1));

    let mut extents = Vec::new();
    let outcome = dive
        .run(&mut handle, never(), |n, item| {
            assert_eq!(n as usize, extents.len() + 1);
            extents.push(item.data().unwrap().bounds.extent());
            Ok(())
        })
        .await
        .unwrap();

    assert_eq!(
        outcome,
        DiveOutcome {
            frames: 3,
            interrupted: false
        }
    );
    assert_eq!(extents[0], [-2.25, 0.75, -1.25, 1.25]);
    assert!(extents[2][1] - extents[2][0] < extents[1][1] - extents[1][0]);
    tokio::task::spawn_blocking(move || handle.shutdown(WAIT))
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn dive_ends_when_the_worker_exits() {
    let mut handle = spawn_dive_worker(MandelbrotWorker::new(4, 4).unwrap(), fast().oneshot(true));
    let dive = Dive::new(20, 3, 0.1, (-0.75, 0.1));

    let mut frames = 0;
    let outcome = tokio::time::timeout(
        WAIT,
        dive.run(&mut handle, never(), |_, _| {
            frames += 1;
            Ok(())
        }),
    )
    .await
    .expect("dive must not hang on a dead worker");

    assert!(matches!(outcome, Err(Error::WorkerDied(_))), "{outcome:?}");
    assert_eq!(frames, 1);
    tokio::task::spawn_blocking(move || handle.join(WAIT))
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn dive_stops_on_a_worker_fault() {
    let worker = MandelbrotWorker::new(4, 4).unwrap().with_iteration_cap(5);
    let mut handle = spawn_dive_worker(worker, fast());
    let dive = Dive::new(10, 3, 0.1, (-0.75, 0.1));

    let outcome = tokio::time::timeout(WAIT, dive.run(&mut handle, never(), |_, _| Ok(())))
        .await
        .expect("dive must not hang on a faulted request");

    match outcome {
        Err(Error::Fault(fault)) => {
            assert_eq!(fault.hook, "process_data");
            assert!(fault.message.contains("exceeds cap"));
        }
        other => panic!("expected a fault, got {other:?}"),
    }
    assert_eq!(handle.poll_state(), WorkerState::Running);
    tokio::task::spawn_blocking(move || handle.shutdown(WAIT))
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn dive_rejects_unusable_requests_up_front() {
    let mut handle = spawn_dive_worker(MandelbrotWorker::new(4, 4).unwrap(), fast());

    let zero_iterations = Dive::new(0, 3, 0.1, (-0.75, 0.1));
    let outcome = zero_iterations.run(&mut handle, never(), |_, _| Ok(())).await;
    assert!(matches!(outcome, Err(Error::InvalidRequest(_))), "{outcome:?}");

    // A view a few ulps wide collapses on the first zoom.
    let eps = f64::EPSILON;
    let collapsing = Dive::new(10, 5, 0.9, (1.0, 1.0))
        .with_start(Bounds::new(1.0, 1.0 + 4.0 * eps, 1.0, 1.0 + 4.0 * eps));
    let mut frames = 0;
    let outcome = tokio::time::timeout(
        WAIT,
        collapsing.run(&mut handle, never(), |_, _| {
            frames += 1;
            Ok(())
        }),
    )
    .await
    .expect("dive must not hang on collapsed bounds");
    assert!(matches!(outcome, Err(Error::InvalidRequest(_))), "{outcome:?}");
    assert_eq!(frames, 1);

    tokio::task::spawn_blocking(move || handle.shutdown(WAIT))
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn dive_can_be_interrupted() {
    let mut handle = spawn_dive_worker(MandelbrotWorker::new(4, 4).unwrap(), fast());
    let dive = Dive::new(20, 1_000, 0.01, (-0.75, 0.1));

    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let mut tx = Some(tx);
    let interrupt = async move {
        let _ = rx.await;
    };
    let outcome = tokio::time::timeout(
        WAIT,
        dive.run(&mut handle, interrupt, |_, _| {
            if let Some(tx) = tx.take() {
                let _ = tx.send(());
            }
            Ok(())
        }),
    )
    .await
    .unwrap()
    .unwrap();

    assert!(outcome.interrupted);
    assert!(outcome.frames >= 1 && outcome.frames < 1_000);
    tokio::task::spawn_blocking(move || handle.shutdown(WAIT))
        .await
        .unwrap()
        .unwrap();
}

#[test]
fn rejects_empty_grid_and_bad_horizon() {
    assert!(MandelbrotWorker::new(0, 4).is_err());
    assert!(matches!(
        MandelbrotWorker::new(usize::MAX, 2),
        Err(sciworker::error::Error::Config(_))
    ));
    assert!(MandelbrotWorker::new(4, 4).unwrap().with_horizon(-1.0).is_err());
    assert!(MandelbrotWorker::new(4, 4).unwrap().with_horizon(4.0).is_ok());
}
