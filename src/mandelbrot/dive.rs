//! Controller side of a Mandelbrot dive: submit a view, wait for its frame,
//! zoom toward an anchor, repeat.
//!
//! Exactly one request is in flight at a time. The dive ends when the last
//! frame arrives, when `interrupt` resolves, or with an error as soon as the
//! worker reports a fault or stops being able to answer.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::mandelbrot::{
    Bounds, ComputeRequest, MANDELBROT_CATEGORY, MandelbrotFrame, MandelbrotWorker,
};
use crate::model::{Payload, ResultItem};
use crate::worker::WorkerHandle;

/// How often the controller drains the result queue.
pub const DEFAULT_TICK: Duration = Duration::from_millis(10);

/// Parameters of one dive.
#[derive(Debug, Clone, Copy)]
pub struct Dive {
    pub start: Bounds,
    pub maxiter: u32,
    pub frames: u32,
    pub zoom_fraction: f64,
    pub anchor: (f64, f64),
    pub tick: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiveOutcome {
    pub frames: u32,
    pub interrupted: bool,
}

impl Dive {
    /// A dive from the full-set view.
    pub fn new(maxiter: u32, frames: u32, zoom_fraction: f64, anchor: (f64, f64)) -> Self {
        Self {
            start: Bounds::new(-2.25, 0.75, -1.25, 1.25),
            maxiter,
            frames,
            zoom_fraction,
            anchor,
            tick: DEFAULT_TICK,
        }
    }

    pub fn with_start(mut self, start: Bounds) -> Self {
        self.start = start;
        self
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Drive `handle` through the dive, calling `on_frame` with the running
    /// frame count for every frame received.
    ///
    /// The worker must already be started. Fails with `Error::Fault` if the
    /// worker reports a fault, and with `WorkerDied` if it exits before the
    /// last frame.
    pub async fn run<I, F>(
        &self,
        handle: &mut WorkerHandle<MandelbrotWorker>,
        interrupt: I,
        mut on_frame: F,
    ) -> Result<DiveOutcome>
    where
        I: Future<Output = ()>,
        F: FnMut(u32, &ResultItem<MandelbrotFrame>) -> Result<()>,
    {
        if self.frames == 0 {
            return Ok(DiveOutcome {
                frames: 0,
                interrupted: false,
            });
        }

        submit(handle, self.start, self.maxiter)?;

        let mut received = 0u32;
        let mut tick = tokio::time::interval(self.tick);
        tokio::pin!(interrupt);

        while received < self.frames {
            tokio::select! {
                _ = &mut interrupt => {
                    info!(frames = received, "dive interrupted");
                    return Ok(DiveOutcome { frames: received, interrupted: true });
                }
                _ = tick.tick() => {
                    // Checked before draining so a frame produced just before
                    // exit is still delivered.
                    let alive = handle.check_alive();
                    let mut next = None;

                    let batch: Vec<_> = handle.results().collect();
                    for item in batch {
                        match &item.payload {
                            Payload::Fault(fault) => return Err(Error::Fault(fault.clone())),
                            Payload::Data(frame) if item.category == MANDELBROT_CATEGORY => {
                                received += 1;
                                on_frame(received, &item)?;
                                if received < self.frames {
                                    next = Some(
                                        frame.bounds.zoom_toward(self.anchor, self.zoom_fraction)?,
                                    );
                                }
                            }
                            Payload::Data(_) => {}
                        }
                    }

                    if received < self.frames {
                        alive?;
                        if let Some(bounds) = next {
                            submit(handle, bounds, self.maxiter)?;
                        }
                    }
                }
            }
        }

        Ok(DiveOutcome {
            frames: received,
            interrupted: false,
        })
    }
}

/// Queue the next view. Bounds that have collapsed below float resolution
/// end the dive here rather than as a worker fault.
fn submit(handle: &WorkerHandle<MandelbrotWorker>, bounds: Bounds, maxiter: u32) -> Result<()> {
    let request = ComputeRequest::new(bounds, maxiter);
    request.validate(u32::MAX)?;
    debug!(extent = ?bounds.extent(), "dive request");
    if handle.submit(request)?.is_some() {
        return Err(Error::Other("dive request displaced from the input queue".to_string()));
    }
    Ok(())
}

