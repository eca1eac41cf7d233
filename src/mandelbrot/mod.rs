//! Mandelbrot computation worker.
//!
//! Owns fixed image parameters (grid size, escape horizon, iteration cap).
//! Each dequeued `ComputeRequest` yields exactly one `MandelbrotFrame` on the
//! output queue under the `"mandelbrot"` category.

pub mod compute;
pub mod dive;
pub mod request;

use std::convert::Infallible;

use tracing::debug;

use crate::error::{Error, Result};
use crate::worker::{
    Cleaner, DataProcessor, Initializer, Leftovers, Specialization, WorkerBuilder, WorkerContext,
};

pub use compute::{Grid, cell_count, escape_time, mandelbrot_image};
pub use dive::{Dive, DiveOutcome};
pub use request::{Bounds, ComputeRequest, MandelbrotFrame};

/// Category label of computed frames.
pub const MANDELBROT_CATEGORY: &str = "mandelbrot";

/// Default escape radius.
pub const DEFAULT_HORIZON: f64 = 2.0;

/// Default upper bound on a request's `maxiter`.
pub const DEFAULT_ITERATION_CAP: u32 = 10_000;

#[derive(Debug)]
pub struct MandelbrotWorker {
    width: usize,
    height: usize,
    horizon: f64,
    iteration_cap: u32,
    frames: u64,
}

impl MandelbrotWorker {
    /// A worker producing `width x height` images.
    pub fn new(width: usize, height: usize) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::Config(format!(
                "mandelbrot grid must be non-empty, got {width}x{height}"
            )));
        }
        if cell_count(width, height).is_none() {
            return Err(Error::Config(format!(
                "mandelbrot grid {width}x{height} is too large"
            )));
        }
        Ok(Self {
            width,
            height,
            horizon: DEFAULT_HORIZON,
            iteration_cap: DEFAULT_ITERATION_CAP,
            frames: 0,
        })
    }

    pub fn with_horizon(mut self, horizon: f64) -> Result<Self> {
        if !(horizon.is_finite() && horizon > 0.0) {
            return Err(Error::Config(format!(
                "horizon must be positive and finite, got {horizon}"
            )));
        }
        self.horizon = horizon;
        Ok(self)
    }

    pub fn with_iteration_cap(mut self, cap: u32) -> Self {
        self.iteration_cap = cap;
        self
    }

    /// Builder with the initializer and cleaner registered.
    pub fn builder(self, name: impl AsRef<str>) -> WorkerBuilder<Self> {
        WorkerBuilder::new(name, self)
            .with_initializer()
            .with_cleaner()
    }

    /// Compute one frame. Row 0 of the image is the top (`ymax`) edge.
    pub fn compute(&self, request: &ComputeRequest) -> Result<MandelbrotFrame> {
        request.validate(self.iteration_cap)?;
        let mut image = mandelbrot_image(
            &request.bounds,
            self.width,
            self.height,
            request.maxiter,
            self.horizon,
        )?;
        image.flip_vertical();
        Ok(MandelbrotFrame {
            image,
            bounds: request.bounds,
            maxiter: request.maxiter,
        })
    }
}

impl Specialization for MandelbrotWorker {
    type Item = ComputeRequest;
    type Message = Infallible;
    type Output = MandelbrotFrame;
}

impl DataProcessor for MandelbrotWorker {
    fn process_data(
        &mut self,
        input: Option<ComputeRequest>,
        ctx: &mut WorkerContext<MandelbrotFrame>,
    ) -> Result<()> {
        let request = input.ok_or_else(|| {
            Error::Config("mandelbrot worker needs an input queue".to_string())
        })?;
        let frame = self.compute(&request)?;
        self.frames += 1;
        debug!(
            frame = self.frames,
            maxiter = request.maxiter,
            extent = ?request.bounds.extent(),
            "mandelbrot frame computed"
        );
        ctx.emit(MANDELBROT_CATEGORY, frame)
    }
}

impl Initializer for MandelbrotWorker {
    fn initialize(&mut self, ctx: &mut WorkerContext<MandelbrotFrame>) -> Result<()> {
        self.frames = 0;
        debug!(
            worker = %ctx.worker(),
            width = self.width,
            height = self.height,
            horizon = self.horizon,
            "mandelbrot worker ready"
        );
        Ok(())
    }
}

impl Cleaner for MandelbrotWorker {
    fn cleanup(
        &mut self,
        leftovers: Leftovers<ComputeRequest, Infallible>,
        ctx: &mut WorkerContext<MandelbrotFrame>,
    ) -> Result<()> {
        // Pending requests describe views the controller has moved past.
        debug!(
            worker = %ctx.worker(),
            frames = self.frames,
            discarded = leftovers.items.len(),
            "mandelbrot worker cleaned up"
        );
        Ok(())
    }
}
