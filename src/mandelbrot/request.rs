//! Computation requests and results for the Mandelbrot worker.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::mandelbrot::compute::Grid;

/// A rectangular region of the complex plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
}

impl Bounds {
    pub fn new(xmin: f64, xmax: f64, ymin: f64, ymax: f64) -> Self {
        Self {
            xmin,
            xmax,
            ymin,
            ymax,
        }
    }

    /// `[xmin, xmax, ymin, ymax]`, the order image extents use.
    pub fn extent(&self) -> [f64; 4] {
        [self.xmin, self.xmax, self.ymin, self.ymax]
    }

    pub fn center(&self) -> (f64, f64) {
        (
            self.xmin + (self.xmax - self.xmin) / 2.0,
            self.ymin + (self.ymax - self.ymin) / 2.0,
        )
    }

    pub fn span(&self) -> (f64, f64) {
        (self.xmax - self.xmin, self.ymax - self.ymin)
    }

    pub fn validate(&self) -> Result<()> {
        if self.extent().iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidRequest(format!(
                "bounds must be finite: {:?}",
                self.extent()
            )));
        }
        if self.xmin >= self.xmax || self.ymin >= self.ymax {
            return Err(Error::InvalidRequest(format!(
                "bounds must be increasing: {:?}",
                self.extent()
            )));
        }
        Ok(())
    }

    /// One dive step: move the centre toward `anchor` by `fraction` of the
    /// distance and shrink both spans by the same fraction.
    pub fn zoom_toward(&self, anchor: (f64, f64), fraction: f64) -> Result<Bounds> {
        if !(0.0..1.0).contains(&fraction) {
            return Err(Error::InvalidRequest(format!(
                "zoom fraction must be in [0, 1), got {fraction}"
            )));
        }
        let (xc, yc) = self.center();
        let (xspan, yspan) = self.span();
        let (xt, yt) = anchor;

        let xn = xc + (xt - xc) * fraction;
        let yn = yc + (yt - yc) * fraction;
        let xspan = xspan * (1.0 - fraction);
        let yspan = yspan * (1.0 - fraction);

        Ok(Bounds::new(
            xn - xspan / 2.0,
            xn + xspan / 2.0,
            yn - yspan / 2.0,
            yn + yspan / 2.0,
        ))
    }
}

/// One bounded computation: a region and an iteration count.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComputeRequest {
    pub bounds: Bounds,
    pub maxiter: u32,
}

impl ComputeRequest {
    pub fn new(bounds: Bounds, maxiter: u32) -> Self {
        Self { bounds, maxiter }
    }

    pub fn validate(&self, iteration_cap: u32) -> Result<()> {
        self.bounds.validate()?;
        if self.maxiter == 0 {
            return Err(Error::InvalidRequest("maxiter must be positive".to_string()));
        }
        if self.maxiter > iteration_cap {
            return Err(Error::InvalidRequest(format!(
                "maxiter {} exceeds cap {iteration_cap}",
                self.maxiter
            )));
        }
        Ok(())
    }
}

/// `(xmin, xmax, ymin, ymax, maxiter)`.
impl From<(f64, f64, f64, f64, u32)> for ComputeRequest {
    fn from((xmin, xmax, ymin, ymax, maxiter): (f64, f64, f64, f64, u32)) -> Self {
        Self::new(Bounds::new(xmin, xmax, ymin, ymax), maxiter)
    }
}

/// Parses `xmin,xmax,ymin,ymax,maxiter`.
impl std::str::FromStr for ComputeRequest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let [xmin, xmax, ymin, ymax, maxiter] = parts.as_slice() else {
            return Err(Error::InvalidRequest(format!(
                "expected xmin,xmax,ymin,ymax,maxiter, got {s:?}"
            )));
        };
        let float = |v: &str| {
            v.parse::<f64>()
                .map_err(|e| Error::InvalidRequest(format!("bad bound {v:?}: {e}")))
        };
        let maxiter = maxiter
            .parse::<u32>()
            .map_err(|e| Error::InvalidRequest(format!("bad maxiter {maxiter:?}: {e}")))?;
        Ok(Self::new(
            Bounds::new(float(*xmin)?, float(*xmax)?, float(*ymin)?, float(*ymax)?),
            maxiter,
        ))
    }
}

/// A computed image and the region it covers. Row 0 is `ymax`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MandelbrotFrame {
    pub image: Grid,
    pub bounds: Bounds,
    pub maxiter: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_separated_request() {
        let req: ComputeRequest = "-2, 1, -1, 1, 10".parse().unwrap();
        assert_eq!(req.bounds.extent(), [-2.0, 1.0, -1.0, 1.0]);
        assert_eq!(req.maxiter, 10);
        assert!("-2,1,-1".parse::<ComputeRequest>().is_err());
        assert!("-2,1,-1,1,many".parse::<ComputeRequest>().is_err());
    }

    #[test]
    fn rejects_degenerate_requests() {
        let cap = 1000;
        assert!(ComputeRequest::from((1.0, -2.0, -1.0, 1.0, 10)).validate(cap).is_err());
        assert!(ComputeRequest::from((-2.0, 1.0, -1.0, 1.0, 0)).validate(cap).is_err());
        assert!(ComputeRequest::from((-2.0, 1.0, -1.0, 1.0, 5000)).validate(cap).is_err());
        assert!(ComputeRequest::from((f64::NAN, 1.0, -1.0, 1.0, 10)).validate(cap).is_err());
        assert!(ComputeRequest::from((-2.0, 1.0, -1.0, 1.0, 10)).validate(cap).is_ok());
    }

    #[test]
    fn zoom_moves_toward_anchor_and_shrinks() {
        let b = Bounds::new(-2.0, 2.0, -1.0, 1.0);
        let z = b.zoom_toward((2.0, 1.0), 0.5).unwrap();
        assert_eq!(z.center(), (1.0, 0.5));
        assert_eq!(z.span(), (2.0, 1.0));
        assert!(b.zoom_toward((0.0, 0.0), 1.0).is_err());
    }
}
