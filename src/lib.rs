//! # sciworker
//!
//! Interruptible background workers for scientific applications.
//!
//! A worker runs its own loop on a dedicated thread and is driven by a
//! controller over two planes: a control channel (`Start`, `Pause`, `Stop`,
//! application messages) and a data plane (work items in, tagged results
//! out). Specializations plug into the loop through capability traits;
//! `mandelbrot` and `source` are two ready-made ones.

pub mod config;
pub mod error;
pub mod mandelbrot;
pub mod model;
pub mod source;
pub mod telemetry;
pub mod worker;
