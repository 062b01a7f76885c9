//! 运行集稳定性监测 / Run-set stability monitor
//!
//! Tracks the time stability of a detector timing calibration across runs:
//! for each run of each run set the 2D timing histogram is projected onto
//! the time axis, a Gaussian is fitted around the peak and the fitted
//! position is collected into an overview keyed by run number, with markers
//! at the first run of every set.
//!
//! ## Layout
//! - [`core`]: histograms, the Gaussian fit, run-set enumeration, the drift
//!   series
//! - [`store`]: JSON-backed run-set catalog and histogram artifacts
//! - [`tools`]: CLI, run loop, display, output

pub mod core;
pub mod error;
pub mod store;
pub mod tools;

pub use core::{DriftRecorder, DriftSeries, FitResult, PeakFitter, RunSet, RunSetEnumerator};
pub use error::{MonitorError, MonitorResult};
pub use store::{ArtifactDirectory, CatalogStore};
pub use tools::{DriftPipeline, DriftReport, PipelineOptions};
