//! 核心模块集合 / Core pipeline pieces
//!
//! Run-set enumeration, histogram containers, the Gaussian fit and the
//! drift series.

pub mod drift_series;
pub mod gaussian_fit;
pub mod histogram;
pub mod peak_fitter;
pub mod run_sets;

pub use drift_series::{AxisRange, DriftRecorder, DriftSeries, Measurement, SetBoundary};
pub use gaussian_fit::{FitOutcome, FitRange, FitStatus, GaussParams, GaussianFit};
pub use histogram::{Axis, Histogram1D, Histogram2D};
pub use peak_fitter::{
    FitResult, FitSnapshot, FitterConfig, HistogramSource, PeakFitter, RunFit, SkipReason,
};
pub use run_sets::{MemoryStore, RunSet, RunSetEnumerator, RunSetStore};
