//! 单运行峰拟合 / Per-run peak fitting
//!
//! Loads the run's 2D timing histogram, projects it onto the time axis and
//! fits a Gaussian in a fixed window around the mode. Loading goes through
//! [`HistogramSource`]; everything after loading is pure and returns a
//! [`FitSnapshot`] so a display can draw what was fitted.

use super::gaussian_fit::{FitOutcome, FitRange, FitStatus, GaussParams, GaussianFit};
use super::histogram::{Histogram1D, Histogram2D};
use crate::error::ErrorCategory;
use crate::tools::constants::{defaults, fit};

/// Why a run contributes no point to the overview
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// No artifact file for the run
    MissingArtifact,
    /// The file exists but could not be read
    UnreadableArtifact(String),
    /// The file could not be parsed or holds inconsistent data
    CorruptArtifact(String),
    /// The named histogram is not in the artifact
    MissingHistogram(String),
    /// The named histogram has no entries
    EmptyHistogram(String),
    /// The Gaussian fit reported a nonzero status
    FitFailed(FitStatus),
}

impl SkipReason {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnreadableArtifact(_) => ErrorCategory::Io,
            Self::FitFailed(_) => ErrorCategory::Fit,
            Self::MissingArtifact
            | Self::CorruptArtifact(_)
            | Self::MissingHistogram(_)
            | Self::EmptyHistogram(_) => ErrorCategory::Artifact,
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingArtifact => write!(f, "artifact missing"),
            Self::UnreadableArtifact(e) => write!(f, "artifact unreadable: {e}"),
            Self::CorruptArtifact(e) => write!(f, "artifact corrupt: {e}"),
            Self::MissingHistogram(name) => write!(f, "histogram '{name}' not found"),
            Self::EmptyHistogram(name) => write!(f, "histogram '{name}' is empty"),
            Self::FitFailed(status) => write!(f, "fit failed ({status})"),
        }
    }
}

/// Source of per-run histogram artifacts
pub trait HistogramSource {
    /// Load the 2D histogram `name` of `run`
    ///
    /// Implementations must release any file handle before returning,
    /// on the error paths too.
    fn load(&self, run: u32, name: &str) -> Result<Histogram2D, SkipReason>;
}

/// Per-run fit result
#[derive(Debug, Clone, PartialEq)]
pub enum FitResult {
    Fitted { peak_position: f64, uncertainty: f64 },
    Failed(SkipReason),
}

impl FitResult {
    pub fn is_fitted(&self) -> bool {
        matches!(self, Self::Fitted { .. })
    }

    pub fn peak_position(&self) -> Option<f64> {
        match self {
            Self::Fitted { peak_position, .. } => Some(*peak_position),
            Self::Failed(_) => None,
        }
    }
}

/// Vertical marker drawn at the fitted position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorLine {
    pub x: f64,
    pub y_low: f64,
    pub y_high: f64,
}

/// Everything a display needs to draw one run's fit
#[derive(Debug, Clone)]
pub struct FitSnapshot {
    pub run: u32,
    pub projection: Histogram1D,
    /// Mode estimate (center of the maximum bin)
    pub mode: f64,
    pub fit: GaussianFit,
    pub outcome: FitOutcome,
    /// Present on success only
    pub indicator: Option<IndicatorLine>,
    /// X range for drawing the projection
    pub display_range: (f64, f64),
}

/// Fitter parameters
#[derive(Debug, Clone)]
pub struct FitterConfig {
    pub histogram_name: String,
    pub half_window: f64,
    pub initial_mean: f64,
    pub initial_sigma: f64,
    pub uncertainty: f64,
    pub display_range: (f64, f64),
}

impl Default for FitterConfig {
    fn default() -> Self {
        Self {
            histogram_name: defaults::HISTOGRAM_NAME.to_string(),
            half_window: fit::HALF_WINDOW,
            initial_mean: fit::INITIAL_MEAN,
            initial_sigma: fit::INITIAL_SIGMA,
            uncertainty: fit::FIXED_UNCERTAINTY,
            display_range: (fit::DISPLAY_MIN, fit::DISPLAY_MAX),
        }
    }
}

/// Outcome of [`PeakFitter::analyze`]
#[derive(Debug, Clone)]
pub struct RunFit {
    pub result: FitResult,
    /// `None` when the run never reached the fit
    pub snapshot: Option<FitSnapshot>,
}

/// Fits the timing peak of single runs
pub struct PeakFitter<'a> {
    source: &'a dyn HistogramSource,
    config: FitterConfig,
}

impl<'a> PeakFitter<'a> {
    pub fn new(source: &'a dyn HistogramSource, config: FitterConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &FitterConfig {
        &self.config
    }

    /// Fit `run`, result only
    pub fn fit(&self, run: u32) -> FitResult {
        self.analyze(run).result
    }

    /// Fit `run`, keeping the projection and fit for display
    pub fn analyze(&self, run: u32) -> RunFit {
        let h2 = match self.source.load(run, &self.config.histogram_name) {
            Ok(h2) => h2,
            Err(reason) => {
                tracing::debug!(run, %reason, "run skipped");
                return RunFit {
                    result: FitResult::Failed(reason),
                    snapshot: None,
                };
            }
        };

        let projection = h2.project_x(format!("Proj_{run}"));
        let (result, snapshot) = self.fit_projection(run, projection);
        if let FitResult::Failed(reason) = &result {
            tracing::warn!(run, %reason, "fit failed");
        }
        RunFit {
            result,
            snapshot: Some(snapshot),
        }
    }

    /// Fit an already projected time distribution
    pub fn fit_projection(&self, run: u32, projection: Histogram1D) -> (FitResult, FitSnapshot) {
        let mode = projection
            .maximum_bin()
            .map(|bin| projection.bin_center(bin))
            .unwrap_or(0.0);
        let maximum = projection.maximum();

        let gauss = GaussianFit::new(
            format!("fTime_{run}"),
            FitRange::around(mode, self.config.half_window),
            GaussParams::new(maximum, self.config.initial_mean, self.config.initial_sigma),
        );
        let outcome = gauss.fit(&projection);

        let (result, indicator) = if outcome.status.is_ok() {
            let position = outcome.params.mean;
            (
                FitResult::Fitted {
                    peak_position: position,
                    uncertainty: self.config.uncertainty,
                },
                Some(IndicatorLine {
                    x: position,
                    y_low: 0.0,
                    y_high: maximum,
                }),
            )
        } else {
            (FitResult::Failed(SkipReason::FitFailed(outcome.status)), None)
        };

        let snapshot = FitSnapshot {
            run,
            projection,
            mode,
            fit: gauss,
            outcome,
            indicator,
            display_range: self.config.display_range,
        };
        (result, snapshot)
    }
}
