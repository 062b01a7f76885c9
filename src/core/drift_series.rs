//! 漂移序列累积模块 / Drift series accumulation
//!
//! Collects fitted peak positions keyed by run number, the run-set boundary
//! markers and the final axis range. Every recorded run counts as analyzed,
//! whether it produced a point or not; the skip breakdown is kept alongside
//! so the report can tell the two apart.

use super::peak_fitter::{FitResult, SkipReason};
use crate::error::ErrorCategory;
use std::collections::BTreeMap;

/// One point of the overview
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub value: f64,
    pub error: f64,
    /// Ordinal of the run set that was open when the run was recorded
    pub set_index: Option<usize>,
}

/// Vertical marker at the first run of a set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetBoundary {
    pub set_index: usize,
    pub run: u32,
}

/// Closed display range of the run-number axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisRange {
    pub min: f64,
    pub max: f64,
}

/// A skipped or failed run
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRun {
    pub run: u32,
    pub reason: SkipReason,
}

/// Finalized series
#[derive(Debug, Clone, PartialEq)]
pub struct DriftSeries {
    pub points: BTreeMap<u32, Measurement>,
    pub boundaries: Vec<SetBoundary>,
    pub skipped: Vec<SkippedRun>,
    pub x_range: Option<AxisRange>,
    pub analyzed: usize,
}

impl DriftSeries {
    pub fn get(&self, run: u32) -> Option<&Measurement> {
        self.points.get(&run)
    }

    pub fn fitted_count(&self) -> usize {
        self.points.len()
    }

    /// Skipped runs grouped by category
    pub fn skip_stats(&self) -> BTreeMap<ErrorCategory, Vec<u32>> {
        let mut stats: BTreeMap<ErrorCategory, Vec<u32>> = BTreeMap::new();
        for skipped in &self.skipped {
            stats
                .entry(skipped.reason.category())
                .or_default()
                .push(skipped.run);
        }
        stats
    }
}

/// Incremental builder of a [`DriftSeries`]
#[derive(Debug, Default)]
pub struct DriftRecorder {
    points: BTreeMap<u32, Measurement>,
    boundaries: Vec<SetBoundary>,
    skipped: Vec<SkippedRun>,
    x_range: Option<AxisRange>,
    analyzed: usize,
}

impl DriftRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the result of `run`; failures leave the slot unset
    pub fn record(&mut self, run: u32, result: &FitResult) {
        self.analyzed += 1;
        match result {
            FitResult::Fitted {
                peak_position,
                uncertainty,
            } => {
                let set_index = self.boundaries.last().map(|b| b.set_index);
                self.points.insert(
                    run,
                    Measurement {
                        value: *peak_position,
                        error: *uncertainty,
                        set_index,
                    },
                );
            }
            FitResult::Failed(reason) => self.skipped.push(SkippedRun {
                run,
                reason: reason.clone(),
            }),
        }
    }

    /// Open run set `set_index`, whose first run is `run`
    pub fn mark_set_boundary(&mut self, set_index: usize, run: u32) -> SetBoundary {
        let boundary = SetBoundary { set_index, run };
        self.boundaries.push(boundary);
        boundary
    }

    /// Clamp the run axis to `[first_run - margin, last_run + margin]`
    pub fn finalize(&mut self, first_run: u32, last_run: u32, margin: u32) -> AxisRange {
        let range = AxisRange {
            min: f64::from(first_run) - f64::from(margin),
            max: f64::from(last_run) + f64::from(margin),
        };
        self.x_range = Some(range);
        range
    }

    /// Runs recorded so far, fitted or not
    pub fn summary_count(&self) -> usize {
        self.analyzed
    }

    pub fn into_series(self) -> DriftSeries {
        DriftSeries {
            points: self.points,
            boundaries: self.boundaries,
            skipped: self.skipped,
            x_range: self.x_range,
            analyzed: self.analyzed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::gaussian_fit::FitStatus;

    fn fitted(value: f64) -> FitResult {
        FitResult::Fitted {
            peak_position: value,
            uncertainty: 0.0001,
        }
    }

    #[test]
    fn test_failures_leave_gaps_but_count() {
        let mut recorder = DriftRecorder::new();
        recorder.mark_set_boundary(0, 100);
        recorder.record(100, &FitResult::Failed(SkipReason::MissingArtifact));
        recorder.record(101, &fitted(3.0));
        assert_eq!(recorder.summary_count(), 2);

        let series = recorder.into_series();
        assert!(series.get(100).is_none());
        assert_eq!(series.get(101).unwrap().value, 3.0);
        assert_eq!(series.get(101).unwrap().error, 0.0001);
        assert_eq!(series.fitted_count(), 1);
        assert_eq!(series.analyzed, 2);
    }

    #[test]
    fn test_measurements_tagged_with_open_set() {
        let mut recorder = DriftRecorder::new();
        recorder.mark_set_boundary(0, 10);
        recorder.record(10, &fitted(1.0));
        let boundary = recorder.mark_set_boundary(1, 20);
        recorder.record(20, &fitted(2.0));

        assert_eq!(boundary, SetBoundary { set_index: 1, run: 20 });
        let series = recorder.into_series();
        assert_eq!(series.get(10).unwrap().set_index, Some(0));
        assert_eq!(series.get(20).unwrap().set_index, Some(1));
        assert_eq!(series.boundaries.len(), 2);
    }

    #[test]
    fn test_finalize_applies_margin() {
        let mut recorder = DriftRecorder::new();
        let range = recorder.finalize(100, 102, 10);
        assert_eq!(range, AxisRange { min: 90.0, max: 112.0 });

        // low run numbers may push the lower edge below zero
        assert_eq!(recorder.finalize(3, 5, 10).min, -7.0);
        assert_eq!(recorder.into_series().x_range.unwrap().max, 15.0);
    }

    #[test]
    fn test_skip_stats_by_category() {
        let mut recorder = DriftRecorder::new();
        recorder.record(1, &FitResult::Failed(SkipReason::MissingArtifact));
        recorder.record(
            2,
            &FitResult::Failed(SkipReason::FitFailed(FitStatus::MaxIterations)),
        );
        recorder.record(3, &FitResult::Failed(SkipReason::EmptyHistogram("h".into())));

        let stats = recorder.into_series().skip_stats();
        assert_eq!(stats[&ErrorCategory::Artifact], vec![1, 3]);
        assert_eq!(stats[&ErrorCategory::Fit], vec![2]);
    }

    #[test]
    fn test_rerecording_run_overwrites_slot() {
        let mut recorder = DriftRecorder::new();
        recorder.record(5, &fitted(1.0));
        recorder.record(5, &fitted(1.5));
        let series = recorder.into_series();
        assert_eq!(series.get(5).unwrap().value, 1.5);
        assert_eq!(series.analyzed, 2);
    }
}
