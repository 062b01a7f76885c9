//! 运行循环 / Run loop
//!
//! `Init -> Enumerating -> (PerRunFit)* -> Finalizing -> Done`. Only the
//! enumeration can fail; a run without data or with a failed fit is
//! recorded as a gap and the loop moves on.

use super::constants::defaults;
use super::display::FitDisplay;
use crate::core::{
    DriftRecorder, DriftSeries, FitResult, PeakFitter, RunSet, RunSetEnumerator, RunSetStore,
};
use crate::error::{MonitorError, MonitorResult};
use std::time::Duration;

/// Pipeline stage, observable for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Init,
    Enumerating,
    Fitting { set_index: usize, run: u32 },
    Finalizing,
    Done,
}

/// Loop options
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub data_tag: String,
    pub calibration: String,
    /// Pause after each run; `None` disables watch mode
    pub watch_pause: Option<Duration>,
    pub axis_margin: u32,
}

impl PipelineOptions {
    pub fn new(data_tag: impl Into<String>, calibration: impl Into<String>) -> Self {
        Self {
            data_tag: data_tag.into(),
            calibration: calibration.into(),
            watch_pause: None,
            axis_margin: defaults::AXIS_MARGIN,
        }
    }

    pub fn with_watch(mut self, watch: bool) -> Self {
        self.watch_pause = watch.then(|| Duration::from_millis(defaults::WATCH_PAUSE_MS));
        self
    }
}

/// Per-set summary for the report
#[derive(Debug, Clone, PartialEq)]
pub struct SetSummary {
    pub index: usize,
    /// `None` for a set without runs
    pub first_run: Option<u32>,
    pub runs: usize,
    pub fitted: usize,
    /// Mean fitted position of the set, `None` without any fit
    pub mean_position: Option<f64>,
}

/// Everything the pipeline produced
#[derive(Debug, Clone, PartialEq)]
pub struct DriftReport {
    pub series: DriftSeries,
    pub sets: Vec<SetSummary>,
    /// Runs in the order they were visited
    pub visited: Vec<u32>,
}

impl DriftReport {
    /// Runs counted as analyzed (fitted or not)
    pub fn analyzed(&self) -> usize {
        self.series.analyzed
    }
}

/// Drives enumeration, fitting and recording
pub struct DriftPipeline<'a> {
    store: &'a dyn RunSetStore,
    fitter: PeakFitter<'a>,
    display: &'a mut dyn FitDisplay,
    options: PipelineOptions,
    state: PipelineState,
}

impl<'a> DriftPipeline<'a> {
    pub fn new(
        store: &'a dyn RunSetStore,
        fitter: PeakFitter<'a>,
        display: &'a mut dyn FitDisplay,
        options: PipelineOptions,
    ) -> Self {
        Self {
            store,
            fitter,
            display,
            options,
            state: PipelineState::Init,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    fn transition(&mut self, next: PipelineState) {
        tracing::trace!(from = ?self.state, to = ?next, "pipeline state");
        self.state = next;
    }

    /// Run the whole pipeline once
    pub fn run(&mut self) -> MonitorResult<DriftReport> {
        if self.state != PipelineState::Init {
            return Err(MonitorError::InvalidInput(
                "pipeline already ran".to_string(),
            ));
        }

        self.transition(PipelineState::Enumerating);
        let sets = RunSetEnumerator::new(self.store)
            .list_sets(&self.options.data_tag, &self.options.calibration)?;
        tracing::info!(
            sets = sets.len(),
            calibration = %self.options.calibration,
            "run sets enumerated"
        );

        let mut recorder = DriftRecorder::new();
        let mut summaries = Vec::with_capacity(sets.len());
        let mut visited = Vec::new();

        for set in &sets {
            summaries.push(self.process_set(set, &mut recorder, &mut visited));
        }

        self.transition(PipelineState::Finalizing);
        // first run of the first set and last run of the last set, in store order
        let first = sets.iter().flat_map(|s| s.run_numbers()).next().copied();
        let last = sets.iter().flat_map(|s| s.run_numbers()).last().copied();
        if let (Some(first), Some(last)) = (first, last) {
            recorder.finalize(first, last, self.options.axis_margin);
        }

        let series = recorder.into_series();
        tracing::info!(
            analyzed = series.analyzed,
            fitted = series.fitted_count(),
            "runs analyzed"
        );
        self.transition(PipelineState::Done);

        Ok(DriftReport {
            series,
            sets: summaries,
            visited,
        })
    }

    fn process_set(
        &mut self,
        set: &RunSet,
        recorder: &mut DriftRecorder,
        visited: &mut Vec<u32>,
    ) -> SetSummary {
        match set.first_run_number() {
            Some(first_run) => {
                let boundary = recorder.mark_set_boundary(set.index(), first_run);
                self.display.mark_set_boundary(&boundary);
            }
            None => tracing::warn!(set = set.index(), "run set has no runs, no boundary marked"),
        }
        tracing::info!(set = set.index(), runs = set.len(), "processing run set");

        let mut positions = Vec::with_capacity(set.len());
        for &run in set.run_numbers() {
            self.transition(PipelineState::Fitting {
                set_index: set.index(),
                run,
            });
            visited.push(run);

            let run_fit = self.fitter.analyze(run);
            if let Some(snapshot) = &run_fit.snapshot {
                self.display.show_fit(snapshot);
            }
            match &run_fit.result {
                FitResult::Fitted { peak_position, .. } => positions.push(*peak_position),
                FitResult::Failed(reason) => self.display.show_skip(run, reason),
            }
            recorder.record(run, &run_fit.result);

            if let Some(pause) = self.options.watch_pause {
                self.display.refresh();
                std::thread::sleep(pause);
            }
        }

        SetSummary {
            index: set.index(),
            first_run: set.first_run_number(),
            runs: set.len(),
            fitted: positions.len(),
            mean_position: (!positions.is_empty())
                .then(|| positions.iter().sum::<f64>() / positions.len() as f64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        Axis, FitterConfig, GaussParams, Histogram2D, HistogramSource, MemoryStore, SkipReason,
    };
    use crate::tools::display::NullDisplay;
    use std::collections::HashMap;

    const TAG: &str = "Data.CB.T0";

    struct Synthetic(HashMap<u32, f64>);

    impl HistogramSource for Synthetic {
        fn load(&self, run: u32, name: &str) -> Result<Histogram2D, SkipReason> {
            let mean = self.0.get(&run).ok_or(SkipReason::MissingArtifact)?;
            let mut h2 = Histogram2D::new(name, Axis::new(400, -100.0, 100.0), Axis::new(2, 0.0, 2.0));
            let model = GaussParams::new(300.0, *mean, 2.0);
            for ix in 0..400 {
                let value = model.eval(h2.x_axis.bin_center(ix)).round();
                h2.contents[ix] = value;
                h2.contents[400 + ix] = value;
            }
            h2.entries = h2.contents.iter().sum();
            Ok(h2)
        }
    }

    #[test]
    fn test_state_reaches_done() {
        let store = MemoryStore::new().with_set("c", TAG, vec![1]);
        let source = Synthetic(HashMap::from([(1, 0.5)]));
        let mut display = NullDisplay;
        let fitter = PeakFitter::new(&source, FitterConfig::default());
        let mut pipeline =
            DriftPipeline::new(&store, fitter, &mut display, PipelineOptions::new(TAG, "c"));

        assert_eq!(pipeline.state(), PipelineState::Init);
        let report = pipeline.run().unwrap();
        assert_eq!(pipeline.state(), PipelineState::Done);
        assert_eq!(report.analyzed(), 1);

        // second run is refused
        assert!(pipeline.run().is_err());
    }

    #[test]
    fn test_enumeration_failure_processes_nothing() {
        let store = MemoryStore::unreachable();
        let source = Synthetic(HashMap::new());
        let mut display = NullDisplay;
        let fitter = PeakFitter::new(&source, FitterConfig::default());
        let mut pipeline =
            DriftPipeline::new(&store, fitter, &mut display, PipelineOptions::new(TAG, "c"));

        let err = pipeline.run().unwrap_err();
        assert!(matches!(err, MonitorError::FatalConfiguration(_)));
        assert_eq!(pipeline.state(), PipelineState::Enumerating);
    }

    #[test]
    fn test_set_summaries() {
        let store = MemoryStore::new()
            .with_set("c", TAG, vec![10, 11, 12])
            .with_set("c", TAG, vec![13]);
        let source = Synthetic(HashMap::from([(10, 1.0), (12, 2.0)]));
        let mut display = NullDisplay;
        let fitter = PeakFitter::new(&source, FitterConfig::default());
        let report = DriftPipeline::new(&store, fitter, &mut display, PipelineOptions::new(TAG, "c"))
            .run()
            .unwrap();

        assert_eq!(report.sets.len(), 2);
        assert_eq!(report.sets[0].runs, 3);
        assert_eq!(report.sets[0].fitted, 2);
        let mean = report.sets[0].mean_position.unwrap();
        assert!((mean - 1.5).abs() < 1e-3);
        assert_eq!(report.sets[1].fitted, 0);
        assert_eq!(report.sets[1].mean_position, None);
        assert_eq!(report.analyzed(), 4);
        assert_eq!(report.series.x_range.unwrap().max, 23.0);
    }

    #[test]
    fn test_set_without_runs_is_skipped() {
        let store = MemoryStore::new()
            .with_set("c", TAG, vec![10])
            .with_set("c", TAG, vec![])
            .with_set("c", TAG, vec![20]);
        let source = Synthetic(HashMap::from([(10, 1.0), (20, -1.0)]));
        let mut display = NullDisplay;
        let fitter = PeakFitter::new(&source, FitterConfig::default());
        let report = DriftPipeline::new(&store, fitter, &mut display, PipelineOptions::new(TAG, "c"))
            .run()
            .expect("an empty set must not abort the pipeline");

        let marked: Vec<(usize, u32)> = report
            .series
            .boundaries
            .iter()
            .map(|b| (b.set_index, b.run))
            .collect();
        assert_eq!(marked, vec![(0, 10), (2, 20)]);
        assert_eq!(report.sets.len(), 3);
        assert_eq!(report.sets[1].first_run, None);
        assert_eq!(report.sets[1].runs, 0);
        assert_eq!(report.series.get(20).unwrap().set_index, Some(2));
        assert_eq!(report.analyzed(), 2);
        let range = report.series.x_range.unwrap();
        assert_eq!((range.min, range.max), (0.0, 30.0));
    }

    #[test]
    fn test_watch_option() {
        let options = PipelineOptions::new(TAG, "c").with_watch(true);
        assert_eq!(options.watch_pause, Some(Duration::from_millis(100)));
        assert_eq!(PipelineOptions::new(TAG, "c").with_watch(false).watch_pause, None);
    }
}
