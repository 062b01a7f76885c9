//! 拟合实时显示 / Live display of the per-run fits
//!
//! The pipeline hands every fit and every set boundary to a [`FitDisplay`].
//! Nothing drawn here feeds back into the results.

use crate::core::{FitSnapshot, SetBoundary, SkipReason};
use std::fmt::Write as _;

/// Rendering context passed into the pipeline
pub trait FitDisplay {
    /// A run reached the fit (successful or not)
    fn show_fit(&mut self, snapshot: &FitSnapshot);

    /// A run produced no point
    fn show_skip(&mut self, run: u32, reason: &SkipReason);

    /// A new run set starts at `boundary.run`
    fn mark_set_boundary(&mut self, boundary: &SetBoundary);

    /// Flush whatever was drawn for the current run
    fn refresh(&mut self) {}
}

/// Display that draws nothing
#[derive(Debug, Default)]
pub struct NullDisplay;

impl FitDisplay for NullDisplay {
    fn show_fit(&mut self, _snapshot: &FitSnapshot) {}
    fn show_skip(&mut self, _run: u32, _reason: &SkipReason) {}
    fn mark_set_boundary(&mut self, _boundary: &SetBoundary) {}
}

/// Terminal display: one line per run, a text plot of the projection when
/// verbose
#[derive(Debug)]
pub struct ConsoleDisplay {
    verbose: bool,
    plot_width: usize,
}

const PLOT_ROWS: usize = 8;

impl ConsoleDisplay {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            plot_width: 60,
        }
    }

    /// Projection inside the display range as rows of `#`, the fitted
    /// position marked with `|`
    pub fn render_projection(&self, snapshot: &FitSnapshot) -> String {
        let (low, high) = snapshot.display_range;
        let width = self.plot_width;
        let step = (high - low) / width as f64;

        let mut columns = vec![0.0_f64; width];
        let hist = &snapshot.projection;
        for (index, &content) in hist.contents.iter().enumerate() {
            let x = hist.bin_center(index);
            if x < low || x >= high {
                continue;
            }
            let column = (((x - low) / step) as usize).min(width - 1);
            columns[column] += content;
        }
        let peak = columns.iter().copied().fold(0.0, f64::max);
        let marker = snapshot
            .indicator
            .filter(|line| line.x >= low && line.x < high)
            .map(|line| (((line.x - low) / step) as usize).min(width - 1));

        let mut out = String::new();
        for row in (1..=PLOT_ROWS).rev() {
            let threshold = peak * (row as f64 - 0.5) / PLOT_ROWS as f64;
            let line: String = columns
                .iter()
                .enumerate()
                .map(|(i, &value)| match marker {
                    Some(m) if m == i => '|',
                    _ if peak > 0.0 && value >= threshold => '#',
                    _ => ' ',
                })
                .collect();
            let _ = writeln!(out, "  {}", line.trim_end());
        }
        let _ = writeln!(out, "  {:<w$}{:>8}", format!("{low}"), format!("{high}"), w = width - 8);
        out
    }
}

impl FitDisplay for ConsoleDisplay {
    fn show_fit(&mut self, snapshot: &FitSnapshot) {
        match snapshot.indicator {
            Some(line) => {
                if self.verbose {
                    let params = snapshot.outcome.params;
                    println!(
                        "[FIT] run {}: peak {:.4} sigma {:.3} chi2/ndf {:.2}/{}",
                        snapshot.run,
                        line.x,
                        params.sigma,
                        snapshot.outcome.chi2,
                        snapshot.outcome.ndf
                    );
                    print!("{}", self.render_projection(snapshot));
                }
            }
            None => println!("Run {}: fit failed", snapshot.run),
        }
    }

    fn show_skip(&mut self, run: u32, reason: &SkipReason) {
        // fit failures were already reported by show_fit
        if self.verbose && !matches!(reason, SkipReason::FitFailed(_)) {
            println!("[SKIP] run {run}: {reason}");
        }
    }

    fn mark_set_boundary(&mut self, boundary: &SetBoundary) {
        if self.verbose {
            println!(
                "[SET] set {} starts at run {}",
                boundary.set_index, boundary.run
            );
        }
    }
}
