//! 高斯峰拟合 / Gaussian peak fit
//!
//! Weighted least squares (Levenberg–Marquardt) of
//! `f(x) = A·exp(−½((x−μ)/σ)²)` to the bins of a [`Histogram1D`] whose
//! centers fall inside the fit range. Bins with zero content or zero error
//! do not enter the chi-square. The fit is pure: no display, no logging.

use super::histogram::Histogram1D;

/// Gaussian parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussParams {
    pub amplitude: f64,
    pub mean: f64,
    pub sigma: f64,
}

impl GaussParams {
    pub fn new(amplitude: f64, mean: f64, sigma: f64) -> Self {
        Self {
            amplitude,
            mean,
            sigma,
        }
    }

    #[inline]
    pub fn eval(&self, x: f64) -> f64 {
        let z = (x - self.mean) / self.sigma;
        self.amplitude * (-0.5 * z * z).exp()
    }

    fn to_array(self) -> [f64; 3] {
        [self.amplitude, self.mean, self.sigma]
    }

    fn from_array(p: [f64; 3]) -> Self {
        Self::new(p[0], p[1], p[2])
    }

    fn is_finite(&self) -> bool {
        self.amplitude.is_finite() && self.mean.is_finite() && self.sigma.is_finite()
    }
}

/// Closed fit interval `[low, high]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitRange {
    pub low: f64,
    pub high: f64,
}

impl FitRange {
    /// Symmetric window around `center`
    pub fn around(center: f64, half_width: f64) -> Self {
        Self {
            low: center - half_width,
            high: center + half_width,
        }
    }

    #[inline]
    pub fn contains(&self, x: f64) -> bool {
        x >= self.low && x <= self.high
    }
}

/// Outcome code of a fit; only [`FitStatus::Converged`] is a success
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitStatus {
    Converged,
    /// No usable bin inside the range
    EmptyRange,
    /// Fewer usable bins than free parameters
    TooFewPoints(usize),
    /// Normal equations could not be solved at any damping
    Singular,
    /// Parameters left the finite domain or sigma collapsed to zero
    NonFinite,
    /// Iteration budget exhausted before convergence
    MaxIterations,
    /// Damping exhausted without a downhill step
    Stalled,
    /// Minimum found, but the peak lies outside the range, the amplitude is
    /// not positive or the width is degenerate
    Unphysical,
}

impl FitStatus {
    /// Integer status, 0 on success
    pub fn code(&self) -> i32 {
        match self {
            Self::Converged => 0,
            Self::EmptyRange => -1,
            Self::TooFewPoints(_) => -2,
            Self::Singular => 3,
            Self::NonFinite => 4,
            Self::MaxIterations => 5,
            Self::Stalled => 6,
            Self::Unphysical => 7,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Converged)
    }
}

impl std::fmt::Display for FitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Converged => write!(f, "converged"),
            Self::EmptyRange => write!(f, "no data in fit range"),
            Self::TooFewPoints(n) => write!(f, "only {n} points in fit range"),
            Self::Singular => write!(f, "singular normal matrix"),
            Self::NonFinite => write!(f, "parameters diverged"),
            Self::MaxIterations => write!(f, "iteration limit reached"),
            Self::Stalled => write!(f, "no downhill step at maximum damping"),
            Self::Unphysical => write!(f, "peak outside fit range or degenerate"),
        }
    }
}

/// Result of one fit
#[derive(Debug, Clone, PartialEq)]
pub struct FitOutcome {
    pub status: FitStatus,
    /// Final parameters (initial ones if the fit never started)
    pub params: GaussParams,
    /// Parameter errors from the inverse curvature matrix, when available
    pub errors: Option<GaussParams>,
    pub chi2: f64,
    pub ndf: usize,
    /// Iterations over all starting points
    pub iterations: usize,
}

impl FitOutcome {
    fn failed(status: FitStatus, params: GaussParams, ndf: usize, iterations: usize) -> Self {
        Self {
            status,
            params,
            errors: None,
            chi2: f64::NAN,
            ndf,
            iterations,
        }
    }
}

/// A fit definition; built fresh for every histogram
///
/// The minimisation starts from `initial`. A second start is seeded from
/// the first two moments of the binned data inside the range; the lower
/// chi-square of the accepted minima wins.
#[derive(Debug, Clone)]
pub struct GaussianFit {
    pub name: String,
    pub range: FitRange,
    pub initial: GaussParams,
    /// Iteration budget per starting point
    pub max_iterations: usize,
}

const DEFAULT_MAX_ITERATIONS: usize = 500;
const INITIAL_LAMBDA: f64 = 1e-3;
const MAX_LAMBDA: f64 = 1e12;
const RELATIVE_TOLERANCE: f64 = 1e-10;
/// Smallest accepted sigma, relative to the range width
const MIN_SIGMA_FRACTION: f64 = 1e-6;

struct Point {
    x: f64,
    y: f64,
    sigma: f64,
}

impl GaussianFit {
    pub fn new(name: impl Into<String>, range: FitRange, initial: GaussParams) -> Self {
        Self {
            name: name.into(),
            range,
            initial,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    fn collect_points(&self, hist: &Histogram1D) -> Vec<Point> {
        (0..hist.axis.bins)
            .filter_map(|i| {
                let x = hist.bin_center(i);
                let y = hist.bin_content(i);
                let sigma = hist.bin_error(i);
                (self.range.contains(x) && y != 0.0 && sigma > 0.0).then_some(Point { x, y, sigma })
            })
            .collect()
    }

    /// Run the fit against `hist`
    pub fn fit(&self, hist: &Histogram1D) -> FitOutcome {
        let points = self.collect_points(hist);
        let ndf = points.len().saturating_sub(3);

        if points.is_empty() {
            return FitOutcome::failed(FitStatus::EmptyRange, self.initial, ndf, 0);
        }
        if points.len() < 3 {
            return FitOutcome::failed(FitStatus::TooFewPoints(points.len()), self.initial, ndf, 0);
        }

        let mut outcome = self.accept(self.minimize(&points, self.initial));
        if let Some(seed) = moment_seed(&points) {
            let retry = self.accept(self.minimize(&points, seed));
            let iterations = outcome.iterations + retry.iterations;
            if retry.status.is_ok() && (!outcome.status.is_ok() || retry.chi2 < outcome.chi2) {
                outcome = retry;
            }
            outcome.iterations = iterations;
        }
        outcome
    }

    /// Demote a converged outcome that does not describe a peak in the range
    fn accept(&self, mut outcome: FitOutcome) -> FitOutcome {
        if !outcome.status.is_ok() {
            return outcome;
        }
        let width = self.range.high - self.range.low;
        let p = outcome.params;
        let plausible = self.range.contains(p.mean)
            && p.amplitude > 0.0
            && p.sigma.is_finite()
            && p.sigma >= MIN_SIGMA_FRACTION * width
            && p.sigma <= width;
        if !plausible {
            outcome.status = FitStatus::Unphysical;
            outcome.errors = None;
        }
        outcome
    }

    /// Levenberg-Marquardt from `start`
    fn minimize(&self, points: &[Point], start: GaussParams) -> FitOutcome {
        let ndf = points.len() - 3;
        if !start.is_finite() || start.sigma == 0.0 {
            return FitOutcome::failed(FitStatus::NonFinite, start, ndf, 0);
        }

        let mut p = start.to_array();
        let mut chi2 = chi_square(points, p);
        let mut lambda = INITIAL_LAMBDA;
        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.max_iterations {
            iterations += 1;
            let (jtj, jtr) = normal_equations(points, p);

            let mut damped = jtj;
            for (k, row) in damped.iter_mut().enumerate() {
                row[k] += lambda * jtj[k][k].max(f64::MIN_POSITIVE);
            }

            let Some(delta) = solve3(damped, jtr) else {
                lambda *= 10.0;
                if lambda > MAX_LAMBDA {
                    let params = GaussParams::from_array(p);
                    return FitOutcome::failed(FitStatus::Singular, params, ndf, iterations);
                }
                continue;
            };

            let trial = [p[0] + delta[0], p[1] + delta[1], p[2] + delta[2]];
            let trial_params = GaussParams::from_array(trial);
            if !trial_params.is_finite() || trial_params.sigma == 0.0 {
                lambda *= 10.0;
                if lambda > MAX_LAMBDA {
                    let params = GaussParams::from_array(p);
                    return FitOutcome::failed(FitStatus::NonFinite, params, ndf, iterations);
                }
                continue;
            }

            let step_small = delta
                .iter()
                .zip(p.iter())
                .all(|(d, v)| d.abs() <= RELATIVE_TOLERANCE * (v.abs() + 1e-12));

            let trial_chi2 = chi_square(points, trial);
            if trial_chi2 < chi2 {
                let improvement = chi2 - trial_chi2;
                p = trial;
                chi2 = trial_chi2;
                lambda = (lambda / 10.0).max(1e-12);
                if step_small || improvement <= RELATIVE_TOLERANCE * chi2 || chi2 < 1e-24 {
                    converged = true;
                    break;
                }
            } else if step_small {
                // the step vanished without lowering chi2: sitting on the minimum
                converged = true;
                break;
            } else {
                lambda *= 10.0;
                if lambda > MAX_LAMBDA {
                    let params = GaussParams::from_array(p);
                    return FitOutcome::failed(FitStatus::Stalled, params, ndf, iterations);
                }
            }
        }

        let mut params = GaussParams::from_array(p);
        if !converged {
            return FitOutcome::failed(FitStatus::MaxIterations, params, ndf, iterations);
        }
        params.sigma = params.sigma.abs();

        let (jtj, _) = normal_equations(points, p);
        let errors = invert3(jtj).map(|cov| {
            GaussParams::new(
                cov[0][0].abs().sqrt(),
                cov[1][1].abs().sqrt(),
                cov[2][2].abs().sqrt(),
            )
        });

        FitOutcome {
            status: FitStatus::Converged,
            params,
            errors,
            chi2,
            ndf,
            iterations,
        }
    }
}

/// Amplitude, mean and RMS of the binned data
fn moment_seed(points: &[Point]) -> Option<GaussParams> {
    let weight: f64 = points.iter().map(|pt| pt.y).sum();
    if weight <= 0.0 {
        return None;
    }
    let mean = points.iter().map(|pt| pt.y * pt.x).sum::<f64>() / weight;
    let variance = points
        .iter()
        .map(|pt| pt.y * (pt.x - mean) * (pt.x - mean))
        .sum::<f64>()
        / weight;
    let amplitude = points.iter().map(|pt| pt.y).fold(f64::MIN, f64::max);

    let seed = GaussParams::new(amplitude, mean, variance.sqrt());
    (seed.is_finite() && seed.sigma > 0.0).then_some(seed)
}

fn chi_square(points: &[Point], p: [f64; 3]) -> f64 {
    let model = GaussParams::from_array(p);
    points
        .iter()
        .map(|pt| {
            let r = (pt.y - model.eval(pt.x)) / pt.sigma;
            r * r
        })
        .sum()
}

/// `JᵀJ` and `Jᵀr` of the weighted residuals
fn normal_equations(points: &[Point], p: [f64; 3]) -> ([[f64; 3]; 3], [f64; 3]) {
    let [amplitude, mean, sigma] = p;
    let mut jtj = [[0.0; 3]; 3];
    let mut jtr = [0.0; 3];

    for pt in points {
        let dx = pt.x - mean;
        let e = (-0.5 * dx * dx / (sigma * sigma)).exp();
        let f = amplitude * e;
        let grad = [
            e / pt.sigma,
            f * dx / (sigma * sigma) / pt.sigma,
            f * dx * dx / (sigma * sigma * sigma) / pt.sigma,
        ];
        let r = (pt.y - f) / pt.sigma;
        for j in 0..3 {
            jtr[j] += grad[j] * r;
            for k in 0..3 {
                jtj[j][k] += grad[j] * grad[k];
            }
        }
    }
    (jtj, jtr)
}

/// Gaussian elimination with partial pivoting
fn solve3(mut a: [[f64; 3]; 3], mut b: [f64; 3]) -> Option<[f64; 3]> {
    for col in 0..3 {
        let pivot = (col..3).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-300 || !a[pivot][col].is_finite() {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in col + 1..3 {
            let factor = a[row][col] / a[col][col];
            for k in col..3 {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = [0.0; 3];
    for row in (0..3).rev() {
        let tail: f64 = (row + 1..3).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    x.iter().all(|v| v.is_finite()).then_some(x)
}

fn invert3(a: [[f64; 3]; 3]) -> Option<[[f64; 3]; 3]> {
    let mut inv = [[0.0; 3]; 3];
    for col in 0..3 {
        let mut unit = [0.0; 3];
        unit[col] = 1.0;
        let column = solve3(a, unit)?;
        for row in 0..3 {
            inv[row][col] = column[row];
        }
    }
    Some(inv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::histogram::Axis;

    fn gaussian_hist(amplitude: f64, mean: f64, sigma: f64) -> Histogram1D {
        let mut h = Histogram1D::new("h", Axis::new(400, -100.0, 100.0));
        let model = GaussParams::new(amplitude, mean, sigma);
        for i in 0..h.axis.bins {
            h.contents[i] = model.eval(h.bin_center(i)).round();
        }
        h.entries = h.integral();
        h
    }

    #[test]
    fn test_fit_recovers_mean() {
        let h = gaussian_hist(1000.0, 3.0, 2.5);
        let fit = GaussianFit::new(
            "f",
            FitRange::around(3.0, 10.0),
            GaussParams::new(h.maximum(), 0.0, 5.0),
        );
        let outcome = fit.fit(&h);

        assert!(outcome.status.is_ok(), "status: {}", outcome.status);
        assert!((outcome.params.mean - 3.0).abs() < 0.01);
        assert!((outcome.params.sigma - 2.5).abs() < 0.05);
        assert!((outcome.params.amplitude - 1000.0).abs() < 10.0);
        assert!(outcome.errors.is_some());
        assert!(outcome.ndf > 20 && outcome.ndf <= 38);
    }

    #[test]
    fn test_fit_negative_mean() {
        let h = gaussian_hist(500.0, -2.0, 3.0);
        let fit = GaussianFit::new(
            "f",
            FitRange::around(-2.0, 10.0),
            GaussParams::new(h.maximum(), 0.0, 5.0),
        );
        let outcome = fit.fit(&h);
        assert!(outcome.status.is_ok());
        assert!((outcome.params.mean + 2.0).abs() < 0.01);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let h = gaussian_hist(800.0, 1.25, 2.0);
        let make = || {
            GaussianFit::new(
                "f",
                FitRange::around(1.25, 10.0),
                GaussParams::new(h.maximum(), 0.0, 5.0),
            )
        };
        assert_eq!(make().fit(&h), make().fit(&h));
    }

    /// Fit from the fixed start (max, 0, 5) in mode ± 10, as the fitter does
    fn fit_around_mode(h: &Histogram1D) -> (GaussianFit, FitOutcome) {
        let mode = h.bin_center(h.maximum_bin().unwrap());
        let fit = GaussianFit::new(
            "f",
            FitRange::around(mode, 10.0),
            GaussParams::new(h.maximum(), 0.0, 5.0),
        );
        let outcome = fit.fit(h);
        (fit, outcome)
    }

    #[test]
    fn test_fit_reaches_peaks_far_from_start() {
        for mean in [9.0, 10.0, 12.0, 14.0, 15.0, -12.0] {
            let h = gaussian_hist(960.0, mean, 2.5);
            let (_, outcome) = fit_around_mode(&h);
            assert!(outcome.status.is_ok(), "mean {mean}: {}", outcome.status);
            assert!(
                (outcome.params.mean - mean).abs() < 0.05,
                "mean {mean}: fitted {}",
                outcome.params.mean
            );
            assert!((outcome.params.sigma - 2.5).abs() < 0.1);
        }
    }

    #[test]
    fn test_peak_position_sweep() {
        for step in -72..=72 {
            let mean = step as f64 * 0.25;
            let h = gaussian_hist(960.0, mean, 2.5);
            let (fit, outcome) = fit_around_mode(&h);
            if outcome.status.is_ok() {
                assert!(fit.range.contains(outcome.params.mean), "mean {mean}");
                assert!(
                    (outcome.params.mean - mean).abs() < 0.05,
                    "mean {mean}: fitted {}",
                    outcome.params.mean
                );
            } else {
                assert_ne!(outcome.status.code(), 0);
            }
        }
    }

    #[test]
    fn test_single_start_never_reports_a_stray_peak() {
        // without the moment seed the start at 0 cannot reach a peak at 15
        let h = gaussian_hist(960.0, 15.0, 2.5);
        let fit = GaussianFit::new(
            "f",
            FitRange::around(15.0, 10.0),
            GaussParams::new(h.maximum(), 0.0, 5.0),
        );
        let points = fit.collect_points(&h);
        let outcome = fit.accept(fit.minimize(&points, fit.initial));
        if outcome.status.is_ok() {
            assert!((outcome.params.mean - 15.0).abs() < 0.05);
        } else {
            assert!(matches!(
                outcome.status,
                FitStatus::Stalled
                    | FitStatus::Unphysical
                    | FitStatus::MaxIterations
                    | FitStatus::NonFinite
                    | FitStatus::Singular
            ));
            assert!(outcome.errors.is_none());
        }
    }

    #[test]
    fn test_converged_outside_range_is_unphysical() {
        let fit = GaussianFit::new(
            "f",
            FitRange::around(12.0, 10.0),
            GaussParams::new(960.0, 0.0, 5.0),
        );
        let converged = |params: GaussParams| FitOutcome {
            status: FitStatus::Converged,
            params,
            errors: Some(GaussParams::new(1.0, 0.01, 0.01)),
            chi2: 1.0,
            ndf: 37,
            iterations: 4,
        };

        let stray = fit.accept(converged(GaussParams::new(960.0, 1.0e6, 2.5)));
        assert_eq!(stray.status, FitStatus::Unphysical);
        assert_eq!(stray.status.code(), 7);
        assert!(stray.errors.is_none());

        let negative = fit.accept(converged(GaussParams::new(-3.0, 12.0, 2.5)));
        assert_eq!(negative.status, FitStatus::Unphysical);

        let needle = fit.accept(converged(GaussParams::new(960.0, 12.0, 1e-9)));
        assert_eq!(needle.status, FitStatus::Unphysical);

        let flat = fit.accept(converged(GaussParams::new(960.0, 12.0, 400.0)));
        assert_eq!(flat.status, FitStatus::Unphysical);

        let good = fit.accept(converged(GaussParams::new(960.0, 12.0, 2.5)));
        assert_eq!(good.status, FitStatus::Converged);
    }

    #[test]
    fn test_moment_seed_tracks_data() {
        let h = gaussian_hist(960.0, -12.0, 2.5);
        let fit = GaussianFit::new(
            "f",
            FitRange::around(-12.0, 10.0),
            GaussParams::new(h.maximum(), 0.0, 5.0),
        );
        let seed = moment_seed(&fit.collect_points(&h)).unwrap();
        assert!((seed.mean + 12.0).abs() < 0.1);
        assert!((seed.sigma - 2.5).abs() < 0.2);
        assert_eq!(seed.amplitude, h.maximum());
    }

    #[test]
    fn test_empty_range_fails() {
        let h = gaussian_hist(1000.0, 3.0, 2.5);
        let fit = GaussianFit::new(
            "f",
            FitRange::around(80.0, 5.0),
            GaussParams::new(1000.0, 0.0, 5.0),
        );
        let outcome = fit.fit(&h);
        assert_eq!(outcome.status, FitStatus::EmptyRange);
        assert_ne!(outcome.status.code(), 0);
    }

    #[test]
    fn test_too_few_points_fails() {
        let mut h = Histogram1D::new("h", Axis::new(40, -10.0, 10.0));
        h.contents[20] = 50.0;
        h.contents[21] = 20.0;
        h.entries = 70.0;
        let fit = GaussianFit::new(
            "f",
            FitRange::around(0.25, 10.0),
            GaussParams::new(50.0, 0.0, 5.0),
        );
        assert_eq!(fit.fit(&h).status, FitStatus::TooFewPoints(2));
    }

    #[test]
    fn test_range_is_inclusive() {
        let range = FitRange::around(2.0, 10.0);
        assert!(range.contains(-8.0));
        assert!(range.contains(12.0));
        assert!(!range.contains(12.0001));
    }

    #[test]
    fn test_solve3_identity() {
        let a = [[2.0, 0.0, 0.0], [0.0, 4.0, 0.0], [0.0, 0.0, 8.0]];
        assert_eq!(solve3(a, [2.0, 4.0, 8.0]), Some([1.0, 1.0, 1.0]));
        assert_eq!(solve3([[0.0; 3]; 3], [1.0, 1.0, 1.0]), None);
    }
}
