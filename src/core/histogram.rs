//! 直方图容器 / Binned histogram containers
//!
//! Fixed-width binning only. The 2D container stores the time-like
//! observable on X and the control coordinate (detector element) on Y;
//! [`Histogram2D::project_x`] collapses Y into a 1D time distribution.
//! Under/overflow is not tracked: fills outside the axis are dropped.

use serde::{Deserialize, Serialize};

/// Largest bin count accepted per axis and per 2D grid
pub const MAX_BINS: usize = 1 << 24;

/// Fixed-width axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    /// Number of bins
    pub bins: usize,
    /// Lower edge of the first bin
    pub min: f64,
    /// Upper edge of the last bin
    pub max: f64,
}

impl Axis {
    pub fn new(bins: usize, min: f64, max: f64) -> Self {
        Self { bins, min, max }
    }

    #[inline]
    pub fn bin_width(&self) -> f64 {
        (self.max - self.min) / self.bins as f64
    }

    /// Center of bin `index` (0-based)
    #[inline]
    pub fn bin_center(&self, index: usize) -> f64 {
        self.min + (index as f64 + 0.5) * self.bin_width()
    }

    /// Bin containing `x`, `None` outside `[min, max)`
    pub fn find_bin(&self, x: f64) -> Option<usize> {
        if self.bins == 0 || !x.is_finite() || x < self.min || x >= self.max {
            return None;
        }
        let index = ((x - self.min) / self.bin_width()) as usize;
        // rounding at the upper edge
        Some(index.min(self.bins - 1))
    }

    /// Check the axis describes at least one bin of positive width
    pub fn validate(&self) -> Result<(), String> {
        if self.bins == 0 {
            return Err("axis has no bins".to_string());
        }
        if self.bins > MAX_BINS {
            return Err(format!("axis has {} bins, limit is {MAX_BINS}", self.bins));
        }
        if !(self.min.is_finite() && self.max.is_finite()) || self.max <= self.min {
            return Err(format!("invalid axis range [{}, {}]", self.min, self.max));
        }
        Ok(())
    }
}

/// One-dimensional histogram
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram1D {
    pub name: String,
    pub axis: Axis,
    pub contents: Vec<f64>,
    /// Per-bin errors; `None` means Poisson (`sqrt(content)`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<f64>>,
    /// Number of fill calls (or the stored entry count)
    pub entries: f64,
}

impl Histogram1D {
    pub fn new(name: impl Into<String>, axis: Axis) -> Self {
        Self {
            name: name.into(),
            axis,
            contents: vec![0.0; axis.bins],
            errors: None,
            entries: 0.0,
        }
    }

    /// Add `weight` to the bin containing `x`
    pub fn fill(&mut self, x: f64, weight: f64) {
        self.entries += 1.0;
        if let Some(index) = self.axis.find_bin(x) {
            self.contents[index] += weight;
        }
    }

    #[inline]
    pub fn bin_content(&self, index: usize) -> f64 {
        self.contents[index]
    }

    #[inline]
    pub fn bin_center(&self, index: usize) -> f64 {
        self.axis.bin_center(index)
    }

    pub fn bin_error(&self, index: usize) -> f64 {
        match &self.errors {
            Some(errors) => errors[index],
            None => self.contents[index].abs().sqrt(),
        }
    }

    /// Index of the bin with the largest content (first one on ties)
    pub fn maximum_bin(&self) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (index, &content) in self.contents.iter().enumerate() {
            match best {
                Some((_, value)) if content <= value => {}
                _ => best = Some((index, content)),
            }
        }
        best.map(|(index, _)| index)
    }

    /// Largest bin content, 0 for an empty axis
    pub fn maximum(&self) -> f64 {
        self.maximum_bin()
            .map(|index| self.contents[index])
            .unwrap_or(0.0)
    }

    pub fn integral(&self) -> f64 {
        self.contents.iter().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries <= 0.0
    }

    pub fn validate(&self) -> Result<(), String> {
        self.axis.validate()?;
        if self.contents.len() != self.axis.bins {
            return Err(format!(
                "{}: {} contents for {} bins",
                self.name,
                self.contents.len(),
                self.axis.bins
            ));
        }
        if let Some(errors) = &self.errors
            && errors.len() != self.axis.bins
        {
            return Err(format!(
                "{}: {} errors for {} bins",
                self.name,
                errors.len(),
                self.axis.bins
            ));
        }
        Ok(())
    }
}

/// Two-dimensional histogram, X = time observable, Y = control coordinate
///
/// Contents are row-major: `contents[iy * x_axis.bins + ix]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram2D {
    pub name: String,
    pub x_axis: Axis,
    pub y_axis: Axis,
    pub contents: Vec<f64>,
    pub entries: f64,
}

impl Histogram2D {
    pub fn new(name: impl Into<String>, x_axis: Axis, y_axis: Axis) -> Self {
        Self {
            name: name.into(),
            x_axis,
            y_axis,
            contents: vec![0.0; x_axis.bins.checked_mul(y_axis.bins).unwrap_or(0)],
            entries: 0.0,
        }
    }

    pub fn fill(&mut self, x: f64, y: f64, weight: f64) {
        self.entries += 1.0;
        if let (Some(ix), Some(iy)) = (self.x_axis.find_bin(x), self.y_axis.find_bin(y)) {
            self.contents[iy * self.x_axis.bins + ix] += weight;
        }
    }

    #[inline]
    pub fn bin_content(&self, ix: usize, iy: usize) -> f64 {
        self.contents[iy * self.x_axis.bins + ix]
    }

    pub fn is_empty(&self) -> bool {
        self.entries <= 0.0
    }

    /// Sum over the Y axis, keeping the X binning
    pub fn project_x(&self, name: impl Into<String>) -> Histogram1D {
        let nx = self.x_axis.bins;
        let mut projection = Histogram1D::new(name, self.x_axis);
        if nx == 0 {
            return projection;
        }
        for row in self.contents.chunks_exact(nx) {
            for (sum, &content) in projection.contents.iter_mut().zip(row) {
                *sum += content;
            }
        }
        projection.entries = self.entries;
        projection
    }

    pub fn validate(&self) -> Result<(), String> {
        self.x_axis.validate()?;
        self.y_axis.validate()?;
        let expected = self
            .x_axis
            .bins
            .checked_mul(self.y_axis.bins)
            .filter(|&cells| cells <= MAX_BINS)
            .ok_or_else(|| "bin count overflows".to_string())?;
        if self.contents.len() != expected {
            return Err(format!(
                "{}: {} contents for {}x{} bins",
                self.name,
                self.contents.len(),
                self.x_axis.bins,
                self.y_axis.bins
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_binning() {
        let axis = Axis::new(200, -100.0, 100.0);
        assert_eq!(axis.bin_width(), 1.0);
        assert_eq!(axis.bin_center(0), -99.5);
        assert_eq!(axis.find_bin(-100.0), Some(0));
        assert_eq!(axis.find_bin(0.25), Some(100));
        assert_eq!(axis.find_bin(100.0), None);
        assert_eq!(axis.find_bin(f64::NAN), None);
    }

    #[test]
    fn test_axis_validation() {
        assert!(Axis::new(10, 0.0, 1.0).validate().is_ok());
        assert!(Axis::new(0, 0.0, 1.0).validate().is_err());
        assert!(Axis::new(10, 1.0, 1.0).validate().is_err());
    }

    #[test]
    fn test_maximum_bin_first_on_ties() {
        let mut h = Histogram1D::new("h", Axis::new(4, 0.0, 4.0));
        h.contents = vec![1.0, 5.0, 5.0, 2.0];
        assert_eq!(h.maximum_bin(), Some(1));
        assert_eq!(h.maximum(), 5.0);
    }

    #[test]
    fn test_poisson_errors_by_default() {
        let mut h = Histogram1D::new("h", Axis::new(2, 0.0, 2.0));
        h.contents = vec![9.0, 0.0];
        assert_eq!(h.bin_error(0), 3.0);
        assert_eq!(h.bin_error(1), 0.0);
    }

    #[test]
    fn test_project_x_sums_rows() {
        let mut h2 = Histogram2D::new("h2", Axis::new(3, 0.0, 3.0), Axis::new(2, 0.0, 2.0));
        h2.fill(0.5, 0.5, 1.0);
        h2.fill(0.5, 1.5, 2.0);
        h2.fill(2.5, 1.5, 4.0);
        h2.fill(9.0, 0.5, 8.0); // outside X, dropped from contents

        let p = h2.project_x("p");
        assert_eq!(p.name, "p");
        assert_eq!(p.contents, vec![3.0, 0.0, 4.0]);
        assert_eq!(p.entries, 4.0);
        assert_eq!(p.axis, h2.x_axis);
    }

    #[test]
    fn test_validate_detects_size_mismatch() {
        let mut h2 = Histogram2D::new("h2", Axis::new(3, 0.0, 3.0), Axis::new(2, 0.0, 2.0));
        assert!(h2.validate().is_ok());
        h2.contents.pop();
        assert!(h2.validate().is_err());
    }

    #[test]
    fn test_oversized_grid_rejected() {
        let huge = Axis::new(1 << 32, 0.0, 1.0);
        assert!(huge.validate().is_err());

        let h2 = Histogram2D {
            name: "h2".to_string(),
            x_axis: huge,
            y_axis: huge,
            contents: Vec::new(),
            entries: 0.0,
        };
        assert!(h2.validate().is_err());

        // each axis within the limit, the grid is not
        let wide = Axis::new(MAX_BINS, 0.0, 1.0);
        let grid = Histogram2D {
            name: "h2".to_string(),
            x_axis: wide,
            y_axis: Axis::new(2, 0.0, 2.0),
            contents: Vec::new(),
            entries: 0.0,
        };
        assert_eq!(grid.validate(), Err("bin count overflows".to_string()));
    }
}
