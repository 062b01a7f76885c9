//! 概览输出与控制台报告 / Overview output and console report
//!
//! The overview container is a JSON object keyed by overview name. Writing
//! updates it in place: other keys survive, the same key is replaced.

use super::cli::AppConfig;
use super::constants::labels;
use super::pipeline::DriftReport;
use crate::core::{AxisRange, DriftSeries};
use crate::error::{MonitorError, MonitorResult};
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::UTF8_FULL};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::Path;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// One overview point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverviewPoint {
    pub run: u32,
    pub value: f64,
    pub error: f64,
}

/// Vertical set-boundary line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryLine {
    pub set: usize,
    pub run: u32,
    pub y_min: f64,
    pub y_max: f64,
}

/// Persisted overview
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverviewArtifact {
    pub name: String,
    pub title: String,
    pub x_title: String,
    pub y_title: String,
    pub calibration: String,
    pub data_tag: String,
    pub histogram: String,
    /// Clamped run-number range, absent when no run was enumerated
    pub x_range: Option<[f64; 2]>,
    pub y_range: [f64; 2],
    pub points: Vec<OverviewPoint>,
    pub boundaries: Vec<BoundaryLine>,
    pub analyzed: usize,
    pub generated_at: String,
    pub generator: String,
}

impl OverviewArtifact {
    pub fn from_report(report: &DriftReport, config: &AppConfig) -> Self {
        let (y_min, y_max) = config.y_range;
        let series = &report.series;
        Self {
            name: config.overview_name.clone(),
            title: config.overview_name.clone(),
            x_title: labels::X_TITLE.to_string(),
            y_title: labels::Y_TITLE.to_string(),
            calibration: config.calibration.clone(),
            data_tag: config.data_tag.clone(),
            histogram: config.histogram_name.clone(),
            x_range: series.x_range.map(|AxisRange { min, max }| [min, max]),
            y_range: [y_min, y_max],
            points: series
                .points
                .iter()
                .map(|(&run, m)| OverviewPoint {
                    run,
                    value: m.value,
                    error: m.error,
                })
                .collect(),
            boundaries: series
                .boundaries
                .iter()
                .map(|b| BoundaryLine {
                    set: b.set_index,
                    run: b.run,
                    y_min,
                    y_max,
                })
                .collect(),
            analyzed: series.analyzed,
            generated_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            generator: format!("runset-monitor v{VERSION}"),
        }
    }
}

/// Insert `artifact` under its name into the container at `path`
///
/// A missing file starts a new container; a file that is not a JSON
/// object is an error rather than being overwritten.
pub fn write_overview(path: &Path, artifact: &OverviewArtifact) -> MonitorResult<()> {
    let mut container = match fs::read_to_string(path) {
        Ok(text) if text.trim().is_empty() => Map::new(),
        Ok(text) => match serde_json::from_str::<Value>(&text)? {
            Value::Object(map) => map,
            _ => {
                return Err(MonitorError::InvalidInput(format!(
                    "{} is not an overview container",
                    path.display()
                )));
            }
        },
        Err(e) if e.kind() == ErrorKind::NotFound => Map::new(),
        Err(e) => return Err(e.into()),
    };

    container.insert(artifact.name.clone(), serde_json::to_value(artifact)?);

    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, &Value::Object(container))?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Read one overview back from a container
pub fn read_overview(path: &Path, name: &str) -> MonitorResult<Option<OverviewArtifact>> {
    let text = fs::read_to_string(path)?;
    let container: Map<String, Value> = serde_json::from_str(&text)?;
    container
        .get(name)
        .map(|value| serde_json::from_value(value.clone()).map_err(MonitorError::from))
        .transpose()
}

fn right(text: String) -> Cell {
    Cell::new(text).set_alignment(CellAlignment::Right)
}

/// Per-run table of the series
pub fn format_series_table(series: &DriftSeries) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Run", "Set", "Position", "Uncertainty"]);

    for (&run, m) in &series.points {
        table.add_row(vec![
            right(run.to_string()),
            right(m.set_index.map(|s| s.to_string()).unwrap_or_default()),
            right(format!("{:.4}", m.value)),
            right(format!("{:.4}", m.error)),
        ]);
    }
    table.to_string()
}

/// Per-set table with fitted counts and mean positions
pub fn format_set_table(report: &DriftReport) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Set", "First run", "Runs", "Fitted", "Mean position"]);

    for set in &report.sets {
        table.add_row(vec![
            right(set.index.to_string()),
            right(
                set.first_run
                    .map(|run| run.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            right(set.runs.to_string()),
            right(set.fitted.to_string()),
            right(
                set.mean_position
                    .map(|m| format!("{m:.4}"))
                    .unwrap_or_else(|| "-".to_string()),
            ),
        ]);
    }
    table.to_string()
}

/// Final console report
pub fn print_summary(report: &DriftReport, config: &AppConfig) {
    println!();
    println!("{}", format_set_table(report));
    if config.verbose && !report.series.points.is_empty() {
        println!("{}", format_series_table(&report.series));
    }

    let skipped = report.series.skip_stats();
    if !skipped.is_empty() {
        println!("[INFO] runs without a point:");
        for (category, runs) in &skipped {
            println!("   {}: {} run(s)", category.display_name(), runs.len());
        }
    }
    println!("{} runs analyzed.", report.analyzed());
}
