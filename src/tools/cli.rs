//! 命令行接口模块 / Command-line interface
//!
//! Argument parsing, configuration and startup/completion banners.

use super::constants::defaults;
use crate::core::FitterConfig;
use crate::error::{MonitorError, MonitorResult};
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use std::path::PathBuf;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// 应用程序配置 / Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Run-set catalog (metadata store export)
    pub catalog_path: PathBuf,

    /// Directory holding the per-run histogram artifacts
    pub artifact_dir: PathBuf,

    /// Calibration identifier
    pub calibration: String,

    /// Data tag queried in the catalog
    pub data_tag: String,

    /// 2D histogram name inside each artifact
    pub histogram_name: String,

    /// Artifact file name pattern with `{run}`
    pub artifact_pattern: String,

    /// Overview output container (updated in place)
    pub output_path: PathBuf,

    /// Key of the overview inside the output container
    pub overview_name: String,

    /// Y display range of the overview
    pub y_range: (f64, f64),

    /// Pause after each run for a live display
    pub watch: bool,

    pub verbose: bool,
}

impl AppConfig {
    /// Configuration with every default except the required inputs
    pub fn with_defaults(
        catalog_path: impl Into<PathBuf>,
        artifact_dir: impl Into<PathBuf>,
        calibration: impl Into<String>,
    ) -> Self {
        Self {
            catalog_path: catalog_path.into(),
            artifact_dir: artifact_dir.into(),
            calibration: calibration.into(),
            data_tag: defaults::DATA_TAG.to_string(),
            histogram_name: defaults::HISTOGRAM_NAME.to_string(),
            artifact_pattern: defaults::ARTIFACT_PATTERN.to_string(),
            output_path: PathBuf::from(defaults::OUTPUT_FILE),
            overview_name: defaults::OVERVIEW_NAME.to_string(),
            y_range: (defaults::Y_MIN, defaults::Y_MAX),
            watch: false,
            verbose: false,
        }
    }

    /// Fitter parameters derived from this configuration
    pub fn fitter_config(&self) -> FitterConfig {
        FitterConfig {
            histogram_name: self.histogram_name.clone(),
            ..FitterConfig::default()
        }
    }
}

/// 命令行定义
pub fn build_command() -> Command {
    Command::new("runset-monitor")
        .version(VERSION)
        .about(DESCRIPTION)
        .author("CaLib Team")
        .arg(
            Arg::new("calibration")
                .long("calibration")
                .short('c')
                .help("Calibration identifier")
                .required(true)
                .value_name("NAME"),
        )
        .arg(
            Arg::new("catalog")
                .long("catalog")
                .help("Run-set catalog (JSON export of the metadata store)")
                .required(true)
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("artifacts")
                .long("artifacts")
                .short('a')
                .help("Directory with the per-run histogram artifacts")
                .required(true)
                .value_name("DIR")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("data")
                .long("data")
                .help("Data tag queried in the catalog")
                .default_value(defaults::DATA_TAG),
        )
        .arg(
            Arg::new("hist")
                .long("hist")
                .help("Name of the 2D timing histogram")
                .default_value(defaults::HISTOGRAM_NAME),
        )
        .arg(
            Arg::new("pattern")
                .long("pattern")
                .help("Artifact file name pattern, {run} is replaced by the run number")
                .default_value(defaults::ARTIFACT_PATTERN),
        )
        .arg(
            Arg::new("output")
                .long("output")
                .short('o')
                .help("Overview output file (updated, not overwritten)")
                .value_name("FILE")
                .default_value(defaults::OUTPUT_FILE)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("name")
                .long("name")
                .help("Overview name inside the output file")
                .default_value(defaults::OVERVIEW_NAME),
        )
        .arg(
            Arg::new("y-min")
                .long("y-min")
                .help("Lower edge of the overview y range")
                .allow_negative_numbers(true)
                .value_parser(value_parser!(f64)),
        )
        .arg(
            Arg::new("y-max")
                .long("y-max")
                .help("Upper edge of the overview y range")
                .allow_negative_numbers(true)
                .value_parser(value_parser!(f64)),
        )
        .arg(
            Arg::new("watch")
                .long("watch")
                .short('w')
                .help("Pause after each run to follow the fits live")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Show per-run details and the full series table")
                .action(ArgAction::SetTrue),
        )
}

/// Build an [`AppConfig`] from parsed matches
pub fn config_from_matches(matches: &ArgMatches) -> MonitorResult<AppConfig> {
    let string = |id: &str| matches.get_one::<String>(id).cloned().unwrap_or_default();
    let path = |id: &str| matches.get_one::<PathBuf>(id).cloned().unwrap_or_default();

    let y_min = matches
        .get_one::<f64>("y-min")
        .copied()
        .unwrap_or(defaults::Y_MIN);
    let y_max = matches
        .get_one::<f64>("y-max")
        .copied()
        .unwrap_or(defaults::Y_MAX);
    if !(y_min < y_max) {
        return Err(MonitorError::InvalidInput(format!(
            "y range [{y_min}, {y_max}] is empty"
        )));
    }

    Ok(AppConfig {
        catalog_path: path("catalog"),
        artifact_dir: path("artifacts"),
        calibration: string("calibration"),
        data_tag: string("data"),
        histogram_name: string("hist"),
        artifact_pattern: string("pattern"),
        output_path: path("output"),
        overview_name: string("name"),
        y_range: (y_min, y_max),
        watch: matches.get_flag("watch"),
        verbose: matches.get_flag("verbose"),
    })
}

/// Parse the process arguments; clap exits on `--help` and usage errors
pub fn parse_args() -> MonitorResult<AppConfig> {
    config_from_matches(&build_command().get_matches())
}

pub fn show_startup_info(config: &AppConfig) {
    println!("runset-monitor v{VERSION}");
    println!("{DESCRIPTION}");
    println!(
        "[INFO] calibration '{}' / {} / histogram '{}'",
        config.calibration, config.data_tag, config.histogram_name
    );
    if config.verbose {
        println!("[INFO] catalog:   {}", config.catalog_path.display());
        println!("[INFO] artifacts: {}", config.artifact_dir.display());
        println!("[INFO] output:    {}", config.output_path.display());
    }
    println!();
}

pub fn show_completion_info(config: &AppConfig) {
    if config.verbose {
        println!("[OK] overview '{}' written", config.overview_name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> MonitorResult<AppConfig> {
        let matches = build_command()
            .try_get_matches_from(args)
            .map_err(|e| MonitorError::InvalidInput(e.to_string()))?;
        config_from_matches(&matches)
    }

    #[test]
    fn test_defaults_applied() {
        let config = parse(&[
            "runset-monitor",
            "-c",
            "LD2_Dec_07",
            "--catalog",
            "sets.json",
            "-a",
            "hists",
        ])
        .unwrap();

        assert_eq!(config.calibration, "LD2_Dec_07");
        assert_eq!(config.data_tag, "Data.CB.T0");
        assert_eq!(config.histogram_name, "CaLib_CB_Time_Neut");
        assert_eq!(config.artifact_pattern, "Hist_CBTaggTAPS_{run}.json");
        assert_eq!(config.output_path, PathBuf::from("runset_overview.json"));
        assert_eq!(config.overview_name, "CBTime");
        assert_eq!(config.y_range, (-20.0, 20.0));
        assert!(!config.watch);
    }

    #[test]
    fn test_negative_y_range() {
        let config = parse(&[
            "runset-monitor",
            "-c",
            "x",
            "--catalog",
            "s.json",
            "-a",
            "h",
            "--y-min",
            "-5",
            "--y-max",
            "5.5",
            "--watch",
        ])
        .unwrap();
        assert_eq!(config.y_range, (-5.0, 5.5));
        assert!(config.watch);
    }

    #[test]
    fn test_inverted_y_range_rejected() {
        let result = parse(&[
            "runset-monitor",
            "-c",
            "x",
            "--catalog",
            "s.json",
            "-a",
            "h",
            "--y-min",
            "3",
            "--y-max",
            "-3",
        ]);
        assert!(matches!(result, Err(MonitorError::InvalidInput(_))));
    }

    #[test]
    fn test_calibration_required() {
        assert!(parse(&["runset-monitor", "--catalog", "s.json", "-a", "h"]).is_err());
    }

    #[test]
    fn test_fitter_config_uses_histogram_name() {
        let mut config = AppConfig::with_defaults("s.json", "h", "x");
        config.histogram_name = "CaLib_TAPS_Time".to_string();
        let fitter = config.fitter_config();
        assert_eq!(fitter.histogram_name, "CaLib_TAPS_Time");
        assert_eq!(fitter.half_window, 10.0);
    }
}
