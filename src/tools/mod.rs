//! 工具模块集合 / Tool layer
//!
//! CLI, the run loop, display, logging and output, supporting main.rs.

pub mod cli;
pub mod constants;
pub mod display;
pub mod logging;
pub mod output;
pub mod pipeline;
pub mod scanner;

pub use cli::{AppConfig, parse_args, show_completion_info, show_startup_info};
pub use display::{ConsoleDisplay, FitDisplay, NullDisplay};
pub use logging::init_tracing;
pub use output::{
    OverviewArtifact, format_series_table, format_set_table, print_summary, read_overview,
    write_overview,
};
pub use pipeline::{DriftPipeline, DriftReport, PipelineOptions, PipelineState, SetSummary};
pub use scanner::{show_missing_artifacts, show_scan_results};
