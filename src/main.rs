//! runset-monitor - 主程序入口 / entry point
//!
//! 纯流程控制器。
//!
//! Flow control only: parse the configuration, run the pipeline, write the
//! overview, print the summary and exit.

use runset_monitor::{
    core::PeakFitter,
    error::{ErrorCategory, MonitorError},
    store::{ArtifactDirectory, CatalogStore},
    tools::{self, AppConfig, ConsoleDisplay, DriftPipeline, OverviewArtifact, PipelineOptions},
};
use std::process;

/// 错误退出码定义 / Exit codes
mod exit_codes {
    /// 通用错误（I/O）
    pub const GENERAL_ERROR: i32 = 1;
    /// 配置错误：目录、标定名或数据标签
    pub const CONFIGURATION_ERROR: i32 = 2;
    /// 直方图文件错误
    pub const ARTIFACT_ERROR: i32 = 3;
    /// 输出文件错误
    pub const OUTPUT_ERROR: i32 = 4;
}

/// 获取错误建议文本
fn get_error_suggestion(error: &MonitorError) -> &'static str {
    match ErrorCategory::from_monitor_error(error) {
        ErrorCategory::Configuration => {
            "检查目录文件路径、标定名和数据标签，使用 --help 查看完整用法 / Check the catalog path, the calibration name and the data tag; use --help for usage"
        }
        ErrorCategory::Io => "检查路径是否存在且可读写 / Check that the paths exist and are readable/writable",
        ErrorCategory::Artifact | ErrorCategory::Fit => {
            "检查直方图目录和文件名模式 / Check the artifact directory and the file name pattern"
        }
        ErrorCategory::Other => {
            "目录、直方图或概览文件不是有效的 JSON / A catalog, artifact or overview file is not valid JSON"
        }
    }
}

/// 错误处理和建议
fn handle_error(error: MonitorError) -> ! {
    eprintln!("[ERROR] 错误 / Error: {error}");
    eprintln!("[INFO] 建议 / Suggestion: {}", get_error_suggestion(&error));

    let exit_code = match ErrorCategory::from_monitor_error(&error) {
        ErrorCategory::Configuration => exit_codes::CONFIGURATION_ERROR,
        ErrorCategory::Artifact | ErrorCategory::Fit => exit_codes::ARTIFACT_ERROR,
        ErrorCategory::Other => exit_codes::OUTPUT_ERROR,
        ErrorCategory::Io => exit_codes::GENERAL_ERROR,
    };
    process::exit(exit_code);
}

fn run(config: &AppConfig) -> Result<(), MonitorError> {
    let store = CatalogStore::open(&config.catalog_path)?;
    let artifacts = ArtifactDirectory::new(&config.artifact_dir, &config.artifact_pattern)?;

    let scanned = match artifacts.scan() {
        Ok(found) => {
            tools::show_scan_results(config, &found);
            Some(found)
        }
        Err(e) => {
            tracing::warn!(error = %e, "artifact directory not scanned");
            None
        }
    };

    let fitter = PeakFitter::new(&artifacts, config.fitter_config());
    let mut display = ConsoleDisplay::new(config.verbose);
    let options = PipelineOptions::new(&config.data_tag, &config.calibration)
        .with_watch(config.watch);

    let report = DriftPipeline::new(&store, fitter, &mut display, options).run()?;
    if let Some(found) = &scanned {
        tools::show_missing_artifacts(&report.visited, found);
    }

    let overview = OverviewArtifact::from_report(&report, config);
    tools::write_overview(&config.output_path, &overview)?;

    tools::print_summary(&report, config);
    Ok(())
}

fn main() {
    let config = match tools::parse_args() {
        Ok(config) => config,
        Err(error) => handle_error(error),
    };
    tools::init_tracing(config.verbose);
    tools::show_startup_info(&config);

    if let Err(error) = run(&config) {
        handle_error(error);
    }

    tools::show_completion_info(&config);
    process::exit(0);
}
