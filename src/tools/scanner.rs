//! 文件扫描模块 / Artifact scan report
//!
//! Lists which run artifacts are present before the run loop starts. Purely
//! informational: the loop itself resolves every run by name.

use super::cli::AppConfig;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

fn extract_filename_lossy(path: &Path) -> String {
    path.file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string()
}

/// One-line description of the scanned run range
pub fn describe_scan(found: &BTreeMap<u32, PathBuf>) -> String {
    match (found.keys().next(), found.keys().next_back()) {
        (Some(first), Some(last)) => {
            format!("{} artifact(s), runs {first}..={last}", found.len())
        }
        _ => "no artifacts".to_string(),
    }
}

pub fn show_scan_results(config: &AppConfig, found: &BTreeMap<u32, PathBuf>) {
    if found.is_empty() {
        println!(
            "[WARNING] no artifacts matching '{}' in {}",
            config.artifact_pattern,
            config.artifact_dir.display()
        );
        return;
    }

    println!(
        "[INFO] {}: {}",
        config.artifact_dir.display(),
        describe_scan(found)
    );
    if config.verbose {
        for (run, path) in found {
            println!("   {run}: {}", extract_filename_lossy(path));
        }
    }
}

/// 扫描中缺少文件的运行（按访问顺序）
///
/// Visited runs with no artifact in the scan, in visit order
pub fn missing_runs(visited: &[u32], found: &BTreeMap<u32, PathBuf>) -> Vec<u32> {
    visited
        .iter()
        .copied()
        .filter(|run| !found.contains_key(run))
        .collect()
}

pub fn show_missing_artifacts(visited: &[u32], found: &BTreeMap<u32, PathBuf>) {
    let missing = missing_runs(visited, found);
    if missing.is_empty() {
        return;
    }
    println!("[INFO] {} enumerated run(s) without artifact", missing.len());
    tracing::debug!(?missing, "runs without artifact");
}
