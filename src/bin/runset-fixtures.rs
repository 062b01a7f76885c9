//! runset-fixtures - 演示数据集生成器 / demo dataset generator
//!
//! Writes a run-set catalog and one synthetic timing artifact per run, so
//! runset-monitor can be tried without a metadata server or real data.
//!
//! ```text
//! runset-fixtures --out demo --set 100-104 --set 105-109 --offset 0.5 --offset -1.2 --missing 103
//! runset-monitor -c demo --catalog demo/catalog.json -a demo
//! ```

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use runset_monitor::store::{ArtifactFile, Catalog, PeakShape, StoredHistogram, timing_histogram};
use runset_monitor::tools::constants::defaults;

#[derive(Parser)]
#[command(name = "runset-fixtures")]
#[command(about = "Generate a synthetic run-set catalog and timing artifacts")]
#[command(version)]
struct Cli {
    /// Output directory
    #[arg(long, short = 'o')]
    out: PathBuf,

    /// Calibration name written into the catalog
    #[arg(long, short = 'c', default_value = "demo")]
    calibration: String,

    /// Run set as `first-last` or `a,b,c`; repeat for more sets
    #[arg(long = "set", required = true)]
    sets: Vec<String>,

    /// Peak offset per set (ns); missing entries default to 0
    #[arg(long = "offset", allow_negative_numbers = true)]
    offsets: Vec<f64>,

    /// Runs listed in the catalog but without an artifact
    #[arg(long)]
    missing: Vec<u32>,

    /// Run-to-run wobble amplitude (ns)
    #[arg(long, default_value_t = 0.3)]
    wobble: f64,
}

fn parse_set(text: &str) -> Result<Vec<u32>> {
    let runs: Vec<u32> = if let Some((first, last)) = text.split_once('-') {
        let first: u32 = first.trim().parse().with_context(|| format!("bad set '{text}'"))?;
        let last: u32 = last.trim().parse().with_context(|| format!("bad set '{text}'"))?;
        if last < first {
            bail!("set '{text}' is descending");
        }
        (first..=last).collect()
    } else {
        text.split(',')
            .map(|run| {
                run.trim()
                    .parse()
                    .with_context(|| format!("bad run '{run}' in set '{text}'"))
            })
            .collect::<Result<_>>()?
    };
    if runs.is_empty() {
        bail!("set '{text}' has no runs");
    }
    Ok(runs)
}

/// Deterministic per-run peak position
fn peak_position(offset: f64, wobble: f64, run: u32) -> f64 {
    offset + wobble * (f64::from(run) * 0.7).sin()
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    fs::create_dir_all(&cli.out)
        .with_context(|| format!("cannot create {}", cli.out.display()))?;

    let mut catalog = Catalog::new();
    let mut written = 0usize;

    for (index, text) in cli.sets.iter().enumerate() {
        let runs = parse_set(text)?;
        let offset = cli.offsets.get(index).copied().unwrap_or(0.0);

        for &run in &runs {
            if cli.missing.contains(&run) {
                continue;
            }
            let shape = PeakShape::at(peak_position(offset, cli.wobble, run));
            let mut artifact = ArtifactFile::new();
            artifact.insert(StoredHistogram::H2(timing_histogram(
                defaults::HISTOGRAM_NAME,
                shape,
            )));
            let path = cli
                .out
                .join(defaults::ARTIFACT_PATTERN.replace("{run}", &run.to_string()));
            artifact
                .write(&path)
                .with_context(|| format!("cannot write {}", path.display()))?;
            written += 1;
        }
        catalog.push_set(&cli.calibration, defaults::DATA_TAG, runs);
    }

    let catalog_path = cli.out.join("catalog.json");
    catalog
        .write(&catalog_path)
        .with_context(|| format!("cannot write {}", catalog_path.display()))?;

    println!(
        "[OK] {} set(s), {written} artifact(s) in {}",
        cli.sets.len(),
        cli.out.display()
    );
    Ok(())
}
