//! 单运行直方图文件 / Per-run histogram artifacts
//!
//! One JSON file per run, named by a pattern with a `{run}` placeholder,
//! holding named histograms:
//!
//! ```json
//! { "histograms": { "CaLib_CB_Time_Neut": { "kind": "h2", "name": "...",
//!   "x_axis": {...}, "y_axis": {...}, "contents": [...], "entries": 1234 } } }
//! ```

use crate::core::{Histogram1D, Histogram2D, HistogramSource, SkipReason};
use crate::error::{MonitorError, MonitorResult, artifact_error};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Placeholder replaced by the run number in artifact patterns
pub const RUN_PLACEHOLDER: &str = "{run}";

/// A histogram as stored in an artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoredHistogram {
    H1(Histogram1D),
    H2(Histogram2D),
}

/// Contents of one artifact file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactFile {
    #[serde(default)]
    pub histograms: BTreeMap<String, StoredHistogram>,
}

impl ArtifactFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, histogram: StoredHistogram) {
        let name = match &histogram {
            StoredHistogram::H1(h) => h.name.clone(),
            StoredHistogram::H2(h) => h.name.clone(),
        };
        self.histograms.insert(name, histogram);
    }

    /// Read and parse; the file is closed when this returns
    pub fn read(path: &Path) -> MonitorResult<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    pub fn write(&self, path: &Path) -> MonitorResult<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    /// Extract the named 2D histogram, checking it is usable
    pub fn take_h2(mut self, name: &str) -> Result<Histogram2D, SkipReason> {
        match self.histograms.remove(name) {
            None => Err(SkipReason::MissingHistogram(name.to_string())),
            Some(StoredHistogram::H1(_)) => Err(SkipReason::CorruptArtifact(format!(
                "'{name}' is not a 2D histogram"
            ))),
            Some(StoredHistogram::H2(h2)) => {
                h2.validate().map_err(SkipReason::CorruptArtifact)?;
                if h2.is_empty() {
                    return Err(SkipReason::EmptyHistogram(name.to_string()));
                }
                Ok(h2)
            }
        }
    }
}

/// Directory of artifacts addressed by run number
#[derive(Debug, Clone)]
pub struct ArtifactDirectory {
    dir: PathBuf,
    prefix: String,
    suffix: String,
}

impl ArtifactDirectory {
    /// `pattern` must contain exactly one `{run}`
    pub fn new(dir: impl Into<PathBuf>, pattern: &str) -> MonitorResult<Self> {
        let mut parts = pattern.split(RUN_PLACEHOLDER);
        let (Some(prefix), Some(suffix), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(MonitorError::InvalidInput(format!(
                "artifact pattern '{pattern}' must contain {RUN_PLACEHOLDER} exactly once"
            )));
        };
        Ok(Self {
            dir: dir.into(),
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, run: u32) -> PathBuf {
        self.dir
            .join(format!("{}{run}{}", self.prefix, self.suffix))
    }

    /// Run number encoded in `file_name`, if it matches the pattern
    pub fn run_of(&self, file_name: &str) -> Option<u32> {
        file_name
            .strip_prefix(&self.prefix)?
            .strip_suffix(&self.suffix)?
            .parse()
            .ok()
    }

    /// All artifacts present in the directory (non-recursive)
    pub fn scan(&self) -> MonitorResult<BTreeMap<u32, PathBuf>> {
        if !self.dir.is_dir() {
            return Err(MonitorError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("artifact directory not found: {}", self.dir.display()),
            )));
        }

        let mut found = BTreeMap::new();
        for entry in WalkDir::new(&self.dir).min_depth(1).max_depth(1) {
            let entry = entry
                .map_err(|e| artifact_error(&format!("cannot scan {}", self.dir.display()), e))?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str()
                && let Some(run) = self.run_of(name)
            {
                found.insert(run, entry.into_path());
            }
        }
        Ok(found)
    }
}

impl HistogramSource for ArtifactDirectory {
    fn load(&self, run: u32, name: &str) -> Result<Histogram2D, SkipReason> {
        let path = self.path_for(run);
        let artifact = match ArtifactFile::read(&path) {
            Ok(artifact) => artifact,
            Err(MonitorError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                return Err(SkipReason::MissingArtifact);
            }
            Err(MonitorError::Io(e)) => return Err(SkipReason::UnreadableArtifact(e.to_string())),
            Err(e) => return Err(SkipReason::CorruptArtifact(e.to_string())),
        };
        artifact.take_h2(name)
    }
}
