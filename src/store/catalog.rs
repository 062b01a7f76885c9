//! 运行集目录 / JSON run-set catalog
//!
//! File-backed [`RunSetStore`]. Layout:
//!
//! ```json
//! { "calibrations": { "<calibration>": { "<data tag>": [
//!     { "first_run": 100, "runs": [100, 101] }, { "runs": [102] } ] } } }
//! ```
//!
//! `first_run` is optional and defaults to the first listed run.

use crate::core::RunSetStore;
use crate::error::{MonitorError, MonitorResult, config_error};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// One set entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_run: Option<u32>,
    pub runs: Vec<u32>,
}

/// Whole catalog: calibration -> data tag -> ordered sets
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub calibrations: BTreeMap<String, BTreeMap<String, Vec<CatalogSet>>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a set to `calibration` / `data_tag`
    pub fn push_set(&mut self, calibration: &str, data_tag: &str, runs: Vec<u32>) {
        self.calibrations
            .entry(calibration.to_string())
            .or_default()
            .entry(data_tag.to_string())
            .or_default()
            .push(CatalogSet {
                first_run: runs.first().copied(),
                runs,
            });
    }

    pub fn write(&self, path: &Path) -> MonitorResult<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}

/// Read-only store over a [`Catalog`]
#[derive(Debug, Clone)]
pub struct CatalogStore {
    catalog: Catalog,
}

impl CatalogStore {
    /// Open a catalog file; any failure is fatal for the pipeline
    pub fn open(path: &Path) -> MonitorResult<Self> {
        let file = File::open(path)
            .map_err(|e| config_error(&format!("cannot open catalog {}", path.display()), e))?;
        let catalog: Catalog = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| config_error(&format!("invalid catalog {}", path.display()), e))?;
        Ok(Self { catalog })
    }

    pub fn from_catalog(catalog: Catalog) -> Self {
        Self { catalog }
    }

    fn sets(&self, data_tag: &str, calibration: &str) -> &[CatalogSet] {
        self.catalog
            .calibrations
            .get(calibration)
            .and_then(|tags| tags.get(data_tag))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn set(&self, data_tag: &str, calibration: &str, set: usize) -> MonitorResult<&CatalogSet> {
        self.sets(data_tag, calibration).get(set).ok_or_else(|| {
            MonitorError::FatalConfiguration(format!(
                "run set {set} does not exist for calibration '{calibration}' ({data_tag})"
            ))
        })
    }
}

impl RunSetStore for CatalogStore {
    fn n_sets(&self, data_tag: &str, calibration: &str) -> MonitorResult<usize> {
        Ok(self.sets(data_tag, calibration).len())
    }

    fn runs_of_set(&self, data_tag: &str, calibration: &str, set: usize) -> MonitorResult<Vec<u32>> {
        Ok(self.set(data_tag, calibration, set)?.runs.clone())
    }

    fn first_run_of_set(
        &self,
        data_tag: &str,
        calibration: &str,
        set: usize,
    ) -> MonitorResult<Option<u32>> {
        let entry = self.set(data_tag, calibration, set)?;
        Ok(entry.first_run.or_else(|| entry.runs.first().copied()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RunSetEnumerator;

    #[test]
    fn test_parse_catalog_with_optional_first_run() {
        let json = r#"{
            "calibrations": {
                "LD2_Dec_07": {
                    "Data.CB.T0": [
                        { "first_run": 99, "runs": [100, 101] },
                        { "runs": [102] }
                    ]
                }
            }
        }"#;
        let catalog: Catalog = serde_json::from_str(json).unwrap();
        let store = CatalogStore::from_catalog(catalog);

        assert_eq!(store.n_sets("Data.CB.T0", "LD2_Dec_07").unwrap(), 2);
        assert_eq!(store.first_run_of_set("Data.CB.T0", "LD2_Dec_07", 0).unwrap(), Some(99));
        assert_eq!(store.first_run_of_set("Data.CB.T0", "LD2_Dec_07", 1).unwrap(), Some(102));
        assert_eq!(store.n_sets("Data.TAPS.T0", "LD2_Dec_07").unwrap(), 0);
    }

    #[test]
    fn test_missing_catalog_is_fatal() {
        let err = CatalogStore::open(Path::new("/nonexistent/catalog.json")).unwrap_err();
        assert!(matches!(err, MonitorError::FatalConfiguration(_)));
    }

    #[test]
    fn test_written_catalog_reopens() {
        let mut catalog = Catalog::new();
        catalog.push_set("calib", "Data.CB.T0", vec![5, 6, 7]);
        catalog.push_set("calib", "Data.CB.T0", vec![8]);

        let path = std::env::temp_dir().join(format!("runset_catalog_{}.json", std::process::id()));
        catalog.write(&path).unwrap();
        let store = CatalogStore::open(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        let sets = RunSetEnumerator::new(&store)
            .list_sets("Data.CB.T0", "calib")
            .unwrap();
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[0].run_numbers(), &[5, 6, 7]);
        assert_eq!(sets[1].first_run_number(), Some(8));
    }

    #[test]
    fn test_set_without_runs_has_no_first_run() {
        let json = r#"{
            "calibrations": {
                "LD2_Dec_07": {
                    "Data.CB.T0": [ { "runs": [] }, { "runs": [102] } ]
                }
            }
        }"#;
        let store = CatalogStore::from_catalog(serde_json::from_str(json).unwrap());

        assert_eq!(store.first_run_of_set("Data.CB.T0", "LD2_Dec_07", 0).unwrap(), None);
        let sets = RunSetEnumerator::new(&store)
            .list_sets("Data.CB.T0", "LD2_Dec_07")
            .unwrap();
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[1].first_run_number(), Some(102));
    }
}
