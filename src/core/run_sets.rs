//! 运行集枚举 / Run-set enumeration
//!
//! A calibration is split into run sets; each set owns an ordered list of
//! run numbers. The metadata store behind [`RunSetStore`] is an external
//! collaborator, queried read-only.

use crate::error::{MonitorError, MonitorResult};
use std::collections::BTreeMap;

/// Read-only view of the run/calibration metadata store
pub trait RunSetStore {
    /// Number of run sets of `calibration` for `data_tag`
    fn n_sets(&self, data_tag: &str, calibration: &str) -> MonitorResult<usize>;

    /// Ordered run numbers of set `set`
    fn runs_of_set(&self, data_tag: &str, calibration: &str, set: usize) -> MonitorResult<Vec<u32>>;

    /// First run of set `set` as recorded by the store, `None` for a set
    /// without runs
    fn first_run_of_set(
        &self,
        data_tag: &str,
        calibration: &str,
        set: usize,
    ) -> MonitorResult<Option<u32>>;
}

/// One run set, immutable once enumerated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSet {
    index: usize,
    runs: Vec<u32>,
    first_run: Option<u32>,
}

impl RunSet {
    pub fn new(index: usize, runs: Vec<u32>, first_run: Option<u32>) -> Self {
        Self {
            index,
            runs,
            first_run,
        }
    }

    /// Ordinal of the set within its calibration
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn run_numbers(&self) -> &[u32] {
        &self.runs
    }

    pub fn first_run_number(&self) -> Option<u32> {
        self.first_run
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

/// Lists the run sets of a calibration in store order
pub struct RunSetEnumerator<'a> {
    store: &'a dyn RunSetStore,
}

impl<'a> RunSetEnumerator<'a> {
    pub fn new(store: &'a dyn RunSetStore) -> Self {
        Self { store }
    }

    /// Fetch all sets; zero sets is a fatal configuration error
    pub fn list_sets(&self, data_tag: &str, calibration: &str) -> MonitorResult<Vec<RunSet>> {
        let n_sets = self.store.n_sets(data_tag, calibration)?;
        if n_sets == 0 {
            return Err(MonitorError::FatalConfiguration(format!(
                "no run sets found for calibration '{calibration}' ({data_tag})"
            )));
        }

        (0..n_sets)
            .map(|index| {
                let runs = self.store.runs_of_set(data_tag, calibration, index)?;
                let first_run = self.store.first_run_of_set(data_tag, calibration, index)?;
                Ok(RunSet::new(index, runs, first_run))
            })
            .collect()
    }
}

/// In-memory store keyed by `(calibration, data_tag)`
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    sets: BTreeMap<(String, String), Vec<Vec<u32>>>,
    unreachable: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a set; its first run is the first listed run
    pub fn with_set(mut self, calibration: &str, data_tag: &str, runs: Vec<u32>) -> Self {
        self.sets
            .entry((calibration.to_string(), data_tag.to_string()))
            .or_default()
            .push(runs);
        self
    }

    /// A store whose every query fails, as if the server were down
    pub fn unreachable() -> Self {
        Self {
            sets: BTreeMap::new(),
            unreachable: true,
        }
    }

    fn sets_for(&self, data_tag: &str, calibration: &str) -> MonitorResult<&[Vec<u32>]> {
        if self.unreachable {
            return Err(MonitorError::FatalConfiguration(
                "metadata store unreachable".to_string(),
            ));
        }
        Ok(self
            .sets
            .get(&(calibration.to_string(), data_tag.to_string()))
            .map(Vec::as_slice)
            .unwrap_or(&[]))
    }

    fn set(&self, data_tag: &str, calibration: &str, set: usize) -> MonitorResult<&Vec<u32>> {
        self.sets_for(data_tag, calibration)?.get(set).ok_or_else(|| {
            MonitorError::FatalConfiguration(format!(
                "run set {set} does not exist for calibration '{calibration}'"
            ))
        })
    }
}

impl RunSetStore for MemoryStore {
    fn n_sets(&self, data_tag: &str, calibration: &str) -> MonitorResult<usize> {
        Ok(self.sets_for(data_tag, calibration)?.len())
    }

    fn runs_of_set(&self, data_tag: &str, calibration: &str, set: usize) -> MonitorResult<Vec<u32>> {
        Ok(self.set(data_tag, calibration, set)?.clone())
    }

    fn first_run_of_set(
        &self,
        data_tag: &str,
        calibration: &str,
        set: usize,
    ) -> MonitorResult<Option<u32>> {
        Ok(self.set(data_tag, calibration, set)?.first().copied())
    }
}
