//! 文件存储模块 / File-backed collaborators
//!
//! The metadata store and the histogram artifacts are owned by other
//! systems; these implementations read their JSON exports.

pub mod artifacts;
pub mod catalog;
pub mod synthetic;

pub use artifacts::{ArtifactDirectory, ArtifactFile, StoredHistogram};
pub use catalog::{Catalog, CatalogSet, CatalogStore};
pub use synthetic::{PeakShape, timing_histogram};
