//! 统一错误处理框架 / Unified error handling
//!
//! Fatal errors abort the pipeline before (or after) the run loop; per-run
//! problems never surface here, they are [`SkipReason`](crate::core::SkipReason)
//! values recorded by the pipeline.

use std::fmt;
use std::io;
use thiserror::Error;

/// 监测程序的统一错误类型 / Errors that stop the monitor
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Metadata store unreachable, or it returned no run sets
    #[error("configuration error: {0}")]
    FatalConfiguration(String),

    /// Invalid command-line or programmatic input
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Artifact content could not be interpreted
    #[error("artifact error: {0}")]
    Artifact(String),

    /// Catalog or overview (de)serialization failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Standard result type for monitor operations
pub type MonitorResult<T> = Result<T, MonitorError>;

// ==================== helpers ====================

/// Build a fatal configuration error with context
#[inline]
pub fn config_error<E: fmt::Display>(context: &str, err: E) -> MonitorError {
    MonitorError::FatalConfiguration(format!("{context}: {err}"))
}

/// Build an artifact error with context
#[inline]
pub fn artifact_error<E: fmt::Display>(context: &str, err: E) -> MonitorError {
    MonitorError::Artifact(format!("{context}: {err}"))
}

// ==================== classification ====================

/// 错误分类，用于退出码和跳过统计
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub enum ErrorCategory {
    /// Metadata store / configuration problems
    Configuration,
    /// Histogram artifact problems (missing, corrupt, empty)
    Artifact,
    /// Fit did not converge
    Fit,
    /// I/O failures
    Io,
    /// Output serialization and anything else
    Other,
}

impl ErrorCategory {
    /// Classify a [`MonitorError`]
    pub fn from_monitor_error(e: &MonitorError) -> Self {
        match e {
            MonitorError::FatalConfiguration(_) | MonitorError::InvalidInput(_) => {
                Self::Configuration
            }
            MonitorError::Artifact(_) => Self::Artifact,
            MonitorError::Io(_) => Self::Io,
            MonitorError::Serialization(_) => Self::Other,
        }
    }

    /// Display name used in reports
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Artifact => "artifact",
            Self::Fit => "fit",
            Self::Io => "I/O",
            Self::Other => "other",
        }
    }
}
