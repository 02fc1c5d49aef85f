//! Custom error types for the application.
//!
//! This module defines the primary error type, `CyclerError`, for the entire crate.
//! Using the `thiserror` crate, it provides a centralized and consistent way to handle
//! the failures that can occur while loading cycler output, querying a cycle store,
//! or computing derived metrics.
//!
//! ## Error Hierarchy
//!
//! `CyclerError` consolidates several groups of failures:
//!
//! - **Load errors**: `MalformedFilename`, `DuplicateCycleFile`, `SourceFormat`,
//!   `NoCyclesDetected`, `PartialLoad` and `Cancelled` are raised by the
//!   instrument-family adapters.
//! - **Capacity errors**: `CapacityUnresolved` when every resolution strategy declined.
//! - **Store errors**: `DuplicateCycle`, `CycleNotFound`, `InvalidRange` and `EmptyRange`
//!   describe violations of the cycle store's query contract.
//! - **Metric errors**: `PulseNotFound`, `InsufficientData` and `InvalidParameter` come
//!   from the derived-metrics engine.
//! - **Ambient errors**: `Config` and `Configuration` wrap configuration failures;
//!   `Io` and `Csv` wrap file access failures together with the path involved.
//!
//! Every variant carries the file, cycle number or expected-versus-observed values needed
//! to act on it without opening the raw data.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type AppResult<T> = std::result::Result<T, CyclerError>;

#[derive(Error, Debug)]
pub enum CyclerError {
    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in '{}': {source}", file.display())]
    Csv {
        file: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Cycle {cycle} is named by two files: '{}' and '{}'", first.display(), second.display())]
    DuplicateCycleFile {
        cycle: u32,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("Could not resolve nominal capacity for '{}' (tried: {})", location.display(), tried.join(", "))]
    CapacityUnresolved { location: PathBuf, tried: Vec<String> },

    #[error("Malformed cycle filename '{}': expected {expected}", file.display())]
    MalformedFilename { file: PathBuf, expected: String },

    #[error("Cycle {cycle} is already present in the store")]
    DuplicateCycle { cycle: u32 },

    #[error("Cycle {cycle} not found (available: {available:?})")]
    CycleNotFound { cycle: u32, available: Vec<u32> },

    #[error("Invalid cycle range {start}-{end}: start is greater than end")]
    InvalidRange { start: u32, end: u32 },

    #[error("No stored cycle falls in range {start}-{end}")]
    EmptyRange { start: u32, end: u32 },

    #[error("Expected {expected} pulse(s) of {duration_s} s, found {found}")]
    PulseNotFound {
        expected: usize,
        found: usize,
        duration_s: f64,
    },

    #[error("Unparsable raw table '{}': {reason}", file.display())]
    SourceFormat { file: PathBuf, reason: String },

    #[error("No cycle boundaries detected in '{}'", file.display())]
    NoCyclesDetected { file: PathBuf },

    #[error("Load of '{}' is partial: {failed} of {total} cycle file(s) failed", location.display())]
    PartialLoad {
        location: PathBuf,
        failed: usize,
        total: usize,
    },

    #[error("Not enough data for {operation}: need {needed}, found {found}")]
    InsufficientData {
        operation: &'static str,
        needed: usize,
        found: usize,
    },

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Load of '{}' was cancelled", location.display())]
    Cancelled { location: PathBuf },
}

impl CyclerError {
    /// Wraps an I/O failure on `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CyclerError::Io {
            path: path.into(),
            source,
        }
    }

    /// Wraps a CSV reader failure on `file`.
    pub fn csv(file: impl Into<PathBuf>, source: csv::Error) -> Self {
        CyclerError::Csv {
            file: file.into(),
            source,
        }
    }

    /// Builds a `SourceFormat` error for `file`.
    pub fn source_format(file: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        CyclerError::SourceFormat {
            file: file.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` for errors that describe a query against a store rather than
    /// a broken data source.
    pub fn is_query_error(&self) -> bool {
        matches!(
            self,
            CyclerError::CycleNotFound { .. }
                | CyclerError::InvalidRange { .. }
                | CyclerError::EmptyRange { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_not_found_lists_available_cycles() {
        let err = CyclerError::CycleNotFound {
            cycle: 9,
            available: vec![1, 2, 3],
        };
        let msg = err.to_string();
        assert!(msg.contains("Cycle 9"));
        assert!(msg.contains("[1, 2, 3]"));
        assert!(err.is_query_error());
    }

    #[test]
    fn io_error_names_the_path() {
        let err = CyclerError::io(
            "/data/cell/Restore",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/data/cell/Restore"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn malformed_filename_names_file_and_expectation() {
        let err = CyclerError::MalformedFilename {
            file: PathBuf::from("Restore/SaveDataX.csv"),
            expected: "SaveData<N>.csv".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("SaveDataX.csv"));
        assert!(msg.contains("SaveData<N>.csv"));
        assert!(!err.is_query_error());
    }

    #[test]
    fn capacity_unresolved_lists_strategies() {
        let err = CyclerError::CapacityUnresolved {
            location: PathBuf::from("/data/cell"),
            tried: vec!["manual".into(), "filename".into(), "first-cycle".into()],
        };
        assert!(err
            .to_string()
            .contains("manual, filename, first-cycle"));
    }
}
