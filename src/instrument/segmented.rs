//! Segmented family: one file per cycle under a fixed sub-path.
//!
//! Cycle files are named `<prefix><N>.<ext>` (for example `Restore/SaveData12.csv`).
//! Every file is parsed independently on the rayon pool. A file that fails to
//! parse is reported in [`LoadOutcome::failures`] rather than aborting the load;
//! a file whose name does not follow the scheme aborts it.

use crate::config::CapacitySettings;
use crate::core::{CycleTable, CyclerFamily, Sample};
use crate::data::capacity::CapacityResolver;
use crate::error::{AppResult, CyclerError};
use crate::instrument::config::SegmentedConfig;
use crate::instrument::{build_store, table, CycleLoadError, LoadCancel, LoadOutcome};
use parking_lot::Mutex;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Loader for the segmented family.
pub struct SegmentedLoader {
    config: SegmentedConfig,
    resolver: CapacityResolver,
}

impl SegmentedLoader {
    /// Creates a loader with the default capacity resolver.
    pub fn new(config: SegmentedConfig) -> Self {
        Self {
            config,
            resolver: CapacityResolver::default(),
        }
    }

    /// Replaces the capacity resolver.
    pub fn with_resolver(mut self, resolver: CapacityResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Layout configuration in use.
    pub fn config(&self) -> &SegmentedConfig {
        &self.config
    }

    /// Extracts the cycle number from a file name, or `None` if it does not
    /// follow `<prefix><N>.<ext>` with `N >= 1`.
    pub fn cycle_number(&self, file_name: &str) -> Option<u32> {
        let digits = file_name
            .strip_prefix(&self.config.file_prefix)?
            .strip_suffix(&self.config.file_extension)?
            .strip_suffix('.')?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse::<u32>().ok().filter(|n| *n >= 1)
    }

    /// Lists `(cycle, path)` for every cycle file, sorted by cycle number.
    ///
    /// # Errors
    ///
    /// - `Io` naming the directory if it cannot be read
    /// - `MalformedFilename` for the first file that does not follow the scheme
    /// - `DuplicateCycleFile` when two names carry the same number (`SaveData01`
    ///   and `SaveData1`)
    pub fn cycle_files(&self, source: &Path) -> AppResult<Vec<(u32, PathBuf)>> {
        let dir = source.join(&self.config.sub_path);
        let mut files = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|e| CyclerError::io(&dir, e))? {
            let path = entry.map_err(|e| CyclerError::io(&dir, e))?.path();
            if !path.is_file() {
                continue;
            }
            let cycle = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| self.cycle_number(name))
                .ok_or_else(|| CyclerError::MalformedFilename {
                    file: path.clone(),
                    expected: self.config.naming_scheme(),
                })?;
            files.push((cycle, path));
        }
        files.sort();
        if let Some(pair) = files.windows(2).find(|pair| pair[0].0 == pair[1].0) {
            return Err(CyclerError::DuplicateCycleFile {
                cycle: pair[0].0,
                first: pair[0].1.clone(),
                second: pair[1].1.clone(),
            });
        }
        Ok(files)
    }

    /// Parses one cycle file into a rebased, time-ordered table.
    pub fn parse_cycle(&self, cycle: u32, path: &Path) -> AppResult<CycleTable> {
        let mut samples: Vec<Sample> = table::read_table(path, &self.config.layout)?;
        if samples.is_empty() {
            return Err(CyclerError::source_format(path, "file holds no samples"));
        }
        samples.sort_by(|a, b| a.time_s.total_cmp(&b.time_s));
        CycleTable::rebased(cycle, &samples)
    }

    /// Loads every cycle file under `source`.
    ///
    /// Per-file parse failures are collected into the outcome; use
    /// [`LoadOutcome::into_complete`] to reject partial stores.
    ///
    /// # Errors
    ///
    /// - `Io` if the cycle-file directory cannot be read
    /// - `MalformedFilename` if any file breaks the naming scheme
    /// - `DuplicateCycleFile` if two files map to one cycle number
    /// - `SourceFormat` if there are no cycle files or every file failed
    /// - `CapacityUnresolved` if no capacity strategy succeeds
    /// - `Cancelled` if `cancel` fires before the store is complete
    pub fn load(
        &self,
        source: &Path,
        capacity: &CapacitySettings,
        cancel: &LoadCancel,
    ) -> AppResult<LoadOutcome> {
        let files = self.cycle_files(source)?;
        if files.is_empty() {
            return Err(CyclerError::source_format(
                source.join(&self.config.sub_path),
                format!("no {} files found", self.config.naming_scheme()),
            ));
        }
        info!(source = %source.display(), files = files.len(), "Parsing cycle files");

        let parsed: Mutex<Vec<CycleTable>> = Mutex::new(Vec::with_capacity(files.len()));
        let failures: Mutex<Vec<CycleLoadError>> = Mutex::new(Vec::new());

        files.par_iter().try_for_each(|(cycle, path)| -> AppResult<()> {
            cancel.check(source)?;
            match self.parse_cycle(*cycle, path) {
                Ok(table) => {
                    debug!(cycle, records = table.record_count(), "Parsed cycle file");
                    parsed.lock().push(table);
                }
                Err(cause) => {
                    warn!(cycle, file = %path.display(), error = %cause, "Cycle file failed to parse");
                    failures.lock().push(CycleLoadError {
                        cycle: *cycle,
                        file: path.clone(),
                        cause,
                    });
                }
            }
            Ok(())
        })?;

        let tables = parsed.into_inner();
        let mut failures = failures.into_inner();
        failures.sort_by_key(|f| f.cycle);

        if tables.is_empty() {
            return Err(CyclerError::source_format(
                source,
                format!("all {} cycle file(s) failed to parse", files.len()),
            ));
        }

        cancel.check(source)?;
        let store = build_store(
            source,
            CyclerFamily::Segmented,
            capacity,
            &self.resolver,
            tables,
        )?;
        Ok(LoadOutcome { store, failures })
    }
}
