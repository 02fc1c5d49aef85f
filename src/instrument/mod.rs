//! Instrument-family adapters and load dispatch.
//!
//! A data directory is classified once, by [`detect`], into one of the two
//! supported families, and the matching loader variant of [`CyclerLoader`]
//! builds a complete [`CycleStore`]. Nothing is visible to callers until the
//! store is fully built; a cancelled or failed load leaves nothing behind.

use crate::config::{CapacitySettings, Settings};
use crate::core::{CycleTable, CyclerFamily};
use crate::data::capacity::{CapacityContext, CapacityResolver};
use crate::data::store::CycleStore;
use crate::error::{AppResult, CyclerError};
use crate::metadata::StoreMetadataBuilder;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

pub mod config;
pub mod continuous;
pub mod segmented;
pub mod table;

pub use config::{ContinuousLogConfig, SegmentedConfig};
pub use continuous::{detect_boundaries, ContinuousLogLoader, CycleBoundary};
pub use segmented::SegmentedLoader;

/// Cooperative cancellation for an in-flight load, checked once per file or
/// cycle. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct LoadCancel(Arc<AtomicBool>);

impl LoadCancel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn check(&self, location: &Path) -> AppResult<()> {
        if self.is_cancelled() {
            Err(CyclerError::Cancelled {
                location: location.to_path_buf(),
            })
        } else {
            Ok(())
        }
    }
}

/// A cycle file that could not be parsed during an otherwise successful load.
#[derive(Debug, Error)]
#[error("cycle {cycle} ('{}'): {cause}", file.display())]
pub struct CycleLoadError {
    pub cycle: u32,
    pub file: PathBuf,
    #[source]
    pub cause: CyclerError,
}

/// A finished store plus any per-cycle failures.
#[derive(Debug)]
pub struct LoadOutcome {
    pub store: CycleStore,
    pub failures: Vec<CycleLoadError>,
}

impl LoadOutcome {
    /// Whether every cycle file parsed.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Returns the store only if nothing failed.
    ///
    /// # Errors
    ///
    /// `PartialLoad` with the failure and total counts.
    pub fn into_complete(self) -> AppResult<CycleStore> {
        if self.failures.is_empty() {
            return Ok(self.store);
        }
        let failed = self.failures.len();
        Err(CyclerError::PartialLoad {
            location: self.store.source().to_path_buf(),
            failed,
            total: failed + self.store.len(),
        })
    }
}

/// Classifies a data directory: segmented iff `<source>/<marker_dir>` is a directory.
pub fn detect(source: &Path, segmented: &SegmentedConfig) -> CyclerFamily {
    if source.join(&segmented.marker_dir).is_dir() {
        CyclerFamily::Segmented
    } else {
        CyclerFamily::ContinuousLog
    }
}

/// The closed set of loaders.
pub enum CyclerLoader {
    Segmented(SegmentedLoader),
    ContinuousLog(ContinuousLogLoader),
}

impl CyclerLoader {
    /// Picks the loader for `source` according to [`detect`].
    pub fn for_source(source: &Path, settings: &Settings) -> Self {
        Self::for_family(detect(source, &settings.segmented), settings)
    }

    /// Builds the loader for a known family.
    pub fn for_family(family: CyclerFamily, settings: &Settings) -> Self {
        match family {
            CyclerFamily::Segmented => {
                CyclerLoader::Segmented(SegmentedLoader::new(settings.segmented.clone()))
            }
            CyclerFamily::ContinuousLog => {
                CyclerLoader::ContinuousLog(ContinuousLogLoader::new(settings.continuous.clone()))
            }
        }
    }

    pub fn family(&self) -> CyclerFamily {
        match self {
            CyclerLoader::Segmented(_) => CyclerFamily::Segmented,
            CyclerLoader::ContinuousLog(_) => CyclerFamily::ContinuousLog,
        }
    }

    /// Loads `source` into a complete store.
    pub fn load(
        &self,
        source: &Path,
        settings: &Settings,
        cancel: &LoadCancel,
    ) -> AppResult<LoadOutcome> {
        match self {
            CyclerLoader::Segmented(loader) => loader.load(source, &settings.capacity, cancel),
            CyclerLoader::ContinuousLog(loader) => loader.load(source, &settings.capacity, cancel),
        }
    }
}

/// Detects the family of `source` and loads it.
pub fn load_source(source: impl AsRef<Path>, settings: &Settings) -> AppResult<LoadOutcome> {
    let source = source.as_ref();
    let loader = CyclerLoader::for_source(source, settings);
    info!(source = %source.display(), family = %loader.family(), "Loading cycler output");

    let outcome = loader.load(source, settings, &LoadCancel::new())?;
    info!(
        cycles = outcome.store.len(),
        failed = outcome.failures.len(),
        capacity_mah = outcome.store.capacity_mah(),
        "Load finished"
    );
    Ok(outcome)
}

/// Resolves capacity and assembles the store from fully parsed tables.
pub(crate) fn build_store(
    source: &Path,
    family: CyclerFamily,
    capacity: &CapacitySettings,
    resolver: &CapacityResolver,
    tables: Vec<CycleTable>,
) -> AppResult<CycleStore> {
    let first_cycle = || tables.iter().find(|t| t.cycle() == 1).cloned();
    let resolution = resolver.resolve(&CapacityContext::new(source, capacity, &first_cycle))?;

    let metadata = StoreMetadataBuilder::new()
        .capacity(resolution.capacity_mah, resolution.source)
        .family(family)
        .source(source)
        .c_rate(capacity.c_rate)
        .build()?;

    let mut store = CycleStore::new(metadata);
    for table in tables {
        store.add(table.cycle(), table)?;
    }
    Ok(store)
}
