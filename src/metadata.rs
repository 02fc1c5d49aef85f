//! Source-level metadata attached to a cycle store.

use crate::core::CyclerFamily;
use crate::error::{AppResult, CyclerError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which capacity-resolution strategy produced the nominal capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacitySource {
    /// Supplied explicitly in the configuration.
    Manual,
    /// Parsed from a `<number>mAh` path component.
    Filename,
    /// Measured from the first cycle's discharge segment.
    FirstCycle,
}

/// Metadata captured once per load. Read-only after the store is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreMetadata {
    capacity_mah: f64,
    capacity_source: CapacitySource,
    family: CyclerFamily,
    source: PathBuf,
    c_rate: f64,
    loaded_at: DateTime<Utc>,
    software_version: String,
}

impl StoreMetadata {
    /// Nominal capacity in mAh.
    pub fn capacity_mah(&self) -> f64 {
        self.capacity_mah
    }

    /// Strategy that resolved the capacity.
    pub fn capacity_source(&self) -> CapacitySource {
        self.capacity_source
    }

    /// Instrument family that produced the data.
    pub fn family(&self) -> CyclerFamily {
        self.family
    }

    /// Directory the data was loaded from.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Reference C-rate configured for this source.
    pub fn c_rate(&self) -> f64 {
        self.c_rate
    }

    /// Wall-clock time the load finished.
    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Version of the crate that performed the load.
    pub fn software_version(&self) -> &str {
        &self.software_version
    }
}

/// A builder for constructing `StoreMetadata` instances.
#[derive(Default)]
pub struct StoreMetadataBuilder {
    capacity: Option<(f64, CapacitySource)>,
    family: Option<CyclerFamily>,
    source: Option<PathBuf>,
    c_rate: Option<f64>,
}

impl StoreMetadataBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capacity(mut self, capacity_mah: f64, source: CapacitySource) -> Self {
        self.capacity = Some((capacity_mah, source));
        self
    }

    pub fn family(mut self, family: CyclerFamily) -> Self {
        self.family = Some(family);
        self
    }

    pub fn source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn c_rate(mut self, c_rate: f64) -> Self {
        self.c_rate = Some(c_rate);
        self
    }

    /// Validates and builds the metadata.
    pub fn build(self) -> AppResult<StoreMetadata> {
        let (capacity_mah, capacity_source) = self.capacity.ok_or_else(|| missing("capacity"))?;
        if !(capacity_mah.is_finite() && capacity_mah > 0.0) {
            return Err(CyclerError::InvalidParameter {
                name: "capacity",
                reason: format!("must be positive, got {capacity_mah}"),
            });
        }
        Ok(StoreMetadata {
            capacity_mah,
            capacity_source,
            family: self.family.ok_or_else(|| missing("family"))?,
            source: self.source.ok_or_else(|| missing("source"))?,
            c_rate: self.c_rate.unwrap_or(0.2),
            loaded_at: Utc::now(),
            software_version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }
}

fn missing(name: &'static str) -> CyclerError {
    CyclerError::InvalidParameter {
        name,
        reason: "required store metadata field was not set".into(),
    }
}
