//! Nominal-capacity resolution.
//!
//! The capacity used to normalize currents into C-rate and SOC is resolved by an
//! ordered list of strategies, each of which either produces a value or declines.
//! The first success wins:
//!
//! 1. [`ManualOverride`] - the operator's configured value.
//! 2. [`FilenameCapacity`] - a `<number>mAh` token in the source path.
//! 3. [`FirstCycleDischarge`] - the largest discharge capacity seen in cycle 1.
//!
//! Resolution has no side effects: strategies only read from the context, and the
//! first-cycle table is obtained lazily so cheaper strategies never trigger a parse.

use crate::config::CapacitySettings;
use crate::core::CycleTable;
use crate::error::{AppResult, CyclerError};
use crate::metadata::CapacitySource;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

static CAPACITY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"(\d+(?:[.-]\d+)?)mAh").expect("Invalid capacity regex")
});

/// Inputs available to the capacity strategies.
pub struct CapacityContext<'a> {
    source: &'a Path,
    settings: &'a CapacitySettings,
    first_cycle: &'a dyn Fn() -> Option<CycleTable>,
}

impl<'a> CapacityContext<'a> {
    /// `first_cycle` is only called by strategies that need cycle 1.
    pub fn new(
        source: &'a Path,
        settings: &'a CapacitySettings,
        first_cycle: &'a dyn Fn() -> Option<CycleTable>,
    ) -> Self {
        Self {
            source,
            settings,
            first_cycle,
        }
    }

    /// Data location being resolved.
    pub fn source(&self) -> &Path {
        self.source
    }

    /// Capacity configuration.
    pub fn settings(&self) -> &CapacitySettings {
        self.settings
    }

    /// Loads (or reuses) cycle 1.
    pub fn first_cycle(&self) -> Option<CycleTable> {
        (self.first_cycle)()
    }
}

/// One step of the fallback chain.
pub trait CapacityStrategy: Send + Sync {
    /// Short name used in logs and in `CapacityUnresolved`.
    fn name(&self) -> &'static str;

    /// Provenance recorded when this strategy succeeds.
    fn provenance(&self) -> CapacitySource;

    /// Produces a capacity in mAh, or `None` to decline.
    fn resolve(&self, ctx: &CapacityContext<'_>) -> Option<f64>;
}

/// A resolved capacity and the strategy that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    pub capacity_mah: f64,
    pub source: CapacitySource,
}

/// Uses `capacity.manual_mah` verbatim.
pub struct ManualOverride;

impl CapacityStrategy for ManualOverride {
    fn name(&self) -> &'static str {
        "manual"
    }

    fn provenance(&self) -> CapacitySource {
        CapacitySource::Manual
    }

    fn resolve(&self, ctx: &CapacityContext<'_>) -> Option<f64> {
        ctx.settings().manual_mah
    }
}

/// Scans the source path components for `<number>mAh`.
pub struct FilenameCapacity;

impl CapacityStrategy for FilenameCapacity {
    fn name(&self) -> &'static str {
        "filename"
    }

    fn provenance(&self) -> CapacitySource {
        CapacitySource::Filename
    }

    fn resolve(&self, ctx: &CapacityContext<'_>) -> Option<f64> {
        capacity_from_path(ctx.source())
    }
}

/// Takes the maximum cumulative discharge capacity of cycle 1.
pub struct FirstCycleDischarge;

impl CapacityStrategy for FirstCycleDischarge {
    fn name(&self) -> &'static str {
        "first-cycle"
    }

    fn provenance(&self) -> CapacitySource {
        CapacitySource::FirstCycle
    }

    fn resolve(&self, ctx: &CapacityContext<'_>) -> Option<f64> {
        ctx.first_cycle()?.max_discharge_capacity()
    }
}

/// Parses the first `<number>mAh` token found in the path's components.
///
/// A `-` decimal marker is read as `.`, so `3-2mAh` yields `3.2`.
pub fn capacity_from_path(path: &Path) -> Option<f64> {
    path.components().find_map(|component| {
        let text = component.as_os_str().to_string_lossy();
        CAPACITY_PATTERN
            .captures(&text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().replace('-', ".").parse::<f64>().ok())
    })
}

/// The ordered fallback chain.
pub struct CapacityResolver {
    strategies: Vec<Box<dyn CapacityStrategy>>,
}

impl Default for CapacityResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl CapacityResolver {
    /// Manual override, then filename, then first-cycle discharge.
    pub fn new() -> Self {
        Self {
            strategies: vec![
                Box::new(ManualOverride),
                Box::new(FilenameCapacity),
                Box::new(FirstCycleDischarge),
            ],
        }
    }

    /// A resolver with no strategies; add them with [`CapacityResolver::with_strategy`].
    pub fn empty() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Appends a strategy to the end of the chain.
    pub fn with_strategy(mut self, strategy: impl CapacityStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    /// Names of the strategies, in evaluation order.
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Runs the chain. Values that are not finite and positive count as declines.
    ///
    /// # Errors
    ///
    /// `CapacityUnresolved` when every strategy declines.
    pub fn resolve(&self, ctx: &CapacityContext<'_>) -> AppResult<Resolution> {
        for strategy in &self.strategies {
            match strategy.resolve(ctx) {
                Some(capacity_mah) if capacity_mah.is_finite() && capacity_mah > 0.0 => {
                    debug!(
                        strategy = strategy.name(),
                        capacity_mah,
                        source = %ctx.source().display(),
                        "Resolved nominal capacity"
                    );
                    return Ok(Resolution {
                        capacity_mah,
                        source: strategy.provenance(),
                    });
                }
                Some(rejected) => {
                    debug!(strategy = strategy.name(), rejected, "Ignoring non-positive capacity");
                }
                None => debug!(strategy = strategy.name(), "Capacity strategy declined"),
            }
        }
        Err(CyclerError::CapacityUnresolved {
            location: ctx.source().to_path_buf(),
            tried: self
                .strategy_names()
                .into_iter()
                .map(String::from)
                .collect(),
        })
    }
}
