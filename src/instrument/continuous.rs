//! Continuous-log family: one unbroken raw table for the whole test.
//!
//! Cycle boundaries are not marked in the data. They are inferred from the
//! condition column: a rest sample immediately followed by a charge sample
//! starts a new cycle, unless the cycle in progress has only rested so far.
//! Internal rest/discharge alternations (pulse profiles) never split a cycle. A
//! test that goes straight from discharge into charge without resting will
//! merge those cycles.

use crate::config::CapacitySettings;
use crate::core::{Condition, CycleTable, CyclerFamily};
use crate::data::capacity::CapacityResolver;
use crate::error::{AppResult, CyclerError};
use crate::instrument::config::ContinuousLogConfig;
use crate::instrument::{build_store, table, LoadCancel, LoadOutcome};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A half-open `[start, end)` span of the raw table forming one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleBoundary {
    pub cycle: u32,
    pub start: usize,
    pub end: usize,
}

impl CycleBoundary {
    /// Number of raw rows in the span.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the span is empty.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Splits a condition column into cycles in one left-to-right pass.
///
/// The first cycle starts at index 0 whatever its leading condition. Every
/// rest-to-charge transition opens the next cycle, except while the cycle in
/// progress holds nothing but rest, so a leading rest run stays with the charge
/// that follows it. Cycles are numbered from 1; an empty column yields no
/// boundaries.
pub fn detect_boundaries(conditions: &[Condition]) -> Vec<CycleBoundary> {
    if conditions.is_empty() {
        return Vec::new();
    }
    let mut boundaries = Vec::new();
    let mut start = 0;
    let mut active = conditions[0] != Condition::Rest;
    for i in 1..conditions.len() {
        let rest_to_charge =
            conditions[i - 1] == Condition::Rest && conditions[i] == Condition::Charge;
        if rest_to_charge && active {
            boundaries.push(CycleBoundary {
                cycle: boundaries.len() as u32 + 1,
                start,
                end: i,
            });
            start = i;
            active = false;
        }
        active |= conditions[i] != Condition::Rest;
    }
    boundaries.push(CycleBoundary {
        cycle: boundaries.len() as u32 + 1,
        start,
        end: conditions.len(),
    });
    boundaries
}

/// Loader for the continuous-log family.
pub struct ContinuousLogLoader {
    config: ContinuousLogConfig,
    resolver: CapacityResolver,
}

impl ContinuousLogLoader {
    /// Creates a loader with the default capacity resolver.
    pub fn new(config: ContinuousLogConfig) -> Self {
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
    pub fn config(&self) -> &ContinuousLogConfig {
        &self.config
    }

    /// Locates the raw table under `source`: conventional names first, then the
    /// first file (by name) with an accepted extension.
    pub fn resolve_raw_file(&self, source: &Path) -> AppResult<PathBuf> {
        for name in &self.config.raw_file_names {
            let candidate = source.join(name);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }

        let mut candidates: Vec<PathBuf> = fs::read_dir(source)
            .map_err(|e| CyclerError::io(source, e))?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| {
                        self.config
                            .raw_extensions
                            .iter()
                            .any(|accepted| accepted.eq_ignore_ascii_case(ext))
                    })
            })
            .collect();
        candidates.sort();

        candidates.into_iter().next().ok_or_else(|| {
            CyclerError::source_format(
                source,
                format!(
                    "no raw table found (looked for {} or any *.{})",
                    self.config.raw_file_names.join(", "),
                    self.config.raw_extensions.join(" / *.")
                ),
            )
        })
    }

    /// Loads every cycle from the raw table under `source`.
    ///
    /// # Errors
    ///
    /// - `SourceFormat` if no raw table exists or it cannot be parsed
    /// - `NoCyclesDetected` if the table holds no samples
    /// - `Cancelled` if `cancel` fires before the store is complete
    pub fn load(
        &self,
        source: &Path,
        capacity: &CapacitySettings,
        cancel: &LoadCancel,
    ) -> AppResult<LoadOutcome> {
        let raw_file = self.resolve_raw_file(source)?;
        info!(file = %raw_file.display(), "Reading continuous raw table");

        cancel.check(source)?;
        let samples = table::read_table(&raw_file, &self.config.layout)?;
        let conditions: Vec<Condition> = samples.iter().map(|s| s.condition).collect();
        let boundaries = detect_boundaries(&conditions);
        if boundaries.is_empty() {
            return Err(CyclerError::NoCyclesDetected { file: raw_file });
        }
        info!(
            file = %raw_file.display(),
            rows = samples.len(),
            cycles = boundaries.len(),
            "Detected cycle boundaries"
        );

        let tables: Vec<CycleTable> = boundaries
            .par_iter()
            .map(|b| {
                cancel.check(source)?;
                debug!(cycle = b.cycle, start = b.start, rows = b.len(), "Materialising cycle");
                CycleTable::rebased(b.cycle, &samples[b.start..b.end])
            })
            .collect::<AppResult<_>>()?;

        cancel.check(source)?;
        let store = build_store(
            source,
            CyclerFamily::ContinuousLog,
            capacity,
            &self.resolver,
            tables,
        )?;
        Ok(LoadOutcome {
            store,
            failures: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Condition::{Charge, Discharge, Rest};

    #[test]
    fn test_rest_to_charge_starts_a_cycle() {
        let boundaries =
            detect_boundaries(&[Rest, Charge, Charge, Discharge, Rest, Charge, Discharge]);
        assert_eq!(
            boundaries,
            vec![
                CycleBoundary {
                    cycle: 1,
                    start: 0,
                    end: 5
                },
                CycleBoundary {
                    cycle: 2,
                    start: 5,
                    end: 7
                },
            ]
        );
    }

    #[test]
    fn test_pulse_rests_do_not_split() {
        let boundaries =
            detect_boundaries(&[Charge, Rest, Discharge, Rest, Discharge, Rest, Discharge]);
        assert_eq!(boundaries.len(), 1);
        assert_eq!(boundaries[0].len(), 7);
    }

    #[test]
    fn test_leading_charge_belongs_to_cycle_one() {
        let boundaries = detect_boundaries(&[Charge, Discharge, Rest, Charge]);
        assert_eq!(boundaries[0].start, 0);
        assert_eq!(boundaries[0].end, 3);
        assert_eq!(boundaries[1].cycle, 2);
    }

    #[test]
    fn test_leading_discharge_is_its_own_cycle() {
        let boundaries = detect_boundaries(&[
            Discharge, Discharge, Rest, Charge, Charge, Discharge, Rest, Charge, Discharge,
        ]);
        let spans: Vec<(u32, usize, usize)> =
            boundaries.iter().map(|b| (b.cycle, b.start, b.end)).collect();
        assert_eq!(spans, vec![(1, 0, 3), (2, 3, 7), (3, 7, 9)]);
    }

    #[test]
    fn test_leading_rest_run_stays_with_first_charge() {
        let boundaries = detect_boundaries(&[Rest, Rest, Rest, Charge, Discharge, Rest, Charge]);
        assert_eq!(boundaries.len(), 2);
        assert_eq!((boundaries[0].start, boundaries[0].end), (0, 6));
        assert!(boundaries.iter().all(|b| !b.is_empty()));
    }

    #[test]
    fn test_back_to_back_charge_is_merged() {
        let boundaries = detect_boundaries(&[Charge, Discharge, Charge, Discharge]);
        assert_eq!(boundaries.len(), 1);
    }

    #[test]
    fn test_empty_column() {
        assert!(detect_boundaries(&[]).is_empty());
    }

    #[test]
    fn test_boundaries_cover_table() {
        let conditions = [Rest, Charge, Rest, Charge, Discharge, Rest, Rest, Charge];
        let boundaries = detect_boundaries(&conditions);
        let covered: usize = boundaries.iter().map(CycleBoundary::len).sum();
        assert_eq!(covered, conditions.len());
        for pair in boundaries.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }
}
