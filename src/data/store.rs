//! The cycle-indexed container produced by every adapter.
//!
//! A `CycleStore` is constructed once per load, filled by the owning adapter and
//! then shared read-only (typically behind an `Arc`). Every query hands back an
//! owned copy, so no consumer can mutate what another consumer or the store sees.
//!
//! Two lookup styles are offered on purpose:
//! - [`CycleStore::get`] fails loudly when a cycle is missing.
//! - [`CycleStore::get_many`] is a best-effort bulk accessor that skips
//!   missing numbers, for exploratory selections.

use crate::core::{CycleSeries, CycleTable, CyclerFamily};
use crate::error::{AppResult, CyclerError};
use crate::metadata::StoreMetadata;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Cycle number → table mapping plus source metadata.
#[derive(Debug, Clone)]
pub struct CycleStore {
    cycles: HashMap<u32, CycleTable>,
    metadata: StoreMetadata,
}

impl CycleStore {
    /// Creates an empty store. Metadata is fixed for the store's lifetime.
    pub fn new(metadata: StoreMetadata) -> Self {
        Self {
            cycles: HashMap::new(),
            metadata,
        }
    }

    /// Inserts a table under `cycle`.
    ///
    /// # Errors
    ///
    /// `DuplicateCycle` if the number is already present.
    pub fn add(&mut self, cycle: u32, table: CycleTable) -> AppResult<()> {
        if self.cycles.contains_key(&cycle) {
            return Err(CyclerError::DuplicateCycle { cycle });
        }
        self.cycles.insert(cycle, table);
        Ok(())
    }

    /// Returns a copy of one cycle.
    ///
    /// # Errors
    ///
    /// `CycleNotFound`, carrying the sorted list of available cycles.
    pub fn get(&self, cycle: u32) -> AppResult<CycleTable> {
        self.cycles
            .get(&cycle)
            .cloned()
            .ok_or_else(|| CyclerError::CycleNotFound {
                cycle,
                available: self.list_available(),
            })
    }

    /// Concatenates every stored cycle in `start..=end`, ascending, into one
    /// contiguous series indexed from zero.
    ///
    /// # Errors
    ///
    /// - `InvalidRange` if `start > end`
    /// - `EmptyRange` if no stored cycle falls inside the range
    pub fn get_range(&self, start: u32, end: u32) -> AppResult<CycleSeries> {
        if start > end {
            return Err(CyclerError::InvalidRange { start, end });
        }
        let selected: Vec<u32> = self
            .list_available()
            .into_iter()
            .filter(|n| (start..=end).contains(n))
            .collect();
        let (first_cycle, last_cycle) = match (selected.first(), selected.last()) {
            (Some(&first), Some(&last)) => (first, last),
            _ => return Err(CyclerError::EmptyRange { start, end }),
        };

        let total: usize = selected
            .iter()
            .filter_map(|n| self.cycles.get(n))
            .map(CycleTable::record_count)
            .sum();
        let mut samples = Vec::with_capacity(total);
        for n in &selected {
            if let Some(table) = self.cycles.get(n) {
                samples.extend_from_slice(table.samples());
            }
        }

        Ok(CycleSeries {
            first_cycle,
            last_cycle,
            samples,
        })
    }

    /// Returns copies of every requested cycle that is present, silently
    /// omitting the rest.
    pub fn get_many(&self, cycles: &[u32]) -> BTreeMap<u32, CycleTable> {
        cycles
            .iter()
            .filter_map(|n| self.cycles.get(n).map(|t| (*n, t.clone())))
            .collect()
    }

    /// Sorted list of the cycle numbers present.
    pub fn list_available(&self) -> Vec<u32> {
        let mut numbers: Vec<u32> = self.cycles.keys().copied().collect();
        numbers.sort_unstable();
        numbers
    }

    /// Whether `cycle` is present.
    pub fn contains(&self, cycle: u32) -> bool {
        self.cycles.contains_key(&cycle)
    }

    /// Number of cycles held.
    pub fn len(&self) -> usize {
        self.cycles.len()
    }

    /// Whether the store holds no cycles.
    pub fn is_empty(&self) -> bool {
        self.cycles.is_empty()
    }

    /// Source-level metadata.
    pub fn metadata(&self) -> &StoreMetadata {
        &self.metadata
    }

    /// Resolved nominal capacity in mAh.
    pub fn capacity_mah(&self) -> f64 {
        self.metadata.capacity_mah()
    }

    /// Instrument family that produced the data.
    pub fn family(&self) -> CyclerFamily {
        self.metadata.family()
    }

    /// Directory the data was loaded from.
    pub fn source(&self) -> &Path {
        self.metadata.source()
    }

    /// Reference C-rate recorded for the source.
    pub fn c_rate(&self) -> f64 {
        self.metadata.c_rate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_support::sample;
    use crate::core::Condition;
    use crate::metadata::{CapacitySource, StoreMetadataBuilder};

    fn metadata() -> StoreMetadata {
        StoreMetadataBuilder::new()
            .capacity(58.0, CapacitySource::Manual)
            .family(CyclerFamily::Segmented)
            .source("/data/cell")
            .build()
            .unwrap()
    }

    fn table(cycle: u32, len: usize) -> CycleTable {
        let samples = (0..len)
            .map(|i| sample(i as f64, Condition::Charge, 3.5 + cycle as f64 * 0.01, 100.0))
            .collect();
        CycleTable::new(cycle, samples).unwrap()
    }

    fn store_with(cycles: &[(u32, usize)]) -> CycleStore {
        let mut store = CycleStore::new(metadata());
        for &(n, len) in cycles {
            store.add(n, table(n, len)).unwrap();
        }
        store
    }

    #[test]
    fn test_add_rejects_duplicates() {
        let mut store = store_with(&[(1, 3)]);
        let err = store.add(1, table(1, 2)).unwrap_err();
        assert!(matches!(err, CyclerError::DuplicateCycle { cycle: 1 }));
        assert_eq!(store.get(1).unwrap().record_count(), 3);
    }

    #[test]
    fn test_get_missing_reports_available() {
        let store = store_with(&[(3, 1), (1, 1), (2, 1)]);
        match store.get(9) {
            Err(CyclerError::CycleNotFound { cycle, available }) => {
                assert_eq!(cycle, 9);
                assert_eq!(available, vec![1, 2, 3]);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_get_returns_independent_copy() {
        let store = store_with(&[(1, 4)]);
        let copy = store.get(1).unwrap();
        let mut samples = copy.into_samples();
        samples.clear();
        assert_eq!(store.get(1).unwrap().record_count(), 4);
    }

    #[test]
    fn test_get_range_errors() {
        let store = store_with(&[(1, 2), (2, 2), (10, 2)]);
        assert!(matches!(
            store.get_range(5, 3),
            Err(CyclerError::InvalidRange { start: 5, end: 3 })
        ));
        assert!(matches!(
            store.get_range(3, 9),
            Err(CyclerError::EmptyRange { start: 3, end: 9 })
        ));
    }

    #[test]
    fn test_get_range_tolerates_gaps() {
        let store = store_with(&[(1, 2), (2, 3), (5, 4)]);
        let series = store.get_range(1, 6).unwrap();
        assert_eq!(series.first_cycle, 1);
        assert_eq!(series.last_cycle, 5);
        assert_eq!(series.record_count(), 9);
    }

    #[test]
    fn test_get_many_omits_missing() {
        let store = store_with(&[(1, 1), (7, 1), (42, 1)]);
        let picked = store.get_many(&[1, 7, 8, 42]);
        assert_eq!(picked.keys().copied().collect::<Vec<_>>(), vec![1, 7, 42]);
    }

    #[test]
    fn test_metadata_accessors() {
        let store = store_with(&[(1, 1)]);
        assert_eq!(store.capacity_mah(), 58.0);
        assert_eq!(store.family(), CyclerFamily::Segmented);
        assert_eq!(store.source(), Path::new("/data/cell"));
        assert_eq!(store.len(), 1);
        assert!(!store.is_empty());
    }
}
