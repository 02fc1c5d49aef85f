//! Per-cycle capacity summaries.

use crate::core::CycleTable;
use crate::data::store::CycleStore;
use serde::{Deserialize, Serialize};

/// Headline numbers for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CycleSummary {
    pub cycle: u32,
    pub charge_capacity_mah: f64,
    pub discharge_capacity_mah: f64,
    /// Discharge over charge capacity in percent; 0 when nothing was charged
    pub efficiency_pct: f64,
    /// Discharge capacity over nominal capacity
    pub retention: f64,
    pub average_discharge_voltage_v: Option<f64>,
    /// Largest |C-rate| reached in the cycle
    pub peak_c_rate: f64,
    pub max_temperature_c: Option<f64>,
    pub record_count: usize,
}

/// Summarizes one cycle against the nominal `capacity_mah`.
pub fn summarize_cycle(table: &CycleTable, capacity_mah: f64) -> CycleSummary {
    let charge = table.max_charge_capacity().unwrap_or(0.0);
    let discharge = table.max_discharge_capacity().unwrap_or(0.0);

    let (sum, count) = table
        .discharge_samples()
        .fold((0.0, 0usize), |(sum, n), s| (sum + s.voltage_v, n + 1));

    let max_temperature_c = table
        .samples()
        .iter()
        .filter_map(|s| s.temperature_c)
        .reduce(f64::max);

    CycleSummary {
        cycle: table.cycle(),
        charge_capacity_mah: charge,
        discharge_capacity_mah: discharge,
        efficiency_pct: if charge > 0.0 {
            discharge / charge * 100.0
        } else {
            0.0
        },
        retention: discharge / capacity_mah,
        average_discharge_voltage_v: (count > 0).then(|| sum / count as f64),
        peak_c_rate: table
            .c_rate_series(capacity_mah)
            .into_iter()
            .fold(0.0, |peak, c| peak.max(c.abs())),
        max_temperature_c,
        record_count: table.record_count(),
    }
}

/// Summarizes the requested cycles in ascending order, or every stored cycle when
/// `cycles` is empty. Numbers that are not stored are skipped.
pub fn summarize_store(store: &CycleStore, cycles: &[u32]) -> Vec<CycleSummary> {
    let wanted = if cycles.is_empty() {
        store.list_available()
    } else {
        cycles.to_vec()
    };
    store
        .get_many(&wanted)
        .values()
        .map(|table| summarize_cycle(table, store.capacity_mah()))
        .collect()
}
