//! Core data types shared by the loaders, the cycle store and the metric processors.
use crate::error::{AppResult, CyclerError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-sample instrument state flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// No current flowing (open circuit).
    Rest,
    /// Current flowing into the cell.
    Charge,
    /// Current flowing out of the cell.
    Discharge,
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Rest => write!(f, "rest"),
            Condition::Charge => write!(f, "charge"),
            Condition::Discharge => write!(f, "discharge"),
        }
    }
}

/// The two supported instrument families.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclerFamily {
    /// One file per charge/discharge cycle, identified by a marker directory.
    Segmented,
    /// One unbroken time series for the whole test.
    ContinuousLog,
}

impl fmt::Display for CyclerFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CyclerFamily::Segmented => write!(f, "segmented"),
            CyclerFamily::ContinuousLog => write!(f, "continuous-log"),
        }
    }
}

/// A single time-ordered sample from a cycler.
///
/// Units are fixed: seconds, volts, milliamps (charge positive, discharge
/// negative), milliamp-hours and degrees Celsius.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Elapsed time since the start of the cycle.
    pub time_s: f64,
    /// Elapsed time since the current condition run started.
    pub step_time_s: f64,
    /// Instrument state for this sample.
    pub condition: Condition,
    /// Terminal voltage.
    pub voltage_v: f64,
    /// Cell current.
    pub current_ma: f64,
    /// Cumulative capacity, relative to the start of the cycle.
    pub capacity_mah: f64,
    /// Cell temperature, when the instrument records one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_c: Option<f64>,
}

impl Sample {
    /// Returns `true` if this sample belongs to a discharge segment.
    pub fn is_discharge(&self) -> bool {
        self.current_ma < 0.0 || self.condition == Condition::Discharge
    }

    /// Returns `true` if this sample belongs to a charge segment.
    pub fn is_charge(&self) -> bool {
        self.current_ma > 0.0 || self.condition == Condition::Charge
    }
}

/// One charge/discharge cycle's time-ordered samples.
///
/// Tables are immutable once built; consumers receive clones from the store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CycleTable {
    cycle: u32,
    samples: Vec<Sample>,
}

impl CycleTable {
    /// Creates a table from samples that are already cycle-local.
    ///
    /// Fails if `cycle` is zero or if sample times go backwards.
    pub fn new(cycle: u32, samples: Vec<Sample>) -> AppResult<Self> {
        if cycle == 0 {
            return Err(CyclerError::InvalidParameter {
                name: "cycle",
                reason: "cycle numbers are 1-based".into(),
            });
        }
        if let Some(pos) = samples
            .windows(2)
            .position(|pair| pair[1].time_s < pair[0].time_s)
        {
            return Err(CyclerError::InvalidParameter {
                name: "samples",
                reason: format!(
                    "cycle {cycle}: sample {} at {} s precedes sample {} at {} s",
                    pos + 1,
                    samples[pos + 1].time_s,
                    pos,
                    samples[pos].time_s
                ),
            });
        }
        Ok(Self { cycle, samples })
    }

    /// Creates a table from a raw slice, shifting time and capacity so the first
    /// sample sits at zero and re-deriving the per-step elapsed time.
    pub fn rebased(cycle: u32, raw: &[Sample]) -> AppResult<Self> {
        let (t0, q0) = raw
            .first()
            .map(|s| (s.time_s, s.capacity_mah))
            .unwrap_or((0.0, 0.0));
        let mut samples: Vec<Sample> = raw
            .iter()
            .map(|s| Sample {
                time_s: s.time_s - t0,
                capacity_mah: s.capacity_mah - q0,
                ..*s
            })
            .collect();
        assign_step_times(&mut samples);
        Self::new(cycle, samples)
    }

    /// The 1-based cycle number.
    pub fn cycle(&self) -> u32 {
        self.cycle
    }

    /// All samples in time order.
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Consumes the table and returns its samples.
    pub fn into_samples(self) -> Vec<Sample> {
        self.samples
    }

    /// Number of samples in the cycle.
    pub fn record_count(&self) -> usize {
        self.samples.len()
    }

    /// Samples belonging to the charge segment.
    pub fn charge_samples(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter().filter(|s| s.is_charge())
    }

    /// Samples belonging to the discharge segment.
    pub fn discharge_samples(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter().filter(|s| s.is_discharge())
    }

    /// Largest cumulative capacity observed while charging, if any.
    pub fn max_charge_capacity(&self) -> Option<f64> {
        max_abs_capacity(self.charge_samples())
    }

    /// Largest cumulative capacity observed while discharging, if any.
    pub fn max_discharge_capacity(&self) -> Option<f64> {
        max_abs_capacity(self.discharge_samples())
    }

    /// Current of every sample expressed as C-rate against `capacity_mah`.
    pub fn c_rate_series(&self, capacity_mah: f64) -> Vec<f64> {
        self.samples
            .iter()
            .map(|s| s.current_ma / capacity_mah)
            .collect()
    }
}

fn max_abs_capacity<'a>(samples: impl Iterator<Item = &'a Sample>) -> Option<f64> {
    samples
        .map(|s| s.capacity_mah.abs())
        .fold(None, |acc, q| Some(acc.map_or(q, |m: f64| m.max(q))))
}

/// Recomputes `step_time_s` as time since the start of each condition run.
pub fn assign_step_times(samples: &mut [Sample]) {
    let mut run_start = 0.0;
    let mut previous: Option<Condition> = None;
    for sample in samples.iter_mut() {
        if previous != Some(sample.condition) {
            run_start = sample.time_s;
            previous = Some(sample.condition);
        }
        sample.step_time_s = sample.time_s - run_start;
    }
}

/// A contiguous, zero-indexed concatenation of cycles returned by a range query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CycleSeries {
    /// First stored cycle included in the series.
    pub first_cycle: u32,
    /// Last stored cycle included in the series.
    pub last_cycle: u32,
    /// Concatenated samples; a sample's position is its index.
    pub samples: Vec<Sample>,
}

impl CycleSeries {
    /// Number of samples in the series.
    pub fn record_count(&self) -> usize {
        self.samples.len()
    }
}
