//! Pulse DC internal resistance.
//!
//! A characterization sweep applies fixed-length current pulses separated by rest.
//! For each pulse the voltage just before onset is the open-circuit reference and
//! the closed-circuit voltage is read at 0.1 s, 1 s, 10 s and 20 s after onset.
//! Onset is the first record of the pulse step and every elapsed time is
//! measured from it; the preceding rest contributes only its voltage.
//! Resistance at each offset is the voltage drop over the pulse current.

use crate::core::{Condition, Sample};
use crate::error::{AppResult, CyclerError};
use crate::validation;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Elapsed times after pulse onset at which voltage is sampled.
pub const SAMPLE_OFFSETS_S: [f64; 4] = [0.1, 1.0, 10.0, 20.0];

/// Pulse detection parameters.
///
/// # Example Configuration (`.toml`)
///
/// ```toml
/// [dcir]
/// pulse_duration_s = 20.0
/// expected_pulses = 4
/// tolerance_s = 0.01
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DcirSettings {
    /// Nominal pulse length in seconds
    pub pulse_duration_s: f64,
    /// Pulses expected in one sweep; fewer is an error, more are truncated
    pub expected_pulses: usize,
    /// Slack applied to duration and offset comparisons
    pub tolerance_s: f64,
}

impl Default for DcirSettings {
    fn default() -> Self {
        Self {
            pulse_duration_s: 20.0,
            expected_pulses: 4,
            tolerance_s: 0.01,
        }
    }
}

impl DcirSettings {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> AppResult<()> {
        validation::is_positive(self.pulse_duration_s)
            .map_err(|e| CyclerError::Configuration(format!("dcir.pulse_duration_s: {e}")))?;
        if self.expected_pulses == 0 {
            return Err(CyclerError::Configuration(
                "dcir.expected_pulses must be at least 1".into(),
            ));
        }
        if !self.tolerance_s.is_finite() || self.tolerance_s < 0.0 {
            return Err(CyclerError::Configuration(format!(
                "dcir.tolerance_s must be non-negative, got {}",
                self.tolerance_s
            )));
        }
        Ok(())
    }
}

/// A detected pulse and the voltages sampled from it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PulseDescriptor {
    /// Index of the first pulse sample
    pub start_index: usize,
    /// Index one past the last pulse sample
    pub end_index: usize,
    /// Signed mean pulse current
    pub current_ma: f64,
    pub condition: Condition,
    /// Last rest voltage before onset
    pub v_rest: f64,
    pub v_100ms: f64,
    pub v_1s: f64,
    pub v_10s: f64,
    pub v_20s: f64,
}

/// Resistances derived from one pulse, in milliohms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DcirMeasurement {
    pub pulse: PulseDescriptor,
    /// State of charge at onset, as a fraction of nominal capacity
    pub soc: f64,
    pub r_100ms_mohm: f64,
    pub r_1s_mohm: f64,
    pub r_10s_mohm: f64,
    pub r_20s_mohm: f64,
    /// `sqrt(r_1s² + r_10s²)`
    pub rss_mohm: f64,
}

#[derive(Debug, Clone, Copy)]
struct PulseRun {
    start: usize,
    end: usize,
}

/// Finds every qualifying pulse in `samples`, in order.
fn find_pulses(samples: &[Sample], settings: &DcirSettings) -> Vec<PulseRun> {
    let mut runs = Vec::new();
    let mut i = 1;
    while i < samples.len() {
        let condition = samples[i].condition;
        if condition == Condition::Rest || samples[i - 1].condition != Condition::Rest {
            i += 1;
            continue;
        }
        let start = i;
        while i < samples.len() && samples[i].condition == condition {
            i += 1;
        }
        let elapsed = samples[i - 1].time_s - samples[start].time_s;
        if (elapsed - settings.pulse_duration_s).abs() <= settings.tolerance_s {
            runs.push(PulseRun { start, end: i });
        } else {
            debug!(start, elapsed, "Skipping non-pulse segment");
        }
    }
    runs
}

fn voltage_at(run: &[Sample], offset_s: f64, tolerance_s: f64) -> f64 {
    let onset_s = run.first().map_or(0.0, |s| s.time_s);
    run.iter()
        .find(|s| s.time_s - onset_s >= offset_s - tolerance_s)
        .or_else(|| run.last())
        .map_or(f64::NAN, |s| s.voltage_v)
}

/// Extracts the pulse sweep from `samples` and computes per-pulse resistance.
///
/// `samples` is typically a single cycle or a `get_range` concatenation.
///
/// # Errors
///
/// - `PulseNotFound` if fewer than `expected_pulses` pulses are present
/// - `InvalidParameter` for a non-positive capacity
pub fn measure_dcir(
    samples: &[Sample],
    capacity_mah: f64,
    settings: &DcirSettings,
) -> AppResult<Vec<DcirMeasurement>> {
    validation::is_positive(capacity_mah).map_err(|e| CyclerError::InvalidParameter {
        name: "capacity_mah",
        reason: format!("{e} (got {capacity_mah})"),
    })?;

    let mut runs = find_pulses(samples, settings);
    if runs.len() < settings.expected_pulses {
        return Err(CyclerError::PulseNotFound {
            expected: settings.expected_pulses,
            found: runs.len(),
            duration_s: settings.pulse_duration_s,
        });
    }
    if runs.len() > settings.expected_pulses {
        warn!(
            found = runs.len(),
            expected = settings.expected_pulses,
            "Extra pulses detected; keeping the first {}",
            settings.expected_pulses
        );
        runs.truncate(settings.expected_pulses);
    }

    Ok(runs
        .iter()
        .map(|run| measure(samples, run, capacity_mah, settings.tolerance_s))
        .collect())
}

fn measure(
    samples: &[Sample],
    run: &PulseRun,
    capacity_mah: f64,
    tolerance_s: f64,
) -> DcirMeasurement {
    let rest = &samples[run.start - 1];
    let pulse = &samples[run.start..run.end];
    let condition = pulse[0].condition;

    let mean_abs_ma = pulse.iter().map(|s| s.current_ma.abs()).sum::<f64>() / pulse.len() as f64;
    let current_ma = match condition {
        Condition::Discharge => -mean_abs_ma,
        _ => mean_abs_ma,
    };

    let [v_100ms, v_1s, v_10s, v_20s] =
        SAMPLE_OFFSETS_S.map(|offset| voltage_at(pulse, offset, tolerance_s));

    // Discharge pulses pull voltage down, charge pulses push it up.
    let sign = if condition == Condition::Charge { -1.0 } else { 1.0 };
    let resistance = |v: f64| sign * (rest.voltage_v - v) * 1e6 / mean_abs_ma;

    let r_1s_mohm = resistance(v_1s);
    let r_10s_mohm = resistance(v_10s);

    DcirMeasurement {
        pulse: PulseDescriptor {
            start_index: run.start,
            end_index: run.end,
            current_ma,
            condition,
            v_rest: rest.voltage_v,
            v_100ms,
            v_1s,
            v_10s,
            v_20s,
        },
        soc: rest.capacity_mah.abs() / capacity_mah,
        r_100ms_mohm: resistance(v_100ms),
        r_1s_mohm,
        r_10s_mohm,
        r_20s_mohm: resistance(v_20s),
        rss_mohm: r_1s_mohm.hypot(r_10s_mohm),
    }
}
