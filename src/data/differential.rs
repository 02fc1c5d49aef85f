//! Differential capacity analysis (dQ/dV and dV/dQ).
//!
//! Raw voltage is too noisy to differentiate directly, so it is smoothed with
//! [`SavitzkyGolay`] first. dQ/dV and dV/dQ are then taken as independent
//! discrete derivatives over the smoothed voltage; dV/dQ is never obtained by
//! inverting dQ/dV pointwise.
//!
//! # Example Configuration (`.toml`)
//!
//! ```toml
//! [differential]
//! window = 21          # omit to derive from the sample count
//! poly_order = 2
//! segment = "discharge"
//! cutoff_c_rate = 0.0
//! ```

use crate::core::Sample;
use crate::data::savgol::{auto_window, SavitzkyGolay, DEFAULT_POLY_ORDER};
use crate::error::{AppResult, CyclerError};
use crate::validation;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Denominators smaller than this yield `None` instead of a derivative.
const MIN_DELTA: f64 = 1e-9;

/// Which part of the cycle to differentiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    /// Every sample in the input.
    #[default]
    Full,
    /// Charge samples only.
    Charge,
    /// Discharge samples only.
    Discharge,
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Segment::Full => "full",
            Segment::Charge => "charge",
            Segment::Discharge => "discharge",
        })
    }
}

impl FromStr for Segment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(Segment::Full),
            "charge" => Ok(Segment::Charge),
            "discharge" => Ok(Segment::Discharge),
            other => Err(format!(
                "unknown segment '{other}' (expected full, charge or discharge)"
            )),
        }
    }
}

impl Segment {
    fn includes(self, sample: &Sample) -> bool {
        match self {
            Segment::Full => true,
            Segment::Charge => sample.is_charge(),
            Segment::Discharge => sample.is_discharge(),
        }
    }
}

/// Parameters for [`differential_capacity`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DifferentialSettings {
    /// Smoothing window; `None` derives it with [`auto_window`]
    pub window: Option<usize>,
    /// Smoothing polynomial order
    pub poly_order: usize,
    /// Part of the cycle to analyse
    pub segment: Segment,
    /// Samples below this |C-rate| are dropped before smoothing
    pub cutoff_c_rate: f64,
}

impl Default for DifferentialSettings {
    fn default() -> Self {
        Self {
            window: None,
            poly_order: DEFAULT_POLY_ORDER,
            segment: Segment::Full,
            cutoff_c_rate: 0.0,
        }
    }
}

impl DifferentialSettings {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> AppResult<()> {
        if let Some(window) = self.window {
            validation::is_odd_window(window).map_err(|e| {
                CyclerError::Configuration(format!("differential.window: {e} (got {window})"))
            })?;
            if self.poly_order >= window {
                return Err(CyclerError::Configuration(format!(
                    "differential.poly_order ({}) must be less than window ({window})",
                    self.poly_order
                )));
            }
        }
        if !self.cutoff_c_rate.is_finite() || self.cutoff_c_rate < 0.0 {
            return Err(CyclerError::Configuration(format!(
                "differential.cutoff_c_rate must be non-negative, got {}",
                self.cutoff_c_rate
            )));
        }
        Ok(())
    }
}

/// One point of a differential curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DifferentialPoint {
    /// Position of the sample in the input slice
    pub index: usize,
    pub voltage_v: f64,
    pub smoothed_voltage_v: f64,
    pub capacity_mah: f64,
    /// |capacity| over nominal capacity
    pub soc: f64,
    /// mAh/V
    pub dq_dv: Option<f64>,
    /// V/mAh
    pub dv_dq: Option<f64>,
    /// dQ/dV over nominal capacity (1/V)
    pub dq_dv_normalized: Option<f64>,
}

/// A dQ/dV and dV/dQ curve plus the smoothing actually applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifferentialCurve {
    pub window: usize,
    pub poly_order: usize,
    pub segment: Segment,
    pub points: Vec<DifferentialPoint>,
}

/// Computes dQ/dV and dV/dQ for `samples` against `capacity_mah`.
///
/// Points are aligned to the input: `index` is the sample's position in
/// `samples`, so samples removed by the segment or cutoff filter simply do not
/// appear. The computation is a pure function of its inputs.
///
/// # Errors
///
/// - `InvalidParameter` for a non-positive capacity or an invalid window/order
/// - `InsufficientData` if fewer than 3 samples survive filtering
pub fn differential_capacity(
    samples: &[Sample],
    capacity_mah: f64,
    settings: &DifferentialSettings,
) -> AppResult<DifferentialCurve> {
    validation::is_positive(capacity_mah).map_err(|e| CyclerError::InvalidParameter {
        name: "capacity_mah",
        reason: format!("{e} (got {capacity_mah})"),
    })?;

    let selected: Vec<(usize, &Sample)> = samples
        .iter()
        .enumerate()
        .filter(|(_, s)| settings.segment.includes(s))
        .filter(|(_, s)| (s.current_ma / capacity_mah).abs() >= settings.cutoff_c_rate)
        .collect();

    if selected.len() < 3 {
        return Err(CyclerError::InsufficientData {
            operation: "differential capacity",
            needed: 3,
            found: selected.len(),
        });
    }

    let filter = match settings.window {
        Some(window) => SavitzkyGolay::new(window, settings.poly_order)?,
        None => {
            let window = auto_window(selected.len());
            SavitzkyGolay::new(window, settings.poly_order.min(window - 1))?
        }
    }
    .fitted_to(selected.len())?;

    let voltage: Vec<f64> = selected.iter().map(|(_, s)| s.voltage_v).collect();
    let capacity: Vec<f64> = selected.iter().map(|(_, s)| s.capacity_mah).collect();
    let smoothed = filter.smooth(&voltage)?;

    let dq_dv = derivative(&capacity, &smoothed);
    let dv_dq = derivative(&smoothed, &capacity);

    let points = selected
        .iter()
        .enumerate()
        .map(|(k, (index, sample))| DifferentialPoint {
            index: *index,
            voltage_v: sample.voltage_v,
            smoothed_voltage_v: smoothed[k],
            capacity_mah: sample.capacity_mah,
            soc: sample.capacity_mah.abs() / capacity_mah,
            dq_dv: dq_dv[k],
            dv_dq: dv_dq[k],
            dq_dv_normalized: dq_dv[k].map(|d| d / capacity_mah),
        })
        .collect();

    Ok(DifferentialCurve {
        window: filter.window(),
        poly_order: filter.poly_order(),
        segment: settings.segment,
        points,
    })
}

/// d(numerator)/d(denominator) by central differences, one-sided at the ends.
fn derivative(numerator: &[f64], denominator: &[f64]) -> Vec<Option<f64>> {
    let n = numerator.len();
    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(1);
            let hi = (i + 1).min(n - 1);
            let dd = denominator[hi] - denominator[lo];
            if dd.abs() < MIN_DELTA {
                None
            } else {
                Some((numerator[hi] - numerator[lo]) / dd)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_support::sample;
    use crate::core::Condition;

    /// Linear discharge: 1 mAh per sample while voltage falls 10 mV per sample.
    fn linear_discharge(len: usize) -> Vec<Sample> {
        (0..len)
            .map(|i| {
                let mut s = sample(i as f64, Condition::Discharge, 4.2 - 0.01 * i as f64, -100.0);
                s.capacity_mah = i as f64;
                s
            })
            .collect()
    }

    #[test]
    fn test_segment_parses_names() {
        assert_eq!("discharge".parse::<Segment>(), Ok(Segment::Discharge));
        assert_eq!(" Charge ".parse::<Segment>(), Ok(Segment::Charge));
        assert_eq!(Segment::Full.to_string(), "full");
        assert!("both".parse::<Segment>().is_err());
    }

    #[test]
    fn test_linear_profile_has_constant_derivatives() {
        let samples = linear_discharge(60);
        let curve = differential_capacity(&samples, 100.0, &DifferentialSettings::default()).unwrap();
        assert_eq!(curve.points.len(), 60);
        assert_eq!(curve.window, 3);
        for p in &curve.points {
            assert!((p.dq_dv.unwrap() + 100.0).abs() < 1e-6);
            assert!((p.dv_dq.unwrap() + 0.01).abs() < 1e-9);
            assert!((p.dq_dv_normalized.unwrap() + 1.0).abs() < 1e-8);
        }
        assert!((curve.points[50].soc - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_flat_voltage_gives_none() {
        let samples: Vec<Sample> = (0..10)
            .map(|i| {
                let mut s = sample(i as f64, Condition::Charge, 3.7, 100.0);
                s.capacity_mah = i as f64;
                s
            })
            .collect();
        let curve = differential_capacity(&samples, 10.0, &DifferentialSettings::default()).unwrap();
        assert!(curve.points.iter().all(|p| p.dq_dv.is_none()));
        assert!(curve
            .points
            .iter()
            .all(|p| p.dv_dq.is_some_and(|d| d.abs() < 1e-12)));
    }

    #[test]
    fn test_segment_filter_keeps_input_indices() {
        let mut samples = vec![
            sample(0.0, Condition::Charge, 4.0, 100.0),
            sample(1.0, Condition::Rest, 4.1, 0.0),
        ];
        samples.extend(linear_discharge(5).into_iter().map(|mut s| {
            s.time_s += 2.0;
            s
        }));
        let settings = DifferentialSettings {
            segment: Segment::Discharge,
            ..Default::default()
        };
        let curve = differential_capacity(&samples, 10.0, &settings).unwrap();
        let indices: Vec<usize> = curve.points.iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_cutoff_drops_low_current_samples() {
        let mut samples = linear_discharge(8);
        samples[7].current_ma = -1.0;
        let settings = DifferentialSettings {
            cutoff_c_rate: 0.05,
            ..Default::default()
        };
        let curve = differential_capacity(&samples, 100.0, &settings).unwrap();
        assert_eq!(curve.points.len(), 7);
    }

    #[test]
    fn test_repeated_computation_is_identical() {
        let samples: Vec<Sample> = linear_discharge(200)
            .into_iter()
            .enumerate()
            .map(|(i, mut s)| {
                s.voltage_v += if i % 3 == 0 { 0.004 } else { -0.002 };
                s
            })
            .collect();
        let settings = DifferentialSettings {
            window: Some(11),
            ..Default::default()
        };
        let first = differential_capacity(&samples, 200.0, &settings).unwrap();
        let second = differential_capacity(&samples, 200.0, &settings).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_errors() {
        let samples = linear_discharge(2);
        assert!(matches!(
            differential_capacity(&samples, 10.0, &DifferentialSettings::default()),
            Err(CyclerError::InsufficientData { found: 2, .. })
        ));
        assert!(matches!(
            differential_capacity(&linear_discharge(10), 0.0, &DifferentialSettings::default()),
            Err(CyclerError::InvalidParameter { name: "capacity_mah", .. })
        ));
    }

    #[test]
    fn test_settings_validation() {
        assert!(DifferentialSettings::default().validate().is_ok());
        let even = DifferentialSettings {
            window: Some(10),
            ..Default::default()
        };
        assert!(even.validate().is_err());
        let order_too_high = DifferentialSettings {
            window: Some(5),
            poly_order: 5,
            ..Default::default()
        };
        assert!(order_too_high.validate().is_err());
    }
}
