//! Capacity fade and cycle-life reliability.
//!
//! Fits a least-squares line through discharge capacity versus cycle number,
//! predicts the end-of-life cycle at 80 % of the initial capacity and grades
//! the cell on relative fade and capacity spread.

use crate::data::summary::CycleSummary;
use crate::error::{AppResult, CyclerError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fraction of initial capacity that marks end of life.
pub const EOL_RETENTION: f64 = 0.8;

/// Reliability grade from relative fade and capacity CV (both in percent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReliabilityGrade {
    /// fade < 5 % and CV < 2 %
    Excellent,
    /// fade < 10 % and CV < 5 %
    Good,
    /// fade < 20 % and CV < 10 %
    Fair,
    Poor,
}

impl ReliabilityGrade {
    /// Grades a cell; the first band both figures fall under wins.
    pub fn classify(relative_fade_pct: f64, capacity_cv_pct: f64) -> Self {
        if relative_fade_pct < 5.0 && capacity_cv_pct < 2.0 {
            ReliabilityGrade::Excellent
        } else if relative_fade_pct < 10.0 && capacity_cv_pct < 5.0 {
            ReliabilityGrade::Good
        } else if relative_fade_pct < 20.0 && capacity_cv_pct < 10.0 {
            ReliabilityGrade::Fair
        } else {
            ReliabilityGrade::Poor
        }
    }
}

impl fmt::Display for ReliabilityGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReliabilityGrade::Excellent => "Excellent",
            ReliabilityGrade::Good => "Good",
            ReliabilityGrade::Fair => "Fair",
            ReliabilityGrade::Poor => "Poor",
        };
        f.write_str(name)
    }
}

/// Least-squares line `capacity = slope * cycle + intercept`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
}

impl LinearFit {
    /// Fits `ys` against `xs`. `None` if fewer than two points or all `xs` coincide.
    pub fn fit(xs: &[f64], ys: &[f64]) -> Option<Self> {
        let n = xs.len().min(ys.len());
        if n < 2 {
            return None;
        }
        let mean_x = xs[..n].iter().sum::<f64>() / n as f64;
        let mean_y = ys[..n].iter().sum::<f64>() / n as f64;

        let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
        for (x, y) in xs.iter().zip(ys) {
            let (dx, dy) = (x - mean_x, y - mean_y);
            sxx += dx * dx;
            sxy += dx * dy;
            syy += dy * dy;
        }
        if sxx == 0.0 {
            return None;
        }
        let slope = sxy / sxx;
        // A flat series is fitted exactly by a flat line.
        let r_squared = if syy == 0.0 {
            1.0
        } else {
            (sxy * sxy) / (sxx * syy)
        };
        Some(Self {
            slope,
            intercept: mean_y - slope * mean_x,
            r_squared,
        })
    }
}

/// End-of-life projection from the fade slope.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EolPrediction {
    pub eol_capacity_mah: f64,
    pub predicted_eol_cycle: u32,
    pub remaining_cycles: u32,
}

/// Fade, spread and life prediction over a run of cycle summaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FadeReport {
    pub first_cycle: u32,
    pub last_cycle: u32,
    pub initial_capacity_mah: f64,
    pub final_capacity_mah: f64,
    pub absolute_fade_mah: f64,
    pub relative_fade_pct: f64,
    pub fade_per_cycle_pct: f64,
    pub fit: LinearFit,
    pub capacity_mean_mah: f64,
    /// Population standard deviation
    pub capacity_std_mah: f64,
    pub capacity_min_mah: f64,
    pub capacity_max_mah: f64,
    pub capacity_cv_pct: f64,
    pub efficiency_mean_pct: f64,
    /// `None` when capacity is not falling
    pub eol: Option<EolPrediction>,
    pub grade: ReliabilityGrade,
}

/// Analyses capacity fade across `summaries`, which must be in ascending cycle order.
///
/// # Errors
///
/// `InsufficientData` with fewer than two summaries.
pub fn analyze_fade(summaries: &[CycleSummary]) -> AppResult<FadeReport> {
    let (first, last) = match summaries {
        [first, .., last] => (first, last),
        _ => {
            return Err(CyclerError::InsufficientData {
                operation: "capacity fade analysis",
                needed: 2,
                found: summaries.len(),
            })
        }
    };

    let n = summaries.len() as f64;
    let xs: Vec<f64> = summaries.iter().map(|s| f64::from(s.cycle)).collect();
    let ys: Vec<f64> = summaries.iter().map(|s| s.discharge_capacity_mah).collect();

    let fit = LinearFit::fit(&xs, &ys).ok_or_else(|| CyclerError::InvalidParameter {
        name: "summaries",
        reason: "cycle numbers must not all be equal".into(),
    })?;

    let initial = first.discharge_capacity_mah;
    let final_capacity = last.discharge_capacity_mah;
    let absolute_fade = initial - final_capacity;
    let relative_fade_pct = if initial > 0.0 {
        absolute_fade / initial * 100.0
    } else {
        0.0
    };

    let mean = ys.iter().sum::<f64>() / n;
    let std = (ys.iter().map(|y| (y - mean).powi(2)).sum::<f64>() / n).sqrt();
    let capacity_cv_pct = if mean > 0.0 { std / mean * 100.0 } else { 0.0 };

    let eol = (initial > 0.0 && fit.slope < 0.0).then(|| {
        let eol_capacity_mah = initial * EOL_RETENTION;
        let cycles_to_eol = ((eol_capacity_mah - initial) / fit.slope).floor();
        let predicted_eol_cycle = (f64::from(first.cycle) + cycles_to_eol) as u32;
        EolPrediction {
            eol_capacity_mah,
            predicted_eol_cycle,
            remaining_cycles: predicted_eol_cycle.saturating_sub(last.cycle),
        }
    });

    Ok(FadeReport {
        first_cycle: first.cycle,
        last_cycle: last.cycle,
        initial_capacity_mah: initial,
        final_capacity_mah: final_capacity,
        absolute_fade_mah: absolute_fade,
        relative_fade_pct,
        fade_per_cycle_pct: relative_fade_pct / n,
        fit,
        capacity_mean_mah: mean,
        capacity_std_mah: std,
        capacity_min_mah: ys.iter().copied().fold(f64::INFINITY, f64::min),
        capacity_max_mah: ys.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        capacity_cv_pct,
        efficiency_mean_pct: summaries.iter().map(|s| s.efficiency_pct).sum::<f64>() / n,
        eol,
        grade: ReliabilityGrade::classify(relative_fade_pct, capacity_cv_pct),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(cycle: u32, discharge: f64) -> CycleSummary {
        CycleSummary {
            cycle,
            charge_capacity_mah: 100.0,
            discharge_capacity_mah: discharge,
            efficiency_pct: discharge,
            retention: discharge / 100.0,
            average_discharge_voltage_v: Some(3.7),
            peak_c_rate: 0.0,
            max_temperature_c: None,
            record_count: 10,
        }
    }

    #[test]
    fn test_linear_fade() {
        let summaries: Vec<CycleSummary> = (1..=11)
            .map(|c| summary(c, 100.0 - (c - 1) as f64 * 0.5))
            .collect();
        let report = analyze_fade(&summaries).unwrap();

        assert_eq!(report.initial_capacity_mah, 100.0);
        assert_eq!(report.final_capacity_mah, 95.0);
        assert!((report.relative_fade_pct - 5.0).abs() < 1e-9);
        assert!((report.fit.slope + 0.5).abs() < 1e-9);
        assert!((report.fit.intercept - 100.5).abs() < 1e-9);
        assert!((report.fit.r_squared - 1.0).abs() < 1e-9);

        let eol = report.eol.unwrap();
        assert_eq!(eol.eol_capacity_mah, 80.0);
        assert_eq!(eol.predicted_eol_cycle, 41);
        assert_eq!(eol.remaining_cycles, 30);
    }

    #[test]
    fn test_flat_capacity_has_no_eol() {
        let summaries = vec![summary(1, 50.0), summary(2, 50.0), summary(3, 50.0)];
        let report = analyze_fade(&summaries).unwrap();
        assert_eq!(report.eol, None);
        assert_eq!(report.capacity_cv_pct, 0.0);
        assert_eq!(report.grade, ReliabilityGrade::Excellent);
    }

    #[test]
    fn test_grade_bands() {
        assert_eq!(ReliabilityGrade::classify(4.9, 1.9), ReliabilityGrade::Excellent);
        assert_eq!(ReliabilityGrade::classify(4.9, 2.0), ReliabilityGrade::Good);
        assert_eq!(ReliabilityGrade::classify(15.0, 3.0), ReliabilityGrade::Fair);
        assert_eq!(ReliabilityGrade::classify(25.0, 1.0), ReliabilityGrade::Poor);
        assert_eq!(ReliabilityGrade::classify(1.0, 12.0), ReliabilityGrade::Poor);
    }

    #[test]
    fn test_requires_two_summaries() {
        assert!(matches!(
            analyze_fade(&[summary(1, 50.0)]),
            Err(CyclerError::InsufficientData { needed: 2, found: 1, .. })
        ));
    }
}
