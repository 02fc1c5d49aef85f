//! Savitzky–Golay smoothing.
//!
//! Each output point is the value at that position of a least-squares polynomial
//! fitted over a sliding window of samples. Interior points use the centred
//! window; the first and last `window / 2` points reuse the first or last full
//! window and evaluate the polynomial at their offset inside it, so the output
//! has the same length as the input and no padding values are invented.

use crate::error::{AppResult, CyclerError};
use crate::validation;

/// Polynomial order used when none is configured.
pub const DEFAULT_POLY_ORDER: usize = 2;

/// Picks a window length for `sample_count` points: one thirtieth of the
/// series, rounded, then bumped up to the next odd number and at least 3.
pub fn auto_window(sample_count: usize) -> usize {
    let raw = (sample_count as f64 / 30.0).round() as usize;
    let odd = if raw % 2 == 0 { raw + 1 } else { raw };
    odd.max(3)
}

/// A configured Savitzky–Golay filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavitzkyGolay {
    window: usize,
    poly_order: usize,
}

impl SavitzkyGolay {
    /// Creates a filter with an odd `window` of at least 3 and `poly_order < window`.
    pub fn new(window: usize, poly_order: usize) -> AppResult<Self> {
        validation::is_odd_window(window).map_err(|e| CyclerError::InvalidParameter {
            name: "window",
            reason: format!("{e} (got {window})"),
        })?;
        if poly_order >= window {
            return Err(CyclerError::InvalidParameter {
                name: "poly_order",
                reason: format!("order {poly_order} must be less than window {window}"),
            });
        }
        Ok(Self { window, poly_order })
    }

    /// Configured window length.
    pub fn window(&self) -> usize {
        self.window
    }

    /// Configured polynomial order.
    pub fn poly_order(&self) -> usize {
        self.poly_order
    }

    /// The filter actually applied to `len` samples: the window shrinks to the
    /// largest odd length that fits and the order is clamped below it.
    pub fn fitted_to(&self, len: usize) -> AppResult<Self> {
        if len < 3 {
            return Err(CyclerError::InsufficientData {
                operation: "savitzky-golay smoothing",
                needed: 3,
                found: len,
            });
        }
        let largest_odd = if len % 2 == 0 { len - 1 } else { len };
        let window = self.window.min(largest_odd);
        Ok(Self {
            window,
            poly_order: self.poly_order.min(window - 1),
        })
    }

    /// Smooths `values`, returning a series of the same length.
    pub fn smooth(&self, values: &[f64]) -> AppResult<Vec<f64>> {
        let filter = self.fitted_to(values.len())?;
        let n = values.len();
        let w = filter.window;
        let half = w / 2;

        let centre = filter.weights_at(0.0)?;
        let mut out = vec![0.0; n];

        for i in half..n - half {
            out[i] = dot(&centre, &values[i - half..i + half + 1]);
        }

        let head = &values[..w];
        let tail = &values[n - w..];
        for offset in 0..half {
            let lead = filter.weights_at(offset as f64 - half as f64)?;
            out[offset] = dot(&lead, head);

            let trail = filter.weights_at((half - offset) as f64)?;
            out[n - 1 - offset] = dot(&trail, tail);
        }

        Ok(out)
    }

    /// Convolution weights that evaluate the window's least-squares polynomial at
    /// position `t`, measured in samples from the window centre.
    fn weights_at(&self, t: f64) -> AppResult<Vec<f64>> {
        let half = (self.window / 2) as f64;
        let terms = self.poly_order + 1;
        // Positions are scaled to [-1, 1] to keep the normal equations well conditioned.
        let xs: Vec<f64> = (0..self.window)
            .map(|i| (i as f64 - half) / half)
            .collect();
        let t = t / half;

        let mut normal = vec![vec![0.0; terms]; terms];
        for x in &xs {
            let powers = powers(*x, terms);
            for (r, pr) in powers.iter().enumerate() {
                for (c, pc) in powers.iter().enumerate() {
                    normal[r][c] += pr * pc;
                }
            }
        }

        let z = solve(normal, powers(t, terms)).ok_or_else(|| CyclerError::InvalidParameter {
            name: "poly_order",
            reason: format!(
                "normal equations are singular for window {} and order {}",
                self.window, self.poly_order
            ),
        })?;

        Ok(xs.iter().map(|x| dot(&powers(*x, terms), &z)).collect())
    }
}

fn powers(x: f64, terms: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(terms);
    let mut p = 1.0;
    for _ in 0..terms {
        out.push(p);
        p *= x;
    }
    out
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Gaussian elimination with partial pivoting. `None` if the system is singular.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Some(x)
}
