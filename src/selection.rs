//! Parsing of operator cycle selections such as `"3 4 5 8-9"` or `"3-5"`.

use crate::error::{AppResult, CyclerError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A set of cycles chosen by the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleSelection {
    /// A contiguous inclusive span, served by `get_range`.
    Range { start: u32, end: u32 },
    /// Individual cycles in the order given, served by `get_many`.
    List(Vec<u32>),
}

impl CycleSelection {
    /// Expands the selection into cycle numbers.
    pub fn cycles(&self) -> Vec<u32> {
        match self {
            CycleSelection::Range { start, end } => (*start..=*end).collect(),
            CycleSelection::List(cycles) => cycles.clone(),
        }
    }
}

impl FromStr for CycleSelection {
    type Err = CyclerError;

    /// A lone `a-b` token is a range; anything else is a list.
    fn from_str(s: &str) -> AppResult<Self> {
        let tokens: Vec<&str> = s.split_whitespace().collect();
        match tokens.as_slice() {
            [single] if single.contains('-') => {
                let (start, end) = parse_cycle_range(single)?;
                Ok(CycleSelection::Range { start, end })
            }
            _ => parse_cycle_list(s).map(CycleSelection::List),
        }
    }
}

fn parse_cycle(token: &str) -> AppResult<u32> {
    match token.trim().parse::<u32>() {
        Ok(0) => Err(CyclerError::InvalidParameter {
            name: "cycles",
            reason: "cycle numbers start at 1".into(),
        }),
        Ok(n) => Ok(n),
        Err(_) => Err(CyclerError::InvalidParameter {
            name: "cycles",
            reason: format!("'{token}' is not a cycle number"),
        }),
    }
}

/// Parses `"a-b"` into an inclusive `(a, b)`.
///
/// # Errors
///
/// `InvalidParameter` for malformed input, `InvalidRange` if `a > b`.
pub fn parse_cycle_range(text: &str) -> AppResult<(u32, u32)> {
    let (start, end) = text
        .trim()
        .split_once('-')
        .ok_or_else(|| CyclerError::InvalidParameter {
            name: "cycles",
            reason: format!("range format required (e.g. '3-5'), got '{text}'"),
        })?;
    let (start, end) = (parse_cycle(start)?, parse_cycle(end)?);
    if start > end {
        return Err(CyclerError::InvalidRange { start, end });
    }
    Ok((start, end))
}

/// Expands a whitespace-separated list of numbers and `a-b` spans, keeping
/// the given order: `"3 4 5 8-9"` becomes `[3, 4, 5, 8, 9]`.
pub fn parse_cycle_list(text: &str) -> AppResult<Vec<u32>> {
    let mut cycles = Vec::new();
    for token in text.split_whitespace() {
        if token.contains('-') {
            let (start, end) = parse_cycle_range(token)?;
            cycles.extend(start..=end);
        } else {
            cycles.push(parse_cycle(token)?);
        }
    }
    if cycles.is_empty() {
        return Err(CyclerError::InvalidParameter {
            name: "cycles",
            reason: "no cycles given".into(),
        });
    }
    Ok(cycles)
}
