//! # Battery Cycler Library
//!
//! This crate ingests the raw output of battery cycling instruments into a uniform,
//! cycle-indexed store and computes derived electrochemical metrics from it. The
//! `battery-cycler` binary (`main.rs`) is a thin command-line frontend over this library;
//! plotting, export formatting and path discovery are left to the caller.
//!
//! ## Crate Structure
//!
//! - **`config`**: Layered configuration (`config::Settings`) loaded with figment from
//!   defaults, a TOML file and `BATTERY_CYCLER_*` environment variables.
//! - **`core`**: The shared data model: `Sample`, `Condition`, `CycleTable`, `CycleSeries`
//!   and `CyclerFamily`.
//! - **`data`**: The `CycleStore` container, nominal-capacity resolution and the
//!   derived-metric processors (Savitzky–Golay smoothing, dQ/dV, pulse DCIR, cycle
//!   summaries and capacity fade).
//! - **`error`**: The `CyclerError` enum used throughout the crate.
//! - **`instrument`**: Family detection and the segmented / continuous-log loaders.
//! - **`logging`**: `tracing-subscriber` initialization.
//! - **`metadata`**: Source-level metadata attached to every store.
//! - **`selection`**: Parsing of operator cycle selections such as `"3 4 5 8-9"`.
//! - **`validation`**: Small validators shared by the configuration types.
//!
//! ## Example
//!
//! ```no_run
//! use battery_cycler::config::Settings;
//! use battery_cycler::data::differential::differential_capacity;
//! use battery_cycler::instrument::load_source;
//!
//! # fn main() -> Result<(), battery_cycler::error::CyclerError> {
//! let settings = Settings::load()?;
//! let store = load_source("/data/LCO_2500mAh_cell01", &settings)?.into_complete()?;
//! let cycle = store.get(1)?;
//! let curve = differential_capacity(cycle.samples(), store.capacity_mah(), &settings.differential)?;
//! println!("{} dQ/dV points", curve.points.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod data;
pub mod error;
pub mod instrument;
pub mod logging;
pub mod metadata;
pub mod selection;
pub mod validation;
