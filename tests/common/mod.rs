//! Shared fixtures: cycler output directories written into temp dirs.
#![allow(dead_code)]

use battery_cycler::config::Settings;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const SEGMENTED_HEADER: &str =
    "Time[s],Voltage[V],Current[mA],Capacity[mAh],StepType,Temp[C]";

pub const CONTINUOUS_HEADER: &str =
    "PassTime[Sec]\tVoltage[V]\tCurrent[mA]\tCapacity[mAh]\tCondition\tTemp1[Deg]";

/// Discharge capacity written for `cycle`; fades 0.2 mAh per cycle from 24 mAh.
pub fn discharge_capacity(cycle: u32) -> f64 {
    24.0 - 0.2 * f64::from(cycle - 1)
}

/// One segmented cycle file: rest, charge, rest, discharge (8 rows).
/// Times are absolute test time so loaders have to rebase them.
pub fn segmented_cycle_csv(cycle: u32) -> String {
    let t0 = f64::from(cycle - 1) * 1000.0;
    let d = discharge_capacity(cycle);
    let rows = [
        (0.0, 3.60, 0.0, 0.0, "3", 25.0),
        (60.0, 3.85, 500.0, 8.0, "1", 25.4),
        (120.0, 4.05, 500.0, 16.0, "1", 25.8),
        (180.0, 4.20, 500.0, 25.0, "1", 26.2),
        (240.0, 4.18, 0.0, 25.0, "3", 26.0),
        (300.0, 3.90, -500.0, d / 3.0, "2", 26.5),
        (360.0, 3.65, -500.0, d * 2.0 / 3.0, "2", 27.2),
        (420.0, 3.00, -500.0, d, "2", 28.0),
    ];
    let mut text = String::from(SEGMENTED_HEADER);
    text.push('\n');
    for (t, v, i, q, code, temp) in rows {
        text.push_str(&format!("{},{v},{i},{q},{code},{temp}\n", t0 + t));
    }
    text
}

/// Creates `<tmp>/<name>/Pattern` and `<tmp>/<name>/Restore/SaveData<N>.csv`.
pub fn segmented_source(name: &str, cycles: &[u32]) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join(name);
    fs::create_dir_all(source.join("Pattern")).unwrap();
    fs::create_dir_all(source.join("Restore")).unwrap();
    for &cycle in cycles {
        write_cycle_file(
            &source,
            &format!("SaveData{cycle}.csv"),
            &segmented_cycle_csv(cycle),
        );
    }
    (tmp, source)
}

/// Writes a file into a segmented source's `Restore` directory.
pub fn write_cycle_file(source: &Path, file_name: &str, contents: &str) {
    fs::write(source.join("Restore").join(file_name), contents).unwrap();
}

/// Rows for `cycles` continuous-log cycles of 8 rows each:
/// 3 x charge, rest, 3 x discharge, rest. Currents are magnitudes.
/// Cycle k spans rows `[8(k-1), 8k)`.
pub fn continuous_rows(cycles: u32) -> Vec<String> {
    let mut rows = Vec::new();
    let mut t = 0.0;
    for cycle in 1..=cycles {
        let d = discharge_capacity(cycle);
        let profile = [
            (3.85, 500.0, 8.0, "1"),
            (4.05, 500.0, 16.0, "1"),
            (4.20, 500.0, 25.0, "1"),
            (4.18, 0.0, 25.0, "0"),
            (3.90, 500.0, d / 3.0, "2"),
            (3.65, 500.0, d * 2.0 / 3.0, "2"),
            (3.00, 500.0, d, "2"),
            (3.20, 0.0, d, "0"),
        ];
        for (v, i, q, code) in profile {
            rows.push(format!("{t}\t{v}\t{i}\t{q}\t{code}\t25.0"));
            t += 60.0;
        }
    }
    rows
}

/// A full continuous-log table with header.
pub fn continuous_text(rows: &[String]) -> String {
    let mut text = String::from(CONTINUOUS_HEADER);
    text.push('\n');
    for row in rows {
        text.push_str(row);
        text.push('\n');
    }
    text
}

/// Creates `<tmp>/<name>/<file_name>` holding `contents`.
pub fn continuous_source(name: &str, file_name: &str, contents: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join(name);
    fs::create_dir_all(&source).unwrap();
    fs::write(source.join(file_name), contents).unwrap();
    (tmp, source)
}

/// Default settings with a manual capacity override.
pub fn manual_settings(capacity_mah: f64) -> Settings {
    let mut settings = Settings::default();
    settings.capacity.manual_mah = Some(capacity_mah);
    settings
}
