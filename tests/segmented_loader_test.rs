//! Segmented family: one file per cycle under the restore directory.

mod common;

use battery_cycler::config::Settings;
use battery_cycler::error::CyclerError;
use battery_cycler::instrument::{LoadCancel, SegmentedLoader};
use std::fs;

fn loader() -> SegmentedLoader {
    SegmentedLoader::new(Settings::default().segmented)
}

#[test]
fn test_loads_every_cycle_file() {
    let (_tmp, source) = common::segmented_source("cell", &[1, 2, 3, 10]);
    let settings = common::manual_settings(25.0);
    let outcome = loader()
        .load(&source, &settings.capacity, &LoadCancel::new())
        .unwrap();

    assert!(outcome.is_complete());
    assert_eq!(outcome.store.list_available(), vec![1, 2, 3, 10]);
    for cycle in [1, 2, 3, 10] {
        let table = outcome.store.get(cycle).unwrap();
        assert_eq!(table.record_count(), 8);
        let discharge = table.max_discharge_capacity().unwrap();
        assert!((discharge - common::discharge_capacity(cycle)).abs() < 1e-9);
    }
}

#[test]
fn test_times_are_rebased_per_cycle() {
    let (_tmp, source) = common::segmented_source("cell", &[4]);
    let settings = common::manual_settings(25.0);
    let store = loader()
        .load(&source, &settings.capacity, &LoadCancel::new())
        .unwrap()
        .store;
    let times: Vec<f64> = store.get(4).unwrap().samples().iter().map(|s| s.time_s).collect();
    assert_eq!(times, vec![0.0, 60.0, 120.0, 180.0, 240.0, 300.0, 360.0, 420.0]);
}

#[test]
fn test_rows_out_of_time_order_are_sorted() {
    let (_tmp, source) = common::segmented_source("cell", &[]);
    let text = format!(
        "{}\n120,4.0,500,16,1,25\n0,3.6,0,0,3,25\n60,3.8,500,8,1,25\n",
        common::SEGMENTED_HEADER
    );
    common::write_cycle_file(&source, "SaveData1.csv", &text);

    let table = loader()
        .parse_cycle(1, &source.join("Restore/SaveData1.csv"))
        .unwrap();
    let volts: Vec<f64> = table.samples().iter().map(|s| s.voltage_v).collect();
    assert_eq!(volts, vec![3.6, 3.8, 4.0]);
}

#[test]
fn test_cycle_number_from_name() {
    let loader = loader();
    assert_eq!(loader.cycle_number("SaveData1.csv"), Some(1));
    assert_eq!(loader.cycle_number("SaveData120.csv"), Some(120));
    assert_eq!(loader.cycle_number("SaveData0.csv"), None);
    assert_eq!(loader.cycle_number("SaveData.csv"), None);
    assert_eq!(loader.cycle_number("SaveData3.txt"), None);
    assert_eq!(loader.cycle_number("Data3.csv"), None);
}

#[test]
fn test_malformed_filename_rejects_load() {
    let (_tmp, source) = common::segmented_source("cell", &[1, 2]);
    common::write_cycle_file(&source, "SaveData_backup.csv", &common::segmented_cycle_csv(3));

    let err = loader()
        .load(&source, &Settings::default().capacity, &LoadCancel::new())
        .unwrap_err();
    match err {
        CyclerError::MalformedFilename { file, expected } => {
            assert!(file.ends_with("SaveData_backup.csv"));
            assert_eq!(expected, "SaveData<N>.csv");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_zero_padded_name_clashing_with_plain_name() {
    let (_tmp, source) = common::segmented_source("cell", &[1, 2]);
    common::write_cycle_file(&source, "SaveData01.csv", &common::segmented_cycle_csv(1));

    let err = loader()
        .load(&source, &common::manual_settings(25.0).capacity, &LoadCancel::new())
        .unwrap_err();
    match err {
        CyclerError::DuplicateCycleFile {
            cycle,
            first,
            second,
        } => {
            assert_eq!(cycle, 1);
            assert!(first.ends_with("SaveData01.csv"));
            assert!(second.ends_with("SaveData1.csv"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_missing_restore_directory_names_the_path() {
    let tmp = tempfile::TempDir::new().unwrap();
    let source = tmp.path().join("cell_100mAh");
    fs::create_dir_all(source.join("Pattern")).unwrap();

    let err = loader()
        .load(&source, &Settings::default().capacity, &LoadCancel::new())
        .unwrap_err();
    assert!(err.to_string().contains("Restore"), "{err}");
    match err {
        CyclerError::Io { path, .. } => assert_eq!(path, source.join("Restore")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_subdirectories_are_ignored() {
    let (_tmp, source) = common::segmented_source("cell", &[1]);
    fs::create_dir(source.join("Restore/old")).unwrap();
    let outcome = loader()
        .load(&source, &common::manual_settings(25.0).capacity, &LoadCancel::new())
        .unwrap();
    assert_eq!(outcome.store.list_available(), vec![1]);
}

#[test]
fn test_corrupt_file_is_reported_as_partial() {
    let (_tmp, source) = common::segmented_source("cell", &[1, 2, 3]);
    common::write_cycle_file(
        &source,
        "SaveData2.csv",
        &format!("{}\n0,3.6,0,0,9,25\n", common::SEGMENTED_HEADER),
    );

    let outcome = loader()
        .load(&source, &common::manual_settings(25.0).capacity, &LoadCancel::new())
        .unwrap();
    assert!(!outcome.is_complete());
    assert_eq!(outcome.store.list_available(), vec![1, 3]);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].cycle, 2);
    assert!(matches!(
        outcome.failures[0].cause,
        CyclerError::SourceFormat { .. }
    ));

    match outcome.into_complete() {
        Err(CyclerError::PartialLoad { failed, total, .. }) => {
            assert_eq!(failed, 1);
            assert_eq!(total, 3);
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_missing_column_fails_the_file() {
    let (_tmp, source) = common::segmented_source("cell", &[1]);
    common::write_cycle_file(&source, "SaveData2.csv", "Time[s],Voltage[V]\n0,3.6\n");

    let outcome = loader()
        .load(&source, &common::manual_settings(25.0).capacity, &LoadCancel::new())
        .unwrap();
    let failure = &outcome.failures[0];
    assert_eq!(failure.cycle, 2);
    assert!(failure.to_string().contains("Current[mA]"));
}

#[test]
fn test_every_file_failing_is_a_format_error() {
    let (_tmp, source) = common::segmented_source("cell", &[]);
    common::write_cycle_file(&source, "SaveData1.csv", common::SEGMENTED_HEADER);
    common::write_cycle_file(&source, "SaveData2.csv", "garbage\n");

    let err = loader()
        .load(&source, &common::manual_settings(25.0).capacity, &LoadCancel::new())
        .unwrap_err();
    assert!(matches!(err, CyclerError::SourceFormat { .. }));
}

#[test]
fn test_empty_restore_directory() {
    let (_tmp, source) = common::segmented_source("cell", &[]);
    let err = loader()
        .load(&source, &common::manual_settings(25.0).capacity, &LoadCancel::new())
        .unwrap_err();
    assert!(matches!(err, CyclerError::SourceFormat { .. }));
}

#[test]
fn test_cancelled_before_parsing() {
    let (_tmp, source) = common::segmented_source("cell", &[1, 2, 3, 4]);
    let cancel = LoadCancel::new();
    cancel.cancel();
    let err = loader()
        .load(&source, &common::manual_settings(25.0).capacity, &cancel)
        .unwrap_err();
    match err {
        CyclerError::Cancelled { location } => assert_eq!(location, source),
        other => panic!("unexpected error: {:?}", other),
    }
}
