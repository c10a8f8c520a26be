use std::fs;
use std::path::PathBuf;

use serde_json::json;

use crate::errors::FormatError;
use crate::formats::{CsvTableFormat, TtnJsonFormat};
use crate::registry::DeviceFormat;
use crate::{all_formats, decode, find_format};

fn fixture(path: &str) -> Vec<u8> {
    let base = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let full_path = base.join("tests/data").join(path);
    fs::read(&full_path)
        .unwrap_or_else(|err| panic!("failed to read fixture {}: {}", full_path.display(), err))
}

#[test]
fn decodes_ttn_json_in_file_order() {
    let records = decode(&fixture("three_devices.json"), "ttn-json").expect("decode failed");

    let ids: Vec<&str> = records
        .iter()
        .map(|record| record.device_id().expect("device id"))
        .collect();
    assert_eq!(ids, ["sensor-a", "sensor-b", "sensor-c"]);
    assert_eq!(
        records.iter().map(|r| r.index()).collect::<Vec<_>>(),
        [0, 1, 2]
    );

    let first = &records[0];
    assert_eq!(first.field_mask().len(), 9);
    assert!(first.field_mask().contains("frequency_plan_id"));
    assert!(!first.field_mask().contains("ids.application_ids.application_id"));
    assert_eq!(first.dev_eui(), Some("70B3D57ED0000001"));
}

#[test]
fn ttn_json_derives_mask_when_entry_has_none() {
    let records = decode(&fixture("three_devices.json"), "ttn-json").expect("decode failed");
    let third = &records[2];

    assert!(third.field_mask().contains("ids.application_ids.application_id"));
    assert!(third.field_mask().contains("root_keys.nwk_key.key"));
    assert!(third.field_mask().contains("lorawan_phy_version"));
}

#[test]
fn ttn_json_rejects_non_array_end_devices() {
    let err = decode(&fixture("malformed_top_level.json"), "ttn-json").unwrap_err();
    match err {
        FormatError::Structure { format, message } => {
            assert_eq!(format, "ttn-json");
            assert!(message.contains("end_devices"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn ttn_json_rejects_entries_that_are_not_objects() {
    let body = json!({
        "end_devices": [
            { "end_device": { "ids": { "device_id": "ok-device" } } },
            "not-an-entry"
        ]
    });
    let err = TtnJsonFormat
        .decode(body.to_string().as_bytes())
        .unwrap_err();
    assert!(matches!(err, FormatError::Entry { position: 2, .. }));
}

#[test]
fn ttn_json_rejects_non_string_mask_paths() {
    let body = json!({
        "end_devices": [
            { "end_device": { "ids": { "device_id": "dev" } }, "field_mask": { "paths": ["ids.device_id", 7] } }
        ]
    });
    let err = TtnJsonFormat
        .decode(body.to_string().as_bytes())
        .unwrap_err();
    assert!(matches!(err, FormatError::Entry { position: 1, .. }));
}

#[test]
fn ttn_json_rejects_invalid_json() {
    let err = decode(b"{\"end_devices\": [", "ttn-json").unwrap_err();
    assert!(matches!(err, FormatError::Json { .. }));
}

#[test]
fn ttn_json_accepts_empty_device_list() {
    let records = decode(br#"{ "end_devices": [] }"#, "ttn-json").expect("decode failed");
    assert!(records.is_empty());
}

#[test]
fn decodes_csv_rows_with_blank_cells_outside_the_mask() {
    let records = CsvTableFormat
        .decode(&fixture("devices.csv"))
        .expect("csv decode failed");
    assert_eq!(records.len(), 3);

    let first = &records[0];
    assert_eq!(first.device_id(), Some("meter-01"));
    assert_eq!(
        first.get("root_keys.app_key.key"),
        Some(&json!("0123456789ABCDEF0123456789ABCDEF"))
    );
    assert_eq!(first.get("supports_join"), Some(&json!(true)));
    assert!(first.field_mask().contains("lorawan_version"));

    let second = &records[1];
    assert!(second.get("frequency_plan_id").is_none());
    assert!(!second.field_mask().contains("frequency_plan_id"));
    assert!(!second.field_mask().contains("lorawan_version"));

    let third = &records[2];
    assert_eq!(third.device_id(), None);
    assert_eq!(third.identifier(), "dev_eui:70B3D57ED0000203");
}

#[test]
fn csv_rejects_ragged_rows() {
    let body = "ids.device_id,frequency_plan_id\nmeter-01,EU_863_870_TTN,extra\n";
    let err = decode(body.as_bytes(), "csv").unwrap_err();
    assert!(matches!(err, FormatError::Csv { .. }));
}

#[test]
fn csv_rejects_conflicting_columns() {
    let body = "ids,ids.device_id\nx,meter-01\n";
    let err = decode(body.as_bytes(), "csv").unwrap_err();
    match err {
        FormatError::Structure { message, .. } => assert!(message.contains("conflicts")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn csv_rejects_missing_header() {
    let err = decode(b"", "csv").unwrap_err();
    assert!(matches!(err, FormatError::Structure { .. }));
}

#[test]
fn unknown_format_lists_registered_codes() {
    let err = decode(b"{}", "chirpstack").unwrap_err();
    match err {
        FormatError::UnknownFormat { format, known } => {
            assert_eq!(format, "chirpstack");
            assert!(known.contains("ttn-json"));
            assert!(known.contains("csv"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn format_lookup_is_case_insensitive() {
    assert!(find_format("TTN-JSON").is_some());
    assert_eq!(all_formats().len(), 2);
}
