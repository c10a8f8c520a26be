use std::collections::HashSet;

use csv::{ReaderBuilder, StringRecord, Trim};
use serde_json::{Map, Value};

use crate::errors::FormatError;
use crate::model::{FieldMask, RawDeviceRecord};
use crate::paths::set_value_at;
use crate::registry::DeviceFormat;

use super::common::utf8_text;

/// Header row of dotted field paths, one device per following row. Blank
/// cells are left out of both the device and its field mask.
pub struct CsvTableFormat;

impl CsvTableFormat {
    const NAME: &'static str = "csv";

    fn validate_header(header: &StringRecord) -> Result<Vec<String>, FormatError> {
        if header.is_empty() || header.iter().all(|column| column.is_empty()) {
            return Err(FormatError::structure(Self::NAME, "missing header row"));
        }

        let mut seen = HashSet::new();
        let mut columns = Vec::with_capacity(header.len());
        for (position, column) in header.iter().enumerate() {
            if column.is_empty() || column.split('.').any(str::is_empty) {
                return Err(FormatError::structure(
                    Self::NAME,
                    format!("column {} has an invalid field path `{column}`", position + 1),
                ));
            }
            if !seen.insert(column) {
                return Err(FormatError::structure(
                    Self::NAME,
                    format!("duplicate column `{column}`"),
                ));
            }
            columns.push(column.to_string());
        }

        for column in &columns {
            let prefix = format!("{column}.");
            if let Some(nested) = columns.iter().find(|other| other.starts_with(&prefix)) {
                return Err(FormatError::structure(
                    Self::NAME,
                    format!("column `{column}` conflicts with `{nested}`"),
                ));
            }
        }

        Ok(columns)
    }

    fn cell_value(cell: &str) -> Value {
        match cell {
            "true" | "TRUE" | "True" => Value::Bool(true),
            "false" | "FALSE" | "False" => Value::Bool(false),
            other => Value::String(other.to_string()),
        }
    }
}

impl DeviceFormat for CsvTableFormat {
    fn code(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        "CSV with a header row of dotted end device field paths"
    }

    fn decode(&self, contents: &[u8]) -> Result<Vec<RawDeviceRecord>, FormatError> {
        let text = utf8_text(Self::NAME, contents)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(Trim::All)
            .from_reader(text.as_bytes());

        let header = reader.headers().map_err(|source| FormatError::Csv {
            format: Self::NAME,
            source,
        })?;
        let columns = Self::validate_header(header)?;

        let mut records = Vec::new();
        for (index, row) in reader.records().enumerate() {
            let row = row.map_err(|source| FormatError::Csv {
                format: Self::NAME,
                source,
            })?;

            let mut end_device = Map::new();
            let mut field_mask = FieldMask::new();
            for (column, cell) in columns.iter().zip(row.iter()) {
                if cell.is_empty() {
                    continue;
                }
                set_value_at(&mut end_device, column, Self::cell_value(cell));
                field_mask.insert(column.as_str());
            }

            records.push(RawDeviceRecord::new(index, end_device, field_mask));
        }

        Ok(records)
    }
}
