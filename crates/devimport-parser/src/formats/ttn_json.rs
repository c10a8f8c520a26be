use serde_json::{Map, Value};

use crate::errors::FormatError;
use crate::model::{FieldMask, RawDeviceRecord};
use crate::paths::leaf_paths;
use crate::registry::DeviceFormat;

use super::common::utf8_text;

/// The Things Stack JSON container:
/// `{ "end_devices": [ { "end_device": {...}, "field_mask": { "paths": [...] } } ] }`.
pub struct TtnJsonFormat;

impl TtnJsonFormat {
    const NAME: &'static str = "ttn-json";

    fn decode_entry(index: usize, entry: &Value) -> Result<RawDeviceRecord, FormatError> {
        let entry = entry
            .as_object()
            .ok_or_else(|| FormatError::entry(Self::NAME, index, "entry is not an object"))?;

        let end_device = match entry.get("end_device") {
            Some(Value::Object(device)) => device.clone(),
            Some(_) => {
                return Err(FormatError::entry(
                    Self::NAME,
                    index,
                    "`end_device` is not an object",
                ))
            }
            None => {
                return Err(FormatError::entry(
                    Self::NAME,
                    index,
                    "missing `end_device`",
                ))
            }
        };

        let field_mask = match entry.get("field_mask") {
            None | Some(Value::Null) => FieldMask::from_paths(leaf_paths(&end_device)),
            Some(Value::Object(mask)) => Self::parse_field_mask(index, mask)?,
            Some(_) => {
                return Err(FormatError::entry(
                    Self::NAME,
                    index,
                    "`field_mask` is not an object",
                ))
            }
        };

        Ok(RawDeviceRecord::new(index, end_device, field_mask))
    }

    fn parse_field_mask(index: usize, mask: &Map<String, Value>) -> Result<FieldMask, FormatError> {
        let paths = match mask.get("paths") {
            None | Some(Value::Null) => return Ok(FieldMask::new()),
            Some(Value::Array(paths)) => paths,
            Some(_) => {
                return Err(FormatError::entry(
                    Self::NAME,
                    index,
                    "`field_mask.paths` is not an array",
                ))
            }
        };

        let mut field_mask = FieldMask::new();
        for path in paths {
            let path = path
                .as_str()
                .map(str::trim)
                .filter(|path| !path.is_empty())
                .ok_or_else(|| {
                    FormatError::entry(
                        Self::NAME,
                        index,
                        format!("field mask path {path} is not a non-empty string"),
                    )
                })?;
            field_mask.insert(path);
        }
        Ok(field_mask)
    }
}

impl DeviceFormat for TtnJsonFormat {
    fn code(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        "The Things Stack JSON: end_devices array of end_device + field_mask entries"
    }

    fn decode(&self, contents: &[u8]) -> Result<Vec<RawDeviceRecord>, FormatError> {
        let text = utf8_text(Self::NAME, contents)?;
        let document: Value = serde_json::from_str(text).map_err(|source| FormatError::Json {
            format: Self::NAME,
            source,
        })?;

        let root = document
            .as_object()
            .ok_or_else(|| FormatError::structure(Self::NAME, "top level is not an object"))?;
        let entries = match root.get("end_devices") {
            Some(Value::Array(entries)) => entries,
            Some(_) => {
                return Err(FormatError::structure(
                    Self::NAME,
                    "`end_devices` is not an array",
                ))
            }
            None => {
                return Err(FormatError::structure(
                    Self::NAME,
                    "missing `end_devices` array",
                ))
            }
        };

        entries
            .iter()
            .enumerate()
            .map(|(index, entry)| Self::decode_entry(index, entry))
            .collect()
    }
}
