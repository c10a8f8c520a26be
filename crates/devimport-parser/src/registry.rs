use once_cell::sync::Lazy;

use crate::errors::FormatError;
use crate::formats::{CsvTableFormat, TtnJsonFormat};
use crate::model::RawDeviceRecord;

/// A decoder for one input file format.
pub trait DeviceFormat: Send + Sync {
    fn code(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn decode(&self, contents: &[u8]) -> Result<Vec<RawDeviceRecord>, FormatError>;
}

#[derive(Debug, Clone)]
pub struct FormatDescriptor {
    pub code: &'static str,
    pub description: &'static str,
}

static FORMATS: Lazy<Vec<&'static dyn DeviceFormat>> = Lazy::new(|| {
    vec![
        &TtnJsonFormat as &dyn DeviceFormat,
        &CsvTableFormat as &dyn DeviceFormat,
    ]
});

pub fn all_formats() -> Vec<FormatDescriptor> {
    FORMATS
        .iter()
        .map(|format| FormatDescriptor {
            code: format.code(),
            description: format.description(),
        })
        .collect()
}

pub fn find_format(code: &str) -> Option<&'static dyn DeviceFormat> {
    let code = code.trim();
    FORMATS
        .iter()
        .copied()
        .find(|format| format.code().eq_ignore_ascii_case(code))
}

/// Decodes `contents` with the format registered under `format_id`. Records
/// come back in file order.
pub fn decode(contents: &[u8], format_id: &str) -> Result<Vec<RawDeviceRecord>, FormatError> {
    let format = find_format(format_id).ok_or_else(|| FormatError::UnknownFormat {
        format: format_id.to_string(),
        known: FORMATS
            .iter()
            .map(|format| format.code())
            .collect::<Vec<_>>()
            .join(", "),
    })?;
    format.decode(contents)
}
