use crate::errors::FormatError;

const UTF8_BOM: &str = "\u{feff}";

/// Interprets `contents` as UTF-8 text, dropping a leading byte-order mark.
pub(super) fn utf8_text<'a>(format: &'static str, contents: &'a [u8]) -> Result<&'a str, FormatError> {
    let text = std::str::from_utf8(contents)
        .map_err(|source| FormatError::Encoding { format, source })?;
    Ok(text.strip_prefix(UTF8_BOM).unwrap_or(text))
}
