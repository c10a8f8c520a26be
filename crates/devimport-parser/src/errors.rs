use thiserror::Error;

/// Fatal decode failures. Any of these means no record in the file can be
/// trusted, so the whole import is abandoned before submission starts.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("unknown format `{format}`; known formats: {known}")]
    UnknownFormat { format: String, known: String },

    #[error("{format} input is not valid UTF-8: {source}")]
    Encoding {
        format: &'static str,
        #[source]
        source: std::str::Utf8Error,
    },

    #[error("{format} input is not valid JSON: {source}")]
    Json {
        format: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{format} CSV error: {source}")]
    Csv {
        format: &'static str,
        #[source]
        source: csv::Error,
    },

    #[error("{format} structure invalid: {message}")]
    Structure {
        format: &'static str,
        message: String,
    },

    #[error("{format} entry {position} invalid: {message}")]
    Entry {
        format: &'static str,
        /// One-based position of the entry in the file.
        position: usize,
        message: String,
    },
}

impl FormatError {
    pub(crate) fn structure(format: &'static str, message: impl Into<String>) -> Self {
        Self::Structure {
            format,
            message: message.into(),
        }
    }

    pub(crate) fn entry(format: &'static str, index: usize, message: impl Into<String>) -> Self {
        Self::Entry {
            format,
            position: index + 1,
            message: message.into(),
        }
    }
}
