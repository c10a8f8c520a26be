pub mod config;
pub mod defaults;
pub mod orchestrator;
pub mod progress;
pub mod submitter;
pub mod validation;
pub mod versions;

pub use config::{ConfigError, ImportConfig, RunSettings};
pub use defaults::{resolve, DefaultableField, FallbackConfig, ResolvedDeviceRecord};
pub use orchestrator::{
    preview_file, CancelHandle, ImportError, ImportEvent, ImportReceipt, ImportRun, RunState,
};
pub use progress::{
    FailureKind, ImportFailure, ImportSummary, ProgressAggregator, ProgressSnapshot,
    ReasonCount, RecordOutcome, RecordResult, SummaryClass,
};
pub use submitter::{SubmissionOutcome, Submitter};
pub use validation::{
    validate, DeviceIdSource, ValidRecord, ValidationError, ValidationOutcome, ValidationPolicy,
};
