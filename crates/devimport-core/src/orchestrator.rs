use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use blake3::Hasher;
use chrono::{DateTime, Utc};
use devimport_parser::{FormatError, RawDeviceRecord};
use devimport_registry::DeviceRegistry;
use futures::{future, stream, StreamExt};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::RunSettings;
use crate::defaults::{resolve, FallbackConfig};
use crate::progress::{
    ImportSummary, ProgressAggregator, ProgressSnapshot, RecordOutcome, RecordResult,
    SummaryClass,
};
use crate::submitter::Submitter;
use crate::validation::{validate, ValidationOutcome, ValidationPolicy};

pub const MAX_CONCURRENCY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Pending,
    Running,
    Finished,
    Aborted,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunState::Pending => "pending",
            RunState::Running => "running",
            RunState::Finished => "finished",
            RunState::Aborted => "aborted",
        })
    }
}

/// Requests cancellation of a running import. Records already handed to the
/// registry still complete and are counted.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub enum ImportEvent {
    Started { run_id: Uuid, total: usize },
    Progress(ProgressSnapshot),
    Completed(ImportReceipt),
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportReceipt {
    pub run_id: Uuid,
    pub format: String,
    pub file_hash: String,
    pub state: RunState,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub summary: ImportSummary,
    pub classification: SummaryClass,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error("import run {0} has already been started")]
    AlreadyStarted(Uuid),
}

/// One pass of one file through the pipeline.
pub struct ImportRun {
    id: Uuid,
    state: RunState,
    submitter: Submitter,
    validation: ValidationPolicy,
    concurrency: usize,
    cancel: CancelHandle,
    events: Option<UnboundedSender<ImportEvent>>,
    summary: Option<ImportSummary>,
}

impl ImportRun {
    pub fn new(registry: Arc<dyn DeviceRegistry>, settings: RunSettings) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: RunState::Pending,
            submitter: Submitter::new(registry, settings.submit_timeout),
            validation: settings.validation,
            concurrency: settings.concurrency.clamp(1, MAX_CONCURRENCY),
            cancel: CancelHandle::default(),
            events: None,
            summary: None,
        }
    }

    pub fn with_events(mut self, events: UnboundedSender<ImportEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Final or partial summary; `None` until records have been decoded.
    pub fn summary(&self) -> Option<&ImportSummary> {
        self.summary.as_ref()
    }

    /// Decodes `contents` and drives every record through resolution,
    /// validation and submission. Only a decode failure is returned as an
    /// error; per-record problems end up in the summary.
    pub async fn run(
        &mut self,
        contents: &[u8],
        format_id: &str,
        fallback: &FallbackConfig,
    ) -> Result<ImportReceipt, ImportError> {
        if self.state != RunState::Pending {
            return Err(ImportError::AlreadyStarted(self.id));
        }

        let started_at = Utc::now();
        let file_hash = compute_hash(contents);

        let records = match devimport_parser::decode(contents, format_id) {
            Ok(records) => records,
            Err(err) => {
                self.state = RunState::Aborted;
                warn!(run_id = %self.id, format = format_id, error = %err, "import aborted: file could not be decoded");
                return Err(err.into());
            }
        };

        let total = records.len();
        self.state = RunState::Running;
        info!(
            run_id = %self.id,
            format = format_id,
            file_hash = %file_hash,
            total,
            concurrency = self.concurrency,
            "import started"
        );
        self.emit(ImportEvent::Started {
            run_id: self.id,
            total,
        });

        let mut aggregator = ProgressAggregator::new(total).with_events(self.events.clone());
        let cancel = self.cancel.clone();
        let submitter = &self.submitter;
        let policy = &self.validation;

        // `buffered` yields in decode order, so outcomes reach the aggregator
        // deterministically whatever order the registry answers in.
        let mut outcomes = stream::iter(records)
            .take_while(|_| future::ready(!cancel.is_cancelled()))
            .map(|record| process_record(record, fallback, policy, submitter))
            .buffered(self.concurrency);

        while let Some(outcome) = outcomes.next().await {
            aggregator.on_outcome(outcome);
        }
        drop(outcomes);

        let summary = aggregator.finalize();
        self.state = if cancel.is_cancelled() && summary.processed_count < total {
            warn!(
                run_id = %self.id,
                processed = summary.processed_count,
                total,
                "import cancelled"
            );
            RunState::Aborted
        } else {
            RunState::Finished
        };

        let receipt = ImportReceipt {
            run_id: self.id,
            format: format_id.to_string(),
            file_hash,
            state: self.state,
            started_at,
            finished_at: Utc::now(),
            classification: summary.classification(),
            message: summary.message(),
            summary: summary.clone(),
        };
        self.summary = Some(summary);

        info!(
            run_id = %self.id,
            state = ?receipt.state,
            succeeded = receipt.summary.success_count,
            failed = receipt.summary.failures.len(),
            "{}",
            receipt.message
        );
        self.emit(ImportEvent::Completed(receipt.clone()));
        Ok(receipt)
    }

    fn emit(&self, event: ImportEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}

async fn process_record(
    record: RawDeviceRecord,
    fallback: &FallbackConfig,
    policy: &ValidationPolicy,
    submitter: &Submitter,
) -> RecordOutcome {
    let resolved = resolve(&record, fallback);
    let index = resolved.index();
    if !resolved.injected().is_empty() {
        debug!(index, injected = ?resolved.injected(), "applied fallback values");
    }

    match validate(resolved, policy) {
        ValidationOutcome::Invalid { identifier, error } => {
            warn!(index, identifier = %identifier, reason = %error, "device rejected");
            RecordOutcome {
                index,
                identifier,
                result: RecordResult::Rejected(error),
            }
        }
        ValidationOutcome::Valid(valid) => {
            let identifier = valid.device_id.clone();
            let outcome = submitter.submit(valid).await;
            RecordOutcome {
                index,
                identifier,
                result: RecordResult::Submitted(outcome),
            }
        }
    }
}

/// Decodes, resolves and validates without contacting the registry.
pub fn preview_file(
    contents: &[u8],
    format_id: &str,
    fallback: &FallbackConfig,
    policy: &ValidationPolicy,
) -> Result<Vec<ValidationOutcome>, FormatError> {
    let records = devimport_parser::decode(contents, format_id)?;
    Ok(records
        .iter()
        .map(|record| validate(resolve(record, fallback), policy))
        .collect())
}

pub fn compute_hash(contents: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(contents);
    hasher.finalize().to_hex().to_string()
}
