use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::orchestrator::ImportEvent;
use crate::submitter::SubmissionOutcome;
use crate::validation::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Validation,
    Conflict,
    Submission,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureKind::Validation => "validation",
            FailureKind::Conflict => "conflict",
            FailureKind::Submission => "submission",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportFailure {
    pub index: usize,
    pub identifier: String,
    pub kind: FailureKind,
    pub reason: String,
}

/// What happened to one record.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordResult {
    Rejected(ValidationError),
    Submitted(SubmissionOutcome),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordOutcome {
    pub index: usize,
    pub identifier: String,
    pub result: RecordResult,
}

impl RecordOutcome {
    fn into_failure(self) -> Option<ImportFailure> {
        let (kind, reason) = match self.result {
            RecordResult::Submitted(SubmissionOutcome::Registered(_)) => return None,
            RecordResult::Rejected(error) => (FailureKind::Validation, error.to_string()),
            RecordResult::Submitted(SubmissionOutcome::Conflict(_, reason)) => {
                (FailureKind::Conflict, reason)
            }
            RecordResult::Submitted(SubmissionOutcome::Failed(_, reason)) => {
                (FailureKind::Submission, reason)
            }
        };
        Some(ImportFailure {
            index: self.index,
            identifier: self.identifier,
            kind,
            reason,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub processed_count: usize,
    pub total: usize,
    pub percent: f64,
}

impl ProgressSnapshot {
    fn new(processed_count: usize, total: usize) -> Self {
        let percent = if total == 0 {
            100.0
        } else {
            // Truncated so an unfinished run never reads as 100%.
            (processed_count * 10_000 / total) as f64 / 100.0
        };
        Self {
            processed_count,
            total,
            percent,
        }
    }
}

impl fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} ({:.2}% finished)",
            self.processed_count, self.total, self.percent
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryClass {
    AllSucceeded,
    PartialSuccess,
    AllFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReasonCount {
    pub reason: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub total: usize,
    pub processed_count: usize,
    pub success_count: usize,
    pub failures: Vec<ImportFailure>,
}

impl ImportSummary {
    pub fn classification(&self) -> SummaryClass {
        if self.success_count == self.total {
            SummaryClass::AllSucceeded
        } else if self.success_count == 0 {
            SummaryClass::AllFailed
        } else {
            SummaryClass::PartialSuccess
        }
    }

    /// True when the run stopped before every record was processed.
    pub fn is_incomplete(&self) -> bool {
        self.processed_count < self.total
    }

    pub fn message(&self) -> String {
        if self.is_incomplete() {
            return format!(
                "Import cancelled after {} of {} end devices; {} imported successfully",
                self.processed_count, self.total, self.success_count
            );
        }
        match self.classification() {
            SummaryClass::AllSucceeded => format!(
                "All {} end devices were imported successfully",
                self.success_count
            ),
            SummaryClass::PartialSuccess => format!(
                "Successfully converted {} of {} end devices",
                self.success_count, self.total
            ),
            SummaryClass::AllFailed => format!(
                "None of the {} end devices could be imported",
                self.total
            ),
        }
    }

    /// Failures grouped by reason, most frequent first.
    pub fn failures_by_reason(&self) -> Vec<ReasonCount> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for failure in &self.failures {
            *counts.entry(failure.reason.as_str()).or_default() += 1;
        }
        let mut entries: Vec<(&str, usize)> = counts.into_iter().collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        entries
            .into_iter()
            .map(|(reason, count)| ReasonCount {
                reason: reason.to_string(),
                count,
            })
            .collect()
    }

    pub fn count_of(&self, kind: FailureKind) -> usize {
        self.failures.iter().filter(|f| f.kind == kind).count()
    }
}

/// Sole writer of a run's summary.
#[derive(Debug)]
pub struct ProgressAggregator {
    summary: ImportSummary,
    events: Option<UnboundedSender<ImportEvent>>,
}

impl ProgressAggregator {
    pub fn new(total: usize) -> Self {
        Self {
            summary: ImportSummary {
                total,
                ..ImportSummary::default()
            },
            events: None,
        }
    }

    pub fn with_events(mut self, events: Option<UnboundedSender<ImportEvent>>) -> Self {
        self.events = events;
        self
    }

    pub fn summary(&self) -> &ImportSummary {
        &self.summary
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot::new(self.summary.processed_count, self.summary.total)
    }

    pub fn on_outcome(&mut self, outcome: RecordOutcome) -> ProgressSnapshot {
        match outcome.into_failure() {
            None => self.summary.success_count += 1,
            Some(failure) => self.summary.failures.push(failure),
        }
        self.summary.processed_count += 1;

        let snapshot = self.snapshot();
        if let Some(events) = &self.events {
            // Receiver may be gone; progress is advisory.
            let _ = events.send(ImportEvent::Progress(snapshot));
        }
        snapshot
    }

    pub fn finalize(self) -> ImportSummary {
        self.summary
    }
}
