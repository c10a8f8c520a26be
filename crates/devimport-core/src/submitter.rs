use std::sync::Arc;
use std::time::Duration;

use devimport_registry::{ConflictTarget, DeviceRegistry, RegistryError};
use tracing::{debug, warn};

use crate::validation::ValidRecord;

pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of one registration call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Registered(String),
    /// Device ID or EUI already claimed in the registry.
    Conflict(String, String),
    /// Any other backend or transport failure, including timeouts.
    Failed(String, String),
}

impl SubmissionOutcome {
    pub fn device_id(&self) -> &str {
        match self {
            SubmissionOutcome::Registered(id)
            | SubmissionOutcome::Conflict(id, _)
            | SubmissionOutcome::Failed(id, _) => id,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            SubmissionOutcome::Registered(_) => None,
            SubmissionOutcome::Conflict(_, reason) | SubmissionOutcome::Failed(_, reason) => {
                Some(reason)
            }
        }
    }
}

/// Sends valid records to the registry, one call per record, no retries.
#[derive(Clone)]
pub struct Submitter {
    registry: Arc<dyn DeviceRegistry>,
    timeout: Duration,
}

impl Submitter {
    pub fn new(registry: Arc<dyn DeviceRegistry>, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn submit(&self, record: ValidRecord) -> SubmissionOutcome {
        let device_id = record.device_id.clone();
        let dev_eui = record.dev_eui().map(str::to_string);
        let request = record.into_request();

        let result = tokio::time::timeout(self.timeout, self.registry.register_device(request)).await;

        let outcome = match result {
            Ok(Ok(_)) => SubmissionOutcome::Registered(device_id),
            Ok(Err(RegistryError::AlreadyExists { target, .. })) => {
                let reason = match (target, dev_eui) {
                    (ConflictTarget::DevEui, Some(dev_eui)) => {
                        format!("EUI already taken (`{dev_eui}`)")
                    }
                    (ConflictTarget::DevEui, None) => "EUI already taken".to_string(),
                    (ConflictTarget::DeviceId, _) => format!("ID already taken (`{device_id}`)"),
                };
                SubmissionOutcome::Conflict(device_id, reason)
            }
            Ok(Err(err)) => SubmissionOutcome::Failed(device_id, err.to_string()),
            Err(_) => SubmissionOutcome::Failed(
                device_id,
                format!("registration timed out after {}s", self.timeout.as_secs_f64()),
            ),
        };

        match &outcome {
            SubmissionOutcome::Registered(id) => debug!(device_id = %id, "device registered"),
            SubmissionOutcome::Conflict(id, reason) | SubmissionOutcome::Failed(id, reason) => {
                warn!(device_id = %id, reason = %reason, "device registration failed")
            }
        }
        outcome
    }
}
