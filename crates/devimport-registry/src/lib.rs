//! Registration backends for end devices: the remote registry the import
//! pipeline submits to, plus an in-memory stand-in for tests and dry runs.

mod http;
mod memory;

use std::fmt;

use async_trait::async_trait;
use devimport_parser::FieldMask;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

pub use http::{HttpDeviceRegistry, HttpRegistryConfig};
pub use memory::InMemoryDeviceRegistry;

/// One create call: the device body and the paths the backend should write.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistrationRequest {
    pub device_id: String,
    pub end_device: Map<String, Value>,
    pub field_mask: FieldMask,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredDevice {
    pub device_id: String,
    pub end_device: Value,
}

/// Which unique key an `AlreadyExists` error collided on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictTarget {
    DeviceId,
    DevEui,
}

impl fmt::Display for ConflictTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictTarget::DeviceId => f.write_str("ID"),
            ConflictTarget::DevEui => f.write_str("EUI"),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RegistryError {
    #[error("{target} already exists: {message}")]
    AlreadyExists {
        target: ConflictTarget,
        message: String,
    },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("registry unavailable: {0}")]
    Unavailable(String),
    #[error("registry returned status {status}: {message}")]
    Backend { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl RegistryError {
    pub fn is_already_exists(&self) -> bool {
        matches!(self, RegistryError::AlreadyExists { .. })
    }
}

#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    async fn register_device(
        &self,
        request: RegistrationRequest,
    ) -> Result<RegisteredDevice, RegistryError>;
}
