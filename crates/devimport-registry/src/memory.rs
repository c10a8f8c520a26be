use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use devimport_parser::paths::non_empty_str_at;
use serde_json::Value;

use crate::{ConflictTarget, DeviceRegistry, RegisteredDevice, RegistrationRequest, RegistryError};

#[derive(Debug, Default)]
struct RegistryState {
    devices: BTreeMap<String, Value>,
    /// (JoinEUI, DevEUI) -> owning device ID.
    euis: HashMap<(String, String), String>,
    scripted_failures: HashMap<String, RegistryError>,
    delays: HashMap<String, Duration>,
    calls: Vec<String>,
}

/// Registry that keeps claimed device IDs and EUIs in memory. Clones share
/// state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDeviceRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl InMemoryDeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Makes every registration of `device_id` fail with `error`.
    pub fn fail_device(&self, device_id: impl Into<String>, error: RegistryError) {
        self.lock().scripted_failures.insert(device_id.into(), error);
    }

    /// Holds the registration of `device_id` for `delay` before answering.
    pub fn delay_device(&self, device_id: impl Into<String>, delay: Duration) {
        self.lock().delays.insert(device_id.into(), delay);
    }

    pub fn contains(&self, device_id: &str) -> bool {
        self.lock().devices.contains_key(device_id)
    }

    pub fn device(&self, device_id: &str) -> Option<Value> {
        self.lock().devices.get(device_id).cloned()
    }

    pub fn registered_ids(&self) -> Vec<String> {
        self.lock().devices.keys().cloned().collect()
    }

    /// Device IDs in the order registration calls arrived.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Removes the device record but keeps its EUIs claimed.
    pub fn deregister(&self, device_id: &str) -> bool {
        self.lock().devices.remove(device_id).is_some()
    }

    /// Removes the device record and releases its EUIs.
    pub fn purge(&self, device_id: &str) -> bool {
        let mut state = self.lock();
        state.euis.retain(|_, owner| owner != device_id);
        state.devices.remove(device_id).is_some()
    }
}

#[async_trait]
impl DeviceRegistry for InMemoryDeviceRegistry {
    async fn register_device(
        &self,
        request: RegistrationRequest,
    ) -> Result<RegisteredDevice, RegistryError> {
        let delay = {
            let mut state = self.lock();
            state.calls.push(request.device_id.clone());
            state.delays.get(&request.device_id).copied()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        if let Some(error) = state.scripted_failures.get(&request.device_id) {
            return Err(error.clone());
        }

        if state.devices.contains_key(&request.device_id) {
            return Err(RegistryError::AlreadyExists {
                target: ConflictTarget::DeviceId,
                message: format!("end device ID `{}` already taken", request.device_id),
            });
        }

        let eui_key = non_empty_str_at(&request.end_device, "ids.dev_eui").map(|dev_eui| {
            let join_eui = non_empty_str_at(&request.end_device, "ids.join_eui").unwrap_or("");
            (join_eui.to_ascii_uppercase(), dev_eui.to_ascii_uppercase())
        });

        if let Some(key) = &eui_key {
            if let Some(owner) = state.euis.get(key) {
                return Err(RegistryError::AlreadyExists {
                    target: ConflictTarget::DevEui,
                    message: format!(
                        "DevEUI `{}` with JoinEUI `{}` already registered by `{owner}`",
                        key.1, key.0
                    ),
                });
            }
        }

        let end_device = Value::Object(request.end_device);
        if let Some(key) = eui_key {
            state.euis.insert(key, request.device_id.clone());
        }
        state
            .devices
            .insert(request.device_id.clone(), end_device.clone());

        Ok(RegisteredDevice {
            device_id: request.device_id,
            end_device,
        })
    }
}
