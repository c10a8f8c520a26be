use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::paths;

pub const DEVICE_ID_PATH: &str = "ids.device_id";
pub const DEV_EUI_PATH: &str = "ids.dev_eui";
pub const JOIN_EUI_PATH: &str = "ids.join_eui";

/// Set of dotted field paths a registration request intends to write.
///
/// Serializes in the gateway shape `{ "paths": [...] }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMask {
    paths: BTreeSet<String>,
}

impl FieldMask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    /// Adds a path; returns `false` when it was already present.
    pub fn insert(&mut self, path: impl Into<String>) -> bool {
        self.paths.insert(path.into())
    }

    /// Exact membership.
    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    /// True when `path` or one of its ancestors is in the mask.
    pub fn covers(&self, path: &str) -> bool {
        if self.contains(path) {
            return true;
        }
        path.match_indices('.')
            .any(|(idx, _)| self.paths.contains(&path[..idx]))
    }

    pub fn union(&self, other: &FieldMask) -> FieldMask {
        FieldMask {
            paths: self.paths.union(&other.paths).cloned().collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.paths.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl fmt::Display for FieldMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<&str> = self.iter().collect();
        f.write_str(&joined.join(","))
    }
}

/// One device entry exactly as it appeared in the input file.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDeviceRecord {
    index: usize,
    end_device: Map<String, Value>,
    field_mask: FieldMask,
}

impl RawDeviceRecord {
    pub fn new(index: usize, end_device: Map<String, Value>, field_mask: FieldMask) -> Self {
        Self {
            index,
            end_device,
            field_mask,
        }
    }

    /// Zero-based position in the file.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn end_device(&self) -> &Map<String, Value> {
        &self.end_device
    }

    pub fn field_mask(&self) -> &FieldMask {
        &self.field_mask
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        paths::value_at(&self.end_device, path)
    }

    pub fn device_id(&self) -> Option<&str> {
        paths::non_empty_str_at(&self.end_device, DEVICE_ID_PATH)
    }

    pub fn dev_eui(&self) -> Option<&str> {
        paths::non_empty_str_at(&self.end_device, DEV_EUI_PATH)
    }

    pub fn join_eui(&self) -> Option<&str> {
        paths::non_empty_str_at(&self.end_device, JOIN_EUI_PATH)
    }

    pub fn identifier(&self) -> String {
        record_identifier(self.index, &self.end_device)
    }

    pub fn into_parts(self) -> (usize, Map<String, Value>, FieldMask) {
        (self.index, self.end_device, self.field_mask)
    }
}

/// Label for the device at `index`: its ID, else its DevEUI, else its
/// one-based position in the file.
pub fn record_identifier(index: usize, end_device: &Map<String, Value>) -> String {
    if let Some(device_id) = paths::non_empty_str_at(end_device, DEVICE_ID_PATH) {
        device_id.to_string()
    } else if let Some(dev_eui) = paths::non_empty_str_at(end_device, DEV_EUI_PATH) {
        format!("dev_eui:{dev_eui}")
    } else {
        format!("entry #{}", index + 1)
    }
}
