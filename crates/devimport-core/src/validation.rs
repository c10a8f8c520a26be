use std::collections::BTreeSet;

use devimport_parser::model::{DEV_EUI_PATH, JOIN_EUI_PATH};
use devimport_registry::RegistrationRequest;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::defaults::{DefaultableField, ResolvedDeviceRecord};
use crate::versions::{MacVersion, PhyVersion};

const DEVICE_ID_MAX_LEN: usize = 36;

/// Where a record's device ID comes from when the file does not carry one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceIdSource {
    /// Only `ids.device_id` is accepted.
    #[default]
    Explicit,
    /// Missing IDs become `eui-<dev_eui in lowercase>`.
    DeriveFromDevEui,
}

/// Rules that depend on how the target deployment is set up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationPolicy {
    pub device_id_source: DeviceIdSource,
    /// Network-server managed devices cannot be created without a plan.
    pub require_frequency_plan: bool,
    pub require_lorawan_versions: bool,
    /// When set, plans outside this list are rejected.
    pub known_frequency_plans: Option<BTreeSet<String>>,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            device_id_source: DeviceIdSource::Explicit,
            require_frequency_plan: true,
            require_lorawan_versions: true,
            known_frequency_plans: None,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("device ID `` not found")]
    MissingDeviceId,
    #[error("invalid device ID `{0}`: use 3 to 36 lowercase letters, digits and single dashes")]
    InvalidDeviceId(String),
    #[error("invalid {field} `{value}`: expected 16 hexadecimal digits")]
    InvalidEui { field: &'static str, value: String },
    #[error("frequency plan `{0}` not found")]
    FrequencyPlanNotFound(String),
    #[error("LoRaWAN version `{0}` not found")]
    LorawanVersionNotFound(String),
    #[error("LoRaWAN PHY version `{0}` not found")]
    PhyVersionNotFound(String),
    #[error("LoRaWAN PHY version `{phy}` is not supported by LoRaWAN version `{mac}`")]
    IncompatibleVersions { mac: String, phy: String },
}

/// A record cleared for submission, with the ID it will be registered under.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidRecord {
    pub device_id: String,
    /// True when the ID was generated from the DevEUI.
    pub derived_id: bool,
    pub record: ResolvedDeviceRecord,
}

impl ValidRecord {
    pub fn dev_eui(&self) -> Option<&str> {
        self.record.dev_eui()
    }

    pub fn into_request(self) -> RegistrationRequest {
        let (end_device, field_mask) = self.record.into_parts();
        RegistrationRequest {
            device_id: self.device_id,
            end_device,
            field_mask,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    Valid(ValidRecord),
    Invalid {
        identifier: String,
        error: ValidationError,
    },
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid(_))
    }
}

/// Checks one resolved record. Identifier checks run first, then the
/// frequency plan, then the LoRaWAN versions; the first failure wins.
pub fn validate(record: ResolvedDeviceRecord, policy: &ValidationPolicy) -> ValidationOutcome {
    let identifier = record.identifier();
    match check(record, policy) {
        Ok(valid) => ValidationOutcome::Valid(valid),
        Err(error) => ValidationOutcome::Invalid { identifier, error },
    }
}

fn check(
    mut record: ResolvedDeviceRecord,
    policy: &ValidationPolicy,
) -> Result<ValidRecord, ValidationError> {
    check_eui(&record, "dev_eui", DEV_EUI_PATH)?;
    check_eui(&record, "join_eui", JOIN_EUI_PATH)?;

    let (device_id, derived_id) = match (record.device_id(), policy.device_id_source) {
        (Some(device_id), _) => (device_id.to_string(), false),
        (None, DeviceIdSource::DeriveFromDevEui) => match record.dev_eui() {
            Some(dev_eui) => (format!("eui-{}", dev_eui.to_ascii_lowercase()), true),
            None => return Err(ValidationError::MissingDeviceId),
        },
        (None, DeviceIdSource::Explicit) => return Err(ValidationError::MissingDeviceId),
    };
    if !is_valid_device_id(&device_id) {
        return Err(ValidationError::InvalidDeviceId(device_id));
    }

    check_frequency_plan(&record, policy)?;
    check_versions(&record, policy)?;

    // Stores the trimmed or derived ID so the payload matches the request.
    record.assign_device_id(&device_id);

    Ok(ValidRecord {
        device_id,
        derived_id,
        record,
    })
}

fn check_eui(
    record: &ResolvedDeviceRecord,
    field: &'static str,
    path: &str,
) -> Result<(), ValidationError> {
    let value = match record.get(path) {
        None | Some(Value::Null) => return Ok(()),
        Some(Value::String(value)) if value.trim().is_empty() => return Ok(()),
        Some(Value::String(value)) => value.trim().to_string(),
        Some(other) => other.to_string(),
    };

    if value.len() == 16 && value.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(())
    } else {
        Err(ValidationError::InvalidEui { field, value })
    }
}

/// Lowercase alphanumerics joined by single dashes, at least three
/// alphanumerics, at most 36 characters.
fn is_valid_device_id(device_id: &str) -> bool {
    if device_id.len() > DEVICE_ID_MAX_LEN
        || device_id.starts_with('-')
        || device_id.ends_with('-')
        || device_id.contains("--")
    {
        return false;
    }

    let mut alphanumerics = 0;
    for c in device_id.chars() {
        match c {
            'a'..='z' | '0'..='9' => alphanumerics += 1,
            '-' => {}
            _ => return false,
        }
    }
    alphanumerics >= 3
}

fn check_frequency_plan(
    record: &ResolvedDeviceRecord,
    policy: &ValidationPolicy,
) -> Result<(), ValidationError> {
    match record.defaultable(DefaultableField::FrequencyPlanId) {
        None if policy.require_frequency_plan => {
            Err(ValidationError::FrequencyPlanNotFound(String::new()))
        }
        None => Ok(()),
        Some(plan) => match &policy.known_frequency_plans {
            Some(known) if !known.contains(plan) => {
                Err(ValidationError::FrequencyPlanNotFound(plan.to_string()))
            }
            _ => Ok(()),
        },
    }
}

fn check_versions(
    record: &ResolvedDeviceRecord,
    policy: &ValidationPolicy,
) -> Result<(), ValidationError> {
    let mac = match record.defaultable(DefaultableField::LorawanVersion) {
        None if policy.require_lorawan_versions => {
            return Err(ValidationError::LorawanVersionNotFound(String::new()))
        }
        None => None,
        Some(code) => Some(
            code.parse::<MacVersion>()
                .map_err(|_| ValidationError::LorawanVersionNotFound(code.to_string()))?,
        ),
    };

    let phy = match record.defaultable(DefaultableField::LorawanPhyVersion) {
        None if policy.require_lorawan_versions => {
            return Err(ValidationError::PhyVersionNotFound(String::new()))
        }
        None => None,
        Some(code) => Some(
            code.parse::<PhyVersion>()
                .map_err(|_| ValidationError::PhyVersionNotFound(code.to_string()))?,
        ),
    };

    if let (Some(mac), Some(phy)) = (mac, phy) {
        if !mac.supports(phy) {
            return Err(ValidationError::IncompatibleVersions {
                mac: mac.to_string(),
                phy: phy.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::{resolve, FallbackConfig};
    use devimport_parser::model::DEVICE_ID_PATH;
    use devimport_parser::paths::leaf_paths;
    use devimport_parser::{FieldMask, RawDeviceRecord};
    use serde_json::json;

    fn resolved(end_device: Value) -> ResolvedDeviceRecord {
        let end_device = end_device.as_object().cloned().unwrap();
        let mask = FieldMask::from_paths(leaf_paths(&end_device));
        resolve(
            &RawDeviceRecord::new(0, end_device, mask),
            &FallbackConfig::default(),
        )
    }

    fn complete(device_id: &str) -> Value {
        json!({
            "ids": { "device_id": device_id, "dev_eui": "70B3D57ED0000001" },
            "frequency_plan_id": "EU_863_870_TTN",
            "lorawan_version": "MAC_V1_0_3",
            "lorawan_phy_version": "PHY_V1_0_3_REV_A"
        })
    }

    fn invalid(outcome: ValidationOutcome) -> ValidationError {
        match outcome {
            ValidationOutcome::Invalid { error, .. } => error,
            ValidationOutcome::Valid(valid) => panic!("expected invalid, got {valid:?}"),
        }
    }

    #[test]
    fn complete_record_is_valid() {
        let outcome = validate(resolved(complete("sensor-a")), &ValidationPolicy::default());
        let ValidationOutcome::Valid(valid) = outcome else {
            panic!("expected valid");
        };
        assert_eq!(valid.device_id, "sensor-a");
        assert!(!valid.derived_id);
    }

    #[test]
    fn padded_device_id_is_trimmed_in_payload() {
        let outcome = validate(resolved(complete("  sensor-a ")), &ValidationPolicy::default());
        let ValidationOutcome::Valid(valid) = outcome else {
            panic!("expected valid");
        };
        assert_eq!(valid.device_id, "sensor-a");
        assert_eq!(
            valid.record.get(DEVICE_ID_PATH),
            Some(&Value::String("sensor-a".into()))
        );
    }

    #[test]
    fn missing_frequency_plan_names_the_empty_field() {
        let mut device = complete("sensor-a");
        device.as_object_mut().unwrap().remove("frequency_plan_id");

        let error = invalid(validate(resolved(device), &ValidationPolicy::default()));
        assert_eq!(error.to_string(), "frequency plan `` not found");
    }

    #[test]
    fn frequency_plan_is_optional_when_policy_allows() {
        let mut device = complete("sensor-a");
        device.as_object_mut().unwrap().remove("frequency_plan_id");
        let policy = ValidationPolicy {
            require_frequency_plan: false,
            ..ValidationPolicy::default()
        };

        assert!(validate(resolved(device), &policy).is_valid());
    }

    #[test]
    fn unknown_frequency_plan_is_named() {
        let policy = ValidationPolicy {
            known_frequency_plans: Some(BTreeSet::from(["US_902_928_FSB_2".to_string()])),
            ..ValidationPolicy::default()
        };

        let error = invalid(validate(resolved(complete("sensor-a")), &policy));
        assert_eq!(error.to_string(), "frequency plan `EU_863_870_TTN` not found");
    }

    #[test]
    fn missing_device_id_is_rejected_unless_derived() {
        let mut device = complete("unused");
        device["ids"].as_object_mut().unwrap().remove("device_id");

        let error = invalid(validate(resolved(device.clone()), &ValidationPolicy::default()));
        assert_eq!(error, ValidationError::MissingDeviceId);

        let policy = ValidationPolicy {
            device_id_source: DeviceIdSource::DeriveFromDevEui,
            ..ValidationPolicy::default()
        };
        let ValidationOutcome::Valid(valid) = validate(resolved(device), &policy) else {
            panic!("expected derived id");
        };
        assert_eq!(valid.device_id, "eui-70b3d57ed0000001");
        assert!(valid.derived_id);

        let request = valid.into_request();
        assert!(request.field_mask.contains("ids.device_id"));
        assert_eq!(request.end_device["ids"]["device_id"], "eui-70b3d57ed0000001");
    }

    #[test]
    fn explicit_id_wins_over_derivation() {
        let policy = ValidationPolicy {
            device_id_source: DeviceIdSource::DeriveFromDevEui,
            ..ValidationPolicy::default()
        };
        let ValidationOutcome::Valid(valid) = validate(resolved(complete("sensor-a")), &policy)
        else {
            panic!("expected valid");
        };
        assert_eq!(valid.device_id, "sensor-a");
        assert!(!valid.derived_id);
    }

    #[test]
    fn device_id_grammar() {
        assert!(is_valid_device_id("abc"));
        assert!(is_valid_device_id("eui-70b3d57ed0000001"));
        assert!(!is_valid_device_id("ab"));
        assert!(!is_valid_device_id("a-b"));
        assert!(!is_valid_device_id("Sensor-A"));
        assert!(!is_valid_device_id("-abc"));
        assert!(!is_valid_device_id("abc-"));
        assert!(!is_valid_device_id("ab--c"));
        assert!(!is_valid_device_id(&"a".repeat(37)));
    }

    #[test]
    fn malformed_eui_is_rejected_before_anything_else() {
        let mut device = complete("sensor-a");
        device["ids"]["dev_eui"] = json!("70B3D57E");
        device.as_object_mut().unwrap().remove("frequency_plan_id");

        let error = invalid(validate(resolved(device), &ValidationPolicy::default()));
        assert_eq!(
            error,
            ValidationError::InvalidEui {
                field: "dev_eui",
                value: "70B3D57E".into()
            }
        );
    }

    #[test]
    fn versions_must_be_known_and_compatible() {
        let mut device = complete("sensor-a");
        device["lorawan_version"] = json!("MAC_V9");
        let error = invalid(validate(resolved(device), &ValidationPolicy::default()));
        assert_eq!(error.to_string(), "LoRaWAN version `MAC_V9` not found");

        let mut device = complete("sensor-a");
        device.as_object_mut().unwrap().remove("lorawan_phy_version");
        let error = invalid(validate(resolved(device), &ValidationPolicy::default()));
        assert_eq!(error.to_string(), "LoRaWAN PHY version `` not found");

        let mut device = complete("sensor-a");
        device["lorawan_phy_version"] = json!("PHY_V1_1_REV_B");
        let error = invalid(validate(resolved(device), &ValidationPolicy::default()));
        assert!(matches!(error, ValidationError::IncompatibleVersions { .. }));
    }
}
