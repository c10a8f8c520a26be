use std::fmt;

use devimport_parser::model::{record_identifier, DEVICE_ID_PATH, DEV_EUI_PATH};
use devimport_parser::paths::{self, set_value_at};
use devimport_parser::{FieldMask, RawDeviceRecord};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The three fields a batch-level fallback may fill in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultableField {
    FrequencyPlanId,
    LorawanVersion,
    LorawanPhyVersion,
}

impl DefaultableField {
    pub const ALL: [DefaultableField; 3] = [
        DefaultableField::FrequencyPlanId,
        DefaultableField::LorawanVersion,
        DefaultableField::LorawanPhyVersion,
    ];

    pub fn path(self) -> &'static str {
        match self {
            DefaultableField::FrequencyPlanId => "frequency_plan_id",
            DefaultableField::LorawanVersion => "lorawan_version",
            DefaultableField::LorawanPhyVersion => "lorawan_phy_version",
        }
    }
}

impl fmt::Display for DefaultableField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Caller-supplied values used only where a record leaves a gap.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub frequency_plan_id: Option<String>,
    pub lorawan_version: Option<String>,
    pub lorawan_phy_version: Option<String>,
}

impl FallbackConfig {
    /// Trimmed value for `field`; blank strings count as not supplied.
    pub fn value_for(&self, field: DefaultableField) -> Option<&str> {
        let value = match field {
            DefaultableField::FrequencyPlanId => self.frequency_plan_id.as_deref(),
            DefaultableField::LorawanVersion => self.lorawan_version.as_deref(),
            DefaultableField::LorawanPhyVersion => self.lorawan_phy_version.as_deref(),
        };
        value.map(str::trim).filter(|value| !value.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        DefaultableField::ALL
            .iter()
            .all(|field| self.value_for(*field).is_none())
    }

    /// Fields set in `overrides` replace the ones here.
    pub fn merged_with(&self, overrides: &FallbackConfig) -> FallbackConfig {
        FallbackConfig {
            frequency_plan_id: overrides
                .frequency_plan_id
                .clone()
                .or_else(|| self.frequency_plan_id.clone()),
            lorawan_version: overrides
                .lorawan_version
                .clone()
                .or_else(|| self.lorawan_version.clone()),
            lorawan_phy_version: overrides
                .lorawan_phy_version
                .clone()
                .or_else(|| self.lorawan_phy_version.clone()),
        }
    }
}

/// A decoded record with fallback values merged in.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDeviceRecord {
    index: usize,
    end_device: Map<String, Value>,
    field_mask: FieldMask,
    injected: Vec<DefaultableField>,
}

impl ResolvedDeviceRecord {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn end_device(&self) -> &Map<String, Value> {
        &self.end_device
    }

    /// Original mask plus every injected field.
    pub fn field_mask(&self) -> &FieldMask {
        &self.field_mask
    }

    /// Fields filled from the fallback, in resolution order.
    pub fn injected(&self) -> &[DefaultableField] {
        &self.injected
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        paths::value_at(&self.end_device, path)
    }

    pub fn str_at(&self, path: &str) -> Option<&str> {
        paths::non_empty_str_at(&self.end_device, path)
    }

    /// Value of a defaultable field, counted only when the mask covers it.
    pub fn defaultable(&self, field: DefaultableField) -> Option<&str> {
        if self.field_mask.covers(field.path()) {
            self.str_at(field.path())
        } else {
            None
        }
    }

    pub fn device_id(&self) -> Option<&str> {
        self.str_at(DEVICE_ID_PATH)
    }

    pub fn dev_eui(&self) -> Option<&str> {
        self.str_at(DEV_EUI_PATH)
    }

    pub fn identifier(&self) -> String {
        record_identifier(self.index, &self.end_device)
    }

    pub(crate) fn assign_device_id(&mut self, device_id: &str) {
        set_value_at(
            &mut self.end_device,
            DEVICE_ID_PATH,
            Value::String(device_id.to_string()),
        );
        self.field_mask.insert(DEVICE_ID_PATH);
    }

    pub fn into_parts(self) -> (Map<String, Value>, FieldMask) {
        (self.end_device, self.field_mask)
    }
}

/// Fills gaps in `record` from `fallback`. A field the record's mask already
/// names is left untouched, even when its value is empty.
pub fn resolve(record: &RawDeviceRecord, fallback: &FallbackConfig) -> ResolvedDeviceRecord {
    let mut end_device = record.end_device().clone();
    let mut field_mask = record.field_mask().clone();
    let mut injected = Vec::new();

    for field in DefaultableField::ALL {
        if record.field_mask().covers(field.path()) {
            continue;
        }
        if let Some(value) = fallback.value_for(field) {
            set_value_at(&mut end_device, field.path(), Value::String(value.to_string()));
            field_mask.insert(field.path());
            injected.push(field);
        }
    }

    ResolvedDeviceRecord {
        index: record.index(),
        end_device,
        field_mask,
        injected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(end_device: Value, mask: &[&str]) -> RawDeviceRecord {
        RawDeviceRecord::new(
            0,
            end_device.as_object().cloned().unwrap(),
            FieldMask::from_paths(mask.iter().copied()),
        )
    }

    fn full_fallback() -> FallbackConfig {
        FallbackConfig {
            frequency_plan_id: Some("EU_863_870_TTN".into()),
            lorawan_version: Some("MAC_V1_0_3".into()),
            lorawan_phy_version: Some("PHY_V1_0_3_REV_A".into()),
        }
    }

    #[test]
    fn injects_missing_fields_and_extends_mask() {
        let raw = record(
            json!({ "ids": { "device_id": "dev-1" }, "lorawan_version": "MAC_V1_1" }),
            &["ids.device_id", "lorawan_version"],
        );

        let resolved = resolve(&raw, &full_fallback());

        assert_eq!(
            resolved.injected(),
            [
                DefaultableField::FrequencyPlanId,
                DefaultableField::LorawanPhyVersion
            ]
        );
        assert_eq!(resolved.get("frequency_plan_id"), Some(&json!("EU_863_870_TTN")));
        assert_eq!(resolved.get("lorawan_version"), Some(&json!("MAC_V1_1")));
        assert!(resolved.field_mask().contains("lorawan_phy_version"));
        assert_eq!(resolved.field_mask().len(), 4);
        assert_eq!(raw.field_mask().len(), 2);
    }

    #[test]
    fn resolving_twice_gives_identical_records() {
        let raw = record(json!({ "ids": { "device_id": "dev-1" } }), &["ids.device_id"]);
        let fallback = FallbackConfig {
            frequency_plan_id: Some("US_902_928_FSB_2".into()),
            ..FallbackConfig::default()
        };

        assert_eq!(resolve(&raw, &fallback), resolve(&raw, &fallback));
    }

    #[test]
    fn fully_specified_record_is_untouched() {
        let raw = record(
            json!({
                "ids": { "device_id": "dev-1" },
                "frequency_plan_id": "AS_923",
                "lorawan_version": "MAC_V1_0_2",
                "lorawan_phy_version": "PHY_V1_0_2_REV_B"
            }),
            &[
                "ids.device_id",
                "frequency_plan_id",
                "lorawan_version",
                "lorawan_phy_version",
            ],
        );

        for fallback in [FallbackConfig::default(), full_fallback()] {
            let resolved = resolve(&raw, &fallback);
            assert!(resolved.injected().is_empty());
            assert_eq!(resolved.end_device(), raw.end_device());
            assert_eq!(resolved.field_mask(), raw.field_mask());
        }
    }

    #[test]
    fn blank_fallback_values_are_not_injected() {
        let raw = record(json!({ "ids": { "device_id": "dev-1" } }), &["ids.device_id"]);
        let fallback = FallbackConfig {
            frequency_plan_id: Some("   ".into()),
            ..FallbackConfig::default()
        };

        let resolved = resolve(&raw, &fallback);
        assert!(resolved.injected().is_empty());
        assert_eq!(resolved.get("frequency_plan_id"), None);
        assert!(fallback.is_empty());
    }

    #[test]
    fn masked_but_empty_field_is_not_overridden() {
        let raw = record(
            json!({ "ids": { "device_id": "dev-1" }, "frequency_plan_id": "" }),
            &["ids.device_id", "frequency_plan_id"],
        );

        let resolved = resolve(&raw, &full_fallback());
        assert_eq!(resolved.get("frequency_plan_id"), Some(&json!("")));
        assert_eq!(resolved.defaultable(DefaultableField::FrequencyPlanId), None);
    }

    #[test]
    fn merged_with_prefers_overrides() {
        let base = full_fallback();
        let overrides = FallbackConfig {
            frequency_plan_id: Some("AU_915_928_FSB_2".into()),
            ..FallbackConfig::default()
        };
        let merged = base.merged_with(&overrides);
        assert_eq!(merged.value_for(DefaultableField::FrequencyPlanId), Some("AU_915_928_FSB_2"));
        assert_eq!(merged.value_for(DefaultableField::LorawanVersion), Some("MAC_V1_0_3"));
    }
}
