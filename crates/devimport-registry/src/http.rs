use std::time::Duration;

use async_trait::async_trait;
use devimport_parser::paths::set_value_at;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::{ConflictTarget, DeviceRegistry, RegisteredDevice, RegistrationRequest, RegistryError};

#[derive(Debug, Clone)]
pub struct HttpRegistryConfig {
    pub base_url: String,
    pub application_id: String,
    pub api_key: Option<String>,
    pub request_timeout: Duration,
}

impl Default for HttpRegistryConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:1885".to_string(),
            application_id: String::new(),
            api_key: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Registry reached over the gRPC-gateway JSON API:
/// `POST {base_url}/api/v3/applications/{application_id}/devices`.
#[derive(Clone)]
pub struct HttpDeviceRegistry {
    client: Client,
    devices_url: String,
    application_id: String,
    api_key: Option<String>,
}

impl HttpDeviceRegistry {
    pub fn new(config: HttpRegistryConfig) -> Result<Self, RegistryError> {
        if config.application_id.trim().is_empty() {
            return Err(RegistryError::Configuration(
                "application id cannot be empty".into(),
            ));
        }
        if config.base_url.trim().is_empty() {
            return Err(RegistryError::Configuration(
                "base url cannot be empty".into(),
            ));
        }

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| RegistryError::Configuration(err.to_string()))?;

        let devices_url = format!(
            "{}/api/v3/applications/{}/devices",
            config.base_url.trim_end_matches('/'),
            config.application_id
        );

        Ok(Self {
            client,
            devices_url,
            application_id: config.application_id,
            api_key: config.api_key,
        })
    }

    pub fn devices_url(&self) -> &str {
        &self.devices_url
    }
}

#[async_trait]
impl DeviceRegistry for HttpDeviceRegistry {
    async fn register_device(
        &self,
        request: RegistrationRequest,
    ) -> Result<RegisteredDevice, RegistryError> {
        let RegistrationRequest {
            device_id,
            mut end_device,
            field_mask,
        } = request;

        set_value_at(&mut end_device, "ids.device_id", json!(device_id));
        set_value_at(
            &mut end_device,
            "ids.application_ids.application_id",
            json!(self.application_id),
        );

        let body = json!({
            "end_device": end_device,
            "field_mask": field_mask,
        });

        let mut call = self.client.post(&self.devices_url).json(&body);
        if let Some(api_key) = &self.api_key {
            call = call.bearer_auth(api_key);
        }

        let response = call.send().await.map_err(transport_error)?;
        let status = response.status();
        debug!(device_id = %device_id, status = status.as_u16(), "registry responded");

        if status.is_success() {
            let end_device = response.json::<Value>().await.map_err(transport_error)?;
            return Ok(RegisteredDevice {
                device_id,
                end_device,
            });
        }

        let text = response.text().await.map_err(transport_error)?;
        let body = serde_json::from_str::<GatewayError>(&text).unwrap_or_else(|_| GatewayError {
            message: Some(text.trim().to_string()).filter(|text| !text.is_empty()),
            ..GatewayError::default()
        });
        Err(classify_error(status, body))
    }
}

/// Error body shape emitted by the gRPC gateway.
#[derive(Debug, Default, Deserialize)]
struct GatewayError {
    #[serde(default)]
    code: Option<i32>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Vec<GatewayErrorDetail>,
}

#[derive(Debug, Default, Deserialize)]
struct GatewayErrorDetail {
    #[serde(default)]
    name: Option<String>,
}

const GRPC_INVALID_ARGUMENT: i32 = 3;
const GRPC_NOT_FOUND: i32 = 5;
const GRPC_ALREADY_EXISTS: i32 = 6;
const GRPC_PERMISSION_DENIED: i32 = 7;
const GRPC_UNAVAILABLE: i32 = 14;
const GRPC_UNAUTHENTICATED: i32 = 16;

const EUIS_TAKEN: &str = "euis_taken";

fn classify_error(status: StatusCode, body: GatewayError) -> RegistryError {
    let message = body
        .message
        .clone()
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());

    if status == StatusCode::CONFLICT || body.code == Some(GRPC_ALREADY_EXISTS) {
        // Detail names are authoritative; the message may echo an ID that
        // itself contains "eui", so only fall back to it without details.
        let names: Vec<&str> = body
            .details
            .iter()
            .filter_map(|detail| detail.name.as_deref())
            .collect();
        let names_eui = if names.is_empty() {
            message.contains(EUIS_TAKEN)
        } else {
            names.iter().any(|name| name.ends_with(EUIS_TAKEN))
        };
        let target = if names_eui {
            ConflictTarget::DevEui
        } else {
            ConflictTarget::DeviceId
        };
        return RegistryError::AlreadyExists { target, message };
    }

    match (status.as_u16(), body.code) {
        (400, _) | (_, Some(GRPC_INVALID_ARGUMENT)) => RegistryError::InvalidArgument(message),
        (404, _) | (_, Some(GRPC_NOT_FOUND)) => RegistryError::NotFound(message),
        (401 | 403, _) | (_, Some(GRPC_PERMISSION_DENIED | GRPC_UNAUTHENTICATED)) => {
            RegistryError::PermissionDenied(message)
        }
        (502..=504, _) | (_, Some(GRPC_UNAVAILABLE)) => RegistryError::Unavailable(message),
        (status, _) => RegistryError::Backend { status, message },
    }
}

fn transport_error(err: reqwest::Error) -> RegistryError {
    if err.is_timeout() {
        RegistryError::Transport(format!("request timed out: {err}"))
    } else {
        RegistryError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(code: Option<i32>, message: &str, detail: Option<&str>) -> GatewayError {
        GatewayError {
            code,
            message: Some(message.to_string()),
            details: detail
                .map(|name| {
                    vec![GatewayErrorDetail {
                        name: Some(name.to_string()),
                    }]
                })
                .unwrap_or_default(),
        }
    }

    #[test]
    fn conflict_on_eui_detail_is_classified_as_eui() {
        let err = classify_error(
            StatusCode::CONFLICT,
            body(Some(6), "end device already registered", Some("end_device_euis_taken")),
        );
        assert_eq!(
            err,
            RegistryError::AlreadyExists {
                target: ConflictTarget::DevEui,
                message: "end device already registered".into(),
            }
        );
    }

    #[test]
    fn conflict_without_eui_hint_is_classified_as_id() {
        let err = classify_error(
            StatusCode::CONFLICT,
            body(Some(6), "ID already taken", Some("id_taken")),
        );
        assert!(matches!(
            err,
            RegistryError::AlreadyExists {
                target: ConflictTarget::DeviceId,
                ..
            }
        ));
    }

    #[test]
    fn id_detail_wins_over_eui_looking_message() {
        let err = classify_error(
            StatusCode::CONFLICT,
            body(
                Some(6),
                "end device `eui-70b3d57ed0000001` already exists",
                Some("id_taken"),
            ),
        );
        assert!(matches!(
            err,
            RegistryError::AlreadyExists {
                target: ConflictTarget::DeviceId,
                ..
            }
        ));
    }

    #[test]
    fn message_decides_only_without_details() {
        let err = classify_error(
            StatusCode::CONFLICT,
            body(Some(6), "error:pkg/identityserver/store:end_device_euis_taken", None),
        );
        assert!(matches!(
            err,
            RegistryError::AlreadyExists {
                target: ConflictTarget::DevEui,
                ..
            }
        ));

        let err = classify_error(
            StatusCode::CONFLICT,
            body(Some(6), "end device `eui-70b3d57ed0000001` already exists", None),
        );
        assert!(matches!(
            err,
            RegistryError::AlreadyExists {
                target: ConflictTarget::DeviceId,
                ..
            }
        ));
    }

    #[test]
    fn grpc_code_wins_when_status_is_generic() {
        let err = classify_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            body(Some(6), "ID already taken", None),
        );
        assert!(err.is_already_exists());

        let err = classify_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            body(Some(14), "connection refused", None),
        );
        assert!(matches!(err, RegistryError::Unavailable(_)));
    }

    #[test]
    fn plain_statuses_map_to_kinds() {
        let err = classify_error(StatusCode::BAD_REQUEST, GatewayError::default());
        assert_eq!(err, RegistryError::InvalidArgument("Bad Request".into()));

        let err = classify_error(StatusCode::FORBIDDEN, body(None, "no rights", None));
        assert_eq!(err, RegistryError::PermissionDenied("no rights".into()));

        let err = classify_error(StatusCode::IM_A_TEAPOT, body(None, "odd", None));
        assert_eq!(
            err,
            RegistryError::Backend {
                status: 418,
                message: "odd".into()
            }
        );
    }

    #[test]
    fn empty_application_id_is_rejected() {
        let err = HttpDeviceRegistry::new(HttpRegistryConfig::default())
            .err()
            .expect("configuration error");
        assert!(matches!(err, RegistryError::Configuration(_)));
    }
}
