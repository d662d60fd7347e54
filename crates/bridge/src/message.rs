//! Wire envelopes and channel payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use veil_common::error::{VeilError, VeilResult};
use veil_platform_core::{CaptureSource, SourceKind};

/// A request travelling from the UI to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeMessage {
    pub channel: String,
    #[serde(default)]
    pub payload: Value,
}

impl BridgeMessage {
    pub fn new(channel: impl Into<String>, payload: Value) -> Self {
        Self {
            channel: channel.into(),
            payload,
        }
    }
}

/// A notification pushed from the host to the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostEvent {
    pub channel: String,
    #[serde(default)]
    pub payload: Value,
}

/// `enumerate-sources` request payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnumerateRequest {
    #[serde(default)]
    pub kinds: Vec<SourceKind>,
}

/// `begin-capture` request payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BeginCaptureRequest {
    pub source_id: String,
}

/// `end-capture` / `install-update` request payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmptyRequest {}

/// `{ ok: true }` or `{ ok: false, error }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Ack {
    pub fn ok() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Turn a negative acknowledgement into a typed error.
    pub fn into_result(self) -> VeilResult<()> {
        if self.ok {
            return Ok(());
        }
        Err(host_error(
            self.error.as_deref().unwrap_or("UnknownHostError"),
        ))
    }
}

/// Map a host error string onto the error taxonomy.
pub fn host_error(error: &str) -> VeilError {
    match error {
        "PermissionDenied" => VeilError::permission_denied("host refused the request"),
        other => VeilError::host_rejected(other),
    }
}

/// `enumerate-sources` response: a source list or a negative acknowledgement.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum EnumerateResponse {
    Sources(Vec<CaptureSource>),
    Refused(Ack),
}

/// Payload of a `screen-share-status` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "kind",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum StatusEvent {
    SourceLost {
        source_id: String,
    },
    StreamEnded {
        source_id: String,
        #[serde(default)]
        reason: Option<String>,
    },
}

impl StatusEvent {
    pub fn source_id(&self) -> &str {
        match self {
            StatusEvent::SourceLost { source_id } | StatusEvent::StreamEnded { source_id, .. } => {
                source_id
            }
        }
    }
}

/// Decode a typed response, reporting schema violations as protocol errors.
pub fn decode<T: serde::de::DeserializeOwned>(channel: &str, value: Value) -> VeilResult<T> {
    serde_json::from_value(value)
        .map_err(|e| VeilError::protocol(format!("malformed {channel} response: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ack_wire_shape() {
        assert_eq!(Ack::ok().to_value(), json!({ "ok": true }));
        assert_eq!(
            Ack::err("NotFound").to_value(),
            json!({ "ok": false, "error": "NotFound" })
        );
    }

    #[test]
    fn negative_ack_maps_to_taxonomy() {
        assert!(matches!(
            Ack::err("PermissionDenied").into_result(),
            Err(VeilError::PermissionDenied { .. })
        ));
        assert!(matches!(
            Ack::err("NotFound").into_result(),
            Err(VeilError::HostRejected { reason }) if reason == "NotFound"
        ));
    }

    #[test]
    fn status_event_wire_shape() {
        let event: StatusEvent = serde_json::from_value(json!({
            "kind": "stream-ended",
            "sourceId": "screen-0",
            "reason": "DeviceRemoved"
        }))
        .unwrap();
        assert_eq!(
            event,
            StatusEvent::StreamEnded {
                source_id: "screen-0".to_string(),
                reason: Some("DeviceRemoved".to_string()),
            }
        );
        assert_eq!(
            serde_json::to_value(StatusEvent::SourceLost {
                source_id: "win-1".to_string()
            })
            .unwrap(),
            json!({ "kind": "source-lost", "sourceId": "win-1" })
        );
    }

    #[test]
    fn enumerate_response_accepts_list_or_refusal() {
        let list: EnumerateResponse = serde_json::from_value(json!([
            { "id": "win-1", "kind": "window", "displayName": "Editor", "thumbnail": null }
        ]))
        .unwrap();
        assert!(matches!(list, EnumerateResponse::Sources(ref s) if s.len() == 1));

        let refused: EnumerateResponse =
            serde_json::from_value(json!({ "ok": false, "error": "PermissionDenied" })).unwrap();
        assert!(matches!(refused, EnumerateResponse::Refused(_)));
    }

    #[test]
    fn begin_capture_request_rejects_unknown_fields() {
        assert!(serde_json::from_value::<BeginCaptureRequest>(json!({ "sourceId": "a" })).is_ok());
        assert!(
            serde_json::from_value::<BeginCaptureRequest>(json!({ "sourceId": "a", "x": 1 }))
                .is_err()
        );
        assert!(serde_json::from_value::<BeginCaptureRequest>(json!({})).is_err());
    }
}
