//! Host-side request routing.
//!
//! The router is the host half of the bridge: it decodes payloads,
//! dispatches to the catalog and the capture platform, owns the single
//! host stream, and turns platform notifications into status events.

use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::broadcast;

use veil_bridge::{
    Ack, BeginCaptureRequest, BridgeMessage, EmptyRequest, EnumerateRequest, HostEvent,
    StatusEvent, BEGIN_CAPTURE, END_CAPTURE, ENUMERATE_SOURCES, INSTALL_UPDATE,
    SCREEN_SHARE_STATUS,
};
use veil_common::config::CatalogConfig;
use veil_platform_core::{CapturePlatform, PlatformEvent, StreamId};

use crate::catalog::SourceCatalog;
use crate::update::UpdateNotices;

#[derive(Debug, Clone)]
struct HeldStream {
    stream: StreamId,
    source_id: String,
}

/// Dispatches bridge messages to host services.
pub struct HostRouter {
    catalog: SourceCatalog,
    platform: Arc<dyn CapturePlatform>,
    held: Mutex<Option<HeldStream>>,
    events: broadcast::Sender<HostEvent>,
    updates: UpdateNotices,
}

impl HostRouter {
    pub fn new(platform: Arc<dyn CapturePlatform>, catalog: CatalogConfig) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            catalog: SourceCatalog::new(platform.clone(), catalog),
            platform,
            held: Mutex::new(None),
            updates: UpdateNotices::new(events.clone()),
            events,
        }
    }

    /// Sender for host → UI events.
    pub fn events(&self) -> broadcast::Sender<HostEvent> {
        self.events.clone()
    }

    pub fn updates(&self) -> &UpdateNotices {
        &self.updates
    }

    /// Source id of the stream the host currently holds, if any.
    pub fn held_source(&self) -> Option<String> {
        self.held_lock().as_ref().map(|h| h.source_id.clone())
    }

    fn held_lock(&self) -> std::sync::MutexGuard<'_, Option<HeldStream>> {
        self.held.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Handle one request. Always produces exactly one response value.
    pub async fn handle(&self, message: BridgeMessage) -> Value {
        let BridgeMessage { channel, payload } = message;
        match channel.as_str() {
            ENUMERATE_SOURCES => self.enumerate(payload).await,
            BEGIN_CAPTURE => self.begin_capture(payload).await,
            END_CAPTURE => self.end_capture(payload).await,
            INSTALL_UPDATE => match decode_payload::<EmptyRequest>(payload) {
                Some(_) => self.updates.install().to_value(),
                None => Ack::err("InvalidPayload").to_value(),
            },
            other => {
                tracing::warn!(channel = other, "No host route for channel");
                Ack::err("UnknownChannel").to_value()
            }
        }
    }

    async fn enumerate(&self, payload: Value) -> Value {
        let Some(request) = decode_payload::<EnumerateRequest>(payload) else {
            return Ack::err("InvalidPayload").to_value();
        };
        match self.catalog.enumerate(&request.kinds).await {
            Ok(sources) => serde_json::to_value(sources)
                .unwrap_or_else(|_| Ack::err("EncodeFailed").to_value()),
            Err(e) => {
                tracing::warn!(error = %e, "Source enumeration failed");
                Ack::err(e.reason()).to_value()
            }
        }
    }

    async fn begin_capture(&self, payload: Value) -> Value {
        let Some(request) = decode_payload::<BeginCaptureRequest>(payload) else {
            return Ack::err("InvalidPayload").to_value();
        };

        if let Some(held) = self.held_lock().as_ref() {
            tracing::warn!(held = %held.source_id, requested = %request.source_id, "Capture already held");
            return Ack::err("Busy").to_value();
        }

        match self.platform.acquire_stream(&request.source_id).await {
            Ok(stream) => {
                tracing::info!(source = %request.source_id, stream = stream.0, "Stream acquired");
                *self.held_lock() = Some(HeldStream {
                    stream,
                    source_id: request.source_id,
                });
                Ack::ok().to_value()
            }
            Err(e) => {
                tracing::warn!(source = %request.source_id, error = %e, "Stream acquisition failed");
                Ack::err(e.reason()).to_value()
            }
        }
    }

    async fn end_capture(&self, payload: Value) -> Value {
        if decode_payload::<EmptyRequest>(payload).is_none() {
            return Ack::err("InvalidPayload").to_value();
        }

        let Some(held) = self.held_lock().take() else {
            tracing::debug!("end-capture with no held stream");
            return Ack::ok().to_value();
        };

        match self.platform.release_stream(held.stream).await {
            Ok(()) => {
                tracing::info!(source = %held.source_id, stream = held.stream.0, "Stream released");
                Ack::ok().to_value()
            }
            Err(e) => {
                tracing::warn!(source = %held.source_id, error = %e, "Stream release failed");
                Ack::err(e.reason()).to_value()
            }
        }
    }

    /// Forward a platform notification to the UI if it concerns the held stream.
    pub fn on_platform_event(&self, event: PlatformEvent) {
        let Some(held_source) = self.held_source() else {
            tracing::debug!(?event, "Platform event with no held stream");
            return;
        };

        let status = match event {
            PlatformEvent::SourceLost { source_id } if source_id == held_source => {
                StatusEvent::SourceLost { source_id }
            }
            PlatformEvent::StreamEnded { source_id, reason } if source_id == held_source => {
                StatusEvent::StreamEnded {
                    source_id,
                    reason: Some(reason),
                }
            }
            other => {
                tracing::debug!(event = ?other, "Ignoring event for another source");
                return;
            }
        };

        match serde_json::to_value(&status) {
            Ok(payload) => {
                let _ = self.events.send(HostEvent {
                    channel: SCREEN_SHARE_STATUS.to_string(),
                    payload,
                });
            }
            Err(e) => tracing::warn!(error = %e, "Failed to encode status event"),
        }
    }
}

fn decode_payload<T: serde::de::DeserializeOwned>(payload: Value) -> Option<T> {
    // `{}` and `null` both mean "no arguments".
    let payload = if payload.is_null() {
        Value::Object(Default::default())
    } else {
        payload
    };
    match serde_json::from_value(payload) {
        Ok(request) => Some(request),
        Err(e) => {
            tracing::warn!(error = %e, "Rejected malformed payload");
            None
        }
    }
}
