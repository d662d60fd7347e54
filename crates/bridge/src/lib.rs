//! Veil Capability Bridge
//!
//! The only path by which the sandboxed UI context reaches host-privileged
//! operations. Every call passes through a [`ChannelPolicy`]; a channel
//! outside the allow-list fails synchronously with `UnauthorizedChannel`
//! before anything is sent.
//!
//! ```text
//!   UI context                          host context
//! ┌──────────────┐   BridgeMessage   ┌──────────────┐
//! │ CaptureBridge├──────────────────►│  HostRouter  │
//! │ UpdateBridge │◄──────────────────┤              │
//! └──────────────┘ response / events └──────────────┘
//! ```

pub mod message;
pub mod policy;
pub mod transport;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use serde_json::{json, Value};
use tokio::sync::broadcast;

use veil_common::error::{VeilError, VeilResult};
use veil_platform_core::{CaptureSource, SourceKind};

pub use message::*;
pub use policy::*;
pub use transport::HostTransport;

/// A policy-checked request/response channel to the host.
#[derive(Clone)]
pub struct Bridge {
    policy: ChannelPolicy,
    transport: Arc<dyn HostTransport>,
    timeout: Duration,
}

impl Bridge {
    pub fn new(policy: ChannelPolicy, transport: Arc<dyn HostTransport>, timeout: Duration) -> Self {
        Self {
            policy,
            transport,
            timeout,
        }
    }

    pub fn policy(&self) -> &ChannelPolicy {
        &self.policy
    }

    /// Invoke a channel.
    ///
    /// The allow-list check happens here, synchronously: an unlisted
    /// channel returns `Err` immediately and no future is created. The
    /// returned future resolves with the host's response, or with
    /// `HostUnavailable` if the host is unreachable or exceeds the timeout.
    pub fn invoke(
        &self,
        channel: &str,
        payload: Value,
    ) -> VeilResult<BoxFuture<'static, VeilResult<Value>>> {
        self.policy.check_invoke(channel)?;

        let transport = self.transport.clone();
        let timeout = self.timeout;
        let bridge = self.policy.name;
        let message = BridgeMessage::new(channel, payload);

        Ok(async move {
            let channel = message.channel.clone();
            tracing::debug!(bridge, channel = %channel, "Bridge request");
            match tokio::time::timeout(timeout, transport.request(message)).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(bridge, channel = %channel, ?timeout, "Host did not respond");
                    Err(VeilError::host_unavailable(format!(
                        "{channel} timed out after {}ms",
                        timeout.as_millis()
                    )))
                }
            }
        }
        .boxed())
    }

    /// Subscribe to one event channel.
    pub fn subscribe(&self, channel: &str) -> VeilResult<EventSubscription> {
        self.policy.check_listen(channel)?;
        Ok(EventSubscription {
            channel: channel.to_string(),
            rx: self.transport.events(),
        })
    }
}

/// Host events for a single allow-listed channel.
pub struct EventSubscription {
    channel: String,
    rx: broadcast::Receiver<HostEvent>,
}

impl EventSubscription {
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Next payload on this channel; `None` once the host is gone.
    pub async fn recv(&mut self) -> Option<Value> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.channel == self.channel => return Some(event.payload),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(channel = %self.channel, skipped, "Event subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Typed capture lifecycle operations over [`CAPTURE_POLICY`].
#[derive(Clone)]
pub struct CaptureBridge {
    inner: Bridge,
}

impl CaptureBridge {
    pub fn new(transport: Arc<dyn HostTransport>, timeout: Duration) -> Self {
        Self {
            inner: Bridge::new(CAPTURE_POLICY, transport, timeout),
        }
    }

    /// Raw access, still subject to the capture allow-list.
    pub fn bridge(&self) -> &Bridge {
        &self.inner
    }

    /// List capturable sources. An empty `kinds` slice asks for both kinds.
    pub async fn enumerate_sources(&self, kinds: &[SourceKind]) -> VeilResult<Vec<CaptureSource>> {
        let payload = serde_json::to_value(EnumerateRequest {
            kinds: kinds.to_vec(),
        })?;
        let value = self.inner.invoke(ENUMERATE_SOURCES, payload)?.await?;

        match decode::<EnumerateResponse>(ENUMERATE_SOURCES, value)? {
            EnumerateResponse::Sources(sources) => {
                let mut seen = HashSet::with_capacity(sources.len());
                if let Some(dup) = sources.iter().find(|s| !seen.insert(s.id.as_str())) {
                    return Err(VeilError::protocol(format!(
                        "duplicate source id {:?} in enumeration",
                        dup.id
                    )));
                }
                Ok(sources)
            }
            EnumerateResponse::Refused(Ack { ok: false, error }) => {
                Err(host_error(error.as_deref().unwrap_or("UnknownHostError")))
            }
            EnumerateResponse::Refused(_) => Err(VeilError::protocol(
                "enumerate-sources acknowledged without a source list",
            )),
        }
    }

    /// Ask the host to acquire a stream for `source_id`.
    pub async fn begin_capture(&self, source_id: &str) -> VeilResult<()> {
        let payload = json!({ "sourceId": source_id });
        let value = self.inner.invoke(BEGIN_CAPTURE, payload)?.await?;
        decode::<Ack>(BEGIN_CAPTURE, value)?.into_result()
    }

    /// Ask the host to release the current stream.
    pub async fn end_capture(&self) -> VeilResult<()> {
        let value = self.inner.invoke(END_CAPTURE, json!({}))?.await?;
        decode::<Ack>(END_CAPTURE, value)?.into_result()
    }

    /// Subscribe to `screen-share-status` notifications.
    pub fn status_events(&self) -> VeilResult<StatusSubscription> {
        Ok(StatusSubscription {
            inner: self.inner.subscribe(SCREEN_SHARE_STATUS)?,
        })
    }
}

/// Decoded `screen-share-status` events.
pub struct StatusSubscription {
    inner: EventSubscription,
}

impl StatusSubscription {
    /// Next well-formed status event; malformed payloads are logged and skipped.
    pub async fn recv(&mut self) -> Option<StatusEvent> {
        loop {
            let payload = self.inner.recv().await?;
            match serde_json::from_value(payload) {
                Ok(event) => return Some(event),
                Err(e) => tracing::warn!(error = %e, "Dropping malformed status event"),
            }
        }
    }
}

/// Update notifications over [`UPDATE_POLICY`].
///
/// Independent of [`CaptureBridge`]; the two allow-lists do not overlap.
#[derive(Clone)]
pub struct UpdateBridge {
    inner: Bridge,
}

impl UpdateBridge {
    pub fn new(transport: Arc<dyn HostTransport>, timeout: Duration) -> Self {
        Self {
            inner: Bridge::new(UPDATE_POLICY, transport, timeout),
        }
    }

    pub fn bridge(&self) -> &Bridge {
        &self.inner
    }

    pub fn on_update_available(&self) -> VeilResult<EventSubscription> {
        self.inner.subscribe(UPDATE_AVAILABLE)
    }

    pub fn on_update_downloaded(&self) -> VeilResult<EventSubscription> {
        self.inner.subscribe(UPDATE_DOWNLOADED)
    }

    /// Ask the host to quit and install a downloaded update.
    pub async fn install_update(&self) -> VeilResult<()> {
        let value = self.inner.invoke(INSTALL_UPDATE, json!({}))?.await?;
        decode::<Ack>(INSTALL_UPDATE, value)?.into_result()
    }
}
