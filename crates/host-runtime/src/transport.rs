//! In-process transport between the UI-side bridge and the host router.
//!
//! The host runs as its own task draining a request queue one message at a
//! time. Each request carries a one-shot reply slot, which gives the
//! call/response pairing. When the host task is gone, both the queue and
//! any outstanding reply slots close, and callers see `HostUnavailable`.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use veil_bridge::{BridgeMessage, HostEvent, HostTransport};
use veil_common::error::{VeilError, VeilResult};
use veil_platform_core::CapturePlatform;

use crate::router::HostRouter;

const REQUEST_QUEUE_DEPTH: usize = 32;

struct HostRequest {
    message: BridgeMessage,
    reply: oneshot::Sender<Value>,
}

/// UI-side end of the host channel.
pub struct ChannelTransport {
    requests: mpsc::Sender<HostRequest>,
    events: broadcast::Sender<HostEvent>,
}

#[async_trait::async_trait]
impl HostTransport for ChannelTransport {
    async fn request(&self, message: BridgeMessage) -> VeilResult<Value> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(HostRequest { message, reply })
            .await
            .map_err(|_| VeilError::host_unavailable("host runtime has shut down"))?;
        response
            .await
            .map_err(|_| VeilError::host_unavailable("host dropped the request"))
    }

    fn events(&self) -> broadcast::Receiver<HostEvent> {
        self.events.subscribe()
    }
}

/// A running host context.
pub struct HostHandle {
    router: Arc<HostRouter>,
    transport: Arc<ChannelTransport>,
    request_task: JoinHandle<()>,
    event_task: JoinHandle<()>,
}

impl HostHandle {
    pub fn router(&self) -> &Arc<HostRouter> {
        &self.router
    }

    /// Transport for constructing bridges.
    pub fn transport(&self) -> Arc<ChannelTransport> {
        self.transport.clone()
    }

    /// Stop the host. Pending and future requests fail with `HostUnavailable`.
    pub fn shutdown(&self) {
        tracing::info!("Shutting down host runtime");
        self.request_task.abort();
        self.event_task.abort();
    }
}

impl Drop for HostHandle {
    fn drop(&mut self) {
        self.request_task.abort();
        self.event_task.abort();
    }
}

/// Start the host context on the current tokio runtime.
pub fn spawn_host(router: Arc<HostRouter>, platform: Arc<dyn CapturePlatform>) -> HostHandle {
    let (requests, mut queue) = mpsc::channel::<HostRequest>(REQUEST_QUEUE_DEPTH);

    let request_router = router.clone();
    let request_task = tokio::spawn(async move {
        while let Some(HostRequest { message, reply }) = queue.recv().await {
            let response = request_router.handle(message).await;
            if reply.send(response).is_err() {
                tracing::debug!("Caller went away before the host replied");
            }
        }
        tracing::debug!("Host request queue closed");
    });

    let mut platform_events = platform.subscribe();
    let event_router = router.clone();
    let event_task = tokio::spawn(async move {
        loop {
            match platform_events.recv().await {
                Ok(event) => event_router.on_platform_event(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Host lagged behind platform events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let transport = Arc::new(ChannelTransport {
        requests,
        events: router.events(),
    });

    HostHandle {
        router,
        transport,
        request_task,
        event_task,
    }
}
