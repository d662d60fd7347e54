//! The seam between a bridge and whatever carries messages to the host.

use serde_json::Value;
use tokio::sync::broadcast;

use veil_common::error::VeilResult;

use crate::message::{BridgeMessage, HostEvent};

/// Carries bridge requests to the host and host events back.
///
/// Implementations must resolve `request` with `HostUnavailable` when the
/// host cannot be reached, rather than hanging or dropping the call.
#[async_trait::async_trait]
pub trait HostTransport: Send + Sync {
    /// Send one request and wait for its response.
    async fn request(&self, message: BridgeMessage) -> VeilResult<Value>;

    /// Subscribe to all host events; the bridge filters by channel.
    fn events(&self) -> broadcast::Receiver<HostEvent>;
}
