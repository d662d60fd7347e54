pub mod ask;
pub mod check;
pub mod share;
pub mod sources;

use std::sync::Arc;

use veil_bridge::CaptureBridge;
use veil_common::config::AppConfig;
use veil_host_runtime::{spawn_host, HostHandle, HostRouter, VirtualDesktop};

/// A running host plus the UI-side capture bridge.
pub struct Desk {
    pub desktop: Arc<VirtualDesktop>,
    pub host: HostHandle,
    pub capture: CaptureBridge,
}

impl Desk {
    pub fn start(config: &AppConfig) -> Self {
        let desktop = Arc::new(VirtualDesktop::new());
        let router = Arc::new(HostRouter::new(desktop.clone(), config.catalog.clone()));
        let host = spawn_host(router, desktop.clone());
        let capture = CaptureBridge::new(host.transport(), config.request_timeout());
        tracing::debug!(timeout_ms = config.bridge.request_timeout_ms, "Host started");
        Self {
            desktop,
            host,
            capture,
        }
    }
}
