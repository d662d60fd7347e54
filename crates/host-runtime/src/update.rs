//! Update notifications for the update bridge.

use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::json;
use tokio::sync::broadcast;

use veil_bridge::{Ack, HostEvent, UPDATE_AVAILABLE, UPDATE_DOWNLOADED};

/// Tracks the update lifecycle and publishes its events.
pub struct UpdateNotices {
    events: broadcast::Sender<HostEvent>,
    downloaded: AtomicBool,
    install_requested: AtomicBool,
}

impl UpdateNotices {
    pub fn new(events: broadcast::Sender<HostEvent>) -> Self {
        Self {
            events,
            downloaded: AtomicBool::new(false),
            install_requested: AtomicBool::new(false),
        }
    }

    pub fn announce_available(&self, version: &str) {
        tracing::info!(version, "Update available");
        self.publish(UPDATE_AVAILABLE, version);
    }

    pub fn announce_downloaded(&self, version: &str) {
        tracing::info!(version, "Update downloaded");
        self.downloaded.store(true, Ordering::SeqCst);
        self.publish(UPDATE_DOWNLOADED, version);
    }

    /// Whether the UI asked for the downloaded update to be installed.
    pub fn install_requested(&self) -> bool {
        self.install_requested.load(Ordering::SeqCst)
    }

    pub(crate) fn install(&self) -> Ack {
        if !self.downloaded.load(Ordering::SeqCst) {
            return Ack::err("NoUpdateDownloaded");
        }
        tracing::info!("Install of downloaded update requested");
        self.install_requested.store(true, Ordering::SeqCst);
        Ack::ok()
    }

    fn publish(&self, channel: &str, version: &str) {
        let _ = self.events.send(HostEvent {
            channel: channel.to_string(),
            payload: json!({ "version": version }),
        });
    }
}
