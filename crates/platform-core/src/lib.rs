//! Veil platform core contracts.
//!
//! This crate contains the cross-platform data structures and host
//! capability traits used by the host runtime and the overlay manager
//! without coupling them to a concrete OS backend.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use veil_common::error::VeilResult;

/// Information about a connected monitor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitorInfo {
    /// Monitor name/identifier.
    pub name: String,
    /// Resolution in physical pixels.
    pub width: u32,
    pub height: u32,
    /// Position in the virtual desktop (pixels).
    pub x: i32,
    pub y: i32,
    /// Scale factor (for example 1.0, 1.25, 2.0).
    pub scale_factor: f64,
    /// Whether this monitor is primary.
    pub primary: bool,
}

impl MonitorInfo {
    /// Logical resolution (physical / scale).
    pub fn logical_width(&self) -> u32 {
        (self.width as f64 / self.scale_factor) as u32
    }

    /// Logical resolution (physical / scale).
    pub fn logical_height(&self) -> u32 {
        (self.height as f64 / self.scale_factor) as u32
    }
}

/// Pick the primary monitor, falling back to the first one.
pub fn primary_monitor(monitors: &[MonitorInfo]) -> Option<&MonitorInfo> {
    monitors
        .iter()
        .find(|m| m.primary)
        .or_else(|| monitors.first())
}

/// Compute virtual desktop bounds that include all connected monitors.
/// Returns `(min_x, min_y, width, height)` in physical pixels.
pub fn virtual_desktop_bounds(monitors: &[MonitorInfo]) -> (i32, i32, u32, u32) {
    if monitors.is_empty() {
        return (0, 0, 1920, 1080);
    }

    let min_x = monitors.iter().map(|m| m.x).min().unwrap_or(0);
    let min_y = monitors.iter().map(|m| m.y).min().unwrap_or(0);
    let max_x = monitors
        .iter()
        .map(|m| m.x + m.width as i32)
        .max()
        .unwrap_or(1920);
    let max_y = monitors
        .iter()
        .map(|m| m.y + m.height as i32)
        .max()
        .unwrap_or(1080);

    let width = (max_x - min_x).max(1) as u32;
    let height = (max_y - min_y).max(1) as u32;
    (min_x, min_y, width, height)
}

/// Kind of capturable target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Screen,
    Window,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Screen => "screen",
            SourceKind::Window => "window",
        }
    }
}

/// One capturable target as returned by source enumeration.
///
/// Created fresh on every enumeration call and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CaptureSource {
    /// Opaque identifier, unique within one enumeration response.
    pub id: String,
    pub kind: SourceKind,
    pub display_name: String,
    /// `data:image/png;base64,...` preview, or `None` if rendering failed.
    pub thumbnail: Option<String>,
}

/// A source as the OS reports it, before thumbnails are attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSource {
    pub id: String,
    pub kind: SourceKind,
    pub name: String,
}

/// Host-side identifier of an acquired media stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamId(pub u64);

/// Host-side identifier of an overlay window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowId(pub u64);

/// Asynchronous notifications raised by the OS capture layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformEvent {
    /// The captured monitor/window went away.
    SourceLost { source_id: String },
    /// The stream stopped producing frames for another reason.
    StreamEnded { source_id: String, reason: String },
}

/// OS capture capabilities available to the privileged host.
#[async_trait::async_trait]
pub trait CapturePlatform: Send + Sync {
    /// List capturable targets of the given kinds.
    async fn list_sources(&self, kinds: &[SourceKind]) -> VeilResult<Vec<RawSource>>;

    /// Render a PNG preview of a source.
    async fn render_thumbnail(&self, source_id: &str, width: u32, height: u32)
        -> VeilResult<Vec<u8>>;

    /// Acquire a frame stream bound to a source.
    async fn acquire_stream(&self, source_id: &str) -> VeilResult<StreamId>;

    /// Release a previously acquired stream.
    async fn release_stream(&self, stream: StreamId) -> VeilResult<()>;

    /// Subscribe to asynchronous capture notifications.
    fn subscribe(&self) -> broadcast::Receiver<PlatformEvent>;
}

/// OS window capabilities used for the overlay surface.
#[async_trait::async_trait]
pub trait WindowPlatform: Send + Sync {
    /// Create an always-on-top, initially hidden overlay window.
    async fn create_overlay_window(&self, width: u32, height: u32) -> VeilResult<WindowId>;

    /// Set or clear the capture-exclusion property of a window.
    async fn set_excluded_from_capture(&self, window: WindowId, excluded: bool) -> VeilResult<()>;

    /// Map or unmap a window.
    async fn set_window_visible(&self, window: WindowId, visible: bool) -> VeilResult<()>;

    /// Destroy a window.
    async fn destroy_window(&self, window: WindowId) -> VeilResult<()>;

    /// Connected monitors, for overlay placement.
    fn monitors(&self) -> VeilResult<Vec<MonitorInfo>>;
}
