//! In-process simulated desktop.
//!
//! Implements both host capability traits against an in-memory model of
//! monitors, application windows, media streams, and overlay surfaces.
//! Faults can be injected to exercise every failure path of the core:
//! permission refusal, broken thumbnails, a slow or stalled capture
//! service, refused capture exclusion, refused hide, sources vanishing,
//! streams ending, and window re-creation that drops the exclusion flag.

use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::Mutex;
use std::time::Duration;

use image::{ImageBuffer, ImageFormat, Rgb, RgbImage};
use tokio::sync::broadcast;

use veil_common::error::{VeilError, VeilResult};
use veil_platform_core::{
    CapturePlatform, MonitorInfo, PlatformEvent, RawSource, SourceKind, StreamId, WindowId,
    WindowPlatform,
};

/// One host-visible operation, recorded in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DesktopOp {
    Acquire { source_id: String, stream: StreamId },
    Release { stream: StreamId },
    CreateWindow { window: WindowId },
    Exclude { window: WindowId, excluded: bool },
    Show { window: WindowId },
    Hide { window: WindowId },
    DestroyWindow { window: WindowId },
}

/// Host-side state of an overlay surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceState {
    pub visible: bool,
    pub excluded: bool,
}

#[derive(Debug, Default)]
struct Faults {
    deny_permission: bool,
    broken_thumbnails: HashSet<String>,
    capture_delay: Option<Duration>,
    refuse_exclusion: bool,
    refuse_hide: bool,
    refuse_window_creation: bool,
}

#[derive(Debug)]
struct DesktopState {
    /// Monitors keyed by a source id fixed at construction.
    screens: Vec<(String, MonitorInfo)>,
    windows: Vec<(String, String)>,
    streams: HashMap<StreamId, String>,
    surfaces: HashMap<WindowId, SurfaceState>,
    next_stream: u64,
    next_window: u64,
    ops: Vec<DesktopOp>,
    faults: Faults,
}

impl DesktopState {
    fn sources(&self) -> Vec<RawSource> {
        let screens = self.screens.iter().map(|(id, m)| RawSource {
            id: id.clone(),
            kind: SourceKind::Screen,
            name: m.name.clone(),
        });
        let windows = self.windows.iter().map(|(id, title)| RawSource {
            id: id.clone(),
            kind: SourceKind::Window,
            name: title.clone(),
        });
        screens.chain(windows).collect()
    }

    fn has_source(&self, source_id: &str) -> bool {
        self.sources().iter().any(|s| s.id == source_id)
    }

    fn surface_mut(&mut self, window: WindowId) -> VeilResult<&mut SurfaceState> {
        self.surfaces
            .get_mut(&window)
            .ok_or_else(|| VeilError::platform(format!("no such window {}", window.0)))
    }
}

/// Simulated host desktop.
pub struct VirtualDesktop {
    state: Mutex<DesktopState>,
    events: broadcast::Sender<PlatformEvent>,
}

impl Default for VirtualDesktop {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualDesktop {
    /// One 1920x1080 monitor and two application windows (`win-1`, `win-2`).
    pub fn new() -> Self {
        let monitors = vec![MonitorInfo {
            name: "Built-in Display".to_string(),
            width: 1920,
            height: 1080,
            x: 0,
            y: 0,
            scale_factor: 1.0,
            primary: true,
        }];
        let windows = vec![
            ("win-1".to_string(), "Editor".to_string()),
            ("win-2".to_string(), "Browser".to_string()),
        ];
        Self::with_layout(monitors, windows)
    }

    /// Desktop with an explicit monitor layout and `(id, title)` windows.
    ///
    /// Monitors get the ids `screen-0`, `screen-1`, ... in list order. The
    /// ids stay put when a monitor is removed.
    pub fn with_layout(monitors: Vec<MonitorInfo>, windows: Vec<(String, String)>) -> Self {
        let (events, _) = broadcast::channel(64);
        let screens = monitors
            .into_iter()
            .enumerate()
            .map(|(idx, m)| (format!("screen-{idx}"), m))
            .collect();
        Self {
            state: Mutex::new(DesktopState {
                screens,
                windows,
                streams: HashMap::new(),
                surfaces: HashMap::new(),
                next_stream: 1,
                next_window: 1,
                ops: Vec::new(),
                faults: Faults::default(),
            }),
            events,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DesktopState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // Fault injection

    pub fn deny_permission(&self, deny: bool) {
        self.lock().faults.deny_permission = deny;
    }

    pub fn break_thumbnail(&self, source_id: impl Into<String>) {
        self.lock().faults.broken_thumbnails.insert(source_id.into());
    }

    /// Delay every stream acquisition; a very long delay models a stalled host.
    pub fn set_capture_delay(&self, delay: Option<Duration>) {
        self.lock().faults.capture_delay = delay;
    }

    pub fn refuse_exclusion(&self, refuse: bool) {
        self.lock().faults.refuse_exclusion = refuse;
    }

    pub fn refuse_hide(&self, refuse: bool) {
        self.lock().faults.refuse_hide = refuse;
    }

    pub fn refuse_window_creation(&self, refuse: bool) {
        self.lock().faults.refuse_window_creation = refuse;
    }

    // Simulated OS activity

    pub fn add_window(&self, id: impl Into<String>, title: impl Into<String>) {
        self.lock().windows.push((id.into(), title.into()));
    }

    /// Remove a monitor or window. Streams bound to it get a `SourceLost`.
    pub fn remove_source(&self, source_id: &str) {
        let affected = {
            let mut state = self.lock();
            state.windows.retain(|(id, _)| id != source_id);
            state.screens.retain(|(id, _)| id != source_id);
            state.streams.values().any(|s| s == source_id)
        };
        if affected {
            let _ = self.events.send(PlatformEvent::SourceLost {
                source_id: source_id.to_string(),
            });
        }
    }

    /// End every live stream with the given reason.
    pub fn end_streams(&self, reason: &str) {
        let sources: Vec<String> = self.lock().streams.values().cloned().collect();
        for source_id in sources {
            let _ = self.events.send(PlatformEvent::StreamEnded {
                source_id,
                reason: reason.to_string(),
            });
        }
    }

    /// Re-create a window in place; the host drops its exclusion flag.
    pub fn recreate_window(&self, window: WindowId) {
        if let Some(surface) = self.lock().surfaces.get_mut(&window) {
            surface.excluded = false;
        }
    }

    // Inspection

    pub fn ops(&self) -> Vec<DesktopOp> {
        self.lock().ops.clone()
    }

    pub fn live_streams(&self) -> usize {
        self.lock().streams.len()
    }

    pub fn release_count(&self) -> usize {
        self.lock()
            .ops
            .iter()
            .filter(|op| matches!(op, DesktopOp::Release { .. }))
            .count()
    }

    pub fn acquire_count(&self) -> usize {
        self.lock()
            .ops
            .iter()
            .filter(|op| matches!(op, DesktopOp::Acquire { .. }))
            .count()
    }

    /// Number of `excluded = true` requests that reached the host.
    pub fn exclusion_asserts(&self) -> usize {
        self.lock()
            .ops
            .iter()
            .filter(|op| matches!(op, DesktopOp::Exclude { excluded: true, .. }))
            .count()
    }

    pub fn surface(&self, window: WindowId) -> Option<SurfaceState> {
        self.lock().surfaces.get(&window).copied()
    }

    pub fn surfaces(&self) -> Vec<(WindowId, SurfaceState)> {
        self.lock().surfaces.iter().map(|(w, s)| (*w, *s)).collect()
    }
}

#[async_trait::async_trait]
impl CapturePlatform for VirtualDesktop {
    async fn list_sources(&self, kinds: &[SourceKind]) -> VeilResult<Vec<RawSource>> {
        let state = self.lock();
        if state.faults.deny_permission {
            return Err(VeilError::permission_denied("screen recording is not permitted"));
        }
        Ok(state
            .sources()
            .into_iter()
            .filter(|s| kinds.contains(&s.kind))
            .collect())
    }

    async fn render_thumbnail(
        &self,
        source_id: &str,
        width: u32,
        height: u32,
    ) -> VeilResult<Vec<u8>> {
        let kind = {
            let state = self.lock();
            if state.faults.broken_thumbnails.contains(source_id) {
                return Err(VeilError::platform(format!(
                    "thumbnail capture failed for {source_id}"
                )));
            }
            state
                .sources()
                .into_iter()
                .find(|s| s.id == source_id)
                .map(|s| s.kind)
                .ok_or_else(|| VeilError::platform(format!("unknown source {source_id}")))?
        };
        render_preview(source_id, kind, width, height)
    }

    async fn acquire_stream(&self, source_id: &str) -> VeilResult<StreamId> {
        let delay = {
            let state = self.lock();
            if state.faults.deny_permission {
                return Err(VeilError::permission_denied("screen recording is not permitted"));
            }
            state.faults.capture_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        if !state.has_source(source_id) {
            return Err(VeilError::host_rejected("NotFound"));
        }
        let stream = StreamId(state.next_stream);
        state.next_stream += 1;
        state.streams.insert(stream, source_id.to_string());
        state.ops.push(DesktopOp::Acquire {
            source_id: source_id.to_string(),
            stream,
        });
        Ok(stream)
    }

    async fn release_stream(&self, stream: StreamId) -> VeilResult<()> {
        let mut state = self.lock();
        if state.streams.remove(&stream).is_none() {
            return Err(VeilError::platform(format!("stream {} is not live", stream.0)));
        }
        state.ops.push(DesktopOp::Release { stream });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<PlatformEvent> {
        self.events.subscribe()
    }
}

#[async_trait::async_trait]
impl WindowPlatform for VirtualDesktop {
    async fn create_overlay_window(&self, width: u32, height: u32) -> VeilResult<WindowId> {
        let mut state = self.lock();
        if state.faults.refuse_window_creation {
            return Err(VeilError::platform("window creation refused"));
        }
        if width == 0 || height == 0 {
            return Err(VeilError::platform("overlay window must have a non-zero size"));
        }
        let window = WindowId(state.next_window);
        state.next_window += 1;
        state.surfaces.insert(
            window,
            SurfaceState {
                visible: false,
                excluded: false,
            },
        );
        state.ops.push(DesktopOp::CreateWindow { window });
        Ok(window)
    }

    async fn set_excluded_from_capture(&self, window: WindowId, excluded: bool) -> VeilResult<()> {
        let mut state = self.lock();
        if excluded && state.faults.refuse_exclusion {
            return Err(VeilError::platform("display affinity refused by compositor"));
        }
        state.surface_mut(window)?.excluded = excluded;
        state.ops.push(DesktopOp::Exclude { window, excluded });
        Ok(())
    }

    async fn set_window_visible(&self, window: WindowId, visible: bool) -> VeilResult<()> {
        let mut state = self.lock();
        if !visible && state.faults.refuse_hide {
            return Err(VeilError::platform("window refused to hide"));
        }
        state.surface_mut(window)?.visible = visible;
        state.ops.push(if visible {
            DesktopOp::Show { window }
        } else {
            DesktopOp::Hide { window }
        });
        Ok(())
    }

    async fn destroy_window(&self, window: WindowId) -> VeilResult<()> {
        let mut state = self.lock();
        if state.surfaces.remove(&window).is_none() {
            return Err(VeilError::platform(format!("no such window {}", window.0)));
        }
        state.ops.push(DesktopOp::DestroyWindow { window });
        Ok(())
    }

    fn monitors(&self) -> VeilResult<Vec<MonitorInfo>> {
        Ok(self.lock().screens.iter().map(|(_, m)| m.clone()).collect())
    }
}

/// Draw a flat preview: a tinted background, plus a title bar for windows.
fn render_preview(source_id: &str, kind: SourceKind, width: u32, height: u32) -> VeilResult<Vec<u8>> {
    if width == 0 || height == 0 {
        return Err(VeilError::platform("thumbnail size must be non-zero"));
    }

    let tint = source_id
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
    let background = Rgb([
        40 + (tint % 60) as u8,
        40 + ((tint >> 8) % 60) as u8,
        50 + ((tint >> 16) % 60) as u8,
    ]);
    let mut img: RgbImage = ImageBuffer::from_pixel(width, height, background);

    if kind == SourceKind::Window {
        let bar = (height / 10).max(1);
        for y in 0..bar {
            for x in 0..width {
                img.put_pixel(x, y, Rgb([200, 200, 210]));
            }
        }
    }

    let mut png = Vec::new();
    img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| VeilError::platform(format!("thumbnail encode failed: {e}")))?;
    Ok(png)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn preview_is_png() {
        let desktop = VirtualDesktop::new();
        let png = desktop.render_thumbnail("win-1", 32, 18).await.unwrap();
        assert_eq!(&png[..4], &[0x89, b'P', b'N', b'G']);
    }

    #[tokio::test]
    async fn release_of_unknown_stream_is_an_error() {
        let desktop = VirtualDesktop::new();
        let stream = desktop.acquire_stream("screen-0").await.unwrap();
        desktop.release_stream(stream).await.unwrap();
        assert!(desktop.release_stream(stream).await.is_err());
        assert_eq!(desktop.release_count(), 1);
    }

    #[tokio::test]
    async fn recreation_drops_exclusion() {
        let desktop = VirtualDesktop::new();
        let window = desktop.create_overlay_window(380, 500).await.unwrap();
        desktop.set_excluded_from_capture(window, true).await.unwrap();
        assert!(desktop.surface(window).unwrap().excluded);
        desktop.recreate_window(window);
        assert!(!desktop.surface(window).unwrap().excluded);
    }

    #[tokio::test]
    async fn removing_streamed_source_emits_source_lost() {
        let desktop = VirtualDesktop::new();
        let mut events = desktop.subscribe();
        desktop.acquire_stream("win-2").await.unwrap();
        desktop.remove_source("win-2");
        assert_eq!(
            events.recv().await.unwrap(),
            PlatformEvent::SourceLost {
                source_id: "win-2".to_string()
            }
        );
    }

    #[tokio::test]
    async fn screen_ids_survive_monitor_removal() {
        let monitors = (0..3)
            .map(|i| MonitorInfo {
                name: format!("Display {i}"),
                width: 1920,
                height: 1080,
                x: 1920 * i,
                y: 0,
                scale_factor: 1.0,
                primary: i == 0,
            })
            .collect();
        let desktop = VirtualDesktop::with_layout(monitors, Vec::new());

        desktop.remove_source("screen-1");

        let sources = desktop.list_sources(&[SourceKind::Screen]).await.unwrap();
        let ids: Vec<_> = sources.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["screen-0", "screen-2"]);
        assert_eq!(sources[1].name, "Display 2");
        assert_eq!(desktop.monitors().unwrap().len(), 2);
        assert!(desktop.acquire_stream("screen-2").await.is_ok());
    }
}
