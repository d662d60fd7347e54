//! Overlay window manager.
//!
//! Owns the assistant overlay's host window and keeps one coupling intact:
//! while a capture session is active, the overlay is visible only if the
//! host has confirmed its capture exclusion.
//!
//! Host-coupled state (window, visibility, exclusion) sits behind an async
//! lock because every change is a host round trip. Paint-only state
//! (position, opacity, placement) sits behind its own lock and never waits
//! on the host.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;

use veil_common::config::{OverlayConfig, OverlayPlacement};
use veil_common::error::{VeilError, VeilResult};
use veil_platform_core::{WindowId, WindowPlatform};

use crate::placement::{anchor_on, MonitorSelector, Position};

const OPACITY_STEPS: [f64; 3] = [1.0, 0.7, 0.4];
const MIN_OPACITY: f64 = 0.1;

#[derive(Debug, Default)]
struct Surface {
    window: Option<WindowId>,
    visible: bool,
    excluded: bool,
    capture_active: bool,
    stealth: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PaintState {
    pub position: Position,
    pub opacity: f64,
    pub placement: OverlayPlacement,
}

/// Point-in-time view of the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OverlaySnapshot {
    pub window: Option<WindowId>,
    pub visible: bool,
    pub excluded: bool,
    pub capture_active: bool,
    pub stealth: bool,
    pub paint: PaintState,
}

impl OverlaySnapshot {
    /// True if the overlay would appear in the shared stream.
    pub fn leaks_into_capture(&self) -> bool {
        self.capture_active && self.visible && !self.excluded
    }
}

pub struct OverlayManager {
    host: Arc<dyn WindowPlatform>,
    config: OverlayConfig,
    surface: AsyncMutex<Surface>,
    paint: Mutex<PaintState>,
}

impl OverlayManager {
    pub fn new(host: Arc<dyn WindowPlatform>, config: OverlayConfig) -> Self {
        let monitors = host.monitors().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Could not read monitor layout");
            Vec::new()
        });
        let position = anchor_on(
            config.placement,
            &MonitorSelector::Primary,
            &monitors,
            (config.width, config.height),
            config.margin,
            Position::default(),
        );
        let paint = PaintState {
            position,
            opacity: config.opacity.clamp(MIN_OPACITY, 1.0),
            placement: config.placement,
        };

        Self {
            host,
            surface: AsyncMutex::new(Surface {
                stealth: config.stealth,
                ..Surface::default()
            }),
            paint: Mutex::new(paint),
            config,
        }
    }

    fn paint_lock(&self) -> MutexGuard<'_, PaintState> {
        self.paint.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub async fn snapshot(&self) -> OverlaySnapshot {
        let surface = self.surface.lock().await;
        OverlaySnapshot {
            window: surface.window,
            visible: surface.visible,
            excluded: surface.excluded,
            capture_active: surface.capture_active,
            stealth: surface.stealth,
            paint: self.paint(),
        }
    }

    /// What the renderer draws on its next paint.
    pub fn paint(&self) -> PaintState {
        *self.paint_lock()
    }

    // Visibility

    /// Make the overlay visible.
    ///
    /// During capture the exclusion is asserted first; if the host refuses,
    /// the overlay stays hidden and `ExclusionAssertFailed` is returned.
    pub async fn show(&self) -> VeilResult<()> {
        let mut surface = self.surface.lock().await;
        if surface.visible {
            return Ok(());
        }
        let window = self.ensure_window(&mut surface).await?;

        if surface.capture_active && !surface.excluded {
            self.assert_exclusion(&mut surface, window).await?;
        } else if surface.stealth && !surface.excluded {
            if let Err(e) = self.assert_exclusion(&mut surface, window).await {
                tracing::warn!(error = %e, "Stealth exclusion not applied outside capture");
            }
        }

        self.host.set_window_visible(window, true).await?;
        surface.visible = true;
        tracing::debug!(window = window.0, excluded = surface.excluded, "Overlay shown");
        Ok(())
    }

    pub async fn hide(&self) -> VeilResult<()> {
        let mut surface = self.surface.lock().await;
        self.hide_locked(&mut surface).await
    }

    pub async fn toggle_visibility(&self) -> VeilResult<bool> {
        let visible = self.surface.lock().await.visible;
        if visible {
            self.hide().await?;
        } else {
            self.show().await?;
        }
        Ok(!visible)
    }

    /// Hide by any means. Falls back to destroying the window.
    pub async fn force_hide(&self) {
        let mut surface = self.surface.lock().await;
        self.force_hide_locked(&mut surface).await;
    }

    // Exclusion

    /// Set the user's stealth preference and apply it to the window.
    ///
    /// Clearing it while capture is active and the overlay is visible hides
    /// the overlay first.
    pub async fn set_excluded_from_capture(&self, excluded: bool) -> VeilResult<()> {
        let mut surface = self.surface.lock().await;
        surface.stealth = excluded;
        let Some(window) = surface.window else {
            return Ok(());
        };

        if excluded {
            if let Err(e) = self.assert_exclusion(&mut surface, window).await {
                if surface.capture_active && surface.visible {
                    self.force_hide_locked(&mut surface).await;
                }
                return Err(e);
            }
            return Ok(());
        }

        if surface.capture_active && surface.visible {
            self.hide_locked(&mut surface).await?;
        }
        self.host.set_excluded_from_capture(window, false).await?;
        surface.excluded = false;
        tracing::info!(window = window.0, "Overlay capture exclusion cleared");
        Ok(())
    }

    pub async fn toggle_exclusion(&self) -> VeilResult<bool> {
        let stealth = !self.surface.lock().await.stealth;
        self.set_excluded_from_capture(stealth).await?;
        Ok(stealth)
    }

    // Capture coupling

    /// Called on every transition into an active capture session.
    ///
    /// Re-issues the exclusion request regardless of the cached flag, since
    /// a recreated window may have lost it. On failure a visible overlay is
    /// force-hidden and `ExclusionAssertFailed` is returned.
    pub async fn enter_capture(&self) -> VeilResult<()> {
        let mut surface = self.surface.lock().await;
        surface.capture_active = true;
        let Some(window) = surface.window else {
            return Ok(());
        };

        if let Err(e) = self.assert_exclusion(&mut surface, window).await {
            if surface.visible {
                tracing::warn!(window = window.0, "Hiding overlay: exclusion not confirmed");
                self.force_hide_locked(&mut surface).await;
            }
            return Err(e);
        }
        Ok(())
    }

    /// Called when the session leaves Active. Hides the overlay.
    pub async fn leave_capture(&self) {
        let mut surface = self.surface.lock().await;
        if !surface.capture_active {
            return;
        }
        surface.capture_active = false;

        if surface.visible {
            if let Err(e) = self.hide_locked(&mut surface).await {
                tracing::warn!(error = %e, "Overlay did not hide after capture ended");
            }
        }
        if let (Some(window), false, true) = (surface.window, surface.stealth, surface.excluded) {
            match self.host.set_excluded_from_capture(window, false).await {
                Ok(()) => surface.excluded = false,
                Err(e) => tracing::debug!(error = %e, "Could not restore non-stealth window"),
            }
        }
    }

    // Paint state

    pub fn set_position(&self, x: i32, y: i32) {
        let mut paint = self.paint_lock();
        paint.position = Position::new(x, y);
        paint.placement = OverlayPlacement::Floating;
    }

    /// Clamp to `[0.1, 1.0]`. NaN leaves the current level.
    pub fn set_opacity(&self, level: f64) -> f64 {
        let mut paint = self.paint_lock();
        if !level.is_nan() {
            paint.opacity = level.clamp(MIN_OPACITY, 1.0);
        }
        paint.opacity
    }

    /// Step through 100% → 70% → 40% → 100%.
    pub fn cycle_opacity(&self) -> f64 {
        let mut paint = self.paint_lock();
        let next = OPACITY_STEPS
            .iter()
            .copied()
            .find(|step| *step < paint.opacity - 0.05)
            .unwrap_or(OPACITY_STEPS[0]);
        paint.opacity = next;
        next
    }

    /// Anchor to a preset on the chosen monitor. An unknown monitor falls
    /// back to the primary one.
    pub fn place(
        &self,
        placement: OverlayPlacement,
        monitor: &MonitorSelector,
    ) -> VeilResult<Position> {
        let monitors = self.host.monitors()?;
        let mut paint = self.paint_lock();
        paint.position = anchor_on(
            placement,
            monitor,
            &monitors,
            (self.config.width, self.config.height),
            self.config.margin,
            paint.position,
        );
        paint.placement = placement;
        Ok(paint.position)
    }

    // Host helpers; callers hold the surface lock.

    async fn ensure_window(&self, surface: &mut Surface) -> VeilResult<WindowId> {
        if let Some(window) = surface.window {
            return Ok(window);
        }
        let window = self
            .host
            .create_overlay_window(self.config.width, self.config.height)
            .await?;
        tracing::info!(window = window.0, "Overlay window created");
        surface.window = Some(window);
        surface.excluded = false;
        Ok(window)
    }

    async fn assert_exclusion(&self, surface: &mut Surface, window: WindowId) -> VeilResult<()> {
        match self.host.set_excluded_from_capture(window, true).await {
            Ok(()) => {
                surface.excluded = true;
                tracing::debug!(window = window.0, "Capture exclusion confirmed");
                Ok(())
            }
            Err(e) => {
                surface.excluded = false;
                tracing::error!(window = window.0, error = %e, "Host refused capture exclusion");
                Err(VeilError::exclusion_assert_failed(e.to_string()))
            }
        }
    }

    async fn hide_locked(&self, surface: &mut Surface) -> VeilResult<()> {
        let Some(window) = surface.window.filter(|_| surface.visible) else {
            return Ok(());
        };
        self.host.set_window_visible(window, false).await?;
        surface.visible = false;
        tracing::debug!(window = window.0, "Overlay hidden");
        Ok(())
    }

    async fn force_hide_locked(&self, surface: &mut Surface) {
        let Some(window) = surface.window else {
            surface.visible = false;
            return;
        };
        if surface.visible {
            match self.host.set_window_visible(window, false).await {
                Ok(()) => {
                    surface.visible = false;
                    return;
                }
                Err(e) => tracing::warn!(error = %e, "Hide refused, destroying overlay window"),
            }
        }
        if let Err(e) = self.host.destroy_window(window).await {
            tracing::error!(window = window.0, error = %e, "Could not destroy overlay window");
        }
        surface.window = None;
        surface.visible = false;
        surface.excluded = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use veil_host_runtime::{DesktopOp, SurfaceState, VirtualDesktop};
    use veil_platform_core::MonitorInfo;

    fn overlay(desktop: &Arc<VirtualDesktop>, stealth: bool) -> OverlayManager {
        OverlayManager::new(
            desktop.clone(),
            OverlayConfig {
                stealth,
                ..OverlayConfig::default()
            },
        )
    }

    #[tokio::test]
    async fn show_outside_capture_applies_stealth_preference() {
        let desktop = Arc::new(VirtualDesktop::new());
        let manager = overlay(&desktop, true);

        manager.show().await.unwrap();
        let snap = manager.snapshot().await;
        let window = snap.window.unwrap();
        assert_eq!(
            desktop.surface(window),
            Some(SurfaceState {
                visible: true,
                excluded: true
            })
        );
        assert!(!snap.leaks_into_capture());

        manager.show().await.unwrap();
        assert_eq!(desktop.exclusion_asserts(), 1);
    }

    #[tokio::test]
    async fn show_during_capture_excludes_before_becoming_visible() {
        let desktop = Arc::new(VirtualDesktop::new());
        let manager = overlay(&desktop, false);

        manager.enter_capture().await.unwrap();
        manager.show().await.unwrap();

        let ops = desktop.ops();
        let exclude = ops
            .iter()
            .position(|op| matches!(op, DesktopOp::Exclude { excluded: true, .. }))
            .unwrap();
        let show = ops
            .iter()
            .position(|op| matches!(op, DesktopOp::Show { .. }))
            .unwrap();
        assert!(exclude < show);
    }

    #[tokio::test]
    async fn refused_exclusion_keeps_overlay_hidden_during_capture() {
        let desktop = Arc::new(VirtualDesktop::new());
        desktop.refuse_exclusion(true);
        let manager = overlay(&desktop, true);

        manager.enter_capture().await.unwrap();
        let result = manager.show().await;
        assert!(matches!(result, Err(VeilError::ExclusionAssertFailed { .. })));
        assert!(!manager.snapshot().await.visible);
    }

    #[tokio::test]
    async fn enter_capture_force_hides_when_assertion_fails() {
        let desktop = Arc::new(VirtualDesktop::new());
        let manager = overlay(&desktop, false);
        manager.show().await.unwrap();

        desktop.refuse_exclusion(true);
        let result = manager.enter_capture().await;
        assert!(matches!(result, Err(VeilError::ExclusionAssertFailed { .. })));

        let snap = manager.snapshot().await;
        assert!(!snap.visible);
        assert!(!snap.leaks_into_capture());
    }

    #[tokio::test]
    async fn force_hide_destroys_a_window_that_refuses_to_hide() {
        let desktop = Arc::new(VirtualDesktop::new());
        let manager = overlay(&desktop, false);
        manager.show().await.unwrap();
        let window = manager.snapshot().await.window.unwrap();

        desktop.refuse_hide(true);
        desktop.refuse_exclusion(true);
        assert!(manager.enter_capture().await.is_err());

        assert_eq!(desktop.surface(window), None);
        let snap = manager.snapshot().await;
        assert_eq!(snap.window, None);
        assert!(!snap.visible);
    }

    #[tokio::test]
    async fn clearing_exclusion_during_capture_hides_first() {
        let desktop = Arc::new(VirtualDesktop::new());
        let manager = overlay(&desktop, true);
        manager.show().await.unwrap();
        manager.enter_capture().await.unwrap();

        manager.set_excluded_from_capture(false).await.unwrap();

        let window = manager.snapshot().await.window.unwrap();
        assert_eq!(
            desktop.surface(window),
            Some(SurfaceState {
                visible: false,
                excluded: false
            })
        );
        let ops = desktop.ops();
        let hide = ops.iter().position(|op| matches!(op, DesktopOp::Hide { .. }));
        let clear = ops
            .iter()
            .position(|op| matches!(op, DesktopOp::Exclude { excluded: false, .. }));
        assert!(hide < clear);
    }

    #[tokio::test]
    async fn leave_capture_hides_the_overlay() {
        let desktop = Arc::new(VirtualDesktop::new());
        let manager = overlay(&desktop, true);
        manager.enter_capture().await.unwrap();
        manager.show().await.unwrap();

        manager.leave_capture().await;
        let snap = manager.snapshot().await;
        assert!(!snap.visible);
        assert!(!snap.capture_active);
        assert!(snap.excluded);
    }

    #[test]
    fn opacity_cycles_and_clamps() {
        let desktop = Arc::new(VirtualDesktop::new());
        let manager = overlay(&desktop, true);

        assert_eq!(manager.cycle_opacity(), 0.7);
        assert_eq!(manager.cycle_opacity(), 0.4);
        assert_eq!(manager.cycle_opacity(), 1.0);

        assert_eq!(manager.set_opacity(0.0), 0.1);
        assert_eq!(manager.set_opacity(f64::NAN), 0.1);
        assert_eq!(manager.set_opacity(3.0), 1.0);
    }

    #[test]
    fn placement_is_local_paint_state() {
        let desktop = Arc::new(VirtualDesktop::new());
        let manager = overlay(&desktop, true);
        assert_eq!(manager.paint().position, Position::new(1500, 40));

        let pos = manager
            .place(OverlayPlacement::Bottom, &MonitorSelector::Primary)
            .unwrap();
        assert_eq!(pos, Position::new(770, 540));

        manager.set_position(12, 34);
        let paint = manager.paint();
        assert_eq!(paint.placement, OverlayPlacement::Floating);
        assert_eq!(paint.position, Position::new(12, 34));
        assert!(desktop.ops().is_empty());
    }

    #[test]
    fn presets_anchor_on_a_secondary_display() {
        let monitors = vec![
            MonitorInfo {
                name: "Built-in Display".to_string(),
                width: 1920,
                height: 1080,
                x: 0,
                y: 0,
                scale_factor: 1.0,
                primary: true,
            },
            MonitorInfo {
                name: "Studio Display".to_string(),
                width: 2560,
                height: 1440,
                x: 1920,
                y: -200,
                scale_factor: 1.0,
                primary: false,
            },
        ];
        let desktop = Arc::new(VirtualDesktop::with_layout(monitors, Vec::new()));
        let manager = overlay(&desktop, true);

        let by_name = MonitorSelector::Name("Studio Display".to_string());
        let corner = manager.place(OverlayPlacement::Corner, &by_name).unwrap();
        assert_eq!(corner, Position::new(1920 + 2560 - 380 - 40, -200 + 40));

        let bottom = manager
            .place(OverlayPlacement::Bottom, &MonitorSelector::Index(1))
            .unwrap();
        assert_eq!(bottom, Position::new(1920 + (2560 - 380) / 2, -200 + 1440 - 500 - 40));
        assert_eq!(manager.paint().placement, OverlayPlacement::Bottom);

        let fallback = manager
            .place(OverlayPlacement::Corner, &MonitorSelector::Index(5))
            .unwrap();
        assert_eq!(fallback, Position::new(1500, 40));
        assert!(desktop.ops().is_empty());
    }
}
