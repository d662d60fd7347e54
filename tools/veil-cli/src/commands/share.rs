//! Share a source with the overlay excluded from capture.
//!
//! Stops on Ctrl+C, after `--duration-secs`, or when the host ends the
//! stream. Overlay hotkeys are not bound here.

use std::sync::Arc;
use std::time::Duration;

use veil_capture_engine::{CaptureController, SessionState};
use veil_common::config::{AppConfig, OverlayPlacement};
use veil_overlay::{MonitorSelector, OverlayManager};

use super::Desk;

/// Where to put the overlay before sharing starts.
pub struct OverlayLayout {
    pub placement: Option<OverlayPlacement>,
    pub monitor: MonitorSelector,
}

pub async fn run(
    config: &AppConfig,
    source_id: String,
    overlay_on: bool,
    layout: OverlayLayout,
    duration_secs: Option<u64>,
) -> anyhow::Result<()> {
    let desk = Desk::start(config);
    let overlay = Arc::new(OverlayManager::new(
        desk.desktop.clone(),
        config.overlay.clone(),
    ));
    let placement = layout.placement.unwrap_or(config.overlay.placement);
    if layout.placement.is_some() || layout.monitor != MonitorSelector::Primary {
        overlay.place(placement, &layout.monitor)?;
    }

    let controller = Arc::new(CaptureController::new(
        desk.capture.clone(),
        overlay.clone(),
    ));
    let listener = controller.spawn_status_listener()?;

    if overlay_on {
        overlay.show().await?;
    }

    println!("Sharing {source_id}...");
    controller.begin_capture(&source_id).await?;

    let snapshot = overlay.snapshot().await;
    println!("  Session: {}", serde_json::to_string(&controller.snapshot())?);
    println!(
        "  Overlay: visible={} excluded={} at ({}, {})",
        snapshot.visible, snapshot.excluded, snapshot.paint.position.x, snapshot.paint.position.y
    );

    let mut updates = controller.subscribe();
    let ended_elsewhere = async {
        let _ = updates.wait_for(|s| !s.state.is_live()).await;
    };

    match duration_secs {
        Some(secs) => {
            println!("Stopping in {secs}s...");
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
                _ = ended_elsewhere => {}
            }
        }
        None => {
            println!("Press Ctrl+C to stop sharing...");
            tokio::select! {
                result = tokio::signal::ctrl_c() => result?,
                _ = ended_elsewhere => {}
            }
        }
    }

    let state = controller.end_capture().await?;
    listener.abort();

    println!();
    match state {
        SessionState::Stopped => println!("Sharing stopped."),
        SessionState::Failed(reason) => println!("Sharing failed: {reason}"),
        other => println!("Sharing ended in state {other:?}"),
    }
    Ok(())
}
