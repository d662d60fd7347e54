//! Local chord handling for the overlay and the running session.

use std::sync::Arc;

use veil_common::error::VeilResult;
use veil_overlay::{Chord, Keymap, LocalCommand};

use crate::session::CaptureController;

pub struct CommandDispatcher {
    keymap: Keymap,
    controller: Arc<CaptureController>,
}

impl CommandDispatcher {
    pub fn new(keymap: Keymap, controller: Arc<CaptureController>) -> Self {
        Self { keymap, controller }
    }

    /// Resolve and run a chord. Unbound chords return `None`.
    pub async fn on_chord(&self, chord: &Chord) -> VeilResult<Option<LocalCommand>> {
        let Some(command) = self.keymap.resolve(chord) else {
            return Ok(None);
        };
        self.apply(command).await?;
        Ok(Some(command))
    }

    pub async fn apply(&self, command: LocalCommand) -> VeilResult<()> {
        let overlay = self.controller.overlay();
        match command {
            LocalCommand::ToggleOverlay => {
                let visible = overlay.toggle_visibility().await?;
                tracing::debug!(visible, "Overlay toggled");
            }
            LocalCommand::ToggleExclusion => {
                let excluded = overlay.toggle_exclusion().await?;
                tracing::info!(excluded, "Overlay stealth toggled");
            }
            LocalCommand::CycleOpacity => {
                let opacity = overlay.cycle_opacity();
                tracing::debug!(opacity, "Overlay opacity");
            }
            LocalCommand::StopSharing => {
                if self.controller.state().is_live() {
                    let state = self.controller.end_capture().await?;
                    tracing::info!(state = ?state, "Sharing stopped from keyboard");
                } else {
                    tracing::debug!("Stop chord with nothing shared");
                }
            }
        }
        Ok(())
    }
}
