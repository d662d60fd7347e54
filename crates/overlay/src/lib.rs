//! Veil Overlay
//!
//! The assistant overlay window as seen from the UI context:
//! - **Manager:** visibility and capture exclusion, kept coupled during capture
//! - **Placement:** corner, side, bottom, and floating anchors per monitor
//! - **Hotkeys:** local chords mapped to overlay and session commands

pub mod hotkeys;
pub mod manager;
pub mod placement;

pub use hotkeys::{Chord, Keymap, LocalCommand};
pub use manager::{OverlayManager, OverlaySnapshot, PaintState};
pub use placement::{MonitorSelector, Position};
