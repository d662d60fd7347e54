//! Multi-display overlay placement.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use veil_common::config::OverlayPlacement;
use veil_common::error::VeilError;
use veil_platform_core::{primary_monitor, virtual_desktop_bounds, MonitorInfo};

/// Top-left corner of the overlay in virtual-desktop pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Which monitor a preset is anchored on.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MonitorSelector {
    #[default]
    Primary,
    /// Position in the host's monitor list.
    Index(usize),
    /// Monitor name as the host reports it.
    Name(String),
}

impl MonitorSelector {
    /// Resolve against `monitors`. Unknown selectors fall back to the
    /// primary monitor.
    pub fn select<'a>(&self, monitors: &'a [MonitorInfo]) -> Option<&'a MonitorInfo> {
        let chosen = match self {
            MonitorSelector::Primary => None,
            MonitorSelector::Index(idx) => monitors.get(*idx),
            MonitorSelector::Name(name) => monitors.iter().find(|m| &m.name == name),
        };
        if chosen.is_none() && *self != MonitorSelector::Primary {
            tracing::debug!(selector = %self, "Monitor not found, using primary");
        }
        chosen.or_else(|| primary_monitor(monitors))
    }
}

impl FromStr for MonitorSelector {
    type Err = VeilError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value.is_empty() {
            return Err(VeilError::Config {
                message: "empty monitor selector".to_string(),
            });
        }
        if value.eq_ignore_ascii_case("primary") {
            return Ok(MonitorSelector::Primary);
        }
        Ok(match value.parse::<usize>() {
            Ok(idx) => MonitorSelector::Index(idx),
            Err(_) => MonitorSelector::Name(value.to_string()),
        })
    }
}

impl fmt::Display for MonitorSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorSelector::Primary => write!(f, "primary"),
            MonitorSelector::Index(idx) => write!(f, "{idx}"),
            MonitorSelector::Name(name) => write!(f, "{name}"),
        }
    }
}

/// Anchor an overlay of `size` on `monitor`.
///
/// `Floating` keeps `current`, only pulling it back onto the monitor if it
/// would be entirely off-screen.
pub fn anchor_position(
    placement: OverlayPlacement,
    monitor: &MonitorInfo,
    size: (u32, u32),
    margin: i32,
    current: Position,
) -> Position {
    let (w, h) = (size.0 as i32, size.1 as i32);
    let left = monitor.x;
    let top = monitor.y;
    let right = monitor.x + monitor.width as i32;
    let bottom = monitor.y + monitor.height as i32;

    let anchored = match placement {
        OverlayPlacement::Corner => Position::new(right - w - margin, top + margin),
        OverlayPlacement::Side => Position::new(right - w - margin, top + (bottom - top - h) / 2),
        OverlayPlacement::Bottom => Position::new(left + (right - left - w) / 2, bottom - h - margin),
        OverlayPlacement::Floating => return clamp_to_desktop(current, size, std::slice::from_ref(monitor)),
    };

    Position::new(anchored.x.max(left), anchored.y.max(top))
}

/// Anchor on the monitor picked by `selector`.
pub fn anchor_on(
    placement: OverlayPlacement,
    selector: &MonitorSelector,
    monitors: &[MonitorInfo],
    size: (u32, u32),
    margin: i32,
    current: Position,
) -> Position {
    match selector.select(monitors) {
        Some(monitor) => anchor_position(placement, monitor, size, margin, current),
        None => clamp_to_desktop(current, size, monitors),
    }
}

/// Keep at least part of the window on the virtual desktop.
///
/// The title strip (top 32 px) must stay reachable so the user can drag
/// the overlay back.
pub fn clamp_to_desktop(position: Position, size: (u32, u32), monitors: &[MonitorInfo]) -> Position {
    const GRIP: i32 = 32;
    let (vx, vy, vw, vh) = virtual_desktop_bounds(monitors);
    let w = size.0 as i32;

    let min_x = vx - w + GRIP;
    let max_x = vx + vw as i32 - GRIP;
    let min_y = vy;
    let max_y = vy + vh as i32 - GRIP;

    Position::new(
        position.x.clamp(min_x, max_x.max(min_x)),
        position.y.clamp(min_y, max_y.max(min_y)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor(x: i32, primary: bool) -> MonitorInfo {
        MonitorInfo {
            name: format!("m{x}"),
            width: 1920,
            height: 1080,
            x,
            y: 0,
            scale_factor: 1.0,
            primary,
        }
    }

    #[test]
    fn corner_sits_top_right_inside_margin() {
        let pos = anchor_position(
            OverlayPlacement::Corner,
            &monitor(0, true),
            (380, 500),
            40,
            Position::default(),
        );
        assert_eq!(pos, Position::new(1920 - 380 - 40, 40));
    }

    #[test]
    fn side_and_bottom_are_centred_on_their_axis() {
        let m = monitor(0, true);
        let side = anchor_position(OverlayPlacement::Side, &m, (380, 500), 40, Position::default());
        assert_eq!(side, Position::new(1500, 290));
        let bottom = anchor_position(OverlayPlacement::Bottom, &m, (380, 500), 40, Position::default());
        assert_eq!(bottom, Position::new(770, 540));
    }

    #[test]
    fn anchors_follow_the_primary_monitor() {
        let monitors = vec![monitor(-1920, false), monitor(0, true)];
        let pos = anchor_on(
            OverlayPlacement::Corner,
            &MonitorSelector::Primary,
            &monitors,
            (380, 500),
            40,
            Position::default(),
        );
        assert_eq!(pos.x, 1500);
    }

    #[test]
    fn floating_is_pulled_back_on_screen() {
        let monitors = vec![monitor(0, true), monitor(1920, false)];
        let pos = clamp_to_desktop(Position::new(9000, -50), (380, 500), &monitors);
        assert_eq!(pos, Position::new(3840 - 32, 0));

        let inside = clamp_to_desktop(Position::new(2000, 300), (380, 500), &monitors);
        assert_eq!(inside, Position::new(2000, 300));
    }

    #[test]
    fn selectors_pick_a_monitor_or_fall_back_to_primary() {
        let monitors = vec![monitor(-1920, false), monitor(0, true)];

        let by_index: MonitorSelector = "0".parse().unwrap();
        assert_eq!(by_index.select(&monitors).unwrap().x, -1920);

        let by_name: MonitorSelector = "m0".parse().unwrap();
        assert_eq!(by_name, MonitorSelector::Name("m0".to_string()));
        assert_eq!(by_name.select(&monitors).unwrap().x, 0);

        let missing = MonitorSelector::Index(7);
        assert!(missing.select(&monitors).unwrap().primary);
        assert!("  ".parse::<MonitorSelector>().is_err());
    }
}
