//! Local keyboard chords.
//!
//! Chords resolve to [`LocalCommand`]s inside the UI context; resolving a
//! chord never touches the bridge.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use veil_common::config::HotkeyConfig;
use veil_common::error::{VeilError, VeilResult};

/// A modifier set plus one key, e.g. `Alt+A`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Chord {
    pub alt: bool,
    pub ctrl: bool,
    pub shift: bool,
    pub meta: bool,
    /// Lowercased key character.
    pub key: char,
}

impl Chord {
    pub fn alt(key: char) -> Self {
        Self {
            alt: true,
            ctrl: false,
            shift: false,
            meta: false,
            key: key.to_ascii_lowercase(),
        }
    }
}

impl FromStr for Chord {
    type Err = VeilError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chord = Chord {
            alt: false,
            ctrl: false,
            shift: false,
            meta: false,
            key: '\0',
        };
        let mut key = None;

        for part in s.split('+').map(str::trim) {
            match part.to_ascii_lowercase().as_str() {
                "alt" | "option" => chord.alt = true,
                "ctrl" | "control" => chord.ctrl = true,
                "shift" => chord.shift = true,
                "meta" | "cmd" | "super" => chord.meta = true,
                other => {
                    let mut chars = other.chars();
                    match (chars.next(), chars.next(), key) {
                        (Some(c), None, None) => key = Some(c),
                        _ => {
                            return Err(VeilError::Config {
                                message: format!("invalid hotkey {s:?}"),
                            })
                        }
                    }
                }
            }
        }

        chord.key = key.ok_or_else(|| VeilError::Config {
            message: format!("hotkey {s:?} has no key"),
        })?;
        Ok(chord)
    }
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (on, name) in [
            (self.ctrl, "Ctrl"),
            (self.alt, "Alt"),
            (self.shift, "Shift"),
            (self.meta, "Meta"),
        ] {
            if on {
                write!(f, "{name}+")?;
            }
        }
        write!(f, "{}", self.key.to_ascii_uppercase())
    }
}

/// Commands bound to chords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalCommand {
    ToggleOverlay,
    ToggleExclusion,
    CycleOpacity,
    StopSharing,
}

/// Chord → command table.
#[derive(Debug, Clone)]
pub struct Keymap {
    bindings: Vec<(Chord, LocalCommand)>,
}

impl Keymap {
    pub fn from_config(config: &HotkeyConfig) -> VeilResult<Self> {
        let bindings = vec![
            (config.toggle_overlay.parse()?, LocalCommand::ToggleOverlay),
            (config.toggle_exclusion.parse()?, LocalCommand::ToggleExclusion),
            (config.cycle_opacity.parse()?, LocalCommand::CycleOpacity),
            (config.stop_sharing.parse()?, LocalCommand::StopSharing),
        ];

        for (i, (chord, _)) in bindings.iter().enumerate() {
            if bindings[..i].iter().any(|(other, _)| other == chord) {
                return Err(VeilError::Config {
                    message: format!("hotkey {chord} is bound twice"),
                });
            }
        }
        Ok(Self { bindings })
    }

    pub fn resolve(&self, chord: &Chord) -> Option<LocalCommand> {
        self.bindings
            .iter()
            .find(|(bound, _)| bound == chord)
            .map(|(_, command)| *command)
    }

    pub fn bindings(&self) -> &[(Chord, LocalCommand)] {
        &self.bindings
    }
}

impl Default for Keymap {
    fn default() -> Self {
        Self {
            bindings: vec![
                (Chord::alt('a'), LocalCommand::ToggleOverlay),
                (Chord::alt('s'), LocalCommand::ToggleExclusion),
                (Chord::alt('o'), LocalCommand::CycleOpacity),
                (Chord::alt('x'), LocalCommand::StopSharing),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_modifiers_case_insensitively() {
        let chord: Chord = "alt+A".parse().unwrap();
        assert_eq!(chord, Chord::alt('a'));
        let chord: Chord = "Ctrl + Shift + k".parse().unwrap();
        assert!(chord.ctrl && chord.shift && !chord.alt);
        assert_eq!(chord.to_string(), "Ctrl+Shift+K");
    }

    #[test]
    fn rejects_malformed_chords() {
        assert!("Alt+".parse::<Chord>().is_err());
        assert!("Alt+AB".parse::<Chord>().is_err());
        assert!("A+B".parse::<Chord>().is_err());
    }

    #[test]
    fn default_config_matches_default_keymap() {
        let keymap = Keymap::from_config(&HotkeyConfig::default()).unwrap();
        assert_eq!(keymap.bindings(), Keymap::default().bindings());
        assert_eq!(
            keymap.resolve(&Chord::alt('o')),
            Some(LocalCommand::CycleOpacity)
        );
        assert_eq!(keymap.resolve(&Chord::alt('p')), None);
    }

    #[test]
    fn duplicate_bindings_are_rejected() {
        let config = HotkeyConfig {
            cycle_opacity: "Alt+A".to_string(),
            ..HotkeyConfig::default()
        };
        assert!(Keymap::from_config(&config).is_err());
    }
}
