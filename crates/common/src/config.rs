//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Capability bridge settings.
    pub bridge: BridgeConfig,

    /// Source enumeration defaults.
    pub catalog: CatalogConfig,

    /// Overlay window defaults.
    pub overlay: OverlayConfig,

    /// Local keyboard bindings.
    pub hotkeys: HotkeyConfig,

    /// Assistant service settings.
    pub assistant: AssistantConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Bridge call policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Upper bound on a single host round-trip, in milliseconds.
    /// A call that exceeds it is reported as host-unavailable.
    pub request_timeout_ms: u64,
}

/// Source enumeration defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Thumbnail width in pixels.
    pub thumbnail_width: u32,

    /// Thumbnail height in pixels.
    pub thumbnail_height: u32,

    /// Include monitors when the caller does not ask for specific kinds.
    pub screens: bool,

    /// Include application windows when the caller does not ask for specific kinds.
    pub windows: bool,
}

/// Where the overlay is anchored on its monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayPlacement {
    /// Top-right corner.
    #[default]
    Corner,
    /// Right edge, vertically centred.
    Side,
    /// Bottom edge, horizontally centred.
    Bottom,
    /// Wherever the user last dragged it.
    Floating,
}

/// Overlay window defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub width: u32,
    pub height: u32,

    /// Initial opacity in `[0.1, 1.0]`.
    pub opacity: f64,

    /// Initial anchor.
    pub placement: OverlayPlacement,

    /// Distance from the monitor edge for anchored placements (pixels).
    pub margin: i32,

    /// Request capture exclusion even when no capture session is running.
    pub stealth: bool,
}

/// Local keyboard chords. Each value is a chord such as `Alt+A`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HotkeyConfig {
    pub toggle_overlay: String,
    pub toggle_exclusion: String,
    pub cycle_opacity: String,
    pub stop_sharing: String,
}

/// Assistant service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// HTTP endpoint accepting `{"message": ...}` and returning `{"reply": ...}`.
    /// When unset the scripted local responder is used.
    pub endpoint: Option<String>,

    /// Request timeout, in milliseconds.
    pub timeout_ms: u64,

    /// First assistant turn of every transcript.
    pub greeting: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "veil=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 5_000,
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            thumbnail_width: 320,
            thumbnail_height: 180,
            screens: true,
            windows: true,
        }
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            width: 380,
            height: 500,
            opacity: 1.0,
            placement: OverlayPlacement::Corner,
            margin: 40,
            stealth: true,
        }
    }
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            toggle_overlay: "Alt+A".to_string(),
            toggle_exclusion: "Alt+S".to_string(),
            cycle_opacity: "Alt+O".to_string(),
            stop_sharing: "Alt+X".to_string(),
        }
    }
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_ms: 30_000,
            greeting: "Hi there! I'm your private assistant. Only you can see this panel. \
                       How can I help you today?"
                .to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }

    /// Bridge timeout as a `Duration`.
    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.bridge.request_timeout_ms.max(1))
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("veil").join("config.json")
}
