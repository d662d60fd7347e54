//! Windows capture exclusion.
//!
//! Uses window display affinity: a window with `WDA_EXCLUDEFROMCAPTURE`
//! stays on the local screen but is omitted from screen capture. Every
//! change is read back so callers only see success once Windows reports the
//! new affinity. On other targets each call returns `Unsupported`.
//!
//! This crate is the native primitive only. There is no Windows
//! `WindowPlatform` here: the shell that owns the overlay's `HWND` calls
//! [`set_excluded_from_capture`] from its own implementation. Inside this
//! workspace only [`probe_exclusion_support`] is reached, from `veil check`.

use serde::Serialize;

use veil_common::error::{VeilError, VeilResult};

/// Raw `HWND` value of a top-level window.
pub type RawWindow = isize;

/// What this build can do about capture exclusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExclusionSupport {
    pub available: bool,
    pub backend: &'static str,
}

pub fn probe_exclusion_support() -> ExclusionSupport {
    ExclusionSupport {
        available: cfg!(target_os = "windows"),
        backend: if cfg!(target_os = "windows") {
            "display-affinity"
        } else {
            "none"
        },
    }
}

/// Set or clear capture exclusion on `window` and confirm it took effect.
///
/// Builds before Windows 10 2004 silently downgrade the request to
/// `WDA_MONITOR`; that is reported as a failure.
pub fn set_excluded_from_capture(window: RawWindow, excluded: bool) -> VeilResult<()> {
    imp::set_affinity(window, excluded)?;
    let actual = imp::is_excluded(window)?;
    if actual != excluded {
        return Err(VeilError::exclusion_assert_failed(format!(
            "window {window:#x} reports excluded={actual} after requesting {excluded}"
        )));
    }
    tracing::debug!(window, excluded, "Display affinity applied");
    Ok(())
}

pub fn is_excluded_from_capture(window: RawWindow) -> VeilResult<bool> {
    imp::is_excluded(window)
}

#[cfg(target_os = "windows")]
mod imp {
    use veil_common::error::{VeilError, VeilResult};
    use windows::Win32::Foundation::HWND;
    use windows::Win32::UI::WindowsAndMessaging::{
        GetWindowDisplayAffinity, SetWindowDisplayAffinity, WDA_EXCLUDEFROMCAPTURE, WDA_NONE,
    };

    use super::RawWindow;

    fn hwnd(window: RawWindow) -> HWND {
        HWND(window as *mut core::ffi::c_void)
    }

    pub fn set_affinity(window: RawWindow, excluded: bool) -> VeilResult<()> {
        let affinity = if excluded {
            WDA_EXCLUDEFROMCAPTURE
        } else {
            WDA_NONE
        };
        // SAFETY: the call validates the handle and fails on a stale HWND.
        unsafe { SetWindowDisplayAffinity(hwnd(window), affinity) }
            .map_err(|e| VeilError::platform(format!("SetWindowDisplayAffinity failed: {e}")))
    }

    pub fn is_excluded(window: RawWindow) -> VeilResult<bool> {
        let mut affinity = 0u32;
        // SAFETY: `affinity` outlives the call.
        unsafe { GetWindowDisplayAffinity(hwnd(window), &mut affinity) }
            .map_err(|e| VeilError::platform(format!("GetWindowDisplayAffinity failed: {e}")))?;
        Ok(affinity == WDA_EXCLUDEFROMCAPTURE.0)
    }
}

#[cfg(not(target_os = "windows"))]
mod imp {
    use veil_common::error::{VeilError, VeilResult};

    use super::RawWindow;

    pub fn set_affinity(_window: RawWindow, _excluded: bool) -> VeilResult<()> {
        Err(VeilError::unsupported(
            "capture exclusion needs window display affinity (Windows only)",
        ))
    }

    pub fn is_excluded(_window: RawWindow) -> VeilResult<bool> {
        Err(VeilError::unsupported(
            "capture exclusion needs window display affinity (Windows only)",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn support_report_serializes() {
        let support = probe_exclusion_support();
        let json = serde_json::to_value(support).unwrap();
        assert_eq!(json["available"], cfg!(target_os = "windows"));
        assert!(json["backend"].is_string());
    }

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn other_targets_report_unsupported() {
        assert!(matches!(
            set_excluded_from_capture(0x1234, true),
            Err(VeilError::Unsupported { .. })
        ));
        assert!(is_excluded_from_capture(0x1234).is_err());
    }
}
