//! Check configuration and capabilities.

use veil_common::config::{config_file_path, AppConfig};
use veil_overlay::Keymap;
use veil_platform_core::WindowPlatform;

use super::Desk;

pub async fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("Veil System Check");
    println!("{}", "=".repeat(50));

    let path = config_file_path();
    if path.exists() {
        println!("[OK] Config: {}", path.display());
    } else {
        println!("[--] Config: defaults ({} not found)", path.display());
    }

    let support = veil_platform_windows::probe_exclusion_support();
    if support.available {
        println!("[OK] Capture exclusion: {}", support.backend);
    } else {
        println!("[WARN] Capture exclusion: not available on this platform");
    }

    let mut all_ok = true;
    match Keymap::from_config(&config.hotkeys) {
        Ok(keymap) => {
            println!("[OK] Hotkeys:");
            for (chord, command) in keymap.bindings() {
                println!("     {:<8} {command:?}", chord.to_string());
            }
        }
        Err(e) => {
            all_ok = false;
            println!("[FAIL] Hotkeys: {e}");
        }
    }

    let desk = Desk::start(config);
    let monitors = desk.desktop.monitors()?;
    println!("[OK] Monitors detected: {}", monitors.len());
    for m in &monitors {
        println!(
            "     {} {}x{} at ({}, {}) (scale: {}x) {}",
            m.name,
            m.width,
            m.height,
            m.x,
            m.y,
            m.scale_factor,
            if m.primary { "(primary)" } else { "" }
        );
    }

    match desk.capture.enumerate_sources(&[]).await {
        Ok(sources) => println!("[OK] Host answered: {} sources", sources.len()),
        Err(e) => {
            all_ok = false;
            println!("[FAIL] Host: {e}");
        }
    }
    desk.host.shutdown();

    match config.assistant.endpoint.as_deref() {
        Some(endpoint) => println!("[OK] Assistant endpoint: {endpoint}"),
        None => println!("[--] Assistant: scripted replies (no endpoint configured)"),
    }

    println!();
    if all_ok {
        println!("Veil is ready.");
    } else {
        println!("Some checks failed. See above for details.");
    }
    Ok(())
}
