//! List capturable sources.

use veil_common::config::AppConfig;
use veil_platform_core::SourceKind;

use super::Desk;

pub async fn run(config: &AppConfig, screens: bool, windows: bool, json: bool) -> anyhow::Result<()> {
    let mut kinds = Vec::new();
    if screens {
        kinds.push(SourceKind::Screen);
    }
    if windows {
        kinds.push(SourceKind::Window);
    }

    let desk = Desk::start(config);
    let sources = desk.capture.enumerate_sources(&kinds).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&sources)?);
        return Ok(());
    }

    if sources.is_empty() {
        println!("No capturable sources.");
        return Ok(());
    }

    println!("{:<12} {:<8} {:<24} Preview", "ID", "Kind", "Name");
    println!("{}", "-".repeat(56));
    for source in &sources {
        let preview = match &source.thumbnail {
            Some(url) => format!("{} bytes", url.len()),
            None => "unavailable".to_string(),
        };
        println!(
            "{:<12} {:<8} {:<24} {}",
            source.id,
            source.kind.as_str(),
            source.display_name,
            preview
        );
    }
    Ok(())
}
