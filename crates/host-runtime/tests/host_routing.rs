use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use serde_json::json;

use veil_bridge::{BridgeMessage, CaptureBridge, StatusEvent, UpdateBridge};
use veil_common::config::CatalogConfig;
use veil_common::error::VeilError;
use veil_host_runtime::{spawn_host, HostHandle, HostRouter, SourceCatalog, VirtualDesktop};
use veil_platform_core::{MonitorInfo, SourceKind};

const TIMEOUT: Duration = Duration::from_millis(500);

fn start(desktop: Arc<VirtualDesktop>) -> (HostHandle, CaptureBridge) {
    let router = Arc::new(HostRouter::new(desktop.clone(), CatalogConfig::default()));
    let host = spawn_host(router, desktop);
    let bridge = CaptureBridge::new(host.transport(), TIMEOUT);
    (host, bridge)
}

#[tokio::test]
async fn enumerate_lists_screens_then_windows_with_thumbnails() {
    let desktop = Arc::new(VirtualDesktop::new());
    let (_host, bridge) = start(desktop);

    let sources = bridge.enumerate_sources(&[]).await.unwrap();
    let ids: Vec<_> = sources.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, ["screen-0", "win-1", "win-2"]);
    assert_eq!(sources[0].kind, SourceKind::Screen);
    assert!(sources
        .iter()
        .all(|s| s.thumbnail.as_deref().unwrap().starts_with("data:image/png;base64,")));

    let windows = bridge.enumerate_sources(&[SourceKind::Window]).await.unwrap();
    assert!(windows.iter().all(|s| s.kind == SourceKind::Window));
}

#[tokio::test]
async fn broken_thumbnail_keeps_the_source() {
    let desktop = Arc::new(VirtualDesktop::new());
    desktop.break_thumbnail("win-1");
    let (_host, bridge) = start(desktop);

    let sources = bridge.enumerate_sources(&[]).await.unwrap();
    let win = sources.iter().find(|s| s.id == "win-1").unwrap();
    assert_eq!(win.display_name, "Editor");
    assert!(win.thumbnail.is_none());
    assert_eq!(sources.len(), 3);
}

#[tokio::test]
async fn permission_refusal_is_not_an_empty_list() {
    let desktop = Arc::new(VirtualDesktop::new());
    desktop.deny_permission(true);
    let (_host, bridge) = start(desktop);

    let result = bridge.enumerate_sources(&[]).await;
    assert!(matches!(result, Err(VeilError::PermissionDenied { .. })));
}

#[tokio::test]
async fn begin_unknown_source_is_not_found() {
    let desktop = Arc::new(VirtualDesktop::new());
    let (_host, bridge) = start(desktop.clone());

    let result = bridge.begin_capture("missing-id").await;
    assert!(matches!(result, Err(VeilError::HostRejected { reason }) if reason == "NotFound"));
    assert_eq!(desktop.live_streams(), 0);
}

#[tokio::test]
async fn host_holds_one_stream_and_releases_it_once() {
    let desktop = Arc::new(VirtualDesktop::new());
    let (host, bridge) = start(desktop.clone());

    bridge.begin_capture("win-1").await.unwrap();
    assert_eq!(host.router().held_source().as_deref(), Some("win-1"));

    let second = bridge.begin_capture("win-2").await;
    assert!(matches!(second, Err(VeilError::HostRejected { reason }) if reason == "Busy"));

    bridge.end_capture().await.unwrap();
    bridge.end_capture().await.unwrap();
    assert_eq!(desktop.release_count(), 1);
    assert_eq!(desktop.live_streams(), 0);
}

#[tokio::test]
async fn malformed_payloads_are_refused() {
    let desktop = Arc::new(VirtualDesktop::new());
    let router = HostRouter::new(desktop, CatalogConfig::default());

    let reply = router
        .handle(BridgeMessage::new("begin-capture", json!({ "source": 1 })))
        .await;
    assert_eq!(reply, json!({ "ok": false, "error": "InvalidPayload" }));

    let reply = router
        .handle(BridgeMessage::new("enumerate-sources", json!({ "kinds": ["tab"] })))
        .await;
    assert_eq!(reply, json!({ "ok": false, "error": "InvalidPayload" }));

    let reply = router
        .handle(BridgeMessage::new("get-sources", json!({})))
        .await;
    assert_eq!(reply, json!({ "ok": false, "error": "UnknownChannel" }));
}

#[tokio::test]
async fn shutdown_makes_host_unavailable() {
    let desktop = Arc::new(VirtualDesktop::new());
    let (host, bridge) = start(desktop);

    host.shutdown();
    tokio::task::yield_now().await;

    let result = bridge.enumerate_sources(&[]).await;
    assert!(matches!(result, Err(VeilError::HostUnavailable { .. })));
}

#[tokio::test]
async fn stalled_host_times_out() {
    let desktop = Arc::new(VirtualDesktop::new());
    desktop.set_capture_delay(Some(Duration::from_secs(30)));
    let router = Arc::new(HostRouter::new(desktop.clone(), CatalogConfig::default()));
    let host = spawn_host(router, desktop);
    let bridge = CaptureBridge::new(host.transport(), Duration::from_millis(30));

    let result = bridge.begin_capture("win-1").await;
    assert!(matches!(result, Err(VeilError::HostUnavailable { .. })));
}

#[tokio::test]
async fn status_events_only_for_the_held_source() {
    let desktop = Arc::new(VirtualDesktop::new());
    let (_host, bridge) = start(desktop.clone());
    let mut status = bridge.status_events().unwrap();

    bridge.begin_capture("win-1").await.unwrap();
    desktop.remove_source("win-2");
    desktop.remove_source("win-1");

    let event = tokio::time::timeout(TIMEOUT, status.recv()).await.unwrap();
    assert_eq!(
        event,
        Some(StatusEvent::SourceLost {
            source_id: "win-1".to_string()
        })
    );
}

#[tokio::test]
async fn update_notices_reach_the_update_bridge() {
    let desktop = Arc::new(VirtualDesktop::new());
    let (host, _capture) = start(desktop);
    let updates = UpdateBridge::new(host.transport(), TIMEOUT);
    let mut available = updates.on_update_available().unwrap();
    let mut downloaded = updates.on_update_downloaded().unwrap();

    host.router().updates().announce_available("2.0.1");
    let payload = tokio::time::timeout(TIMEOUT, available.recv()).await.unwrap();
    assert_eq!(payload, Some(json!({ "version": "2.0.1" })));

    // Available is not installable until the download lands.
    assert!(matches!(
        updates.install_update().await,
        Err(VeilError::HostRejected { reason }) if reason == "NoUpdateDownloaded"
    ));

    host.router().updates().announce_downloaded("2.0.1");
    let payload = tokio::time::timeout(TIMEOUT, downloaded.recv()).await.unwrap();
    assert_eq!(payload, Some(json!({ "version": "2.0.1" })));

    updates.install_update().await.unwrap();
    assert!(host.router().updates().install_requested());
}

fn window_layout() -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::vec(("win-[0-9]", "[A-Za-z]{1,8}"), 0..12)
}

proptest! {
    #[test]
    fn enumerated_ids_are_unique(windows in window_layout(), monitor_count in 0usize..3) {
        let monitors = (0..monitor_count)
            .map(|i| MonitorInfo {
                name: format!("Display {i}"),
                width: 1920,
                height: 1080,
                x: 1920 * i as i32,
                y: 0,
                scale_factor: 1.0,
                primary: i == 0,
            })
            .collect();
        let desktop = Arc::new(VirtualDesktop::with_layout(monitors, windows));
        let catalog = SourceCatalog::new(
            desktop,
            CatalogConfig {
                thumbnail_width: 8,
                thumbnail_height: 8,
                ..CatalogConfig::default()
            },
        );

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let sources = runtime.block_on(catalog.enumerate(&[])).unwrap();

        let mut seen = HashSet::new();
        for source in &sources {
            prop_assert!(seen.insert(source.id.clone()), "duplicate id {}", source.id);
        }
    }
}
