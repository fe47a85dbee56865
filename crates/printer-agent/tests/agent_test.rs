use std::path::{Path, PathBuf};
use std::sync::Arc;

use domain::{ConnectionOptionsOverride, ConnectionState, DeviceIdentity, PortInfo};
use infrastructure::{IdentityStore, MemoryRegistry};
use printer_agent::{Agent, PortListing, list_ports};

const EPSON: PortInfo = PortInfo {
    usb_vendor_id: Some(0x04B8),
    usb_product_id: Some(0x0202),
};

fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("printer-agent-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn build_agent(registry: &Arc<MemoryRegistry>, dir: &Path, fallback: DeviceIdentity) -> Agent {
    Agent::new(
        registry.clone(),
        ConnectionOptionsOverride::default(),
        IdentityStore::new(dir.join("last_device.json")),
        fallback,
    )
    .unwrap()
}

#[tokio::test]
async fn test_list_ports_shows_identities() {
    let registry = MemoryRegistry::new();
    registry.add_port("mem0", EPSON);
    registry.add_port("mem1", PortInfo::default());

    let listing = list_ports(&registry).await.unwrap();

    assert_eq!(
        listing,
        vec![
            PortListing {
                name: "mem0".to_string(),
                identity: DeviceIdentity::new(0x04B8, 0x0202),
            },
            PortListing {
                name: "mem1".to_string(),
                identity: DeviceIdentity::default(),
            },
        ]
    );
}

#[tokio::test]
async fn test_connect_saves_identity_for_reconnect() {
    let dir = scratch("save");
    let registry = Arc::new(MemoryRegistry::new());
    let port = registry.add_port("mem0", EPSON);
    registry.choose(Some(port));

    let first = build_agent(&registry, &dir, DeviceIdentity::default());
    first.connect(false).await.unwrap();
    first.shutdown().await;

    // The chooser is gone; only the saved identity can find the printer
    registry.choose(None);
    let second = build_agent(&registry, &dir, DeviceIdentity::default());
    let identity = second.connect(true).await.unwrap();

    assert_eq!(identity, DeviceIdentity::new(0x04B8, 0x0202));
    assert_eq!(second.printer().state().await, ConnectionState::Open);
}

#[tokio::test]
async fn test_reconnect_falls_back_to_configured_identity() {
    let dir = scratch("fallback");
    let registry = Arc::new(MemoryRegistry::new());
    registry.add_port("mem0", EPSON);

    let agent = build_agent(&registry, &dir, DeviceIdentity::new(0x04B8, 0x0202));

    assert!(agent.connect(true).await.is_ok());
}

#[tokio::test]
async fn test_connect_without_printer_is_an_error() {
    let dir = scratch("none");
    let registry = Arc::new(MemoryRegistry::new());

    let agent = build_agent(&registry, &dir, DeviceIdentity::default());

    assert!(agent.connect(false).await.is_err());
}

#[tokio::test]
async fn test_print_files_sends_each_file_whole() {
    let dir = scratch("print");
    let registry = Arc::new(MemoryRegistry::new());
    let port = registry.add_port("mem0", EPSON);
    registry.choose(Some(port.clone()));

    let receipt = dir.join("receipt.bin");
    let cut = dir.join("cut.bin");
    std::fs::write(&receipt, b"\x1b@Total: 12.50\n").unwrap();
    std::fs::write(&cut, b"\x1dV\x00").unwrap();

    let agent = build_agent(&registry, &dir, DeviceIdentity::default());
    agent.connect(false).await.unwrap();

    let written = agent.print_files(&[receipt, cut]).await.unwrap();

    assert_eq!(written, 2);
    assert_eq!(
        port.written_bytes(),
        b"\x1b@Total: 12.50\n\x1dV\x00".to_vec()
    );
}

#[tokio::test]
async fn test_print_missing_file_fails_before_sending() {
    let dir = scratch("missing");
    let registry = Arc::new(MemoryRegistry::new());
    let port = registry.add_port("mem0", EPSON);
    registry.choose(Some(port.clone()));

    let agent = build_agent(&registry, &dir, DeviceIdentity::default());
    agent.connect(false).await.unwrap();

    assert!(agent.print_files(&[dir.join("nope.bin")]).await.is_err());
    assert!(port.written().is_empty());
}

#[tokio::test]
async fn test_monitor_returns_when_stopped() {
    let dir = scratch("monitor");
    let registry = Arc::new(MemoryRegistry::new());
    let port = registry.add_port("mem0", EPSON);
    registry.choose(Some(port.clone()));

    let agent = build_agent(&registry, &dir, DeviceIdentity::default());
    agent.connect(false).await.unwrap();
    port.push_data(vec![0x12]);

    agent
        .monitor(tokio::time::sleep(std::time::Duration::from_millis(20)))
        .await
        .unwrap();

    assert_eq!(registry.journal().count("reader.acquire"), 1);
}
