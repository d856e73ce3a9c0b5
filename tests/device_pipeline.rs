//! Writer driving a real shell against a regular file standing in for
//! the gadget node. Needs bash for `echo -e`.

#![cfg(unix)]

use keybeam::device::{DeviceWriter, ShellLauncher, WriterSettings};
use keybeam::keyboard::{Encoder, TableDir};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const BASH: &str = "/bin/bash";

fn encoder() -> Arc<Encoder> {
    let encoder = Encoder::new();
    encoder
        .load(
            &TableDir::new(Path::new(env!("CARGO_MANIFEST_DIR")).join("tables")),
            "us",
            "default",
            "default",
        )
        .unwrap();
    Arc::new(encoder)
}

#[test]
fn writes_last_report_to_device() {
    if !Path::new(BASH).exists() {
        eprintln!("skipping: {} not found", BASH);
        return;
    }
    let tmp = tempfile::TempDir::new().unwrap();
    let device = tmp.path().join("hidg0");

    let writer = DeviceWriter::new(
        encoder(),
        ShellLauncher::new(BASH),
        WriterSettings {
            device_path: device.display().to_string(),
            character_delay: Duration::ZERO,
            idle_timeout: Duration::from_millis(200),
        },
    );
    writer.submit("hi");
    writer.submit("B");
    writer.shutdown();

    // every report truncates the node; the last one remains
    let bytes = std::fs::read(&device).unwrap();
    let mut expected = [0u8; 16];
    expected[0] = 0x02;
    expected[2] = 0x05;
    assert_eq!(bytes, expected);
}
