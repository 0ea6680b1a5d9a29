// ABOUTME: Tests that config loading output reaches a subscriber before logging is installed.
// ABOUTME: Env-mutating tests run serially.

use bcbot::logging::load_config_with;
use serial_test::serial;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
    }
}

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn config_file(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[server]\nport = 9100\n").unwrap();
    path
}

#[test]
#[serial]
fn test_invalid_port_warning_is_logged_during_load() {
    std::env::remove_var("RUST_LOG");
    std::env::set_var("MCP_PORT", "not-a-port");
    let dir = TempDir::new().unwrap();
    let path = config_file(&dir);

    let captured = Captured::default();
    let writer = captured.clone();
    let config = load_config_with(Some(path.as_path()), move || writer.clone()).unwrap();
    std::env::remove_var("MCP_PORT");

    assert_eq!(config.server.port, 8080);
    let output = captured.text();
    assert!(output.contains("MCP_PORT is not a valid port number"), "{}", output);
    assert!(output.contains("WARN"), "{}", output);
}

#[test]
#[serial]
fn test_config_source_is_logged_during_load() {
    std::env::remove_var("RUST_LOG");
    std::env::remove_var("MCP_PORT");
    let dir = TempDir::new().unwrap();
    let path = config_file(&dir);

    let captured = Captured::default();
    let writer = captured.clone();
    let config = load_config_with(Some(path.as_path()), move || writer.clone()).unwrap();

    assert_eq!(config.server.port, 9100);
    assert!(captured
        .text()
        .contains("Loading configuration from file"));
}
