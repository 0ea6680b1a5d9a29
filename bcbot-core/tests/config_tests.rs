// ABOUTME: Tests for config loading, environment overrides and start_bot argument resolution.
// ABOUTME: Env-mutating tests run serially.

use bcbot_core::config::{Config, StartBotRequest, Transport};
use bcbot_core::error::ErrorKind;
use serial_test::serial;
use std::io::Write;
use tempfile::TempDir;

const ENV_VARS: &[&str] = &[
    "BCBOT_CONFIG_PATH",
    "MCP_TRANSPORT",
    "MCP_HOST",
    "MCP_PORT",
    "MCP_PATH",
    "BC_USERNAME",
    "BC_PASSWORD",
    "APPEARANCE_CODE",
    "BC_SERVER_URL",
    "BC_ORIGIN",
    "BCBOT_CLIENT",
    "BCBOT_EVENT_CAPACITY",
    "BCBOT_START_TIMEOUT_SECS",
    "BCBOT_COMMAND_TIMEOUT_SECS",
];

fn clear_env() {
    for var in ENV_VARS {
        std::env::remove_var(var);
    }
}

fn write_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    path
}

#[test]
#[serial]
fn test_load_from_env_path_with_overrides() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "config.toml",
        "[server]\nport = 9100\n\n[events]\ncapacity = 42\n",
    );
    std::env::set_var("BCBOT_CONFIG_PATH", &path);
    std::env::set_var("MCP_TRANSPORT", "streamable_http");
    std::env::set_var("MCP_PATH", "tools");
    std::env::set_var("BCBOT_CLIENT", "mock");

    let config = Config::load(None).unwrap();
    assert_eq!(config.server.transport, Transport::Http);
    assert_eq!(config.server.port, 9100);
    assert_eq!(config.server.path, "/tools");
    assert_eq!(config.events.capacity, 42);
    assert_eq!(config.client.client_type(), "mock");
    clear_env();
}

#[test]
#[serial]
fn test_invalid_port_falls_back_to_default() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "config.toml", "[server]\nport = 9100\n");
    std::env::set_var("MCP_PORT", "not-a-port");

    let config = Config::load(Some(path.as_path())).unwrap();
    assert_eq!(config.server.port, 8080);
    clear_env();
}

#[test]
#[serial]
fn test_stdio_transport_from_env() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "config.toml", "");
    std::env::set_var("MCP_TRANSPORT", "stdio");

    let config = Config::load(Some(path.as_path())).unwrap();
    assert_eq!(config.server.transport, Transport::Stdio);
    clear_env();
}

#[test]
#[serial]
fn test_invalid_numeric_override_is_an_error() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "config.toml", "");
    std::env::set_var("BCBOT_EVENT_CAPACITY", "lots");

    let err = Config::load(Some(path.as_path())).unwrap_err();
    assert!(err.to_string().contains("BCBOT_EVENT_CAPACITY"));
    clear_env();
}

#[test]
#[serial]
fn test_zero_timeout_fails_validation() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "config.toml", "");
    std::env::set_var("BCBOT_START_TIMEOUT_SECS", "0");

    assert!(Config::load(Some(path.as_path())).is_err());
    clear_env();
}

#[test]
#[serial]
fn test_missing_explicit_path_is_an_error() {
    clear_env();
    let dir = TempDir::new().unwrap();
    assert!(Config::load(Some(dir.path().join("absent.toml").as_path())).is_err());
}

#[tokio::test]
#[serial]
async fn test_resolve_uses_env_credentials_and_base_dir() {
    clear_env();
    let dir = TempDir::new().unwrap();
    write_file(&dir, "chatroom_config.json", r#"{"Name": "Den", "Limit": 6}"#);
    let path = write_file(
        &dir,
        "config.toml",
        &format!("[bot]\nbase_dir = {:?}\n", dir.path().to_string_lossy()),
    );
    std::env::set_var("BC_USERNAME", "env-user");
    std::env::set_var("BC_PASSWORD", "env-pass");

    let config = Config::load(Some(path.as_path())).unwrap();
    let bot = config
        .bot
        .resolve(&StartBotRequest::default())
        .await
        .unwrap();
    assert_eq!(bot.username, "env-user");
    assert_eq!(bot.password, "env-pass");
    assert_eq!(bot.server_url, "https://bondage-club-server.herokuapp.com/");
    assert_eq!(bot.origin, "https://www.bondage-europe.com");
    assert_eq!(bot.chatroom["Name"], "Den");

    // Explicit arguments win over env fallbacks
    let req = StartBotRequest {
        username: Some("arg-user".to_string()),
        password: Some(String::new()),
        ..Default::default()
    };
    let bot = config.bot.resolve(&req).await.unwrap();
    assert_eq!(bot.username, "arg-user");
    assert_eq!(bot.password, "env-pass");
    clear_env();
}

#[tokio::test]
#[serial]
async fn test_resolve_requires_credentials() {
    clear_env();
    let config = Config::default();
    let err = config
        .bot
        .resolve(&StartBotRequest::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(err.to_string().contains("username"));
}

#[tokio::test]
#[serial]
async fn test_resolve_rejects_bad_chatroom_files() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let not_json = write_file(&dir, "broken.json", "{ nope");
    let not_object = write_file(&dir, "list.json", "[1, 2]");

    let config = Config::default();
    for path in [
        not_json,
        not_object,
        dir.path().join("missing.json"),
    ] {
        let req = StartBotRequest {
            username: Some("bot".to_string()),
            password: Some("pw".to_string()),
            chatroom_config_path: Some(path.to_string_lossy().to_string()),
            ..Default::default()
        };
        let err = config.bot.resolve(&req).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument, "{}", err);
    }
}
