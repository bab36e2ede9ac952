// Config loading and validation tests

use dockerstats::config::AppConfig;
use dockerstats::engine::StreamErrorPolicy;
use std::time::Duration;

const VALID_CONFIG: &str = r#"
[server]
port = 11235
host = "0.0.0.0"
static_dir = "public"

[engine]
client_buffer = 8
aggregator_buffer = 128
read_timeout_secs = 30
on_stream_error = "stop_reader"
list_retry_ms = 500

[monitoring]
stats_log_interval_secs = 60
"#;

const MINIMAL_CONFIG: &str = r#"
[server]
port = 11235
host = "127.0.0.1"
"#;

#[test]
fn test_config_loads_from_str() {
    let config = AppConfig::load_from_str(VALID_CONFIG).expect("load_from_str");
    assert_eq!(config.server.port, 11235);
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.static_dir, "public");
    assert_eq!(config.engine.client_buffer, 8);
    assert_eq!(config.engine.aggregator_buffer, 128);
    assert_eq!(config.engine.on_stream_error, StreamErrorPolicy::StopReader);
    assert_eq!(config.monitoring.stats_log_interval_secs, 60);
}

#[test]
fn test_config_defaults_when_sections_omitted() {
    let config = AppConfig::load_from_str(MINIMAL_CONFIG).expect("minimal");
    assert_eq!(config.server.static_dir, "static");
    assert_eq!(config.engine.client_buffer, 16);
    assert_eq!(config.engine.aggregator_buffer, 256);
    assert_eq!(config.engine.read_timeout_secs, 0);
    assert_eq!(config.engine.on_stream_error, StreamErrorPolicy::Exit);
    assert_eq!(config.engine.list_retry_ms, 1000);
    assert_eq!(config.monitoring.stats_log_interval_secs, 60);
}

#[test]
fn test_engine_config_derivation() {
    let engine = AppConfig::load_from_str(VALID_CONFIG)
        .unwrap()
        .engine_config();
    assert_eq!(engine.read_timeout, Some(Duration::from_secs(30)));
    assert_eq!(engine.list_retry, Duration::from_millis(500));
    assert_eq!(engine.stats_log_interval, Duration::from_secs(60));
    assert_eq!(engine.aggregator_buffer, 128);

    let engine = AppConfig::load_from_str(MINIMAL_CONFIG)
        .unwrap()
        .engine_config();
    assert_eq!(engine.read_timeout, None);
}

#[test]
fn test_config_validation_rejects_invalid_port() {
    let bad = VALID_CONFIG.replace("port = 11235", "port = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("server.port"));
}

#[test]
fn test_config_validation_rejects_empty_host() {
    let bad = VALID_CONFIG.replace("host = \"0.0.0.0\"", "host = \"\"");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("server.host"));
}

#[test]
fn test_config_validation_rejects_client_buffer_zero() {
    let bad = VALID_CONFIG.replace("client_buffer = 8", "client_buffer = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("client_buffer"));
}

#[test]
fn test_config_validation_rejects_aggregator_buffer_zero() {
    let bad = VALID_CONFIG.replace("aggregator_buffer = 128", "aggregator_buffer = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("aggregator_buffer"));
}

#[test]
fn test_config_validation_rejects_list_retry_zero() {
    let bad = VALID_CONFIG.replace("list_retry_ms = 500", "list_retry_ms = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("list_retry_ms"));
}

#[test]
fn test_config_validation_rejects_stats_log_interval_zero() {
    let bad = VALID_CONFIG.replace(
        "stats_log_interval_secs = 60",
        "stats_log_interval_secs = 0",
    );
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("stats_log_interval_secs"));
}

#[test]
fn test_config_rejects_unknown_stream_error_policy() {
    let bad = VALID_CONFIG.replace("\"stop_reader\"", "\"retry\"");
    assert!(AppConfig::load_from_str(&bad).is_err());
}

#[test]
fn test_config_validation_rejects_invalid_toml() {
    let err = AppConfig::load_from_str("not valid toml [[[").unwrap_err();
    assert!(!err.to_string().is_empty());
}

#[test]
fn test_config_load_from_file_via_env() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, VALID_CONFIG).unwrap();
    unsafe { std::env::set_var("CONFIG_FILE", path.to_str().unwrap()) };
    let result = AppConfig::load();
    unsafe { std::env::remove_var("CONFIG_FILE") };
    let config = result.expect("load from CONFIG_FILE");
    assert_eq!(config.server.port, 11235);
    assert_eq!(config.engine.list_retry_ms, 500);
}
