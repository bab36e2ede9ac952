use crate::engine::{EngineConfig, StreamErrorPolicy};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    /// Directory served for every path not matched by a route (the dashboard).
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
}

fn default_static_dir() -> String {
    "static".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
    /// Batches queued per client before new ones are dropped for that client.
    #[serde(default = "default_client_buffer")]
    pub client_buffer: usize,
    /// Capacity of the reader -> aggregator channel.
    #[serde(default = "default_aggregator_buffer")]
    pub aggregator_buffer: usize,
    /// Seconds without stats before a stream counts as failed. 0 waits forever.
    #[serde(default)]
    pub read_timeout_secs: u64,
    #[serde(default)]
    pub on_stream_error: StreamErrorPolicy,
    /// Back-off after a failed or empty container listing.
    #[serde(default = "default_list_retry_ms")]
    pub list_retry_ms: u64,
}

fn default_client_buffer() -> usize {
    16
}

fn default_aggregator_buffer() -> usize {
    256
}

fn default_list_retry_ms() -> u64 {
    1000
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            client_buffer: default_client_buffer(),
            aggregator_buffer: default_aggregator_buffer(),
            read_timeout_secs: 0,
            on_stream_error: StreamErrorPolicy::default(),
            list_retry_ms: default_list_retry_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    /// How often to log engine stats (clients, cycles, batches) at INFO level.
    #[serde(default = "default_stats_log_interval_secs")]
    pub stats_log_interval_secs: u64,
}

fn default_stats_log_interval_secs() -> u64 {
    60
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            stats_log_interval_secs: default_stats_log_interval_secs(),
        }
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(!self.server.host.is_empty(), "server.host must be non-empty");
        anyhow::ensure!(
            self.engine.client_buffer > 0,
            "engine.client_buffer must be > 0, got {}",
            self.engine.client_buffer
        );
        anyhow::ensure!(
            self.engine.aggregator_buffer > 0,
            "engine.aggregator_buffer must be > 0, got {}",
            self.engine.aggregator_buffer
        );
        anyhow::ensure!(
            self.engine.list_retry_ms > 0,
            "engine.list_retry_ms must be > 0, got {}",
            self.engine.list_retry_ms
        );
        anyhow::ensure!(
            self.monitoring.stats_log_interval_secs > 0,
            "monitoring.stats_log_interval_secs must be > 0, got {}",
            self.monitoring.stats_log_interval_secs
        );
        Ok(())
    }

    /// Engine timing and policy derived from the `[engine]` and `[monitoring]` sections.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            aggregator_buffer: self.engine.aggregator_buffer,
            read_timeout: (self.engine.read_timeout_secs > 0)
                .then(|| Duration::from_secs(self.engine.read_timeout_secs)),
            on_stream_error: self.engine.on_stream_error,
            list_retry: Duration::from_millis(self.engine.list_retry_ms),
            stats_log_interval: Duration::from_secs(self.monitoring.stats_log_interval_secs),
        }
    }
}
