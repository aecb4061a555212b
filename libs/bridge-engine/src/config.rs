use std::collections::HashSet;
use std::time::Duration;

use serde::Deserialize;

use crate::error::EngineError;
use crate::forwarder::DEFAULT_QUEUE_DEPTH;

/// Root configuration, parsed from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    /// Outbound connection to the remote endpoint.
    #[serde(default)]
    pub transport: TransportConfig,

    #[serde(default)]
    pub snapshot: SnapshotConfig,

    /// Inbound publish endpoint for the local bus. Disabled when absent.
    #[serde(default)]
    pub ingest: Option<IngestConfig>,

    /// Topics to forward.
    #[serde(default)]
    pub topics: Vec<TopicConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_transport_port")]
    pub port: u16,
    /// Outbound queue depth.
    #[serde(default = "default_buffer")]
    pub buffer: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_transport_port(),
            buffer: default_buffer(),
        }
    }
}

impl TransportConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: f64,
    /// History the frame buffer keeps behind the newest transform of a frame.
    #[serde(default = "default_cache_time_secs")]
    pub cache_time_secs: f64,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            cache_time_secs: default_cache_time_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_ingest_port")]
    pub port: u16,
}

impl IngestConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TopicConfig {
    pub name: String,
    pub msg_type: String,
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_transport_port() -> u16 {
    10000
}

fn default_ingest_port() -> u16 {
    10001
}

fn default_buffer() -> usize {
    1024
}

fn default_interval_secs() -> f64 {
    5.0
}

fn default_cache_time_secs() -> f64 {
    10.0
}

fn default_queue_depth() -> usize {
    DEFAULT_QUEUE_DEPTH
}

impl BridgeConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self, EngineError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| EngineError::Config(format!("{path}: {e}")))?;
        Self::parse(&content).map_err(|e| e.with_context(path))
    }

    /// Parse and validate configuration from a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, EngineError> {
        let config: Self = toml::from_str(toml_str).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.topics.is_empty() {
            return Err(EngineError::Config("no topics configured".into()));
        }
        let mut seen = HashSet::new();
        for topic in &self.topics {
            if topic.name.is_empty() {
                return Err(EngineError::Config("topic with empty name".into()));
            }
            if !seen.insert(topic.name.as_str()) {
                return Err(EngineError::Config(format!("duplicate topic '{}'", topic.name)));
            }
            if topic.msg_type.is_empty() {
                return Err(EngineError::Config(format!("topic '{}': empty msg_type", topic.name)));
            }
            if topic.queue_depth == 0 {
                return Err(EngineError::Config(format!("topic '{}': queue_depth must be > 0", topic.name)));
            }
        }
        positive_secs("snapshot.interval_secs", self.snapshot.interval_secs)?;
        positive_secs("snapshot.cache_time_secs", self.snapshot.cache_time_secs)?;
        if self.transport.buffer == 0 {
            return Err(EngineError::Config("transport.buffer must be > 0".into()));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(self.snapshot.interval_secs)
    }

    pub fn cache_time(&self) -> Duration {
        Duration::from_secs_f64(self.snapshot.cache_time_secs)
    }
}

fn positive_secs(key: &str, secs: f64) -> Result<(), EngineError> {
    // Upper bound keeps Duration::from_secs_f64 from panicking.
    if secs.is_finite() && secs > 0.0 && secs < 1e9 {
        Ok(())
    } else {
        Err(EngineError::Config(format!("{key} must be a positive number of seconds, got {secs}")))
    }
}
