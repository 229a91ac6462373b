//! swarm.toml configuration parser.
//!
//! Every section and field is optional; anything left out falls back to the
//! defaults below.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::duration::serde_str;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmConfig {
    pub queue: QueueConfig,
    pub bridge: BridgeConfig,
    pub controller: ControllerConfig,
    pub worker: WorkerConfig,
    pub store: StoreConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// How long a received message stays hidden before redelivery.
    #[serde(with = "serde_str")]
    pub visibility_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            visibility_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Wall-clock budget a caller waits for its result.
    #[serde(with = "serde_str")]
    pub timeout: Duration,
    /// Pause between table checks while waiting.
    #[serde(with = "serde_str")]
    pub poll_interval: Duration,
    /// Messages fetched per result-queue receive.
    pub receive_batch: usize,
    /// Long-poll wait of each result-queue receive.
    #[serde(with = "serde_str")]
    pub receive_wait: Duration,
    /// Unclaimed results older than this are swept from the table.
    #[serde(with = "serde_str")]
    pub orphan_ttl: Duration,
    #[serde(with = "serde_str")]
    pub sweep_interval: Duration,
    /// Attempts per work-queue send before a submission error.
    pub send_attempts: u32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            poll_interval: Duration::from_millis(500),
            receive_batch: 10,
            receive_wait: Duration::from_secs(5),
            orphan_ttl: Duration::from_secs(600),
            sweep_interval: Duration::from_secs(60),
            send_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    #[serde(with = "serde_str")]
    pub tick_interval: Duration,
    /// Hard ceiling on active worker nodes.
    pub max_nodes: u32,
    /// Consecutive empty-backlog ticks before the fleet is scaled in.
    pub scale_in_threshold: u32,
    /// Ownership tag prefix; every launched node is labelled with it.
    pub tag_prefix: String,
    pub image: String,
    pub instance_type: String,
    /// Upper bound on waiting for a single node to report terminated.
    #[serde(with = "serde_str")]
    pub terminate_timeout: Duration,
    #[serde(with = "serde_str")]
    pub terminate_poll: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            max_nodes: 15,
            scale_in_threshold: 5,
            tag_prefix: "app-tier-instance".to_string(),
            image: "swarm-worker".to_string(),
            instance_type: "t2.micro".to_string(),
            terminate_timeout: Duration::from_secs(60),
            terminate_poll: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub batch_size: usize,
    #[serde(with = "serde_str")]
    pub receive_wait: Duration,
    /// Consecutive empty polls before backing off.
    pub idle_threshold: u32,
    #[serde(with = "serde_str")]
    pub backoff_base: Duration,
    #[serde(with = "serde_str")]
    pub backoff_max: Duration,
    /// Pause after a failed receive.
    #[serde(with = "serde_str")]
    pub error_pause: Duration,
    /// Model reference handed to the compute capability.
    pub model: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            receive_wait: Duration::from_secs(20),
            idle_threshold: 5,
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(10),
            error_pause: Duration::from_secs(5),
            model: "data.pt".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    pub input_bucket: String,
    pub output_bucket: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/var/lib/swarm"),
            input_bucket: "swarm-in".to_string(),
            output_bucket: "swarm-out".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { port: 8000 }
    }
}

impl SwarmConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: SwarmConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the background loops cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        let periods = [
            ("bridge.poll_interval", self.bridge.poll_interval),
            ("bridge.sweep_interval", self.bridge.sweep_interval),
            ("controller.tick_interval", self.controller.tick_interval),
            ("controller.terminate_poll", self.controller.terminate_poll),
        ];
        for (name, period) in periods {
            if period.is_zero() {
                anyhow::bail!("{name} must be non-zero");
            }
        }
        if self.controller.max_nodes == 0 {
            anyhow::bail!("controller.max_nodes must be at least 1");
        }
        Ok(())
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
