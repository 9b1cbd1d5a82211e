//! Node configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use lattice_types::NetworkId;

use crate::logging::LogFormat;
use crate::NodeError;

/// Configuration for a lattice node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Which network's ledger constants to use.
    #[serde(default = "default_network")]
    pub network: NetworkId,

    /// Data directory for ledger storage.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Maximum size of the LMDB memory map, in bytes.
    #[serde(default = "default_lmdb_map_size")]
    pub lmdb_map_size: usize,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub block_processor: BlockProcessorConfig,
}

/// Tuning of the block ingestion pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockProcessorConfig {
    /// Queue length at which remote blocks are refused.
    pub max_queue_size: usize,
    /// Normal-queue entries taken per batch.
    pub batch_size: usize,
    /// Forced entries taken per batch, ahead of the normal ones.
    pub max_forced_batch: usize,
    /// A batch stops early once it has held the write transaction this long.
    pub batch_max_time_ms: u64,
    /// Minimum spacing of slow-batch log lines.
    pub log_interval_secs: u64,
    /// Batches slower than this are reported.
    pub slow_batch_threshold_ms: u64,
    /// Signature verification threads; 0 picks half the available cores.
    pub signature_threads: usize,
    pub unchecked_max_size: usize,
    pub unchecked_max_age_secs: u64,
    pub unchecked_cleanup_interval_secs: u64,
    /// How long the processor waits for the write lock before jumping the line.
    pub write_priority_bump_ms: u64,
    /// Pause after a batch failed on a storage fault.
    pub retry_backoff_ms: u64,
    /// Attempts before an entry caught in failing batches is dropped.
    pub max_batch_retries: u32,
}

impl Default for BlockProcessorConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 65_536,
            batch_size: 256,
            max_forced_batch: 64,
            batch_max_time_ms: 500,
            log_interval_secs: 15,
            slow_batch_threshold_ms: 100,
            signature_threads: 0,
            unchecked_max_size: 65_536,
            unchecked_max_age_secs: 3_600,
            unchecked_cleanup_interval_secs: 60,
            write_priority_bump_ms: 100,
            retry_backoff_ms: 50,
            max_batch_retries: 3,
        }
    }
}

impl BlockProcessorConfig {
    pub fn batch_max_time(&self) -> Duration {
        Duration::from_millis(self.batch_max_time_ms)
    }

    pub fn log_interval(&self) -> Duration {
        Duration::from_secs(self.log_interval_secs)
    }

    pub fn slow_batch_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_batch_threshold_ms)
    }

    pub fn unchecked_max_age(&self) -> Duration {
        Duration::from_secs(self.unchecked_max_age_secs)
    }

    pub fn unchecked_cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.unchecked_cleanup_interval_secs)
    }

    pub fn write_priority_bump(&self) -> Duration {
        Duration::from_millis(self.write_priority_bump_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// The configured thread count, or half the available parallelism (at
    /// least one) when unset.
    pub fn resolved_signature_threads(&self) -> usize {
        if self.signature_threads > 0 {
            return self.signature_threads;
        }
        std::thread::available_parallelism()
            .map(|n| n.get() / 2)
            .unwrap_or(1)
            .max(1)
    }
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_network() -> NetworkId {
    NetworkId::Dev
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./lattice_data")
}

fn default_lmdb_map_size() -> usize {
    1 << 30
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, NodeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| NodeError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// The parsed `log_format`; anything but "json" logs for humans.
    pub fn log_format(&self) -> LogFormat {
        if self.log_format.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Human
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            data_dir: default_data_dir(),
            lmdb_map_size: default_lmdb_map_size(),
            log_format: default_log_format(),
            log_level: default_log_level(),
            block_processor: BlockProcessorConfig::default(),
        }
    }
}
