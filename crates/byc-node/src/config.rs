//! Node configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use byc_core::constants::{DEFAULT_MEMPOOL_MAX_SIZE, DEFAULT_MIN_FEE_RATE};

/// Runtime configuration for a node instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Data directory holding `blocks/` and `utxo.snap`.
    pub data_dir: PathBuf,
    /// Maximum mempool entries.
    pub mempool_max_size: usize,
    /// Minimum fee rate (smallest units per byte) for pool admission.
    pub min_fee_rate: f64,
    /// Blocks between automatic UTXO integrity scans; 0 disables them.
    pub integrity_check_interval: u64,
}

impl NodeConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            mempool_max_size: DEFAULT_MEMPOOL_MAX_SIZE,
            min_fee_rate: DEFAULT_MIN_FEE_RATE,
            integrity_check_interval: byc_core::constants::INTEGRITY_CHECK_INTERVAL,
        }
    }

    /// Load from a JSON file.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        serde_json::from_slice(&bytes).map_err(std::io::Error::other)
    }

    /// Save to a JSON file.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_vec_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    pub fn blocks_dir(&self) -> PathBuf {
        self.data_dir.join("blocks")
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join("utxo.snap")
    }
}
