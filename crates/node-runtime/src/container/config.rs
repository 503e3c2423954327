//! # Node Configuration
//!
//! Aggregates every component's configuration plus node-level settings.
//! Loaded from a JSON file; missing fields fall back to defaults.
//!
//! ## Consistency
//!
//! The ledger's consensus mode is authoritative: the coordinator's
//! `proof_of_work` and `minimum_signatures` are derived from it, and an empty
//! ledger validator list inherits the coordinator's rotation order.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tl_01_difficulty::DifficultyConfig;
use tl_02_validator::ValidatorConfig;
use tl_03_mempool::MempoolConfig;
use tl_04_ledger::{ConsensusMode, LedgerConfig};
use tl_05_consensus::ConsensusConfig;
use tracing::info;

use crate::error::{NodeError, NodeResult};
use crate::genesis::GenesisConfig;

/// Environment variable overriding `data_dir`.
pub const DATA_DIR_ENV: &str = "TL_DATA_DIR";

/// Where the block and mempool stores live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    /// Requires the `rocksdb` feature.
    Rocksdb,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Holds the node lock file and, with RocksDB, the database.
    pub data_dir: PathBuf,
    pub storage: StorageBackend,
    /// File with the hex secret key of this node. A fresh key is generated when
    /// absent.
    pub identity_key_file: Option<PathBuf>,
    /// Capacity of the coordinator's inbound queue.
    pub inbound_queue: usize,
    pub genesis: GenesisConfig,
    pub difficulty: DifficultyConfig,
    pub validator: ValidatorConfig,
    pub mempool: MempoolConfig,
    pub ledger: LedgerConfig,
    pub consensus: ConsensusConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            storage: StorageBackend::default(),
            identity_key_file: None,
            inbound_queue: 1_024,
            genesis: GenesisConfig::default(),
            difficulty: DifficultyConfig::default(),
            validator: ValidatorConfig::default(),
            mempool: MempoolConfig::default(),
            ledger: LedgerConfig::default(),
            consensus: ConsensusConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Fast timers and minimum difficulty, in-memory stores.
    pub fn for_testing() -> Self {
        Self {
            difficulty: DifficultyConfig::for_testing(),
            validator: ValidatorConfig::for_testing(),
            mempool: MempoolConfig::for_testing(),
            ledger: LedgerConfig::for_testing(),
            consensus: ConsensusConfig::for_testing(),
            genesis: GenesisConfig::for_testing(),
            ..Default::default()
        }
    }

    /// Read `path` (defaults when `None`) and apply environment overrides.
    pub fn load(path: Option<&Path>) -> NodeResult<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read(path).map_err(|source| NodeError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
                let config: NodeConfig = serde_json::from_slice(&raw)
                    .map_err(|e| NodeError::Config(format!("{}: {e}", path.display())))?;
                info!("Loaded configuration from {}", path.display());
                config
            }
            None => NodeConfig::default(),
        };

        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            info!("Data directory overridden by {}", DATA_DIR_ENV);
            config.data_dir = PathBuf::from(dir);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> NodeResult<()> {
        if let ConsensusMode::Permissioned { minimum_signatures } = self.ledger.consensus {
            if minimum_signatures == 0 {
                return Err(NodeError::Config(
                    "minimum_signatures must be at least 1".into(),
                ));
            }
            let validators = self.ledger_config().validators.len();
            if validators > 0 && minimum_signatures > validators {
                return Err(NodeError::Config(format!(
                    "minimum_signatures {minimum_signatures} exceeds {validators} validators"
                )));
            }
        }
        if self.inbound_queue == 0 {
            return Err(NodeError::Config("inbound_queue must be positive".into()));
        }
        Ok(())
    }

    pub fn ledger_config(&self) -> LedgerConfig {
        let mut ledger = self.ledger.clone();
        if ledger.validators.is_empty() {
            ledger.validators = self.consensus.validators.clone();
        }
        ledger
    }

    pub fn consensus_config(&self) -> ConsensusConfig {
        let mut consensus = self.consensus.clone();
        match self.ledger.consensus {
            ConsensusMode::ProofOfWork => {
                consensus.proof_of_work = true;
                consensus.minimum_signatures = 1;
            }
            ConsensusMode::Permissioned { minimum_signatures } => {
                consensus.proof_of_work = false;
                consensus.minimum_signatures = minimum_signatures;
            }
        }
        consensus
    }
}
