//! # Genesis Block Builder
//!
//! Creates block 0 from configuration. Every allocation is a reward-style
//! transaction crediting its address; the first one is the block's recorded
//! coinbase.

use serde::Deserialize;
use serde_json::json;
use shared_types::{
    Address, Amount, Block, BlockTemplate, Timestamp, Transaction, TransactionKind, U256,
    COINBASE_ADDRESS, ZERO_HASH,
};
use thiserror::Error;
use tl_01_difficulty::{next_challenge, GENESIS_DIFFICULTY};

/// Genesis block creation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GenesisError {
    #[error("Invalid genesis configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GenesisAllocation {
    pub address: Address,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GenesisConfig {
    /// Milliseconds since the Unix epoch. Fixed so every node derives the same
    /// genesis hash.
    pub timestamp: Timestamp,
    pub allocations: Vec<GenesisAllocation>,
    pub difficulty: U256,
}

impl Default for GenesisConfig {
    fn default() -> Self {
        Self {
            timestamp: 1_700_000_000_000,
            allocations: Vec::new(),
            difficulty: U256::from(GENESIS_DIFFICULTY),
        }
    }
}

impl GenesisConfig {
    /// Difficulty 1 so test chains mine instantly.
    pub fn for_testing() -> Self {
        Self {
            difficulty: U256::one(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), GenesisError> {
        if self.difficulty.is_zero() {
            return Err(GenesisError::InvalidConfig("difficulty is zero".into()));
        }
        let mut seen = std::collections::HashSet::new();
        for allocation in &self.allocations {
            if allocation.address.is_empty() {
                return Err(GenesisError::InvalidConfig("empty allocation address".into()));
            }
            if allocation.amount == 0 {
                return Err(GenesisError::InvalidConfig(format!(
                    "zero allocation to {}",
                    allocation.address
                )));
            }
            if !seen.insert(&allocation.address) {
                return Err(GenesisError::InvalidConfig(format!(
                    "duplicate allocation to {}",
                    allocation.address
                )));
            }
        }
        Ok(())
    }
}

/// Builder for creating genesis blocks.
pub struct GenesisBuilder {
    config: GenesisConfig,
}

impl GenesisBuilder {
    pub fn new(config: GenesisConfig) -> Self {
        Self { config }
    }

    pub fn build(self) -> Result<Block, GenesisError> {
        self.config.validate()?;
        let timestamp = self.config.timestamp;

        let mut transactions: Vec<Transaction> = self
            .config
            .allocations
            .iter()
            .enumerate()
            .map(|(index, allocation)| allocation_tx(allocation, timestamp, index as u64))
            .collect();
        // a block needs at least one transaction
        if transactions.is_empty() {
            transactions.push(Transaction::coinbase("genesis", 0, timestamp, 0));
        }

        let difficulty = self.config.difficulty;
        Ok(Block::from_template(BlockTemplate {
            block_number: 0,
            previous_hash: ZERO_HASH,
            timestamp,
            coinbase_transaction_hash: transactions[0].hash,
            transactions,
            actions: Vec::new(),
            difficulty,
            total_difficulty: difficulty,
            challenge: next_challenge(difficulty),
            mined_by: "genesis".into(),
        }))
    }
}

fn allocation_tx(allocation: &GenesisAllocation, timestamp: Timestamp, index: u64) -> Transaction {
    Transaction::new(
        TransactionKind::Coinbase,
        COINBASE_ADDRESS,
        allocation.address.clone(),
        allocation.amount,
        json!("genesis"),
        timestamp,
        index,
        0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allocations() -> Vec<GenesisAllocation> {
        vec![
            GenesisAllocation {
                address: "02aa".into(),
                amount: 1_000,
            },
            GenesisAllocation {
                address: "02bb".into(),
                amount: 500,
            },
        ]
    }

    #[test]
    fn test_genesis_default() {
        let genesis = GenesisBuilder::new(GenesisConfig::default()).build().unwrap();

        assert_eq!(genesis.number(), 0);
        assert_eq!(genesis.previous_hash(), ZERO_HASH);
        assert_eq!(genesis.header.difficulty, U256::from(0x1024));
        assert_eq!(genesis.transactions.len(), 1);
        assert!(genesis.header.has_valid_hash());
        assert!(genesis.check_format().is_ok());
    }

    #[test]
    fn test_genesis_with_allocations() {
        let config = GenesisConfig {
            allocations: allocations(),
            ..Default::default()
        };
        let genesis = GenesisBuilder::new(config).build().unwrap();

        assert_eq!(genesis.transactions.len(), 2);
        assert_eq!(genesis.coinbase_transaction_hash, genesis.transactions[0].hash);
        assert!(genesis.transactions.iter().all(Transaction::is_coinbase));
        assert_eq!(genesis.transactions[1].to_address, "02bb");
    }

    #[test]
    fn test_genesis_hash_deterministic() {
        let config = GenesisConfig {
            allocations: allocations(),
            ..Default::default()
        };
        let first = GenesisBuilder::new(config.clone()).build().unwrap();
        let second = GenesisBuilder::new(config).build().unwrap();
        assert_eq!(first.hash(), second.hash());
    }

    #[test]
    fn test_config_validation() {
        let mut config = GenesisConfig {
            allocations: allocations(),
            ..Default::default()
        };
        config.allocations[1].address = "02aa".into();
        assert!(config.validate().is_err());

        config.allocations[1] = GenesisAllocation {
            address: "02cc".into(),
            amount: 0,
        };
        assert!(config.validate().is_err());

        config.allocations.pop();
        config.difficulty = U256::zero();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_difficulty_parses_from_hex() {
        let config: GenesisConfig =
            serde_json::from_str(r#"{ "difficulty": "0x2048", "allocations": [] }"#).unwrap();
        assert_eq!(config.difficulty, U256::from(0x2048));
        assert_eq!(config.timestamp, 1_700_000_000_000);
    }
}
