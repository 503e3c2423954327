//! # Adapters
//!
//! - `block_store` - `BlockStore` over any `KeyValueStore`
//! - `balance_table` - balances with per-block history (`BalanceProvider` + `StateRollback`)
//! - `time` - system clock

pub mod balance_table;
pub mod block_store;
pub mod time;
