//! # Balance Table
//!
//! Balances keyed by owner public key, with the previous value of every key a
//! block touched kept per block number so any committed block can be undone.
//!
//! | Entry | Effect |
//! |-------|--------|
//! | coinbase | credit `amount` to the receiver |
//! | any other transaction | debit `amount + miningFee` from the sender, credit `amount` to the receiver |
//! | action | debit `fee` from the acting account's owner |
//!
//! Fees are debited and not credited to anyone.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use shared_types::{Amount, Block, BlockNumber, StorageError};
use tl_02_validator::{AccountRegistry, BalanceProvider};
use tracing::trace;

use crate::ports::outbound::StateRollback;

#[derive(Debug, Default)]
struct BalanceState {
    balances: HashMap<String, Amount>,
    /// Prior value of each touched key; `None` if the key was absent.
    history: BTreeMap<BlockNumber, Vec<(String, Option<Amount>)>>,
}

pub struct BalanceTable {
    accounts: Arc<dyn AccountRegistry>,
    state: RwLock<BalanceState>,
}

impl BalanceTable {
    pub fn new(accounts: Arc<dyn AccountRegistry>) -> Self {
        Self {
            accounts,
            state: RwLock::new(BalanceState::default()),
        }
    }

    /// Highest block number whose effects are applied.
    pub fn last_applied(&self) -> Option<BlockNumber> {
        self.state.read().history.keys().next_back().copied()
    }

    /// Net balance changes of `block`, validated against `balances`.
    fn block_effects(
        &self,
        block: &Block,
        balances: &HashMap<String, Amount>,
    ) -> Result<HashMap<String, Amount>, StorageError> {
        let mut touched: HashMap<String, Amount> = HashMap::new();

        let credit = |touched: &mut HashMap<String, Amount>, key: String, amount: Amount| {
            let current = touched
                .get(&key)
                .or_else(|| balances.get(&key))
                .copied()
                .unwrap_or(0);
            touched.insert(key, current.saturating_add(amount));
        };
        let debit = |touched: &mut HashMap<String, Amount>,
                     key: String,
                     amount: Amount|
         -> Result<(), StorageError> {
            let current = touched
                .get(&key)
                .or_else(|| balances.get(&key))
                .copied()
                .unwrap_or(0);
            let remaining =
                current
                    .checked_sub(amount)
                    .ok_or_else(|| StorageError::DataCorruption {
                        key: key.clone(),
                        reason: format!(
                            "block {} debits {} from a balance of {}",
                            block.number(),
                            amount,
                            current
                        ),
                    })?;
            touched.insert(key, remaining);
            Ok(())
        };

        for tx in &block.transactions {
            let receiver = self.accounts.resolve_key(&tx.to_address);
            if !tx.is_coinbase() {
                let sender = self.accounts.resolve_key(&tx.from_address);
                debit(
                    &mut touched,
                    sender,
                    tx.amount.saturating_add(tx.mining_fee),
                )?;
            }
            credit(&mut touched, receiver, tx.amount);
        }
        for action in &block.actions {
            let owner = self.accounts.resolve_key(&action.from_account);
            debit(&mut touched, owner, action.fee)?;
        }
        Ok(touched)
    }
}

impl BalanceProvider for BalanceTable {
    fn balance_of(&self, address: &str) -> Amount {
        self.state
            .read()
            .balances
            .get(address)
            .copied()
            .unwrap_or(0)
    }
}

impl StateRollback for BalanceTable {
    fn apply_block(&self, block: &Block) -> Result<(), StorageError> {
        let mut state = self.state.write();
        if let Some(last) = state.history.keys().next_back() {
            if *last >= block.number() {
                return Err(StorageError::DataCorruption {
                    key: block.number().to_string(),
                    reason: format!("balances already applied up to block {last}"),
                });
            }
        }

        let touched = self.block_effects(block, &state.balances)?;
        let mut previous = Vec::with_capacity(touched.len());
        for (key, value) in touched {
            previous.push((key.clone(), state.balances.insert(key, value)));
        }
        state.history.insert(block.number(), previous);
        trace!("[tl-04] Applied balances of block {}", block.number());
        Ok(())
    }

    fn rollback_to(&self, number: BlockNumber) -> Result<(), StorageError> {
        let mut state = self.state.write();
        let undone = state.history.split_off(&(number.saturating_add(1)));
        for (_, previous) in undone.into_iter().rev() {
            for (key, value) in previous {
                match value {
                    Some(amount) => state.balances.insert(key, amount),
                    None => state.balances.remove(&key),
                };
            }
        }
        Ok(())
    }
}
