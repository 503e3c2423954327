//! # Outbound Ports (Driven Ports / SPI)
//!
//! Read capabilities supplied by the ledger. The validator never mutates through
//! them, with the exception of the registry write methods the ledger itself uses
//! when applying and rolling back account actions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use shared_types::{Account, Amount, BlockNumber, Hash, StorageError, PAYABLE_EMIT};

/// Spendable balance per address.
pub trait BalanceProvider: Send + Sync {
    /// Balance of a hex public key. Unknown keys hold nothing.
    fn balance_of(&self, address: &str) -> Amount;
}

/// Named accounts created by `create-account` actions.
pub trait AccountRegistry: Send + Sync {
    fn account(&self, name: &str) -> Option<Account>;

    fn add_account(&self, account: Account) -> Result<(), StorageError>;

    fn remove_account(&self, name: &str) -> Result<(), StorageError>;

    /// Owner key behind an account name; plain keys resolve to themselves.
    fn resolve_key(&self, address: &str) -> String {
        self.account(address)
            .map(|account| account.owner_key)
            .unwrap_or_else(|| address.to_string())
    }
}

/// Declared behaviour of one contract method.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractMethod {
    #[serde(default)]
    pub emits: Option<String>,
}

impl ContractMethod {
    pub fn emits_payable(&self) -> bool {
        self.emits.as_deref() == Some(PAYABLE_EMIT)
    }
}

/// Published API of a deployed contract, as carried by a `contract-deploy`
/// action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractInfo {
    pub name: String,
    /// Account that deployed the contract.
    pub account: String,
    #[serde(default)]
    pub methods: BTreeMap<String, ContractMethod>,
}

/// Deployed contract APIs. Execution happens elsewhere; only the declared API is
/// visible here.
pub trait ContractRegistry: Send + Sync {
    fn contract(&self, name: &str) -> Option<ContractInfo>;

    fn add_contract(&self, contract: ContractInfo) -> Result<(), StorageError>;

    fn remove_contract(&self, name: &str) -> Result<(), StorageError>;
}

/// Spent-hash bookkeeping of the committed chain.
pub trait SpentHashView: Send + Sync {
    /// Block a transaction was committed in.
    fn transaction_spent_in(&self, hash: &Hash) -> Option<BlockNumber>;

    /// Payable that consumed `hash` as its reference.
    fn reference_used_by(&self, hash: &Hash) -> Option<Hash>;

    /// Block an action was committed in.
    fn action_spent_in(&self, hash: &Hash) -> Option<BlockNumber>;
}
