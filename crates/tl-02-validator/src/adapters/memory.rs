//! # In-Memory Registries
//!
//! Lock-guarded maps backing the account and contract ports. Used by the node
//! when no persistent registry is configured, and by tests.

use std::collections::HashMap;

use parking_lot::RwLock;
use shared_types::{Account, StorageError};

use crate::ports::outbound::{AccountRegistry, ContractInfo, ContractRegistry};

/// Account names to records.
#[derive(Debug, Default)]
pub struct InMemoryAccountRegistry {
    accounts: RwLock<HashMap<String, Account>>,
}

impl InMemoryAccountRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.accounts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.read().is_empty()
    }
}

impl AccountRegistry for InMemoryAccountRegistry {
    fn account(&self, name: &str) -> Option<Account> {
        self.accounts.read().get(name).cloned()
    }

    fn add_account(&self, account: Account) -> Result<(), StorageError> {
        let mut accounts = self.accounts.write();
        if accounts.contains_key(&account.name) {
            return Err(StorageError::DatabaseError(format!(
                "account {} already exists",
                account.name
            )));
        }
        accounts.insert(account.name.clone(), account);
        Ok(())
    }

    fn remove_account(&self, name: &str) -> Result<(), StorageError> {
        self.accounts
            .write()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }
}

/// Contract names to declared APIs.
#[derive(Debug, Default)]
pub struct InMemoryContractRegistry {
    contracts: RwLock<HashMap<String, ContractInfo>>,
}

impl InMemoryContractRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ContractRegistry for InMemoryContractRegistry {
    fn contract(&self, name: &str) -> Option<ContractInfo> {
        self.contracts.read().get(name).cloned()
    }

    fn add_contract(&self, contract: ContractInfo) -> Result<(), StorageError> {
        let mut contracts = self.contracts.write();
        if contracts.contains_key(&contract.name) {
            return Err(StorageError::DatabaseError(format!(
                "contract {} already exists",
                contract.name
            )));
        }
        contracts.insert(contract.name.clone(), contract);
        Ok(())
    }

    fn remove_contract(&self, name: &str) -> Result<(), StorageError> {
        self.contracts
            .write()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }
}
