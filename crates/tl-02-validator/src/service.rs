//! # Validator Service
//!
//! Ordered, short-circuiting rule sequences per transaction kind and for
//! actions. All reads go through the outbound ports; nothing is cached.

use std::sync::Arc;

use rayon::prelude::*;
use shared_crypto::SignatureVerifier;
use shared_types::{Action, Amount, Hash, Signature, Transaction, TransactionKind};
use tracing::{debug, instrument};

use crate::config::ValidatorConfig;
use crate::error::{ValidationError, ValidationResult};
use crate::ports::outbound::{
    AccountRegistry, BalanceProvider, ContractInfo, ContractRegistry, SpentHashView,
};

/// Capabilities the validator reads through.
#[derive(Clone)]
pub struct ValidatorDependencies {
    pub balances: Arc<dyn BalanceProvider>,
    pub accounts: Arc<dyn AccountRegistry>,
    pub contracts: Arc<dyn ContractRegistry>,
    pub verifier: Arc<dyn SignatureVerifier>,
}

/// Stateless transaction and action validator.
pub struct Validator {
    config: ValidatorConfig,
    deps: ValidatorDependencies,
}

impl Validator {
    pub fn new(config: ValidatorConfig, deps: ValidatorDependencies) -> Self {
        Self { config, deps }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub fn accounts(&self) -> &Arc<dyn AccountRegistry> {
        &self.deps.accounts
    }

    pub fn contracts(&self) -> &Arc<dyn ContractRegistry> {
        &self.deps.contracts
    }

    /// Minimum fee for `tx`: size of its unsigned body times the per-byte rate.
    pub fn minimum_fee(&self, tx: &Transaction) -> Amount {
        (tx.fee_basis_size() as Amount).saturating_mul(self.config.fee_per_byte)
    }

    pub fn validate_checksum(&self, tx: &Transaction) -> ValidationResult<()> {
        if tx.has_valid_checksum() {
            Ok(())
        } else {
            Err(ValidationError::InvalidChecksum)
        }
    }

    /// Validate one transaction against the committed chain.
    #[instrument(skip_all, fields(hash = %tx.short_hash(), kind = tx.type_name()))]
    pub fn validate_transaction(
        &self,
        tx: &Transaction,
        spent: &dyn SpentHashView,
    ) -> ValidationResult<()> {
        let result = self.ensure_unspent(tx, spent).and_then(|_| match &tx.kind {
            TransactionKind::Simple | TransactionKind::Stake | TransactionKind::Allocation => {
                self.check_transfer(tx)
            }
            TransactionKind::Call => self.check_call(tx),
            TransactionKind::Payable {
                from_contract,
                reference,
            } => self.check_payable(tx, from_contract, reference, spent),
            TransactionKind::Coinbase => self.check_coinbase(tx),
        });

        if let Err(err) = &result {
            debug!("[tl-02] Rejected {} {}: {}", tx.type_name(), tx.short_hash(), err);
        }
        result
    }

    /// Validate many transactions in parallel. The error reported is the one of
    /// the earliest failing transaction in input order.
    pub fn validate_batch(
        &self,
        transactions: &[Transaction],
        spent: &dyn SpentHashView,
    ) -> Result<(), (Hash, ValidationError)> {
        let results: Vec<ValidationResult<()>> = transactions
            .par_iter()
            .map(|tx| self.validate_transaction(tx, spent))
            .collect();

        transactions
            .iter()
            .zip(results)
            .try_for_each(|(tx, result)| result.map_err(|err| (tx.hash, err)))
    }

    /// Validate one action against the committed chain.
    #[instrument(skip_all, fields(hash = %shared_types::short_hex(&action.hash)))]
    pub fn validate_action(
        &self,
        action: &Action,
        spent: &dyn SpentHashView,
    ) -> ValidationResult<()> {
        let result = self.check_action(action, spent);
        if let Err(err) = &result {
            debug!(
                "[tl-02] Rejected action {}: {}",
                shared_types::short_hex(&action.hash),
                err
            );
        }
        result
    }

    // =========================================================================
    // TRANSACTION RULES
    // =========================================================================

    fn ensure_unspent(&self, tx: &Transaction, spent: &dyn SpentHashView) -> ValidationResult<()> {
        if spent.transaction_spent_in(&tx.hash).is_some()
            || spent.reference_used_by(&tx.hash).is_some()
        {
            return Err(ValidationError::AlreadySpent(tx.short_hash()));
        }
        Ok(())
    }

    /// simple, stake and allocation
    fn check_transfer(&self, tx: &Transaction) -> ValidationResult<()> {
        self.validate_checksum(tx)?;

        let sender_key = self.deps.accounts.resolve_key(&tx.from_address);
        self.ensure_key("sender", &tx.from_address, &sender_key)?;
        let receiver_key = self.deps.accounts.resolve_key(&tx.to_address);
        self.ensure_key("receiver", &tx.to_address, &receiver_key)?;

        self.ensure_signature(&tx.hash, &tx.signature, &sender_key)?;

        if sender_key == receiver_key {
            return Err(ValidationError::SelfTransfer);
        }
        self.ensure_funds(&sender_key, tx.amount, tx.mining_fee)?;
        if tx.amount == 0 {
            return Err(ValidationError::ZeroAmount);
        }
        self.ensure_fee(tx)?;
        self.ensure_size(tx.serialized_size())
    }

    fn check_call(&self, tx: &Transaction) -> ValidationResult<()> {
        let sender = self.known_account(&tx.from_address)?;
        let receiver = self.known_account(&tx.to_address)?;
        if !receiver.is_contract() {
            return Err(ValidationError::NotAContract(receiver.name));
        }

        self.validate_checksum(tx)?;
        self.ensure_signature(&tx.hash, &tx.signature, &sender.owner_key)?;
        self.ensure_fee(tx)?;
        self.ensure_size(tx.serialized_size())?;

        if sender.name == receiver.name {
            return Err(ValidationError::SelfTransfer);
        }
        self.ensure_funds(&sender.owner_key, tx.amount, tx.mining_fee)
    }

    /// Payables are emitted by contract code, so the payable body carries no
    /// signature of its own and pays no size fee. Authority comes from the
    /// signed reference.
    fn check_payable(
        &self,
        tx: &Transaction,
        from_contract: &str,
        reference: &Transaction,
        spent: &dyn SpentHashView,
    ) -> ValidationResult<()> {
        let sender = self.known_account(&tx.from_address)?;
        let receiver = self.known_account(&tx.to_address)?;

        self.validate_checksum(tx)?;
        self.ensure_size(tx.serialized_size())?;
        self.ensure_signature(&reference.hash, &reference.signature, &sender.owner_key)?;

        match self.deps.accounts.account(from_contract) {
            Some(account) if account.is_contract() => {}
            _ => return Err(ValidationError::NotAContract(from_contract.to_string())),
        }
        if sender.name == receiver.name {
            return Err(ValidationError::SelfTransfer);
        }
        self.ensure_funds(&sender.owner_key, tx.amount, tx.mining_fee)?;

        self.check_payable_reference(reference, &sender, from_contract, spent)
    }

    fn check_payable_reference(
        &self,
        reference: &Transaction,
        sender: &shared_types::Account,
        from_contract: &str,
        spent: &dyn SpentHashView,
    ) -> ValidationResult<()> {
        let reference_sender = self.known_account(&reference.from_address)?;
        if reference_sender.name != sender.name || reference_sender.owner_key != sender.owner_key {
            return Err(ValidationError::InvalidReference(
                "sent by a different account",
            ));
        }
        self.ensure_signature(
            &reference.hash,
            &reference.signature,
            &reference_sender.owner_key,
        )?;

        let contract: ContractInfo = self
            .deps
            .contracts
            .contract(&reference.to_address)
            .ok_or(ValidationError::InvalidReference("not made to a contract"))?;
        let method = reference.invoked_method().unwrap_or_default();
        let emits_payable = contract
            .methods
            .get(method)
            .map(|m| m.emits_payable())
            .unwrap_or(false);
        if !emits_payable {
            return Err(ValidationError::NotPayable {
                method: method.to_string(),
            });
        }

        if let Some(used_by) = spent.reference_used_by(&reference.hash) {
            return Err(ValidationError::ReferenceAlreadyUsed {
                reference: reference.short_hash(),
                used_by: shared_types::short_hex(&used_by),
            });
        }
        if spent.transaction_spent_in(&reference.hash).is_none() {
            return Err(ValidationError::InvalidReference("reference is not committed"));
        }

        if reference.to_address != from_contract {
            return Err(ValidationError::InvalidReference(
                "made to a different contract",
            ));
        }
        Ok(())
    }

    fn check_coinbase(&self, tx: &Transaction) -> ValidationResult<()> {
        self.validate_checksum(tx)?;
        if tx.amount > self.config.mining_reward {
            return Err(ValidationError::ExcessiveReward {
                amount: tx.amount,
                max: self.config.mining_reward,
            });
        }
        self.ensure_size(tx.serialized_size())
    }

    // =========================================================================
    // ACTION RULES
    // =========================================================================

    fn check_action(&self, action: &Action, spent: &dyn SpentHashView) -> ValidationResult<()> {
        if spent.action_spent_in(&action.hash).is_some() {
            return Err(ValidationError::AlreadySpent(shared_types::short_hex(
                &action.hash,
            )));
        }

        let owner_key = if action.is_account_creation() {
            if self.deps.accounts.account(&action.from_account).is_some() {
                return Err(ValidationError::AccountExists(action.from_account.clone()));
            }
            let record = action
                .account_record()
                .map_err(|e| ValidationError::MalformedAccount(e.to_string()))?;
            if !record.is_well_formed() || record.name != action.from_account {
                return Err(ValidationError::MalformedAccount(record.name));
            }
            record.owner_key
        } else {
            self.known_account(&action.from_account)?.owner_key
        };

        if action.is_contract_deploy() {
            let contract: ContractInfo = serde_json::from_value(action.data.clone())
                .map_err(|e| ValidationError::MalformedContract(e.to_string()))?;
            if self.deps.contracts.contract(&contract.name).is_some() {
                return Err(ValidationError::ContractExists(contract.name));
            }
        }

        if !action.has_valid_checksum() {
            return Err(ValidationError::InvalidChecksum);
        }
        self.ensure_key("owner", &action.from_account, &owner_key)?;
        self.ensure_signature(&action.hash, &action.signature, &owner_key)?;
        if action.fee == 0 {
            return Err(ValidationError::MissingFee);
        }
        self.ensure_size(action.serialized_size())?;
        self.ensure_funds(&owner_key, 0, action.fee)
    }

    // =========================================================================
    // SHARED CHECKS
    // =========================================================================

    fn known_account(&self, name: &str) -> ValidationResult<shared_types::Account> {
        self.deps
            .accounts
            .account(name)
            .ok_or_else(|| ValidationError::UnknownAccount(name.to_string()))
    }

    fn ensure_key(&self, role: &'static str, address: &str, key: &str) -> ValidationResult<()> {
        if self.deps.verifier.is_valid_public_key(key) {
            Ok(())
        } else {
            Err(ValidationError::InvalidAddress {
                role,
                address: address.to_string(),
            })
        }
    }

    fn ensure_signature(&self, hash: &Hash, signature: &Signature, key: &str) -> ValidationResult<()> {
        if self.deps.verifier.verify(hash, signature, key) {
            Ok(())
        } else {
            Err(ValidationError::InvalidSignature)
        }
    }

    fn ensure_funds(&self, key: &str, amount: Amount, fee: Amount) -> ValidationResult<()> {
        let available = self.deps.balances.balance_of(key);
        let required = amount.saturating_add(fee);
        if available >= required {
            Ok(())
        } else {
            Err(ValidationError::InsufficientFunds {
                required,
                available,
            })
        }
    }

    fn ensure_fee(&self, tx: &Transaction) -> ValidationResult<()> {
        let required = self.minimum_fee(tx);
        if tx.mining_fee >= required {
            Ok(())
        } else {
            Err(ValidationError::FeeTooLow {
                provided: tx.mining_fee,
                required,
            })
        }
    }

    fn ensure_size(&self, size: usize) -> ValidationResult<()> {
        let limit = self.config.max_entry_size_bytes;
        if size < limit {
            Ok(())
        } else {
            Err(ValidationError::TooLarge { size, limit })
        }
    }
}
