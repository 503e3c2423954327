//! # Core Domain Entities
//!
//! ## Clusters
//!
//! - **Chain**: `BlockHeader`, `Block`, `BlockTemplate`
//! - **Ledger entries**: `Transaction` (shape selected by `TransactionKind`), `Action`
//! - **Accounts**: `Account`, `AccountKind`
//!
//! Amounts are integer base units; `BASE_UNITS_PER_COIN` converts to whole coins.
//! Difficulty values are `U256` and serialize as `0x`-prefixed hex strings.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_with::{serde_as, Bytes};

pub use primitive_types::U256;

use crate::digest::{merkle_root, short_hex, CanonicalHasher};
use crate::errors::FormatError;

// =============================================================================
// PRIMITIVES
// =============================================================================

/// A 32-byte SHA-256 hash.
pub type Hash = [u8; 32];

/// A 64-byte secp256k1 ECDSA signature (r || s).
pub type Signature = [u8; 64];

/// Hex-encoded compressed public key, or an account name resolved through the
/// account registry.
pub type Address = String;

/// Amount in base units.
pub type Amount = u64;

/// Milliseconds since the Unix epoch.
pub type Timestamp = u64;

/// Position of a block in the chain (genesis is 0).
pub type BlockNumber = u64;

/// Signer identity (hex public key) to signature.
pub type SignatureMap = BTreeMap<String, Signature>;

pub const ZERO_HASH: Hash = [0u8; 32];
pub const ZERO_SIGNATURE: Signature = [0u8; 64];

/// Sender address carried by reward transactions.
pub const COINBASE_ADDRESS: &str = "coinbase";

/// Base units per whole coin.
pub const BASE_UNITS_PER_COIN: Amount = 10_000;

/// Marker a contract method declares when invoking it authorizes a payable.
pub const PAYABLE_EMIT: &str = "Payable";

// =============================================================================
// TRANSACTIONS
// =============================================================================

/// Shape of a transaction.
///
/// Decoded from the `type` field at deserialization; unknown tags are rejected
/// there instead of reaching validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransactionKind {
    /// Plain value transfer between keys.
    Simple,
    /// Contract invocation from an account to a contract account.
    Call,
    /// Transfer authorized by an earlier contract call (`reference`).
    Payable {
        from_contract: Address,
        reference: Box<Transaction>,
    },
    /// Block reward.
    Coinbase,
    Stake,
    Allocation,
}

impl TransactionKind {
    pub fn name(&self) -> &'static str {
        match self {
            TransactionKind::Simple => "simple",
            TransactionKind::Call => "call",
            TransactionKind::Payable { .. } => "payable",
            TransactionKind::Coinbase => "coinbase",
            TransactionKind::Stake => "stake",
            TransactionKind::Allocation => "allocation",
        }
    }
}

/// A signed value transfer.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub from_address: Address,
    pub to_address: Address,
    pub amount: Amount,
    /// Arbitrary payload; contract calls carry `{"method": ..., "params": ...}`.
    pub data: serde_json::Value,
    pub timestamp: Timestamp,
    pub nonce: u64,
    pub hash: Hash,
    #[serde_as(as = "Bytes")]
    pub signature: Signature,
    pub mining_fee: Amount,
    #[serde(flatten)]
    pub kind: TransactionKind,
}

impl Transaction {
    /// Build an unsigned transaction with its hash filled in.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        kind: TransactionKind,
        from_address: impl Into<Address>,
        to_address: impl Into<Address>,
        amount: Amount,
        data: serde_json::Value,
        timestamp: Timestamp,
        nonce: u64,
        mining_fee: Amount,
    ) -> Self {
        let mut tx = Self {
            from_address: from_address.into(),
            to_address: to_address.into(),
            amount,
            data,
            timestamp,
            nonce,
            hash: [0u8; 32],
            signature: ZERO_SIGNATURE,
            mining_fee,
            kind,
        };
        tx.hash = tx.compute_hash();
        tx
    }

    /// Reward transaction for `block_number`. The block number doubles as nonce so
    /// that identical rewards in different blocks hash differently.
    pub fn coinbase(
        to_address: impl Into<Address>,
        amount: Amount,
        timestamp: Timestamp,
        block_number: BlockNumber,
    ) -> Self {
        Self::new(
            TransactionKind::Coinbase,
            COINBASE_ADDRESS,
            to_address,
            amount,
            json!("coinbase"),
            timestamp,
            block_number,
            0,
        )
    }

    /// Recompute the canonical digest.
    pub fn compute_hash(&self) -> Hash {
        CanonicalHasher::new()
            .str_field(&self.from_address)
            .str_field(&self.to_address)
            .u64_field(self.amount)
            .str_field(&canonical_data(&self.data))
            .u64_field(self.timestamp)
            .u64_field(self.nonce)
            .finish()
    }

    pub fn has_valid_checksum(&self) -> bool {
        self.compute_hash() == self.hash
    }

    pub fn is_coinbase(&self) -> bool {
        matches!(self.kind, TransactionKind::Coinbase)
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.name()
    }

    /// The authorizing transaction of a payable.
    pub fn reference(&self) -> Option<&Transaction> {
        match &self.kind {
            TransactionKind::Payable { reference, .. } => Some(reference),
            _ => None,
        }
    }

    /// Contract method named in the payload, if any.
    pub fn invoked_method(&self) -> Option<&str> {
        self.data.get("method").and_then(|m| m.as_str())
    }

    /// Size of the unsigned body the minimum fee is charged on.
    pub fn fee_basis_size(&self) -> usize {
        json!({
            "fromAddress": self.from_address,
            "toAddress": self.to_address,
            "type": self.type_name(),
            "data": self.data,
            "timestamp": self.timestamp,
        })
        .to_string()
        .len()
    }

    /// Encoded size of the whole transaction.
    pub fn serialized_size(&self) -> usize {
        serde_json::to_vec(self)
            .map(|bytes| bytes.len())
            .unwrap_or(usize::MAX)
    }

    pub fn short_hash(&self) -> String {
        short_hex(&self.hash)
    }
}

// =============================================================================
// ACTIONS
// =============================================================================

/// Family of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Account,
    Contract,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Account => "account",
            ActionType::Contract => "contract",
        }
    }
}

/// A signed account or contract operation.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub from_account: Address,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub task: String,
    pub data: serde_json::Value,
    pub fee: Amount,
    pub timestamp: Timestamp,
    pub hash: Hash,
    #[serde_as(as = "Bytes")]
    pub signature: Signature,
}

impl Action {
    /// Build an unsigned action with its hash filled in.
    pub fn new(
        from_account: impl Into<Address>,
        action_type: ActionType,
        task: impl Into<String>,
        data: serde_json::Value,
        fee: Amount,
        timestamp: Timestamp,
    ) -> Self {
        let mut action = Self {
            from_account: from_account.into(),
            action_type,
            task: task.into(),
            data,
            fee,
            timestamp,
            hash: [0u8; 32],
            signature: ZERO_SIGNATURE,
        };
        action.hash = action.compute_hash();
        action
    }

    pub fn compute_hash(&self) -> Hash {
        CanonicalHasher::new()
            .str_field(&self.from_account)
            .str_field(self.action_type.as_str())
            .str_field(&self.task)
            .str_field(&canonical_data(&self.data))
            .u64_field(self.fee)
            .u64_field(self.timestamp)
            .finish()
    }

    pub fn has_valid_checksum(&self) -> bool {
        self.compute_hash() == self.hash
    }

    pub fn is_account_creation(&self) -> bool {
        self.action_type == ActionType::Account && self.task == "create"
    }

    pub fn is_contract_deploy(&self) -> bool {
        self.action_type == ActionType::Contract && self.task == "deploy"
    }

    /// Account record embedded in a `create-account` action.
    pub fn account_record(&self) -> Result<Account, FormatError> {
        serde_json::from_value(self.data.clone())
            .map_err(|e| FormatError::MalformedPayload(e.to_string()))
    }

    pub fn serialized_size(&self) -> usize {
        serde_json::to_vec(self)
            .map(|bytes| bytes.len())
            .unwrap_or(usize::MAX)
    }
}

/// Payload bytes as hashed: strings are taken verbatim, anything else as compact
/// JSON (object keys are sorted).
fn canonical_data(data: &serde_json::Value) -> String {
    match data {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// =============================================================================
// ACCOUNTS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    User,
    Contract,
}

/// A named account owned by a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub name: String,
    /// Hex-encoded compressed public key of the owner.
    pub owner_key: String,
    #[serde(rename = "type")]
    pub kind: AccountKind,
}

impl Account {
    pub const MAX_NAME_LEN: usize = 64;

    /// Structural checks only; key validity is a signature-layer concern.
    pub fn is_well_formed(&self) -> bool {
        let name_ok = !self.name.is_empty()
            && self.name.len() <= Self::MAX_NAME_LEN
            && self
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.');
        let key_ok = self.owner_key.len() == 66 && hex::decode(&self.owner_key).is_ok();
        name_ok && key_ok && self.name != COINBASE_ADDRESS
    }

    pub fn is_contract(&self) -> bool {
        self.kind == AccountKind::Contract
    }
}

// =============================================================================
// BLOCKS
// =============================================================================

/// Lightweight per-block metadata kept in memory for the whole chain.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub block_number: BlockNumber,
    pub timestamp: Timestamp,
    pub previous_hash: Hash,
    pub hash: Hash,
    pub nonce: u64,
    pub merkle_root: Hash,
    pub action_merkle_root: Hash,
    pub difficulty: U256,
    pub total_difficulty: U256,
    pub challenge: U256,
    pub tx_hashes: Vec<Hash>,
    pub action_hashes: Vec<Hash>,
    pub mined_by: String,
    #[serde_as(as = "BTreeMap<_, Bytes>")]
    pub signatures: SignatureMap,
}

impl BlockHeader {
    /// digest(previousHash, timestamp, merkleRoot, nonce)
    pub fn compute_hash(&self) -> Hash {
        block_digest(&self.previous_hash, self.timestamp, &self.merkle_root, self.nonce)
    }

    pub fn has_valid_hash(&self) -> bool {
        self.compute_hash() == self.hash
    }

    /// Whether this header directly extends `parent`.
    pub fn extends(&self, parent: &BlockHeader) -> bool {
        self.block_number == parent.block_number + 1 && self.previous_hash == parent.hash
    }

    pub fn short_hash(&self) -> String {
        short_hex(&self.hash)
    }
}

/// Block hash over the fields the proof-of-work search varies.
pub fn block_digest(previous_hash: &Hash, timestamp: Timestamp, merkle_root: &Hash, nonce: u64) -> Hash {
    CanonicalHasher::new()
        .field(previous_hash)
        .u64_field(timestamp)
        .field(merkle_root)
        .u64_field(nonce)
        .finish()
}

/// Unsealed block contents produced by block assembly.
#[derive(Debug, Clone)]
pub struct BlockTemplate {
    pub block_number: BlockNumber,
    pub previous_hash: Hash,
    pub timestamp: Timestamp,
    pub transactions: Vec<Transaction>,
    pub actions: Vec<Action>,
    pub coinbase_transaction_hash: Hash,
    pub difficulty: U256,
    pub total_difficulty: U256,
    pub challenge: U256,
    pub mined_by: String,
}

/// Header plus full bodies, persisted and fetched on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
    pub actions: Vec<Action>,
    pub coinbase_transaction_hash: Hash,
}

impl Block {
    /// Build a block from a template with hash lists and merkle roots derived from
    /// the bodies. The block is sealed with nonce 0.
    pub fn from_template(template: BlockTemplate) -> Self {
        let tx_hashes: Vec<Hash> = template.transactions.iter().map(|tx| tx.hash).collect();
        let action_hashes: Vec<Hash> = template.actions.iter().map(|a| a.hash).collect();
        let mut block = Self {
            header: BlockHeader {
                block_number: template.block_number,
                timestamp: template.timestamp,
                previous_hash: template.previous_hash,
                hash: [0u8; 32],
                nonce: 0,
                merkle_root: merkle_root(&tx_hashes),
                action_merkle_root: merkle_root(&action_hashes),
                difficulty: template.difficulty,
                total_difficulty: template.total_difficulty,
                challenge: template.challenge,
                tx_hashes,
                action_hashes,
                mined_by: template.mined_by,
                signatures: SignatureMap::new(),
            },
            transactions: template.transactions,
            actions: template.actions,
            coinbase_transaction_hash: template.coinbase_transaction_hash,
        };
        block.seal(0);
        block
    }

    /// Set the nonce and recompute the hash.
    pub fn seal(&mut self, nonce: u64) {
        self.header.nonce = nonce;
        self.header.hash = self.header.compute_hash();
    }

    pub fn number(&self) -> BlockNumber {
        self.header.block_number
    }

    pub fn hash(&self) -> Hash {
        self.header.hash
    }

    pub fn previous_hash(&self) -> Hash {
        self.header.previous_hash
    }

    pub fn transaction(&self, hash: &Hash) -> Option<&Transaction> {
        self.transactions.iter().find(|tx| &tx.hash == hash)
    }

    pub fn coinbase_transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter().filter(|tx| tx.is_coinbase())
    }

    /// Transaction mining fees plus action fees, saturating at `Amount::MAX`.
    pub fn mining_fees(&self) -> Amount {
        let tx_fees = self
            .transactions
            .iter()
            .fold(0, |sum: Amount, tx| sum.saturating_add(tx.mining_fee));
        self.actions
            .iter()
            .fold(tx_fees, |sum, action| sum.saturating_add(action.fee))
    }

    pub fn recompute_merkle_root(&self) -> Hash {
        merkle_root(&self.header.tx_hashes)
    }

    pub fn recompute_action_merkle_root(&self) -> Hash {
        merkle_root(&self.header.action_hashes)
    }

    /// Structural checks: header hash lists mirror the bodies in order and no
    /// entry appears twice.
    pub fn check_format(&self) -> Result<(), FormatError> {
        if self.transactions.is_empty() {
            return Err(FormatError::EmptyBlock(self.number()));
        }
        let body_tx: Vec<Hash> = self.transactions.iter().map(|tx| tx.hash).collect();
        if body_tx != self.header.tx_hashes {
            return Err(FormatError::HashListMismatch { list: "transaction" });
        }
        let body_actions: Vec<Hash> = self.actions.iter().map(|a| a.hash).collect();
        if body_actions != self.header.action_hashes {
            return Err(FormatError::HashListMismatch { list: "action" });
        }

        let mut seen = HashSet::new();
        for hash in body_tx.iter().chain(body_actions.iter()) {
            if !seen.insert(*hash) {
                return Err(FormatError::DuplicateEntry(short_hex(hash)));
            }
        }
        Ok(())
    }
}
