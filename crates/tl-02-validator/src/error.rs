//! # Validation Errors
//!
//! One variant per rule. The variant returned is the first rule that failed.

use shared_types::Amount;
use thiserror::Error;

/// Result type alias for validation.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Why an entry was rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Entry {0} is already spent")]
    AlreadySpent(String),

    #[error("Hash does not match contents")]
    InvalidChecksum,

    #[error("Invalid {role} address: {address}")]
    InvalidAddress { role: &'static str, address: String },

    #[error("Signature verification failed")]
    InvalidSignature,

    #[error("Sender and receiver are the same")]
    SelfTransfer,

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: Amount, available: Amount },

    #[error("Amount must be greater than zero")]
    ZeroAmount,

    #[error("Fee too low: provided {provided}, required {required}")]
    FeeTooLow { provided: Amount, required: Amount },

    #[error("Entry too large: {size} bytes (limit {limit})")]
    TooLarge { size: usize, limit: usize },

    #[error("Unknown account: {0}")]
    UnknownAccount(String),

    #[error("Account {0} is not a contract")]
    NotAContract(String),

    #[error("Coinbase amount {amount} exceeds reward {max}")]
    ExcessiveReward { amount: Amount, max: Amount },

    #[error("Payable reference is invalid: {0}")]
    InvalidReference(&'static str),

    #[error("Reference {reference} already used by {used_by}")]
    ReferenceAlreadyUsed { reference: String, used_by: String },

    #[error("Contract method {method} does not emit Payable")]
    NotPayable { method: String },

    #[error("Account {0} already exists")]
    AccountExists(String),

    #[error("Malformed account record: {0}")]
    MalformedAccount(String),

    #[error("Contract {0} already deployed")]
    ContractExists(String),

    #[error("Malformed contract record: {0}")]
    MalformedContract(String),

    #[error("Action fee must be greater than zero")]
    MissingFee,
}

impl ValidationError {
    /// Whether the entry can never become valid again on this chain.
    ///
    /// Funds can arrive later; a bad signature cannot be repaired.
    pub fn is_permanent(&self) -> bool {
        !matches!(
            self,
            ValidationError::InsufficientFunds { .. } | ValidationError::UnknownAccount(_)
        )
    }

    /// Double-spend or reference reuse.
    pub fn is_double_use(&self) -> bool {
        matches!(
            self,
            ValidationError::AlreadySpent(_) | ValidationError::ReferenceAlreadyUsed { .. }
        )
    }
}
