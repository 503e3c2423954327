//! # Shared Crypto
//!
//! Signing and verification capabilities consumed by the Validator, Ledger and
//! Consensus Coordinator.
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `ecdsa` | secp256k1 | Transaction, action and block-header signatures |
//! | `capability` | - | `Signer` / `SignatureVerifier` traits and their ECDSA adapters |
//!
//! ## Security Properties
//!
//! - **secp256k1**: RFC 6979 deterministic nonces, low-S normalization
//! - Secret key bytes are zeroized on drop

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod capability;
pub mod ecdsa;
pub mod errors;

// Re-exports
pub use capability::{EcdsaVerifier, SignatureVerifier, Signer};
pub use ecdsa::{Secp256k1KeyPair, Secp256k1PublicKey, Secp256k1Signature};
pub use errors::CryptoError;
