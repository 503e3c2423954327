//! # Signing Capabilities
//!
//! The ledger core never touches key material directly. It consumes these two
//! traits; production wiring plugs in the secp256k1 adapters below, tests may plug
//! in anything that honours the contract.

use crate::ecdsa::{Secp256k1KeyPair, Secp256k1PublicKey, Secp256k1Signature};

/// `verify(hash, signature, keyMaterial) -> bool`
pub trait SignatureVerifier: Send + Sync {
    /// Whether `signature` over `message` was produced by `public_key` (hex).
    fn verify(&self, message: &[u8; 32], signature: &[u8; 64], public_key: &str) -> bool;

    /// Whether `public_key` (hex) decodes to a usable key.
    fn is_valid_public_key(&self, public_key: &str) -> bool;
}

/// `sign(hash) -> signature`
pub trait Signer: Send + Sync {
    /// Identity other nodes use to look up this signer (hex public key).
    fn identity(&self) -> String;

    /// Sign a 32-byte digest.
    fn sign(&self, message: &[u8; 32]) -> [u8; 64];
}

/// secp256k1 verifier over hex-encoded compressed keys.
#[derive(Debug, Default, Clone, Copy)]
pub struct EcdsaVerifier;

impl SignatureVerifier for EcdsaVerifier {
    fn verify(&self, message: &[u8; 32], signature: &[u8; 64], public_key: &str) -> bool {
        match Secp256k1PublicKey::from_hex(public_key) {
            Ok(key) => key
                .verify(message, &Secp256k1Signature::from_bytes(*signature))
                .is_ok(),
            Err(_) => false,
        }
    }

    fn is_valid_public_key(&self, public_key: &str) -> bool {
        Secp256k1PublicKey::from_hex(public_key).is_ok()
    }
}

impl Signer for Secp256k1KeyPair {
    fn identity(&self) -> String {
        self.public_key().to_hex()
    }

    fn sign(&self, message: &[u8; 32]) -> [u8; 64] {
        *Secp256k1KeyPair::sign(self, message).as_bytes()
    }
}
