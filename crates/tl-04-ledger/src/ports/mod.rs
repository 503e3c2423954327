//! # Ports Layer
//!
//! - `outbound.rs` - Driven ports (capabilities the ledger is constructed with)

pub mod outbound;
