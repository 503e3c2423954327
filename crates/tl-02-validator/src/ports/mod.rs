//! # Ports Layer
//!
//! Read capabilities the validator depends on.

pub mod outbound;
