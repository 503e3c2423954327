//! Adapters for the registry ports.

pub mod memory;
