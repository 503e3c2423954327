//! # Domain Layer
//!
//! In-memory chain bookkeeping. No I/O; the service persists.

pub mod chain;
pub mod fork_choice;
pub mod pool;
pub mod snapshot;
pub mod spent;
