//! # Domain Layer
//!
//! Receipt bookkeeping with no I/O.

pub mod entities;
pub mod pool;
