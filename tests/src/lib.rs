//! # Tandem Ledger Test Suite
//!
//! Cross-crate scenarios run against real node runtimes connected through an
//! in-process network.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── network.rs    # in-process peer hub and node fixtures
//!     ├── settlement.rs # balances, fees, payable reuse, rollback
//!     ├── forks.rs      # competing blocks and reorganization
//!     └── liveness.rs   # turn rotation with a silent validator
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p tl-tests
//! cargo test -p tl-tests integration::liveness
//! ```

#![allow(dead_code)]

pub mod integration;
