//! # Mempool / Block Assembler (TL-03)
//!
//! Holds unconfirmed transactions and actions until a block commits them.
//!
//! ## Reservation Protocol
//!
//! Entries are NEVER deleted when gathered into a candidate block. Deletion
//! happens only when that block commits.
//!
//! ```text
//! [AVAILABLE] ──gather──→ [RESERVED] ──commit──→ [DELETED]
//!                              │
//!                              └── putback ──→ [AVAILABLE]
//! ```
//!
//! | Stage | Method | Effect |
//! |-------|--------|--------|
//! | Gather | `gather_for_block()` | Move receipts to RESERVED, bodies untouched |
//! | Commit | `commit()` | Delete receipts and bodies |
//! | Putback | `putback()` | Return receipts to AVAILABLE |
//! | Reject | `reject()` | Delete one entry wherever it is |
//!
//! Gathering holds the pool lock for the whole selection, so two concurrent
//! assemblies never receive the same entry.
//!
//! ## Persistence
//!
//! Full bodies live in the key-value store under their hex hash; the receipt set
//! is written under the `receipts` key after every mutation and reloaded on
//! startup, where every receipt comes back as available.

pub mod config;
pub mod domain;
pub mod error;
pub mod service;

pub use config::{MempoolConfig, SelectionOrder};
pub use domain::entities::{Batch, EntryKind, PendingEntry, Receipt};
pub use domain::pool::ReceiptPool;
pub use error::{MempoolError, MempoolResult};
pub use service::{Mempool, PendingHistory, RECEIPTS_KEY};
