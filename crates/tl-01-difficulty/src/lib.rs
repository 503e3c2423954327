//! # Difficulty Engine
//!
//! Pure, deterministic difficulty and challenge computation. No I/O, no clock.
//!
//! ## Algorithm
//!
//! ```text
//! mineTime       = floor((newTimestamp - previous.timestamp) / 1000)
//! timeAdjustment = max(targetBlockTime - mineTime, -99)
//! modifier       = (previous.difficulty / 384) * timeAdjustment
//! bomb           = 2^(floor(previous.blockNumber / bombPeriod) - 2)   (0 if exponent < 0)
//! difficulty     = max(previous.difficulty + modifier + bomb, minimumDifficulty)
//! challenge      = floor((2^255 - 1) / max(difficulty, 1))
//! ```
//!
//! All arithmetic is on `U256`; cumulative totals outgrow 64 bits.
//!
//! **Remember**: the challenge is a CEILING. Higher difficulty means a lower
//! challenge and fewer valid hashes.

pub mod config;
pub mod difficulty;

pub use config::{DifficultyConfig, GENESIS_DIFFICULTY};
pub use difficulty::{meets_challenge, next_challenge, DifficultyEngine, ParentInfo};
