//! # Integration Scenarios
//!
//! End-to-end properties of a node: settlement of transfers and payables,
//! rollback, fork choice between peers and turn rotation liveness.

pub mod network;

mod forks;
mod liveness;
mod settlement;
