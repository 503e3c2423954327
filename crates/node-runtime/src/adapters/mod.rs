//! # Adapters
//!
//! Host-side implementations the node plugs into the components: storage
//! backends, the data-directory lock and the outbound peer transport.

pub mod lock;
pub mod storage;
pub mod transport;

pub use lock::DataDirLock;
pub use storage::NodeStores;
pub use transport::{ChannelTransport, PeerPayload};
