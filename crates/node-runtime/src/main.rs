//! # Tandem Ledger Node
//!
//! ```text
//! node-runtime [config.json]
//! ```
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (file, then `TL_DATA_DIR`)
//! 2. Lock the data directory
//! 3. Load or generate the identity key
//! 4. Open storage, the ledger (genesis on first start) and the mempool
//! 5. Start the consensus coordinator
//!
//! Peer networking is not part of this binary: outbound payloads are logged,
//! and a network layer feeds `NodeRuntime::deliver`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use node_runtime::{
    ChannelTransport, DataDirLock, NodeConfig, NodeDependencies, NodeRuntime, NodeStores,
    PeerPayload,
};
use shared_crypto::{Secp256k1KeyPair, Signer};
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn load_identity(path: Option<&Path>) -> Result<Secp256k1KeyPair> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read identity key {}", path.display()))?;
            Secp256k1KeyPair::from_hex(raw.trim())
                .with_context(|| format!("Invalid identity key in {}", path.display()))
        }
        None => {
            warn!("No identity_key_file configured, generating an ephemeral identity");
            Ok(Secp256k1KeyPair::generate())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config =
        NodeConfig::load(config_path.as_deref()).context("Failed to load configuration")?;

    info!("===========================================");
    info!("  Tandem Ledger Node v{}", env!("CARGO_PKG_VERSION"));
    info!("===========================================");

    let _lock = DataDirLock::acquire(&config.data_dir).context("Failed to lock data directory")?;

    let identity = Arc::new(load_identity(config.identity_key_file.as_deref())?);
    info!("Identity: {}", identity.identity());
    if !config.consensus.validators.contains(&identity.identity()) {
        warn!("This node is not in the validator set and will never propose");
    }

    let stores = NodeStores::open(config.storage, &config.data_dir)
        .context("Failed to open storage")?;
    let (transport, mut outbound) = ChannelTransport::new();
    let runtime = NodeRuntime::new(
        &config,
        identity,
        NodeDependencies::with_stores(stores),
        Arc::new(transport),
    )
    .context("Failed to open node")?;

    tokio::spawn(async move {
        while let Some(payload) = outbound.recv().await {
            match payload {
                PeerPayload::Consensus { message } => {
                    debug!("Outbound {:?}", message);
                }
                PeerPayload::NewBlock { block } => {
                    debug!("Outbound block {} {}", block.number(), block.header.short_hash());
                }
            }
        }
    });

    runtime.start();
    info!("Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    info!("Initiating graceful shutdown...");
    runtime.shutdown().await;
    Ok(())
}
