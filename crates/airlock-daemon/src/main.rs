//! Airlock Daemon - Main entry point
//!
//! Boots guardian key material, the VDF engine, and the orchestrator,
//! then serves the IPC surface until shutdown.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::OsRng;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use airlock_core::types::GuardianSlot;
use airlock_daemon::{
    Airlock, DaemonConfig, GuardianHub, IpcServer, MockExecutor, MockScorer, PolicyStore,
    ProgressSender, ProposalStore,
};
use airlock_frost::GuardianKeyring;
use airlock_vdf::{RsaModulus, VdfEngine};
use airlock_vote::{GuardianVotingKey, VotingKeySet};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "airlock_daemon=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Airlock daemon v{}", env!("CARGO_PKG_VERSION"));

    // Load or create config
    let config_path = std::env::var("AIRLOCK_CONFIG")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::config_dir()
                .unwrap_or_else(|| std::path::PathBuf::from("/etc"))
                .join("airlock")
                .join("daemon.json")
        });

    let config = if config_path.exists() {
        DaemonConfig::load(&config_path)?
    } else {
        let config = DaemonConfig::default();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        config.save(&config_path)?;
        info!("Created default config at {:?}", config_path);
        config
    };

    // Guardian key material: load persisted DKG output, or run the
    // one-shot ceremony at first boot
    let keyring_path = config_path.with_file_name("keyring.json");
    let keyring = if keyring_path.exists() {
        let content = std::fs::read_to_string(&keyring_path)?;
        let keyring: GuardianKeyring = serde_json::from_str(&content)?;
        info!(
            group_key = %keyring.group_public.to_hex(),
            "loaded guardian keyring"
        );
        keyring
    } else {
        let keyring = airlock_frost::run_dkg(
            config.airlock.guardian_count,
            config.airlock.approval_threshold,
        )?;
        std::fs::write(&keyring_path, serde_json::to_string(&keyring)?)?;
        info!("Guardian DKG complete; keyring persisted");
        keyring
    };

    // Guardian voting roster. A production deployment registers each
    // guardian's self-generated public key through the network adapter;
    // a fresh local roster keeps the daemon self-contained.
    let voting_keys: Vec<GuardianVotingKey> = (0..config.airlock.guardian_count)
        .map(|slot| GuardianVotingKey::generate(GuardianSlot(slot), &mut OsRng))
        .collect();
    let key_set = VotingKeySet::from_keys(&voting_keys);
    warn!("Generated in-process guardian voting roster; distribute keys via your deployment");

    // Core components
    let mut airlock_config = config.airlock.clone();
    airlock_config.vdf_iterations = config.vdf_iterations();

    // VDF modulus: load the persisted ceremony output, or run the local
    // setup ceremony at first boot. Only the modulus is ever persisted;
    // the prime factors never leave the ceremony.
    let modulus_path = config_path.with_file_name("vdf-modulus.hex");
    let modulus = if modulus_path.exists() {
        let content = std::fs::read_to_string(&modulus_path)?;
        let bytes = hex::decode(content.trim())?;
        info!("loaded VDF modulus ({} bits)", bytes.len() * 8);
        RsaModulus::from_bytes_be(&bytes)
    } else {
        info!(bits = config.vdf_modulus_bits, "running VDF modulus setup ceremony");
        let modulus = RsaModulus::generate(&mut OsRng, config.vdf_modulus_bits);
        std::fs::write(&modulus_path, hex::encode(modulus.to_bytes_be()))?;
        info!("VDF modulus ceremony complete; modulus persisted");
        modulus
    };
    let vdf = Arc::new(VdfEngine::new(modulus, airlock_config.checkpoint_every));

    let store = Arc::new(ProposalStore::new(
        airlock_config.guardian_count,
        airlock_config.approval_threshold,
    ));
    let hub = Arc::new(GuardianHub::new(keyring, key_set, Arc::clone(&store)));
    let policy = PolicyStore::new();

    let scorer = Arc::new(MockScorer::default());
    let executor = Arc::new(MockExecutor::new(
        hub.group_public().clone(),
        Arc::clone(&vdf),
        airlock_config.vdf_iterations,
    ));

    let (progress, mut progress_rx) = ProgressSender::channel();
    let airlock = Arc::new(Airlock::new(
        airlock_config,
        Arc::clone(&store),
        Arc::clone(&hub),
        Arc::clone(&vdf),
        scorer,
        executor,
        Arc::clone(&policy),
        progress,
    ));

    // Drain progress events into the log
    tokio::spawn(async move {
        while let Some(event) = progress_rx.recv().await {
            debug!(?event, "progress");
        }
    });

    // Expiry sweep
    let sweep_store = Arc::clone(&store);
    let sweep_interval = config.expiry_sweep_interval_ms;
    tokio::spawn(async move {
        let mut ticker =
            tokio::time::interval(std::time::Duration::from_millis(sweep_interval));
        loop {
            ticker.tick().await;
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs();
            let expired = sweep_store.expire_sweep(now).await;
            for fingerprint in expired {
                debug!(fingerprint = %fingerprint.short(), "expiry sweep fired");
            }
        }
    });

    // IPC server
    let ipc_server = IpcServer::new(config.ipc_socket_path.clone(), airlock, hub);
    let ipc_handle = tokio::spawn(async move {
        if let Err(e) = ipc_server.run().await {
            error!("IPC server error: {}", e);
        }
    });

    info!("Daemon started successfully");

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        _ = ipc_handle => {
            error!("IPC server exited unexpectedly");
        }
    }

    info!("Daemon shutting down");

    Ok(())
}

/// Helper module for dirs functionality
mod dirs {
    use std::path::PathBuf;

    pub fn config_dir() -> Option<PathBuf> {
        std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))
    }
}
