//! Blacklist and pause state
//!
//! The live policy is process-wide and refreshed by whatever adapter
//! feeds it; the airlock only ever reads an immutable snapshot taken at
//! proposal open, so later mutations never retroactively affect
//! in-flight proposals.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use airlock_core::PolicySnapshot;

/// Live policy source
#[derive(Debug, Default)]
pub struct PolicyStore {
    inner: RwLock<PolicyInner>,
}

#[derive(Debug, Default)]
struct PolicyInner {
    blacklist: HashSet<Vec<u8>>,
    paused: bool,
}

impl PolicyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Copy-on-write snapshot for a proposal open
    pub async fn snapshot(&self) -> PolicySnapshot {
        let inner = self.inner.read().await;
        PolicySnapshot::new(inner.blacklist.clone(), inner.paused)
    }

    /// Add a sender to the blacklist
    pub async fn blacklist(&self, sender: Vec<u8>) {
        let mut inner = self.inner.write().await;
        info!(sender = %hex::encode(&sender), "sender blacklisted");
        inner.blacklist.insert(sender);
    }

    /// Remove a sender from the blacklist
    pub async fn unblacklist(&self, sender: &[u8]) {
        let mut inner = self.inner.write().await;
        inner.blacklist.remove(sender);
    }

    /// Set the global pause flag
    pub async fn set_paused(&self, paused: bool) {
        let mut inner = self.inner.write().await;
        if inner.paused != paused {
            info!(paused, "protocol pause state changed");
        }
        inner.paused = paused;
    }
}
