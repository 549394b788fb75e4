//! Pre-flight policy snapshots
//!
//! Blacklist and pause state are process-wide but read as a copy-on-write
//! snapshot when a proposal opens. Later policy mutations never affect
//! in-flight proposals.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Immutable policy view taken at proposal open
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicySnapshot {
    /// Senders barred from submitting intents
    blacklist: HashSet<Vec<u8>>,

    /// Whether the protocol is globally paused
    paused: bool,
}

impl PolicySnapshot {
    pub fn new(blacklist: HashSet<Vec<u8>>, paused: bool) -> Self {
        Self { blacklist, paused }
    }

    /// Whether the sender is blacklisted in this snapshot
    pub fn is_blacklisted(&self, sender: &[u8]) -> bool {
        self.blacklist.contains(sender)
    }

    /// Whether the protocol was paused when this snapshot was taken
    pub fn is_paused(&self) -> bool {
        self.paused
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_is_immutable_view() {
        let mut blacklist = HashSet::new();
        blacklist.insert(vec![0xBA; 20]);
        let snapshot = PolicySnapshot::new(blacklist.clone(), false);

        assert!(snapshot.is_blacklisted(&[0xBA; 20]));
        assert!(!snapshot.is_blacklisted(&[0x11; 20]));
        assert!(!snapshot.is_paused());

        // Mutating the source set does not reach into the snapshot
        blacklist.insert(vec![0x11; 20]);
        assert!(!snapshot.is_blacklisted(&[0x11; 20]));
    }
}
