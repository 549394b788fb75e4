//! Shared harness for end-to-end airlock tests
//!
//! Builds a complete in-process stack (DKG, voting roster, VDF engine,
//! store, hub, orchestrator, mock adapters) at demo scale and simulates
//! guardian behavior through the public commit/reveal surface.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::OsRng;

use airlock_core::intent::TransactionIntent;
use airlock_core::types::{ChainTag, Fingerprint, GuardianSlot, VoteChoice};
use airlock_core::AirlockConfig;
use airlock_daemon::{
    Airlock, GuardianHub, MockExecutor, PolicyStore, ProgressSender, ProposalStore, RiskScorer,
};
use airlock_vdf::{RsaModulus, VdfEngine};
use airlock_vote::{GuardianVotingKey, RevealProof, VoteCommitment, VotingKeySet};

/// A fully wired in-process airlock
pub struct TestStack {
    pub config: AirlockConfig,
    pub airlock: Arc<Airlock>,
    pub hub: Arc<GuardianHub>,
    pub store: Arc<ProposalStore>,
    pub vdf: Arc<VdfEngine>,
    pub executor: Arc<MockExecutor>,
    pub policy: Arc<PolicyStore>,
    pub voting_keys: Vec<GuardianVotingKey>,
}

/// Stack construction knobs
pub struct StackOptions {
    pub scorer: Arc<dyn RiskScorer>,
    pub vdf_iterations: u64,
    pub proposal_deadline_secs: u64,
    /// Slots allowed to contribute signing shares; None means all
    pub signing_slots: Option<Vec<GuardianSlot>>,
}

impl TestStack {
    pub fn build(options: StackOptions) -> Self {
        let mut config = AirlockConfig::default();
        config.vdf_iterations = options.vdf_iterations;
        config.proposal_deadline_secs = options.proposal_deadline_secs;
        config.scorer_timeout_ms = 500;
        config.checkpoint_every = 256;

        let keyring =
            airlock_frost::run_dkg(config.guardian_count, config.approval_threshold).unwrap();
        let group_public = keyring.group_public.clone();

        let voting_keys: Vec<GuardianVotingKey> = (0..config.guardian_count)
            .map(|slot| GuardianVotingKey::generate(GuardianSlot(slot), &mut OsRng))
            .collect();
        let key_set = VotingKeySet::from_keys(&voting_keys);

        // Small ceremony modulus keeps demo proving fast; the math is
        // width-agnostic
        let modulus = RsaModulus::generate(&mut OsRng, 256);
        let vdf = Arc::new(VdfEngine::new(modulus, config.checkpoint_every));

        let store = Arc::new(ProposalStore::new(
            config.guardian_count,
            config.approval_threshold,
        ));
        let mut hub = GuardianHub::new(keyring, key_set, Arc::clone(&store));
        if let Some(slots) = options.signing_slots {
            hub = hub.with_signing_slots(slots);
        }
        let hub = Arc::new(hub);

        let executor = Arc::new(MockExecutor::new(
            group_public,
            Arc::clone(&vdf),
            config.vdf_iterations,
        ));
        let policy = PolicyStore::new();

        let airlock = Arc::new(Airlock::new(
            config.clone(),
            Arc::clone(&store),
            Arc::clone(&hub),
            Arc::clone(&vdf),
            options.scorer,
            Arc::clone(&executor) as Arc<dyn airlock_daemon::TransactionExecutor>,
            Arc::clone(&policy),
            ProgressSender::disabled(),
        ));

        Self {
            config,
            airlock,
            hub,
            store,
            vdf,
            executor,
            policy,
            voting_keys,
        }
    }

    /// A plain intent with the given value
    pub fn intent(&self, value: u128) -> TransactionIntent {
        TransactionIntent {
            sender: vec![0x11; 20],
            destination: vec![0x22; 20],
            value,
            payload: vec![0xDE, 0xAD],
            source_chain: ChainTag::ETHEREUM,
            dest_chain: None,
        }
    }

    /// Wait until the proposal exists in the store
    pub async fn wait_for_proposal(&self, fingerprint: Fingerprint) {
        for _ in 0..200 {
            if self.store.tally(fingerprint).await.is_ok() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("proposal {} never opened", fingerprint.short());
    }

    /// Have every guardian commit to its assigned vote
    ///
    /// Returns the nonces needed for the reveals, indexed by slot.
    /// Tolerates the proposal finalizing mid-stream (a fast time-lock can
    /// beat the guardians), in which case the remaining commits are
    /// skipped.
    pub async fn commit_all(
        &self,
        fingerprint: Fingerprint,
        votes: &[VoteChoice; 10],
    ) -> Vec<Nonce> {
        let mut nonces = Vec::with_capacity(10);
        let mut finalized = false;
        for (slot, vote) in votes.iter().enumerate() {
            let key = &self.voting_keys[slot];
            let nonce = VoteCommitment::random_nonce(&mut OsRng);
            nonces.push(nonce);
            if finalized {
                continue;
            }
            let commitment = VoteCommitment::compute(key.slot, *vote, &nonce, &fingerprint);
            if self
                .hub
                .submit_commit(fingerprint, key.slot, commitment)
                .await
                .is_err()
            {
                finalized = true;
            }
        }
        nonces
    }

    /// Reveal the given slots in order, stopping silently once the
    /// proposal finalizes
    pub async fn reveal(
        &self,
        fingerprint: Fingerprint,
        votes: &[VoteChoice; 10],
        nonces: &[Nonce],
        order: &[u8],
    ) {
        for slot in order {
            let key = &self.voting_keys[*slot as usize];
            let vote = votes[*slot as usize];
            let proof = RevealProof::prove(
                key,
                vote,
                &nonces[*slot as usize],
                &fingerprint,
                &mut OsRng,
            );
            if self
                .hub
                .submit_reveal(fingerprint, key.slot, vote, &proof)
                .await
                .is_err()
            {
                // Finalized mid-stream; later reveals are expected to bounce
                return;
            }
        }
    }
}

/// Commitment blinding nonce
pub type Nonce = curve25519_dalek::Scalar;

/// Vote assignment helpers
pub fn votes(approve: usize, reject: usize) -> [VoteChoice; 10] {
    let mut votes = [VoteChoice::Abstain; 10];
    for v in votes.iter_mut().take(approve) {
        *v = VoteChoice::Approve;
    }
    for v in votes.iter_mut().skip(approve).take(reject) {
        *v = VoteChoice::Reject;
    }
    votes
}
