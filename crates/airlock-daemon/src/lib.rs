//! Airlock Daemon - the transaction airlock orchestrator
//!
//! Accepts transaction intents, scores them, opens a guardian proposal,
//! optionally arms a VDF time-lock, races voting against the time-lock,
//! and emits a cryptographically attested execution envelope or a block
//! decision.

pub mod config;
pub mod error;
pub mod executor;
pub mod guardian;
pub mod ipc;
pub mod orchestrator;
pub mod policy;
pub mod progress;
pub mod scorer;
pub mod store;

pub use config::DaemonConfig;
pub use error::{DaemonError, Result};
pub use executor::{ExecutionReceipt, MockExecutor, TransactionExecutor};
pub use guardian::GuardianHub;
pub use ipc::IpcServer;
pub use orchestrator::{cancel_pair, Airlock, AirlockOutcome, BlockReason, CancelHandle, CancelToken};
pub use policy::PolicyStore;
pub use progress::{ProgressEvent, ProgressSender};
pub use scorer::{MockScorer, RiskAssessment, RiskScorer};
pub use store::{Proposal, ProposalOutcome, ProposalStore, TallySnapshot, VoteResolution};
