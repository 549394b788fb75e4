//! IPC server for guardian and operator communication
//!
//! Newline-delimited tagged JSON over a Unix socket. Guardians drive the
//! commit-reveal protocol through `SubmitCommit` / `SubmitReveal` /
//! `PollTally`; operators submit intents and poll their terminal
//! outcomes.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use airlock_core::envelope::Envelope;
use airlock_core::intent::TransactionIntent;
use airlock_core::types::{ChainTag, Fingerprint, GuardianSlot, VoteChoice};
use airlock_vote::{RevealProof, VoteCommitment};

use crate::error::{DaemonError, Result};
use crate::guardian::GuardianHub;
use crate::orchestrator::{cancel_pair, Airlock, AirlockOutcome};
use crate::store::TallySnapshot;

/// IPC request types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IpcRequest {
    /// Check if daemon is running
    Ping,

    /// Submit a transaction intent for gating
    SubmitIntent {
        sender: String,      // hex encoded
        destination: String, // hex encoded
        value: String,       // decimal u128
        payload: String,     // hex encoded
        chain_id: u32,
    },

    /// Submit a guardian's vote commitment
    SubmitCommit {
        fingerprint: String, // hex encoded
        slot: u8,
        commitment: String, // hex encoded
    },

    /// Submit a guardian's reveal with its proof
    SubmitReveal {
        fingerprint: String, // hex encoded
        slot: u8,
        vote: VoteChoice,
        proof: RevealProof,
    },

    /// Poll the tally of a proposal
    PollTally {
        fingerprint: String, // hex encoded
    },

    /// Poll the terminal outcome of a submitted intent
    GetOutcome {
        fingerprint: String, // hex encoded
    },
}

/// IPC response types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IpcResponse {
    /// Success with no data
    Ok,

    /// Pong response
    Pong { version: String },

    /// Error response
    Error { message: String },

    /// Intent accepted; lifecycle running
    IntentAccepted { fingerprint: String },

    /// Tally snapshot
    Tally { snapshot: TallySnapshot },

    /// Terminal outcome of an intent
    Outcome {
        state: String,
        envelope: Option<Envelope>,
    },
}

/// Terminal record kept for `GetOutcome`
#[derive(Debug, Clone)]
enum OutcomeRecord {
    Running,
    Done {
        state: String,
        envelope: Option<Envelope>,
    },
}

/// IPC server
pub struct IpcServer {
    socket_path: PathBuf,
    airlock: Arc<Airlock>,
    hub: Arc<GuardianHub>,
    outcomes: Arc<RwLock<HashMap<Fingerprint, OutcomeRecord>>>,
}

impl IpcServer {
    pub fn new(socket_path: PathBuf, airlock: Arc<Airlock>, hub: Arc<GuardianHub>) -> Self {
        Self {
            socket_path,
            airlock,
            hub,
            outcomes: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Start the IPC server
    pub async fn run(&self) -> Result<()> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }

        let listener = UnixListener::bind(&self.socket_path)
            .map_err(|e| DaemonError::Ipc(format!("Failed to bind socket: {}", e)))?;

        info!("IPC server listening on {:?}", self.socket_path);

        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let airlock = Arc::clone(&self.airlock);
                    let hub = Arc::clone(&self.hub);
                    let outcomes = Arc::clone(&self.outcomes);

                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, airlock, hub, outcomes).await {
                            error!("Connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }
    }
}

/// Handle a single IPC connection
async fn handle_connection(
    stream: UnixStream,
    airlock: Arc<Airlock>,
    hub: Arc<GuardianHub>,
    outcomes: Arc<RwLock<HashMap<Fingerprint, OutcomeRecord>>>,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    while reader.read_line(&mut line).await? > 0 {
        let response = match serde_json::from_str::<IpcRequest>(&line) {
            Ok(request) => {
                debug!(?request, "IPC request");
                handle_request(request, &airlock, &hub, &outcomes).await
            }
            Err(e) => IpcResponse::Error {
                message: format!("Invalid request: {}", e),
            },
        };

        let mut payload = serde_json::to_string(&response)?;
        payload.push('\n');
        writer.write_all(payload.as_bytes()).await?;
        line.clear();
    }
    Ok(())
}

async fn handle_request(
    request: IpcRequest,
    airlock: &Arc<Airlock>,
    hub: &Arc<GuardianHub>,
    outcomes: &Arc<RwLock<HashMap<Fingerprint, OutcomeRecord>>>,
) -> IpcResponse {
    match request {
        IpcRequest::Ping => IpcResponse::Pong {
            version: env!("CARGO_PKG_VERSION").to_string(),
        },

        IpcRequest::SubmitIntent {
            sender,
            destination,
            value,
            payload,
            chain_id,
        } => {
            let intent = match parse_intent(&sender, &destination, &value, &payload, chain_id) {
                Ok(intent) => intent,
                Err(message) => return IpcResponse::Error { message },
            };
            let fingerprint = match airlock.prepare(&intent) {
                Ok(fingerprint) => fingerprint,
                Err(e) => {
                    return IpcResponse::Error {
                        message: e.to_string(),
                    }
                }
            };

            outcomes
                .write()
                .await
                .insert(fingerprint, OutcomeRecord::Running);

            let airlock = Arc::clone(airlock);
            let outcomes = Arc::clone(outcomes);
            tokio::spawn(async move {
                let (_handle, token) = cancel_pair();
                let record = match airlock.process_prepared(intent, fingerprint, token).await {
                    Ok(outcome) => outcome_record(outcome),
                    Err(e) => OutcomeRecord::Done {
                        state: format!("error: {}", e),
                        envelope: None,
                    },
                };
                outcomes.write().await.insert(fingerprint, record);
            });

            IpcResponse::IntentAccepted {
                fingerprint: fingerprint.to_hex(),
            }
        }

        IpcRequest::SubmitCommit {
            fingerprint,
            slot,
            commitment,
        } => {
            let result = async {
                let fingerprint = parse_fingerprint(&fingerprint)?;
                let slot = GuardianSlot::new(slot, hub.guardian_count())
                    .map_err(|e| e.to_string())?;
                let commitment = parse_commitment(&commitment)?;
                hub.submit_commit(fingerprint, slot, commitment)
                    .await
                    .map_err(|e| e.to_string())
            }
            .await;
            match result {
                Ok(()) => IpcResponse::Ok,
                Err(message) => IpcResponse::Error { message },
            }
        }

        IpcRequest::SubmitReveal {
            fingerprint,
            slot,
            vote,
            proof,
        } => {
            let result = async {
                let fingerprint = parse_fingerprint(&fingerprint)?;
                let slot = GuardianSlot::new(slot, hub.guardian_count())
                    .map_err(|e| e.to_string())?;
                hub.submit_reveal(fingerprint, slot, vote, &proof)
                    .await
                    .map_err(|e| e.to_string())
            }
            .await;
            match result {
                Ok(snapshot) => IpcResponse::Tally { snapshot },
                Err(message) => IpcResponse::Error { message },
            }
        }

        IpcRequest::PollTally { fingerprint } => {
            let result = async {
                let fingerprint = parse_fingerprint(&fingerprint)?;
                hub.poll_tally(fingerprint).await.map_err(|e| e.to_string())
            }
            .await;
            match result {
                Ok(snapshot) => IpcResponse::Tally { snapshot },
                Err(message) => IpcResponse::Error { message },
            }
        }

        IpcRequest::GetOutcome { fingerprint } => {
            let fingerprint = match parse_fingerprint(&fingerprint) {
                Ok(fingerprint) => fingerprint,
                Err(message) => return IpcResponse::Error { message },
            };
            match outcomes.read().await.get(&fingerprint) {
                None => IpcResponse::Error {
                    message: "unknown intent".into(),
                },
                Some(OutcomeRecord::Running) => IpcResponse::Outcome {
                    state: "running".into(),
                    envelope: None,
                },
                Some(OutcomeRecord::Done { state, envelope }) => IpcResponse::Outcome {
                    state: state.clone(),
                    envelope: envelope.clone(),
                },
            }
        }
    }
}

fn outcome_record(outcome: AirlockOutcome) -> OutcomeRecord {
    match outcome {
        AirlockOutcome::Approved { envelope, .. } => OutcomeRecord::Done {
            state: "approved".into(),
            envelope: Some(envelope),
        },
        AirlockOutcome::Rejected { envelope, .. } => OutcomeRecord::Done {
            state: "rejected".into(),
            envelope: Some(envelope),
        },
        AirlockOutcome::Blocked { reason } => OutcomeRecord::Done {
            state: format!("blocked: {}", reason.as_str()),
            envelope: None,
        },
        AirlockOutcome::Expired => OutcomeRecord::Done {
            state: "expired".into(),
            envelope: None,
        },
        AirlockOutcome::Failed { reason } => OutcomeRecord::Done {
            state: format!("failed: {}", reason),
            envelope: None,
        },
        AirlockOutcome::Cancelled => OutcomeRecord::Done {
            state: "cancelled".into(),
            envelope: None,
        },
    }
}

fn parse_fingerprint(hex_str: &str) -> std::result::Result<Fingerprint, String> {
    Fingerprint::from_hex(hex_str).map_err(|e| format!("bad fingerprint: {}", e))
}

fn parse_commitment(hex_str: &str) -> std::result::Result<VoteCommitment, String> {
    let mut bytes = [0u8; 32];
    hex::decode_to_slice(hex_str, &mut bytes).map_err(|e| format!("bad commitment: {}", e))?;
    Ok(VoteCommitment(bytes))
}

fn parse_intent(
    sender: &str,
    destination: &str,
    value: &str,
    payload: &str,
    chain_id: u32,
) -> std::result::Result<TransactionIntent, String> {
    Ok(TransactionIntent {
        sender: hex::decode(sender).map_err(|e| format!("bad sender: {}", e))?,
        destination: hex::decode(destination).map_err(|e| format!("bad destination: {}", e))?,
        value: value.parse().map_err(|e| format!("bad value: {}", e))?,
        payload: hex::decode(payload).map_err(|e| format!("bad payload: {}", e))?,
        source_chain: ChainTag::new(chain_id),
        dest_chain: None,
    })
}
