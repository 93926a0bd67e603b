use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::blockchain::{Block, PowPolicy};
use crate::ledger::{Ledger, PendingScore, ScoreEvent};

/// Shared application state: the one ledger this process serves.
pub struct AppState {
    pub ledger: Arc<Ledger>,
}

impl AppState {
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self { ledger }
    }
}

/* ---------- Chain API Models ---------- */

#[derive(Serialize, Deserialize)]
pub struct ChainResponse {
    pub length: usize,
    pub difficulty: u32,
    pub policy: PowPolicy,
    pub chain: Vec<Block>,
}

#[derive(Serialize, Deserialize)]
pub struct ValidateResponse {
    pub valid: bool,
    pub length: usize,
    pub difficulty: u32,
}

/* ---------- Score API Models ---------- */

#[derive(Deserialize)]
pub struct AddScoreRequest {
    pub delta: i64,
    #[serde(default)]
    pub description: String,
}

#[derive(Deserialize)]
pub struct EventRequest {
    pub event: ScoreEvent,
}

#[derive(Serialize, Deserialize)]
pub struct QueuedResponse {
    pub pending: usize,
}

#[derive(Serialize, Deserialize)]
pub struct PendingResponse {
    pub size: usize,
    pub scores: Vec<PendingScore>,
}

#[derive(Serialize, Deserialize)]
pub struct TotalResponse {
    pub total: i64,
}

/* ---------- Mining API Models ---------- */

#[derive(Deserialize)]
pub struct PlayerMineRequest {
    pub points: i64,
}

#[derive(Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
