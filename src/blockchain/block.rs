use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::hash::sha256_hex;
use super::{GENESIS_DESCRIPTION, GENESIS_PREVIOUS_HASH, GENESIS_PROOF};
use crate::error::LedgerError;

/// A single score event: points (may be negative) plus a label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScoreEntry {
    pub score: i64,
    pub description: String,
}

/// Points awarded per player, plus the player whose run mined the block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AwardEntry {
    pub miner: String,
    /// Ordered by player name.
    pub scores: BTreeMap<String, i64>,
}

/// What a block records. Opaque to the chain itself; only hashed and aggregated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Score(ScoreEntry),
    Awards(AwardEntry),
    /// Anything else found in persisted data. Kept verbatim so hashes still verify.
    Opaque(serde_json::Value),
}

impl Payload {
    pub fn score(score: i64, description: impl Into<String>) -> Self {
        Payload::Score(ScoreEntry {
            score,
            description: description.into(),
        })
    }

    pub fn award(player: impl Into<String>, points: i64) -> Self {
        let player = player.into();
        Payload::Awards(AwardEntry {
            miner: player.clone(),
            scores: BTreeMap::from([(player, points)]),
        })
    }

    /// The payload's `score` field, if it has a usable one.
    ///
    /// Award payloads carry no `score` field and contribute 0; their points
    /// are only counted per player. Opaque payloads are coerced the lenient
    /// way: an integer, a float (truncated) or a numeric string under `score`
    /// counts; anything else does not.
    pub fn points(&self) -> Option<i64> {
        match self {
            Payload::Score(entry) => Some(entry.score),
            Payload::Awards(_) => Some(0),
            Payload::Opaque(value) => coerce_score(value.get("score")?),
        }
    }

    pub fn awards(&self) -> Option<&BTreeMap<String, i64>> {
        match self {
            Payload::Awards(entry) => Some(&entry.scores),
            _ => None,
        }
    }

    pub fn miner(&self) -> Option<&str> {
        match self {
            Payload::Awards(entry) => Some(&entry.miner),
            _ => None,
        }
    }

    /// Canonical JSON used in the hash preimage.
    fn canonical_json(&self) -> String {
        // Struct fields serialize in declaration order and maps are BTreeMaps,
        // so this encoding is stable across runs and across save/reload.
        serde_json::to_string(self).expect("payload serializes to JSON")
    }
}

fn coerce_score(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        serde_json::Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i64)
            })
        }
        _ => None,
    }
}

/// A single block in the score chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub index: u64,
    pub timestamp: i64, // Unix milliseconds (UTC)
    pub payload: Payload,
    pub previous_hash: String,
    pub proof: u64,   // nonce or proof, depending on the PoW policy
    pub hash: String, // empty until sealed
}

impl Block {
    /// Create the genesis block (first block in the chain).
    pub fn genesis() -> Self {
        Self::genesis_at(Utc::now().timestamp_millis())
    }

    /// Genesis with a fixed timestamp, so its hash is reproducible.
    pub fn genesis_at(timestamp: i64) -> Self {
        let mut block = Self {
            index: 0,
            timestamp,
            payload: Payload::score(0, GENESIS_DESCRIPTION),
            previous_hash: String::from(GENESIS_PREVIOUS_HASH),
            proof: GENESIS_PROOF,
            hash: String::new(),
        };
        block.hash = block.compute_hash();
        block
    }

    /// Create a new block (not mined yet). Run it through `ProofOfWork` to seal it.
    pub fn new(index: u64, previous_hash: String, payload: Payload) -> Self {
        Self::new_with_timestamp(index, previous_hash, payload, Utc::now().timestamp_millis())
    }

    pub fn new_with_timestamp(
        index: u64,
        previous_hash: String,
        payload: Payload,
        timestamp: i64,
    ) -> Self {
        Self {
            index,
            timestamp,
            payload,
            previous_hash,
            proof: 0,
            hash: String::new(),
        }
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }

    pub fn is_sealed(&self) -> bool {
        !self.hash.is_empty()
    }

    /// Compute the SHA-256 hash of this block using its fields
    /// (excluding the `hash` field itself).
    pub fn compute_hash(&self) -> String {
        self.hash_with_proof(self.proof)
    }

    /// Hash this block as if `proof` were stored in it. Used by the nonce
    /// search so it does not have to clone the block per attempt.
    pub fn hash_with_proof(&self, proof: u64) -> String {
        let preimage = format!(
            "{}:{}:{}:{}:{}",
            self.index,
            self.timestamp,
            self.previous_hash,
            proof,
            self.payload.canonical_json()
        );
        sha256_hex(preimage.as_bytes())
    }

    /// Recomputing the hash reproduces the stored one.
    pub fn has_valid_hash(&self) -> bool {
        self.is_sealed() && self.hash == self.compute_hash()
    }

    /// Score contributed by this block.
    pub fn score(&self) -> Result<i64, LedgerError> {
        self.payload
            .points()
            .ok_or(LedgerError::MalformedPayload { index: self.index })
    }
}
