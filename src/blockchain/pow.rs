//! Proof-of-work search for score blocks.
//!
//! Two policies are supported. `BlockHash` looks for a nonce that makes the
//! block's own hash meet the difficulty. `ProofPair` looks for a proof `p`
//! such that `sha256("{last_proof}{p}")` meets it, and hashes the block
//! afterwards.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use log::debug;
use serde::{Deserialize, Serialize};

use super::Block;
use super::hash::{meets_difficulty, proof_pair_digest};
use crate::error::LedgerError;

/// Which predicate a block's proof has to satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PowPolicy {
    #[default]
    BlockHash,
    ProofPair,
}

impl PowPolicy {
    /// Check `candidate` for this policy. Returns the accepted digest.
    fn accepts(
        &self,
        block: &Block,
        last_proof: u64,
        candidate: u64,
        difficulty: u32,
    ) -> Option<String> {
        match self {
            PowPolicy::BlockHash => {
                let digest = block.hash_with_proof(candidate);
                meets_difficulty(&digest, difficulty).then_some(digest)
            }
            PowPolicy::ProofPair => proof_pair_digest(last_proof, candidate, difficulty),
        }
    }

    /// Does `block`, sealed on top of `previous`, carry a valid proof?
    /// Hash integrity is part of the check for both policies.
    pub fn verify(&self, previous: &Block, block: &Block, difficulty: u32) -> bool {
        if !block.has_valid_hash() {
            return false;
        }
        match self {
            PowPolicy::BlockHash => meets_difficulty(&block.hash, difficulty),
            PowPolicy::ProofPair => {
                proof_pair_digest(previous.proof, block.proof, difficulty).is_some()
            }
        }
    }
}

impl fmt::Display for PowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowPolicy::BlockHash => f.write_str("block-hash"),
            PowPolicy::ProofPair => f.write_str("proof-pair"),
        }
    }
}

impl FromStr for PowPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "block-hash" | "nonce" => Ok(PowPolicy::BlockHash),
            "proof-pair" | "proof" => Ok(PowPolicy::ProofPair),
            other => Err(format!("unknown proof-of-work policy '{other}'")),
        }
    }
}

/// Snapshot handed to a progress observer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MiningProgress {
    pub attempts: u64,
    pub elapsed: Duration,
    /// Hashes per second since the search started.
    pub hash_rate: f64,
}

impl MiningProgress {
    fn new(attempts: u64, elapsed: Duration) -> Self {
        let secs = elapsed.as_secs_f64();
        let hash_rate = if secs > 0.0 { attempts as f64 / secs } else { 0.0 };
        Self {
            attempts,
            elapsed,
            hash_rate,
        }
    }
}

/// Optional subscriber for progress notifications (UI, telemetry).
pub type ProgressObserver = Arc<dyn Fn(MiningProgress) + Send + Sync>;

/// Shared flag that stops in-flight searches.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Result of a successful search.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    /// Accepted nonce/proof.
    pub proof: u64,
    /// Digest that satisfied the predicate.
    pub digest: String,
    /// Attempts made by all workers together.
    pub attempts: u64,
    pub elapsed: Duration,
}

/// Search parameters: difficulty, policy and how to run the search.
#[derive(Clone)]
pub struct ProofOfWork {
    pub difficulty: u32,
    pub policy: PowPolicy,
    pub workers: usize,
    pub progress_interval: u64,
    observer: Option<ProgressObserver>,
}

impl fmt::Debug for ProofOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProofOfWork")
            .field("difficulty", &self.difficulty)
            .field("policy", &self.policy)
            .field("workers", &self.workers)
            .field("progress_interval", &self.progress_interval)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl ProofOfWork {
    pub fn new(difficulty: u32, policy: PowPolicy) -> Self {
        Self {
            difficulty,
            policy,
            workers: 1,
            progress_interval: super::DEFAULT_PROGRESS_INTERVAL,
            observer: None,
        }
    }

    pub fn with_policy(mut self, policy: PowPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = interval.max(1);
        self
    }

    pub fn with_observer(mut self, observer: ProgressObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Find a proof for `block` (whose predecessor carries `last_proof`).
    ///
    /// Each worker searches the strided sequence `worker, worker + n, ...`,
    /// so together they cover every non-negative integer. The first worker
    /// to succeed reports through the channel and the rest stop. There is no
    /// attempt cap: only `cancel` ends a search that never succeeds.
    pub fn solve(
        &self,
        block: &Block,
        last_proof: u64,
        cancel: &CancelToken,
    ) -> Result<Solution, LedgerError> {
        let started = Instant::now();
        let workers = self.workers.max(1) as u64;
        let attempts = AtomicU64::new(0);
        let found = AtomicBool::new(false);
        let (tx, rx) = mpsc::channel::<(u64, String)>();

        let winner = thread::scope(|scope| {
            for worker in 0..workers {
                let tx = tx.clone();
                let (attempts, found) = (&attempts, &found);
                scope.spawn(move || {
                    self.search_stride(
                        block, last_proof, worker, workers, cancel, found, attempts, started, tx,
                    )
                });
            }
            drop(tx);
            // Senders all drop without a result only when the search was cancelled.
            let winner = rx.recv().ok();
            found.store(true, Ordering::Relaxed);
            winner
        });

        let elapsed = started.elapsed();
        let attempts = attempts.load(Ordering::Relaxed);
        match winner {
            Some((proof, digest)) => {
                debug!(
                    "POW - block #{} solved: proof={} attempts={} elapsed={:.3}s",
                    block.index,
                    proof,
                    attempts,
                    elapsed.as_secs_f64()
                );
                Ok(Solution {
                    proof,
                    digest,
                    attempts,
                    elapsed,
                })
            }
            None => Err(LedgerError::MiningCancelled),
        }
    }

    /// Solve and seal `block` in place.
    pub fn seal(
        &self,
        block: &mut Block,
        last_proof: u64,
        cancel: &CancelToken,
    ) -> Result<Solution, LedgerError> {
        let solution = self.solve(block, last_proof, cancel)?;
        block.proof = solution.proof;
        block.hash = match self.policy {
            PowPolicy::BlockHash => solution.digest.clone(),
            PowPolicy::ProofPair => block.compute_hash(),
        };
        Ok(solution)
    }

    #[allow(clippy::too_many_arguments)]
    fn search_stride(
        &self,
        block: &Block,
        last_proof: u64,
        start: u64,
        step: u64,
        cancel: &CancelToken,
        found: &AtomicBool,
        attempts: &AtomicU64,
        started: Instant,
        tx: mpsc::Sender<(u64, String)>,
    ) {
        let interval = self.progress_interval.max(1);
        let mut candidate = start;
        let mut local = 0u64;

        loop {
            if found.load(Ordering::Relaxed) || cancel.is_cancelled() {
                break;
            }
            let accepted = self
                .policy
                .accepts(block, last_proof, candidate, self.difficulty);
            local += 1;
            if local % interval == 0 {
                let total = attempts.fetch_add(interval, Ordering::Relaxed) + interval;
                if let Some(observer) = &self.observer {
                    observer(MiningProgress::new(total, started.elapsed()));
                }
                thread::yield_now();
            }
            if let Some(digest) = accepted {
                found.store(true, Ordering::Relaxed);
                let _ = tx.send((candidate, digest));
                break;
            }
            candidate = match candidate.checked_add(step) {
                Some(next) => next,
                None => break,
            };
        }

        attempts.fetch_add(local % interval, Ordering::Relaxed);
    }
}
