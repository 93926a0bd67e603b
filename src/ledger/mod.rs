//! The score ledger: pending scores, mining, persistence and aggregation.

pub mod clock;
pub mod events;
pub mod store;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::DateTime;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::blockchain::{
    Block, CancelToken, Chain, Payload, PowPolicy, ProgressObserver, ProofOfWork, Solution,
};
use crate::config::LedgerConfig;
use crate::error::LedgerError;

pub use clock::{Clock, FixedClock, SystemClock};
pub use events::ScoreEvent;
pub use store::{FileStore, KeyValueStore, MemoryStore};

/// A player run that finishes its search this many seconds early earns one
/// bonus point per second saved.
pub const SPEED_BONUS_SECS: f64 = 10.0;

/// Suffix of the slot that keeps the last stored chain `load` refused.
pub const REJECTED_SLOT_SUFFIX: &str = ".rejected";

/// A score event waiting to be mined into a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingScore {
    pub score: i64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MinedBlock {
    pub index: u64,
    pub hash: String,
    pub proof: u64,
    pub attempts: u64,
    pub elapsed_ms: u64,
}

impl MinedBlock {
    fn new(block: &Block, solution: &Solution) -> Self {
        Self {
            index: block.index,
            hash: block.hash.clone(),
            proof: block.proof,
            attempts: solution.attempts,
            elapsed_ms: u64::try_from(solution.elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Outcome of one `mine_pending_scores` pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MiningReport {
    pub run_id: String,
    pub blocks: Vec<MinedBlock>,
    /// Entries queued while this pass was running.
    pub pending: usize,
}

impl MiningReport {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Points credited to a player by `mine_player_score`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerAward {
    pub player: String,
    pub index: u64,
    pub hash: String,
    pub base_points: i64,
    pub awarded: i64,
    pub mining_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerSummary {
    pub length: usize,
    pub pending: usize,
    pub difficulty: u32,
    pub policy: PowPolicy,
    pub total_score: i64,
    pub valid: bool,
    pub mining: bool,
}

struct LedgerState {
    chain: Chain,
    pending: Vec<PendingScore>,
}

/// Clears the mining flag when a pass ends, however it ends.
struct MiningGuard<'a>(&'a AtomicBool);

impl<'a> MiningGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, LedgerError> {
        if flag.swap(true, Ordering::AcqRel) {
            return Err(LedgerError::MiningInProgress);
        }
        Ok(Self(flag))
    }
}

impl Drop for MiningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// One local score chain plus the scores waiting to be mined into it.
///
/// All methods take `&self`; chain and pending queue sit behind one mutex,
/// which is never held during a proof-of-work search.
pub struct Ledger {
    pow: ProofOfWork,
    slot: String,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    state: Mutex<LedgerState>,
    mining: AtomicBool,
    cancel: CancelToken,
}

impl Ledger {
    /// Open the ledger, restoring the chain from `store` or seeding genesis.
    pub fn open(config: &LedgerConfig, store: Arc<dyn KeyValueStore>) -> Self {
        Self::open_with_clock(config, store, Arc::new(SystemClock))
    }

    pub fn open_with_clock(
        config: &LedgerConfig,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let pow = ProofOfWork::new(config.difficulty, config.policy)
            .with_workers(config.workers)
            .with_progress_interval(config.progress_interval);
        let genesis = Chain::new(
            Block::genesis_at(clock.now_millis()),
            config.difficulty,
            config.policy,
        );
        let ledger = Self {
            pow,
            slot: config.slot.clone(),
            store,
            clock,
            state: Mutex::new(LedgerState {
                chain: genesis,
                pending: Vec::new(),
            }),
            mining: AtomicBool::new(false),
            cancel: CancelToken::new(),
        };
        ledger.load();
        ledger
    }

    /// Subscribe to proof-of-work progress (attempts, elapsed, hash rate).
    pub fn with_progress_observer(mut self, observer: ProgressObserver) -> Self {
        self.pow = self.pow.with_observer(observer);
        self
    }

    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fresh_chain(&self) -> Chain {
        Chain::new(
            Block::genesis_at(self.clock.now_millis()),
            self.pow.difficulty,
            self.pow.policy,
        )
    }

    /// Queue a score event. Never fails; `delta` may be negative.
    /// Returns the number of pending entries.
    pub fn add_score(&self, delta: i64, description: impl Into<String>) -> usize {
        let mut description = description.into();
        if description.trim().is_empty() {
            let now = self.clock.now_millis();
            let when = DateTime::from_timestamp_millis(now)
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| now.to_string());
            description = format!("Score added at {when}");
        }

        let mut state = self.state();
        state.pending.push(PendingScore {
            score: delta,
            description,
        });
        debug!(
            "LEDGER - queued score {delta:+}; {} pending",
            state.pending.len()
        );
        state.pending.len()
    }

    /// Queue the fixed score for a game-flow event.
    pub fn record(&self, event: ScoreEvent) -> usize {
        self.add_score(event.points(), event.description())
    }

    /// Mine every entry pending at call time, one block each, in queue order.
    ///
    /// Each block chains off the block mined before it. Entries queued while
    /// the pass runs wait for the next pass. Mined entries leave the queue
    /// and the chain is persisted even when a later entry fails.
    pub fn mine_pending_scores(&self) -> Result<MiningReport, LedgerError> {
        let _guard = MiningGuard::acquire(&self.mining)?;
        let run_id = Uuid::new_v4().to_string();

        let (batch, mut tip) = {
            let state = self.state();
            (state.pending.clone(), state.chain.latest()?.clone())
        };
        if batch.is_empty() {
            info!("MINER - run {run_id}: no scores to mine");
            return Ok(MiningReport {
                run_id,
                blocks: Vec::new(),
                pending: 0,
            });
        }

        info!(
            "MINER - run {run_id}: mining {} pending score(s) on #{} (difficulty={}, policy={})",
            batch.len(),
            tip.index,
            self.pow.difficulty,
            self.pow.policy
        );

        let mut mined = Vec::with_capacity(batch.len());
        let mut failure = None;
        for entry in batch {
            let payload = Payload::score(entry.score, entry.description);
            let (block, solution) = match self.mine_on(&tip, payload) {
                Ok(sealed) => sealed,
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            };
            let mut state = self.state();
            match state.chain.append(block) {
                Ok(appended) => {
                    mined.push(MinedBlock::new(appended, &solution));
                    tip = appended.clone();
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        let pending = {
            let mut state = self.state();
            state.pending.drain(..mined.len());
            if !mined.is_empty() {
                if let Err(e) = self.persist(&state.chain) {
                    warn!("MINER - run {run_id}: could not persist chain: {e}");
                }
            }
            state.pending.len()
        };

        if let Some(e) = failure {
            warn!(
                "MINER - run {run_id}: stopped after {} block(s): {e}",
                mined.len()
            );
            return Err(e);
        }

        info!(
            "MINER - run {run_id}: sealed {} block(s), tip #{} ({})",
            mined.len(),
            tip.index,
            tip.hash
        );
        Ok(MiningReport {
            run_id,
            blocks: mined,
            pending,
        })
    }

    /// Mine a block awarding `points` plus a speed bonus to `player`.
    ///
    /// The player's run is a proof-pair search from the tip's proof; the
    /// faster it completes, the larger the bonus. The award block is then
    /// sealed under the ledger's own policy.
    pub fn mine_player_score(
        &self,
        player: &str,
        points: i64,
    ) -> Result<PlayerAward, LedgerError> {
        let _guard = MiningGuard::acquire(&self.mining)?;
        let tip = self.state().chain.latest()?.clone();

        let mut block = Block::new_with_timestamp(
            tip.index + 1,
            tip.hash.clone(),
            Payload::award(player, points),
            self.clock.now_millis(),
        );
        let challenge = self
            .pow
            .clone()
            .with_policy(PowPolicy::ProofPair)
            .solve(&block, tip.proof, &self.cancel)?;

        let mining_secs = challenge.elapsed.as_secs_f64();
        let bonus = (SPEED_BONUS_SECS - mining_secs).max(0.0).floor() as i64;
        let awarded = points.saturating_add(bonus);
        block.payload = Payload::award(player, awarded);

        match self.pow.policy {
            PowPolicy::ProofPair => {
                block.proof = challenge.proof;
                block.hash = block.compute_hash();
            }
            PowPolicy::BlockHash => {
                self.pow.seal(&mut block, tip.proof, &self.cancel)?;
            }
        }

        let mut state = self.state();
        let appended = state.chain.append(block)?;
        let award = PlayerAward {
            player: player.to_string(),
            index: appended.index,
            hash: appended.hash.clone(),
            base_points: points,
            awarded,
            mining_secs,
        };
        if let Err(e) = self.persist(&state.chain) {
            warn!("MINER - could not persist chain: {e}");
        }
        info!(
            "MINER - block #{} awards {} to {} ({:.2}s)",
            award.index, award.awarded, award.player, award.mining_secs
        );
        Ok(award)
    }

    fn mine_on(&self, tip: &Block, payload: Payload) -> Result<(Block, Solution), LedgerError> {
        let mut block = Block::new_with_timestamp(
            tip.index + 1,
            tip.hash.clone(),
            payload,
            self.clock.now_millis(),
        );
        let solution = self.pow.seal(&mut block, tip.proof, &self.cancel)?;
        Ok((block, solution))
    }

    /// Sum of every block's score, genesis included. Blocks without a usable
    /// score count as zero.
    pub fn total_score(&self) -> i64 {
        let state = self.state();
        state
            .chain
            .blocks()
            .iter()
            .fold(0i64, |total, block| match block.score() {
                Ok(points) => total.saturating_add(points),
                Err(e) => {
                    debug!("LEDGER - {e}; counting it as zero");
                    total
                }
            })
    }

    /// Per-player totals from award blocks.
    pub fn player_scores(&self) -> BTreeMap<String, i64> {
        let state = self.state();
        let mut scores = BTreeMap::new();
        for awards in state.chain.blocks().iter().filter_map(|b| b.payload.awards()) {
            for (player, points) in awards {
                let total: &mut i64 = scores.entry(player.clone()).or_default();
                *total = total.saturating_add(*points);
            }
        }
        scores
    }

    /// Write the whole chain to the store slot.
    pub fn save(&self) -> Result<(), LedgerError> {
        let state = self.state();
        self.persist(&state.chain)
    }

    fn persist(&self, chain: &Chain) -> Result<(), LedgerError> {
        let json = serde_json::to_string(chain.blocks())?;
        self.store.put(&self.slot, &json)?;
        debug!(
            "LEDGER - saved {} block(s) to slot '{}'",
            chain.len(),
            self.slot
        );
        Ok(())
    }

    /// Replace the in-memory chain with the stored one. Missing or corrupt
    /// data reseeds a fresh genesis; this never fails. Returns the chain length.
    pub fn load(&self) -> usize {
        let chain = match self.restore() {
            Ok(Some(chain)) => {
                info!(
                    "LEDGER - restored {} block(s) from slot '{}'",
                    chain.len(),
                    self.slot
                );
                chain
            }
            Ok(None) => {
                info!("LEDGER - slot '{}' is empty; seeding genesis", self.slot);
                self.fresh_chain()
            }
            Err(e) => {
                warn!(
                    "LEDGER - {e}; discarding stored chain in slot '{}' and reseeding genesis",
                    self.slot
                );
                self.keep_rejected();
                self.fresh_chain()
            }
        };

        let mut state = self.state();
        state.chain = chain;
        state.chain.len()
    }

    /// Copy the refused blob aside before the next save overwrites it.
    fn keep_rejected(&self) {
        let backup = format!("{}{REJECTED_SLOT_SUFFIX}", self.slot);
        let raw = match self.store.get(&self.slot) {
            Ok(Some(raw)) => raw,
            Ok(None) => return,
            Err(e) => {
                warn!("LEDGER - could not read slot '{}' to keep it: {e}", self.slot);
                return;
            }
        };
        match self.store.put(&backup, &raw) {
            Ok(()) => warn!("LEDGER - previous chain kept in slot '{backup}'"),
            Err(e) => warn!("LEDGER - could not keep previous chain in '{backup}': {e}"),
        }
    }

    fn restore(&self) -> Result<Option<Chain>, LedgerError> {
        let Some(raw) = self.store.get(&self.slot)? else {
            return Ok(None);
        };
        let blocks: Vec<Block> = serde_json::from_str(&raw)
            .map_err(|e| LedgerError::PersistenceCorrupt(e.to_string()))?;
        let chain = Chain::from_blocks(blocks, self.pow.difficulty, self.pow.policy)
            .map_err(|e| LedgerError::PersistenceCorrupt(e.to_string()))?;
        if let Some(violation) = chain.first_violation() {
            return Err(LedgerError::PersistenceCorrupt(violation.to_string()));
        }
        Ok(Some(chain))
    }

    pub fn is_valid(&self) -> bool {
        self.state().chain.is_valid()
    }

    /// Snapshot of the chain.
    pub fn blocks(&self) -> Vec<Block> {
        self.state().chain.blocks().to_vec()
    }

    pub fn latest(&self) -> Result<Block, LedgerError> {
        self.state().chain.latest().cloned()
    }

    pub fn pending(&self) -> Vec<PendingScore> {
        self.state().pending.clone()
    }

    pub fn len(&self) -> usize {
        self.state().chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().chain.is_empty()
    }

    pub fn difficulty(&self) -> u32 {
        self.pow.difficulty
    }

    pub fn policy(&self) -> PowPolicy {
        self.pow.policy
    }

    pub fn is_mining(&self) -> bool {
        self.mining.load(Ordering::Acquire)
    }

    pub fn summary(&self) -> LedgerSummary {
        let total_score = self.total_score();
        let state = self.state();
        LedgerSummary {
            length: state.chain.len(),
            pending: state.pending.len(),
            difficulty: self.pow.difficulty,
            policy: self.pow.policy,
            total_score,
            valid: state.chain.is_valid(),
            mining: self.is_mining(),
        }
    }

    /// Stop any in-flight search. Later mining calls fail with `MiningCancelled`.
    pub fn shutdown(&self) {
        info!("LEDGER - shutting down; cancelling in-flight mining");
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::MiningProgress;
    use std::sync::{OnceLock, Weak};
    use std::thread;

    fn config(difficulty: u32, policy: PowPolicy) -> LedgerConfig {
        LedgerConfig {
            difficulty,
            policy,
            ..LedgerConfig::default()
        }
    }

    fn ledger_on(store: Arc<dyn KeyValueStore>, difficulty: u32, policy: PowPolicy) -> Ledger {
        let clock = Arc::new(FixedClock(1_700_000_000_000));
        Ledger::open_with_clock(&config(difficulty, policy), store, clock)
    }

    fn memory_ledger(difficulty: u32) -> Ledger {
        ledger_on(Arc::new(MemoryStore::new()), difficulty, PowPolicy::BlockHash)
    }

    #[test]
    fn genesis_only_chain_scores_zero() {
        let ledger = memory_ledger(1);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.total_score(), 0);
        assert!(ledger.is_valid());
    }

    #[test]
    fn start_and_win_scenario() {
        for policy in [PowPolicy::BlockHash, PowPolicy::ProofPair] {
            let ledger = ledger_on(Arc::new(MemoryStore::new()), 1, policy);
            ledger.add_score(5, "start");
            ledger.mine_pending_scores().unwrap();
            ledger.add_score(10, "win");
            ledger.mine_pending_scores().unwrap();

            assert_eq!(ledger.len(), 3);
            assert_eq!(ledger.total_score(), 15);
            assert!(ledger.is_valid());
            assert!(ledger.pending().is_empty());
        }
    }

    #[test]
    fn batch_is_mined_in_queue_order_with_sequential_links() {
        let ledger = memory_ledger(1);
        ledger.record(ScoreEvent::GameStarted);
        ledger.record(ScoreEvent::Verified);
        ledger.record(ScoreEvent::Expired);
        let report = ledger.mine_pending_scores().unwrap();

        assert_eq!(report.blocks.len(), 3);
        let blocks = ledger.blocks();
        let scores: Vec<i64> = blocks.iter().map(|b| b.score().unwrap()).collect();
        assert_eq!(scores, vec![0, 5, 10, -2]);
        for pair in blocks.windows(2) {
            assert_eq!(pair[1].previous_hash, pair[0].hash);
            assert_eq!(pair[1].index, pair[0].index + 1);
        }
        assert_eq!(ledger.total_score(), 13);
        assert!(ledger.is_valid());
    }

    #[test]
    fn mined_blocks_meet_difficulty() {
        let ledger = memory_ledger(3);
        ledger.add_score(1, "one");
        let report = ledger.mine_pending_scores().unwrap();
        assert!(report.blocks[0].hash.starts_with("000"));
        assert!(ledger.latest().unwrap().hash.starts_with("000"));
    }

    #[test]
    fn mining_empty_queue_is_a_no_op() {
        let ledger = memory_ledger(1);
        ledger.add_score(3, "x");
        ledger.mine_pending_scores().unwrap();
        let (len, total) = (ledger.len(), ledger.total_score());

        let report = ledger.mine_pending_scores().unwrap();
        assert!(report.is_empty());
        assert_eq!(ledger.len(), len);
        assert_eq!(ledger.total_score(), total);
    }

    #[test]
    fn blank_description_gets_timestamped_default() {
        let ledger = memory_ledger(1);
        ledger.add_score(-2, "  ");
        let pending = ledger.pending();
        assert_eq!(pending[0].score, -2);
        assert!(pending[0].description.starts_with("Score added at 2023-11-14"));
    }

    #[test]
    fn save_then_load_reproduces_chain() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let ledger = ledger_on(Arc::clone(&store), 1, PowPolicy::ProofPair);
        ledger.add_score(5, "start");
        ledger.add_score(-2, "expired");
        ledger.mine_pending_scores().unwrap();
        ledger.save().unwrap();
        let before = ledger.blocks();

        let reopened = ledger_on(store, 1, PowPolicy::ProofPair);
        assert_eq!(reopened.blocks(), before);
        assert_eq!(reopened.total_score(), 3);
        assert!(reopened.is_valid());
    }

    #[test]
    fn corrupt_blob_reseeds_genesis() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let ledger = ledger_on(Arc::clone(&store), 1, PowPolicy::BlockHash);
        ledger.add_score(5, "start");
        ledger.mine_pending_scores().unwrap();
        assert_eq!(ledger.len(), 2);

        store.put("scoreChain", "{ this is not a chain").unwrap();
        assert_eq!(ledger.load(), 1);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.total_score(), 0);
    }

    #[test]
    fn tampered_or_empty_blob_reseeds_genesis() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let ledger = ledger_on(Arc::clone(&store), 1, PowPolicy::BlockHash);
        ledger.add_score(5, "start");
        ledger.mine_pending_scores().unwrap();

        let mut blocks = ledger.blocks();
        blocks[1].payload = Payload::score(500, "start");
        store
            .put("scoreChain", &serde_json::to_string(&blocks).unwrap())
            .unwrap();
        assert_eq!(ledger.load(), 1);

        store.put("scoreChain", "[]").unwrap();
        assert_eq!(ledger.load(), 1);
    }

    #[test]
    fn malformed_historical_scores_count_as_zero() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let pow = ProofOfWork::new(1, PowPolicy::BlockHash);
        let mut chain = Chain::new(Block::genesis_at(0), 1, PowPolicy::BlockHash);
        let payloads = [
            serde_json::json!({ "score": "abc", "description": "garbled" }),
            serde_json::json!({ "score": "7" }),
            serde_json::json!({ "description": "no score at all", "extra": true }),
        ];
        for payload in payloads {
            let tip = chain.latest().unwrap().clone();
            let mut block = Block::new_with_timestamp(
                tip.index + 1,
                tip.hash.clone(),
                Payload::Opaque(payload),
                5,
            );
            pow.seal(&mut block, tip.proof, &CancelToken::new()).unwrap();
            chain.append(block).unwrap();
        }
        store
            .put("scoreChain", &serde_json::to_string(chain.blocks()).unwrap())
            .unwrap();

        let ledger = ledger_on(store, 1, PowPolicy::BlockHash);
        assert_eq!(ledger.len(), 4);
        assert!(ledger.is_valid());
        assert_eq!(ledger.total_score(), 7);
    }

    #[test]
    fn player_awards_include_speed_bonus() {
        for policy in [PowPolicy::BlockHash, PowPolicy::ProofPair] {
            let ledger = ledger_on(Arc::new(MemoryStore::new()), 1, policy);
            let alice = ledger.mine_player_score("alice", 10).unwrap();
            let bob = ledger.mine_player_score("bob", 3).unwrap();
            ledger.mine_player_score("alice", 1).unwrap();

            assert!((10..=20).contains(&alice.awarded));
            assert!((3..=13).contains(&bob.awarded));
            let scores = ledger.player_scores();
            assert_eq!(scores.len(), 2);
            assert_eq!(scores["bob"], bob.awarded);
            assert_eq!(ledger.blocks()[2].payload.miner(), Some("bob"));
            assert!(ledger.is_valid(), "{policy}");
        }
    }

    #[test]
    fn award_blocks_add_nothing_to_total_score() {
        let ledger = memory_ledger(1);
        let award = ledger.mine_player_score("alice", 7).unwrap();
        assert!(award.awarded >= 7);
        assert_eq!(ledger.total_score(), 0);

        ledger.add_score(5, "start");
        ledger.mine_pending_scores().unwrap();
        assert_eq!(ledger.total_score(), 5);
        assert_eq!(ledger.player_scores()["alice"], award.awarded);
    }

    #[test]
    fn multiple_workers_build_a_valid_chain() {
        let cfg = LedgerConfig {
            difficulty: 2,
            workers: 3,
            ..LedgerConfig::default()
        };
        let ledger = Ledger::open(&cfg, Arc::new(MemoryStore::new()));
        for i in 0..4 {
            ledger.add_score(i, format!("score {i}"));
        }
        ledger.mine_pending_scores().unwrap();
        assert_eq!(ledger.len(), 5);
        assert_eq!(ledger.total_score(), 6);
        assert!(ledger.is_valid());
    }

    #[test]
    fn mining_is_single_flight_and_defers_new_scores() {
        let ledger = Arc::new(memory_ledger(8));
        ledger.add_score(5, "start");

        let miner = {
            let ledger = Arc::clone(&ledger);
            thread::spawn(move || ledger.mine_pending_scores())
        };
        while !ledger.is_mining() {
            thread::yield_now();
        }

        assert!(matches!(
            ledger.mine_pending_scores(),
            Err(LedgerError::MiningInProgress)
        ));
        assert_eq!(ledger.add_score(10, "win"), 2);

        ledger.shutdown();
        let result = miner.join().unwrap();
        assert!(matches!(result, Err(LedgerError::MiningCancelled)));
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.pending().len(), 2);
        assert!(!ledger.is_mining());
    }

    #[test]
    fn cancel_mid_pass_keeps_and_persists_mined_prefix() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let cfg = LedgerConfig {
            difficulty: 4,
            progress_interval: 1,
            ..LedgerConfig::default()
        };
        let handle: Arc<OnceLock<Weak<Ledger>>> = Arc::new(OnceLock::new());
        let observer_handle = Arc::clone(&handle);
        let clock = Arc::new(FixedClock(1_700_000_000_000));
        let observer: ProgressObserver = Arc::new(move |_: MiningProgress| {
            // Cancel as soon as the first block has been appended.
            if let Some(ledger) = observer_handle.get().and_then(Weak::upgrade) {
                if ledger.len() >= 2 {
                    ledger.shutdown();
                }
            }
        });
        let ledger = Arc::new(
            Ledger::open_with_clock(&cfg, Arc::clone(&store), clock).with_progress_observer(observer),
        );
        handle.set(Arc::downgrade(&ledger)).unwrap();

        ledger.add_score(5, "start");
        ledger.add_score(10, "win");
        ledger.add_score(-2, "expired");
        let result = ledger.mine_pending_scores();

        assert!(matches!(result, Err(LedgerError::MiningCancelled)));
        assert_eq!(ledger.len(), 2);
        let pending = ledger.pending();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].description, "win");

        let reopened = ledger_on(Arc::clone(&store), 4, PowPolicy::BlockHash);
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.total_score(), 5);
        assert!(store.get("scoreChain.rejected").unwrap().is_none());
    }

    #[test]
    fn chain_refused_at_new_difficulty_is_kept_aside() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let ledger = ledger_on(Arc::clone(&store), 1, PowPolicy::BlockHash);
        ledger.add_score(5, "start");
        ledger.mine_pending_scores().unwrap();
        let stored = store.get("scoreChain").unwrap().unwrap();

        let harder = ledger_on(Arc::clone(&store), 4, PowPolicy::BlockHash);
        assert_eq!(harder.len(), 1);
        assert_eq!(store.get("scoreChain.rejected").unwrap(), Some(stored.clone()));

        harder.add_score(1, "fresh");
        harder.mine_pending_scores().unwrap();
        assert_eq!(store.get("scoreChain.rejected").unwrap(), Some(stored));
    }

    #[test]
    fn progress_observer_sees_attempts() {
        let seen = Arc::new(Mutex::new(0u64));
        let sink = Arc::clone(&seen);
        let cfg = LedgerConfig {
            difficulty: 4,
            progress_interval: 10,
            ..LedgerConfig::default()
        };
        let ledger = Ledger::open(&cfg, Arc::new(MemoryStore::new())).with_progress_observer(
            Arc::new(move |p: MiningProgress| {
                *sink.lock().unwrap() = p.attempts;
            }),
        );
        ledger.add_score(1, "observed");
        let report = ledger.mine_pending_scores().unwrap();
        let last_seen = *seen.lock().unwrap();
        assert_eq!(last_seen, report.blocks[0].attempts / 10 * 10);
    }

    #[test]
    fn summary_reflects_state() {
        let ledger = memory_ledger(1);
        ledger.add_score(4, "a");
        ledger.mine_pending_scores().unwrap();
        ledger.add_score(1, "b");
        let summary = ledger.summary();
        assert_eq!(summary.length, 2);
        assert_eq!(summary.pending, 1);
        assert_eq!(summary.total_score, 4);
        assert!(summary.valid);
        assert!(!summary.mining);
    }
}
