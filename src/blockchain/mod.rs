pub mod block;
pub mod hash;
pub mod model;
pub mod pow;

pub use block::{AwardEntry, Block, Payload, ScoreEntry};
pub use model::{Chain, ChainViolation};
pub use pow::{CancelToken, MiningProgress, PowPolicy, ProgressObserver, ProofOfWork, Solution};

/// Default Proof-of-Work difficulty (number of leading hex zeros).
pub const DEFAULT_DIFFICULTY: u32 = 4;

/// Difficulty bounds (keep low in dev to avoid long waits)
pub const DIFF_MIN: u32 = 1;
pub const DIFF_MAX: u32 = 8;

/// Previous-hash sentinel carried by the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Proof stored in the genesis block; seeds the proof-pair search.
pub const GENESIS_PROOF: u64 = 1;

pub const GENESIS_DESCRIPTION: &str = "Genesis Block";

/// Attempts between two progress notifications.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 10_000;
