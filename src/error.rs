use thiserror::Error;

/// Everything that can go wrong inside the score ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("chain has no blocks (genesis missing)")]
    EmptyChain,

    #[error(
        "block does not link to the chain tip: expected index {expected_index} after {expected_previous}, got index {got_index} after {got_previous}"
    )]
    ChainLinkage {
        expected_index: u64,
        got_index: u64,
        expected_previous: String,
        got_previous: String,
    },

    #[error("block #{index} is unsealed or fails its proof-of-work check")]
    InvalidBlock { index: u64 },

    #[error("persisted chain is corrupt: {0}")]
    PersistenceCorrupt(String),

    #[error("block #{index} carries no usable score")]
    MalformedPayload { index: u64 },

    #[error("a mining run is already in progress")]
    MiningInProgress,

    #[error("mining was cancelled")]
    MiningCancelled,

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
