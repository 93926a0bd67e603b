//! Proof-of-work score ledger: a small hash chain that records score events.

pub mod api;
pub mod blockchain;
pub mod config;
pub mod error;
pub mod ledger;

pub use blockchain::{Block, Chain, Payload, PowPolicy};
pub use config::{LedgerConfig, ServerConfig};
pub use error::LedgerError;
pub use ledger::{Ledger, ScoreEvent};
