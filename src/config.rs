//! Settings read from the environment (after `.env` is loaded by the binary).

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use log::warn;

use crate::blockchain::{
    DEFAULT_DIFFICULTY, DEFAULT_PROGRESS_INTERVAL, DIFF_MAX, DIFF_MIN, PowPolicy,
};

/// Storage slot the chain is written to by default.
pub const DEFAULT_SLOT: &str = "scoreChain";

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerConfig {
    pub difficulty: u32,
    pub policy: PowPolicy,
    /// Threads searching each block's proof in parallel.
    pub workers: usize,
    pub progress_interval: u64,
    pub slot: String,
    /// `None` keeps the chain in memory only.
    pub data_dir: Option<PathBuf>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            policy: PowPolicy::default(),
            workers: 1,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            slot: DEFAULT_SLOT.to_string(),
            data_dir: None,
        }
    }
}

impl LedgerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults, bad
    /// values are logged and ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let difficulty = parse_or(&lookup, "LEDGER_DIFFICULTY", defaults.difficulty);
        let clamped = difficulty.clamp(DIFF_MIN, DIFF_MAX);
        if clamped != difficulty {
            warn!(
                "LEDGER_DIFFICULTY={difficulty} out of range {DIFF_MIN}..={DIFF_MAX}, using {clamped}"
            );
        }

        Self {
            difficulty: clamped,
            policy: parse_or(&lookup, "LEDGER_POW_POLICY", defaults.policy),
            workers: parse_or(&lookup, "LEDGER_WORKERS", defaults.workers).max(1),
            progress_interval: parse_or(
                &lookup,
                "LEDGER_PROGRESS_INTERVAL",
                defaults.progress_interval,
            )
            .max(1),
            slot: lookup("LEDGER_SLOT")
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.slot),
            data_dir: lookup("LEDGER_DATA_DIR")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_or(&lookup, "PORT", 8080),
        }
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("ignoring invalid {key}='{raw}'");
            default
        }),
    }
}
