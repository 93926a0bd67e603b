use sha2::{Digest, Sha256};

/// SHA-256 of `data`, hex encoded (lowercase).
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// True when the first `difficulty` characters of `digest` are all `'0'`.
pub fn meets_difficulty(digest: &str, difficulty: u32) -> bool {
    let difficulty = difficulty as usize;
    digest.len() >= difficulty && digest.bytes().take(difficulty).all(|c| c == b'0')
}

/// Proof-pair predicate: `sha256("{last_proof}{proof}")` must meet the difficulty.
/// Returns the digest when it does.
pub fn proof_pair_digest(last_proof: u64, proof: u64, difficulty: u32) -> Option<String> {
    let digest = sha256_hex(format!("{last_proof}{proof}").as_bytes());
    meets_difficulty(&digest, difficulty).then_some(digest)
}
