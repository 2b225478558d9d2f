//! Room code generation and canonicalization — `spec.md` §3 "Room Code".

use rand::Rng;

/// 32-symbol alphabet excluding visually confusable characters
/// (`I`, `O`, `0`, `1`).
pub const ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Number of characters in a room code.
pub const CODE_LEN: usize = 6;

/// Generate a fresh, uniformly random room code.
pub fn generate() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Canonicalize a client-supplied room code: uppercase, trimmed.
/// Case-insensitive on input (`spec.md` §3).
pub fn canonicalize(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}
