// src/ids.rs
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::fmt::Write;

pub const DEFAULT_ID_BYTES: usize = 12;

/// Random record id from the OS RNG. This is what the store calls.
pub fn generate_id_default() -> String {
    let mut rng = OsRng;
    generate_id(&mut rng, DEFAULT_ID_BYTES)
}

/// URL-safe base64 (no padding) of `nbytes` random bytes.
pub fn generate_id<R: RngCore>(rng: &mut R, nbytes: usize) -> String {
    let mut buf = vec![0u8; nbytes];
    rng.fill_bytes(&mut buf);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&buf)
}

/// Identity of an ingested listing: trimmed, lowercased
/// `title|||organization|||notice_date`.
pub fn seen_key(title: &str, organization: &str, notice_date: &str) -> String {
    format!(
        "{}|||{}|||{}",
        title.trim().to_lowercase(),
        organization.trim().to_lowercase(),
        notice_date.trim().to_lowercase()
    )
}

/// Hex SHA-256 of a key. Stored instead of the raw key.
pub fn hash_key(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        let _ = write!(out, "{b:02x}");
    }
    out
}
