//! Invite-code alphabet, canonicalization, and the RNG oracle.
//!
//! The RNG only draws raw characters; uniqueness is the engine's job
//! (rejection-sample until the candidate is free in `invite_code`). This
//! module owns the alphabet and the dash formatting.

use rand::Rng;

/// `[A-HJKLMNP-Z2-9]` — excludes I, O, 0, 1 to avoid visual ambiguity.
pub const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

pub trait CodeRng: Send + Sync {
    /// Returns 16 raw characters (no dashes) drawn from `ALPHABET`.
    fn sample_code(&self) -> String;
}

pub struct ThreadCodeRng;

impl CodeRng for ThreadCodeRng {
    fn sample_code(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..16)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect()
    }
}

#[cfg(test)]
pub struct SequentialCodeRng {
    next: std::sync::atomic::AtomicU32,
}

#[cfg(test)]
impl SequentialCodeRng {
    pub fn new() -> Self {
        Self { next: std::sync::atomic::AtomicU32::new(0) }
    }
}

#[cfg(test)]
impl CodeRng for SequentialCodeRng {
    fn sample_code(&self) -> String {
        let n = self.next.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        // Deterministic but distinct 16-char codes: base-32 encode `n`
        // over the alphabet, left-padded.
        let mut chars = [ALPHABET[0] as char; 16];
        let mut value = n;
        for slot in chars.iter_mut().rev() {
            *slot = ALPHABET[(value as usize) % ALPHABET.len()] as char;
            value /= ALPHABET.len() as u32;
        }
        chars.iter().collect()
    }
}

/// Insert dashes at positions 4/9/14 of a 16-char raw code: `XXXX-XXXX-XXXX-XXXX`.
pub fn format_with_dashes(raw: &str) -> String {
    debug_assert_eq!(raw.len(), 16);
    let mut out = String::with_capacity(19);
    for (i, c) in raw.chars().enumerate() {
        if i > 0 && i % 4 == 0 {
            out.push('-');
        }
        out.push(c);
    }
    out
}

/// Canonicalize a caller-submitted invite code: strip dashes/whitespace,
/// uppercase, validate every character is in `ALPHABET` and the length is
/// 16, then re-insert dashes at the canonical positions.
///
/// Returns `None` if the input doesn't match `^[A-HJKLMNP-Z2-9]{16}$` after
/// stripping separators.
pub fn canonicalize(input: &str) -> Option<String> {
    let stripped: String = input.chars().filter(|c| !c.is_whitespace() && *c != '-').collect();
    if stripped.len() != 16 {
        return None;
    }
    let upper = stripped.to_uppercase();
    if !upper.bytes().all(|b| ALPHABET.contains(&b)) {
        return None;
    }
    Some(format_with_dashes(&upper))
}
