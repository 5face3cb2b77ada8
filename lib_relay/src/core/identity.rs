//! # Client Identity Generator
//!
//! Produces the short, opaque identifiers under which live connections are
//! registered. The backend learns a client's id from the announcement message
//! sent at connection time and uses it to address `/emit` commands, so the
//! only hard requirement is that two concurrently-registered connections
//! never share an id.
//!
//! A bare random token of a few characters would make collisions a real
//! (if unlikely) correctness hazard given the registry's last-write-wins
//! insert. Instead, each id combines a process-wide monotonic sequence number
//! with a short random suffix: the counter guarantees uniqueness for the
//! lifetime of the process, the suffix keeps ids non-guessable across
//! restarts. Ids are not persisted and carry no structure callers may rely on.

use std::sync::atomic::{AtomicU64, Ordering};

use rand::distr::Alphanumeric;
use rand::Rng;

/// Length of the random alphanumeric suffix appended to the sequence number.
const SUFFIX_LEN: usize = 6;

/// Generates unique, opaque client identifiers. Generation cannot fail.
pub struct IdGenerator {
    /// Process-wide sequence number. `Relaxed` is sufficient: we only need
    /// each fetch_add to observe a distinct value, not any ordering with
    /// surrounding memory operations.
    counter: AtomicU64,
}

impl IdGenerator {
    /// Creates a generator starting from sequence number zero.
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }

    /// Produces the next identifier, e.g. `"1f-k3Xp9Q"`.
    ///
    /// The hex-encoded counter makes the id unique among all ids handed out
    /// by this process; the random suffix makes it opaque.
    pub fn generate(&self) -> String {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        let suffix: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(SUFFIX_LEN)
            .map(char::from)
            .collect();
        format!("{:x}-{}", seq, suffix)
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_are_unique() {
        let generator = IdGenerator::new();
        let ids: HashSet<String> = (0..10_000).map(|_| generator.generate()).collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn ids_are_short_and_alphanumeric() {
        let generator = IdGenerator::new();
        let id = generator.generate();
        assert!(id.len() <= 24, "id unexpectedly long: {}", id);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'));
    }

    #[test]
    fn sequence_half_is_monotonic() {
        let generator = IdGenerator::new();
        let a = generator.generate();
        let b = generator.generate();
        let seq = |id: &str| u64::from_str_radix(id.split('-').next().unwrap(), 16).unwrap();
        assert!(seq(&b) > seq(&a));
    }
}
