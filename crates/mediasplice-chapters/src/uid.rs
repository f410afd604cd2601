//! Registry of unique edition and chapter IDs.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Namespace a unique ID belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UidKind {
    Edition,
    Chapter,
}

/// Hands out random, nonzero 32 bit IDs that never repeat within their
/// [`UidKind`].
#[derive(Debug)]
pub struct UniqueIds {
    rng: StdRng,
    editions: HashSet<u64>,
    chapters: HashSet<u64>,
}

impl Default for UniqueIds {
    fn default() -> Self {
        Self::new()
    }
}

impl UniqueIds {
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Deterministic sequence of IDs, for reproducible output.
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            rng,
            editions: HashSet::new(),
            chapters: HashSet::new(),
        }
    }

    fn set_mut(&mut self, kind: UidKind) -> &mut HashSet<u64> {
        match kind {
            UidKind::Edition => &mut self.editions,
            UidKind::Chapter => &mut self.chapters,
        }
    }

    /// Whether `uid` has not been handed out or registered yet.
    pub fn is_unique(&self, kind: UidKind, uid: u64) -> bool {
        let set = match kind {
            UidKind::Edition => &self.editions,
            UidKind::Chapter => &self.chapters,
        };
        !set.contains(&uid)
    }

    /// Record an ID that already exists. Returns `false` if it was taken.
    pub fn register(&mut self, kind: UidKind, uid: u64) -> bool {
        self.set_mut(kind).insert(uid)
    }

    /// Create a fresh ID.
    pub fn create(&mut self, kind: UidKind) -> u64 {
        loop {
            let candidate = u64::from(self.rng.gen::<u32>());
            if candidate != 0 && self.set_mut(kind).insert(candidate) {
                return candidate;
            }
        }
    }
}
