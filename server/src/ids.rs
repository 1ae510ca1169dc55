use std::sync::atomic::{AtomicU64, Ordering};

/// Hands out `"{prefix}{n}"` identifiers, starting at 1.
///
/// Each allocator is owned by whoever creates the identified things (the hub
/// owns one for matches and one for players), so uniqueness holds per allocator.
#[derive(Debug)]
pub struct SequenceIds {
    prefix: &'static str,
    next: AtomicU64,
}

pub const COMBAT_PREFIX: &str = "CBT";
pub const PLAYER_PREFIX: &str = "CLI";

impl SequenceIds {
    pub fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            next: AtomicU64::new(1),
        }
    }

    pub fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}{}", self.prefix, n)
    }
}
