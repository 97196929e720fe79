//! # Stage: DedupIndex
//!
//! ## Responsibility
//! Record which logical messages have already been rendered so that the two
//! polling loops never show the same message twice.
//!
//! ## Guarantees
//! - Deterministic: the same role and text always produce the same key
//! - Keys are bounded: at most `prefix_len` characters of text are kept
//! - Monotonic: keys are never removed for the life of the index
//! - Non-panicking: truncation is done on `char` boundaries
//!
//! ## NOT Responsible For
//! - Telling apart two distinct messages that share the same prefix; they
//!   collide and the second one is suppressed
//! - Persistence (in-memory only, one index per session)

use std::collections::HashSet;

use crate::protocol::Sender;

/// Number of leading characters of a message that participate in its key.
pub const DEFAULT_PREFIX_LEN: usize = 50;

/// Opaque identity of a rendered message: role tag plus a text prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey(String);

impl DedupKey {
    /// Derive the key for a message authored by `sender`.
    ///
    /// Only the first `prefix_len` characters of `text` are kept.
    ///
    /// # Panics
    /// This function never panics.
    pub fn derive(sender: Sender, text: &str, prefix_len: usize) -> Self {
        let prefix: String = text.chars().take(prefix_len).collect();
        DedupKey(format!("{}{}", sender.tag(), prefix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Set of keys already rendered in this session.
#[derive(Debug)]
pub struct DedupIndex {
    prefix_len: usize,
    seen: HashSet<DedupKey>,
}

impl DedupIndex {
    pub fn new(prefix_len: usize) -> Self {
        DedupIndex { prefix_len, seen: HashSet::new() }
    }

    /// Key for `text` under this index's prefix length.
    pub fn key_for(&self, sender: Sender, text: &str) -> DedupKey {
        DedupKey::derive(sender, text, self.prefix_len)
    }

    pub fn seen(&self, key: &DedupKey) -> bool {
        self.seen.contains(key)
    }

    pub fn mark(&mut self, key: DedupKey) {
        self.seen.insert(key);
    }

    /// Mark `key` and report whether it was new. Equivalent to
    /// `!seen(&key)` followed by `mark(key)`.
    pub fn mark_new(&mut self, key: DedupKey) -> bool {
        self.seen.insert(key)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn prefix_len(&self) -> usize {
        self.prefix_len
    }
}

impl Default for DedupIndex {
    fn default() -> Self {
        DedupIndex::new(DEFAULT_PREFIX_LEN)
    }
}
