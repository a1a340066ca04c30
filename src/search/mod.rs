// Incremental filtering of the current mode's items.
//
// Exact substring search is always available. For large corpora a bigram
// index is built in the background and swapped in once ready; until then
// (or if it never arrives) searches stay exact.

pub mod bigram;
pub mod cache;

pub use bigram::BigramIndex;
pub use cache::IndexCache;

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::debug;

/// Indices of `items` containing `needle`, ignoring case, in item order.
/// An empty needle matches everything.
pub fn search_substring<S: AsRef<str>>(items: &[S], needle: &str) -> Vec<usize> {
    if needle.is_empty() {
        return (0..items.len()).collect();
    }
    let needle = needle.to_lowercase();
    items
        .iter()
        .enumerate()
        .filter(|(_, item)| item.as_ref().to_lowercase().contains(&needle))
        .map(|(idx, _)| idx)
        .collect()
}

/// Identity of a corpus snapshot, used to key finished indexes.
pub fn fingerprint<S: AsRef<str>>(items: &[S]) -> u64 {
    let mut hasher = DefaultHasher::new();
    items.len().hash(&mut hasher);
    for item in items {
        item.as_ref().hash(&mut hasher);
    }
    hasher.finish()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Exact,
    Bigram,
}

/// Search over one corpus with a needle-keyed result cache.
#[derive(Debug, Clone)]
pub struct SearchIndex {
    haystack: Arc<Vec<String>>,
    fingerprint: u64,
    threshold: usize,
    bigrams: Option<Arc<BigramIndex>>,
    cache: HashMap<String, Vec<usize>>,
}

impl SearchIndex {
    pub fn new(haystack: Vec<String>, threshold: usize) -> Self {
        let fingerprint = fingerprint(&haystack);
        Self {
            haystack: Arc::new(haystack),
            fingerprint,
            threshold,
            bigrams: None,
            cache: HashMap::new(),
        }
    }

    /// Shared handle on the searched strings, for background index builds.
    pub fn corpus(&self) -> Arc<Vec<String>> {
        Arc::clone(&self.haystack)
    }

    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    pub fn len(&self) -> usize {
        self.haystack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.haystack.is_empty()
    }

    /// Large enough to be worth a bigram index, and none attached yet.
    pub fn wants_bigrams(&self) -> bool {
        self.haystack.len() > self.threshold && self.bigrams.is_none()
    }

    pub fn strategy(&self) -> Strategy {
        if self.bigrams.is_some() {
            Strategy::Bigram
        } else {
            Strategy::Exact
        }
    }

    /// Switch to the bigram strategy if `index` was built over this exact
    /// corpus. Returns whether it was taken.
    pub fn attach_bigrams(&mut self, fingerprint: u64, index: Arc<BigramIndex>) -> bool {
        if fingerprint != self.fingerprint
            || index.corpus_len() != self.haystack.len()
            || self.haystack.len() <= self.threshold
        {
            debug!("ignoring bigram index for another corpus");
            return false;
        }
        self.bigrams = Some(index);
        self.cache.clear();
        debug!("bigram search enabled over {} items", self.haystack.len());
        true
    }

    /// Matching indices for `needle`, ascending.
    pub fn matches(&mut self, needle: &str) -> Vec<usize> {
        if let Some(hit) = self.cache.get(needle) {
            return hit.clone();
        }
        let found = match &self.bigrams {
            Some(index) => index.search(&self.haystack, needle),
            None => search_substring(&self.haystack, needle),
        };
        self.cache.insert(needle.to_string(), found.clone());
        found
    }
}

impl Default for SearchIndex {
    fn default() -> Self {
        Self::new(Vec::new(), usize::MAX)
    }
}
