// Finished bigram indexes, kept for the whole session and keyed by corpus
// fingerprint, so re-entering a screen over the same items never rebuilds.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use super::{BigramIndex, SearchIndex};

/// What to do about an index for one corpus.
#[derive(Debug, Clone)]
pub enum Want {
    Cached(Arc<BigramIndex>),
    /// Nobody is building it yet; the caller should.
    Spawn,
    /// Being built, or failed before and not retried.
    Pending,
}

#[derive(Debug, Default)]
pub struct IndexCache {
    ready: HashMap<u64, Arc<BigramIndex>>,
    building: HashSet<u64>,
    failed: HashSet<u64>,
}

impl IndexCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `fingerprint`. A `Spawn` answer marks it as building, so it
    /// is handed out once.
    pub fn want(&mut self, fingerprint: u64) -> Want {
        if let Some(index) = self.ready.get(&fingerprint) {
            return Want::Cached(Arc::clone(index));
        }
        if self.failed.contains(&fingerprint) || !self.building.insert(fingerprint) {
            return Want::Pending;
        }
        Want::Spawn
    }

    pub fn ready(&mut self, fingerprint: u64, index: Arc<BigramIndex>) {
        self.building.remove(&fingerprint);
        self.ready.insert(fingerprint, index);
    }

    pub fn failed(&mut self, fingerprint: u64) {
        self.building.remove(&fingerprint);
        self.failed.insert(fingerprint);
    }

    /// Attach a finished index to `search` if one exists. Returns true when
    /// the caller should start a build for this corpus.
    pub fn prepare(&mut self, search: &mut SearchIndex) -> bool {
        if !search.wants_bigrams() {
            return false;
        }
        let fingerprint = search.fingerprint();
        match self.want(fingerprint) {
            Want::Cached(index) => {
                search.attach_bigrams(fingerprint, index);
                debug!("reusing bigram index for corpus {:x}", fingerprint);
                false
            }
            Want::Spawn => true,
            Want::Pending => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{BrowserState, Mode};
    use crate::search::Strategy;

    fn artists() -> Vec<String> {
        ["Can", "Neu!", "Faust", "Cluster"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn later_state_over_same_corpus_reuses_index() {
        let mut cache = IndexCache::new();

        let mut first = BrowserState::new(Mode::Artists, artists(), 2);
        assert!(cache.prepare(first.search_mut()));
        // a second request while building does not start another build
        assert!(!cache.prepare(first.search_mut()));

        let fp = first.search().fingerprint();
        let built = Arc::new(BigramIndex::build(first.search().corpus().as_slice()));
        cache.ready(fp, built);

        let mut second = BrowserState::new(Mode::Artists, artists(), 2);
        assert!(!cache.prepare(second.search_mut()));
        assert_eq!(second.search().strategy(), Strategy::Bigram);
    }

    #[test]
    fn failed_build_is_not_retried() {
        let mut cache = IndexCache::new();
        let mut state = BrowserState::new(Mode::Artists, artists(), 2);
        assert!(cache.prepare(state.search_mut()));

        cache.failed(state.search().fingerprint());

        let mut again = BrowserState::new(Mode::Artists, artists(), 2);
        assert!(!cache.prepare(again.search_mut()));
        assert_eq!(again.search().strategy(), Strategy::Exact);
        assert!(matches!(cache.want(again.search().fingerprint()), Want::Pending));
    }

    #[test]
    fn small_corpus_never_asks_for_a_build() {
        let mut cache = IndexCache::new();
        let mut state = BrowserState::new(Mode::Artists, artists(), 100);
        assert!(!cache.prepare(state.search_mut()));
        assert_eq!(state.search().strategy(), Strategy::Exact);
    }

    #[test]
    fn index_for_another_corpus_is_not_attached() {
        let mut cache = IndexCache::new();
        let mut albums = BrowserState::new(Mode::Artists, vec!["Tago Mago".into(), "Ege Bamyasi".into(), "Soon Over Babaluma".into()], 2);
        let fp = albums.search().fingerprint();
        assert!(cache.prepare(albums.search_mut()));

        // built from a different item list under the same key
        cache.ready(fp, Arc::new(BigramIndex::build(&artists())));
        assert!(!cache.prepare(albums.search_mut()));
        assert_eq!(albums.search().strategy(), Strategy::Exact);
    }
}
