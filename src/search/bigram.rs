// Bigram inverted index for large corpora (tens of thousands of artists).
//
// Every 2-character shingle over a small alphabet maps to the ascending list
// of items containing it. A needle matches an item when all of its shingles
// occur somewhere in the item, in any order, so results are a superset of
// exact substring matches: false positives are possible, false negatives
// are not.

use std::collections::HashMap;
use tracing::debug;

use super::search_substring;

/// Characters that take part in shingles. Anything else is not indexed.
pub const ALPHABET: &str = "abcdefghijklmnopqrstuvwxyz0123456789 ";

type Shingle = (char, char);

#[derive(Debug, Clone, Default)]
pub struct BigramIndex {
    postings: HashMap<Shingle, Vec<usize>>,
    corpus_len: usize,
}

fn indexable(c: char) -> bool {
    ALPHABET.contains(c)
}

/// Overlapping 2-character windows of an already lowercased string.
fn shingles(lowered: &str) -> impl Iterator<Item = (char, char)> + '_ {
    lowered.chars().zip(lowered.chars().skip(1))
}

impl BigramIndex {
    /// Build the index over `items`. Expensive for large corpora; run it off
    /// the UI loop.
    pub fn build<S: AsRef<str>>(items: &[S]) -> Self {
        let mut postings: HashMap<Shingle, Vec<usize>> = HashMap::new();

        for (idx, item) in items.iter().enumerate() {
            let lowered = item.as_ref().to_lowercase();
            for (a, b) in shingles(&lowered) {
                if !indexable(a) || !indexable(b) {
                    continue;
                }
                let list = postings.entry((a, b)).or_default();
                // items are visited in order, so each list stays ascending
                if list.last() != Some(&idx) {
                    list.push(idx);
                }
            }
        }

        debug!(
            "bigram index: {} shingles over {} items",
            postings.len(),
            items.len()
        );

        Self {
            postings,
            corpus_len: items.len(),
        }
    }

    /// Number of items the index was built over.
    pub fn corpus_len(&self) -> usize {
        self.corpus_len
    }

    pub fn shingle_count(&self) -> usize {
        self.postings.len()
    }

    /// Indices of items containing every indexable shingle of `needle`.
    /// Needles shorter than two characters, or without any indexable
    /// shingle, fall back to exact substring search over `items`.
    pub fn search<S: AsRef<str>>(&self, items: &[S], needle: &str) -> Vec<usize> {
        let lowered = needle.to_lowercase();
        if lowered.chars().count() < 2 {
            return search_substring(items, needle);
        }

        let mut result: Option<Vec<usize>> = None;
        for (a, b) in shingles(&lowered) {
            if !indexable(a) || !indexable(b) {
                continue;
            }
            let Some(found) = self.postings.get(&(a, b)) else {
                // an indexable shingle nobody has
                return Vec::new();
            };
            result = Some(match result {
                None => found.clone(),
                Some(acc) => intersect(&acc, found),
            });
            if result.as_ref().is_some_and(Vec::is_empty) {
                return Vec::new();
            }
        }

        match result {
            Some(idxs) => idxs,
            None => search_substring(items, needle),
        }
    }
}

/// Intersection of two ascending lists, ascending.
fn intersect(a: &[usize], b: &[usize]) -> Vec<usize> {
    let mut out = Vec::with_capacity(a.len().min(b.len()));
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn corpus() -> Vec<&'static str> {
        vec!["Johann Sebastian Bach", "Joy Division", "Björk", "Bach Collegium Japan", "AC/DC"]
    }

    #[test]
    fn finds_substring_matches() {
        let items = corpus();
        let index = BigramIndex::build(&items);
        assert_eq!(index.search(&items, "bach"), vec![0, 3]);
        assert_eq!(index.search(&items, "JOY"), vec![1]);
    }

    #[test]
    fn shingle_matching_is_fuzzy() {
        // every shingle of "xoba" occurs, just not contiguously
        let items = vec!["xo ob ba"];
        let index = BigramIndex::build(&items);
        assert_eq!(search_substring(&items, "xoba"), Vec::<usize>::new());
        assert_eq!(index.search(&items, "xoba"), vec![0]);
    }

    #[test]
    fn short_needles_fall_back_to_exact() {
        let items = corpus();
        let index = BigramIndex::build(&items);
        assert_eq!(index.search(&items, "j"), search_substring(&items, "j"));
        assert_eq!(index.search(&items, ""), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn unindexable_shingles_do_not_lose_matches() {
        let items = corpus();
        let index = BigramIndex::build(&items);
        assert_eq!(index.search(&items, "c/d"), vec![4]);
        assert!(index.search(&items, "björk").contains(&2));
        assert_eq!(index.search(&items, "ö/"), search_substring(&items, "ö/"));
    }

    #[test]
    fn intersects_sorted_lists() {
        assert_eq!(intersect(&[1, 3, 5, 7], &[0, 3, 4, 7, 9]), vec![3, 7]);
        assert!(intersect(&[1, 2], &[]).is_empty());
    }

    proptest! {
        #[test]
        fn exact_matches_are_a_subset(
            items in prop::collection::vec("[a-zA-Z0-9 ()/é-]{0,16}", 0..60),
            needle in "[a-zA-Z0-9 ()/é-]{0,5}",
        ) {
            let index = BigramIndex::build(&items);
            let fuzzy = index.search(&items, &needle);
            for idx in search_substring(&items, &needle) {
                prop_assert!(fuzzy.contains(&idx), "missing {} for {:?}", idx, needle);
            }
            prop_assert!(fuzzy.windows(2).all(|w| w[0] < w[1]));
        }

        #[test]
        fn needles_cut_from_items_always_match(
            items in prop::collection::vec("[a-zA-Z0-9 ]{2,16}", 1..40),
            pick in any::<prop::sample::Index>(),
            start in 0usize..16,
            len in 2usize..6,
        ) {
            let i = pick.index(items.len());
            let item = &items[i];
            let start = start.min(item.len() - 2);
            let end = (start + len).min(item.len());
            let needle = &item[start..end];

            let index = BigramIndex::build(&items);
            prop_assert!(index.search(&items, needle).contains(&i));
        }
    }
}
