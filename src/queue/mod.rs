// Queue file management - the only code that touches the queue file.
//
// Format: UTF-8, one library-relative path per line, mandatory trailing
// newline. Several instances may read and rewrite the file; there is no
// locking and the last writer wins. Only one instance ever drives playback,
// so the only racing writers are "add to queue" instances.

use rand::seq::index;
use rand::Rng;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info};

use crate::library::Library;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("failed to access queue file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot sample {requested} entries from a queue of {available}")]
    OutOfRange { requested: usize, available: usize },
    #[error("queue invariant violated: {0:?} is not queued")]
    NotQueued(String),
    #[error("queue invariant violated: {path:?} is queued {count} times")]
    Duplicated { path: String, count: usize },
}

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Clone)]
pub struct QueueStore {
    path: PathBuf,
}

impl QueueStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whole queue in file order.
    pub fn read(&self) -> QueueResult<Vec<String>> {
        let content = fs::read_to_string(&self.path).map_err(|source| self.io(source))?;
        Ok(parse(&content))
    }

    pub fn len(&self) -> QueueResult<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> QueueResult<bool> {
        Ok(self.len()? == 0)
    }

    pub fn contains(&self, relpath: &str) -> QueueResult<bool> {
        Ok(self.read()?.iter().any(|item| item == relpath))
    }

    /// `n == 0` returns the whole queue unshuffled; otherwise `n` distinct
    /// entries in random order.
    pub fn sample(&self, n: usize) -> QueueResult<Vec<String>> {
        self.sample_with(n, &mut rand::thread_rng())
    }

    pub fn sample_with<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> QueueResult<Vec<String>> {
        let items = self.read()?;
        sample_items(items, n, rng)
    }

    /// Queue contents with `relpath` removed. Not persisted.
    pub fn remove(&self, relpath: &str) -> QueueResult<Vec<String>> {
        remove_entry(self.read()?, relpath)
    }

    /// Queue contents with `relpath` appended. Not persisted.
    pub fn append(&self, relpath: &str) -> QueueResult<Vec<String>> {
        append_entry(self.read()?, relpath)
    }

    /// Replace the queue file. Readers see either the old or the new content,
    /// never a partial write.
    pub fn persist(&self, items: &[String]) -> QueueResult<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut tmp = NamedTempFile::new_in(dir).map_err(|source| self.io(source))?;
        tmp.write_all(render(items).as_bytes())
            .map_err(|source| self.io(source))?;
        tmp.as_file().sync_all().map_err(|source| self.io(source))?;
        tmp.persist(&self.path)
            .map_err(|err| self.io(err.error))?;

        debug!("Persisted {} queue entries to {}", items.len(), self.path.display());
        Ok(())
    }

    /// Remove and persist in one step.
    pub fn take(&self, relpath: &str) -> QueueResult<()> {
        let remaining = self.remove(relpath)?;
        self.persist(&remaining)?;
        info!("removed: {}", relpath);
        Ok(())
    }

    /// Append and persist in one step.
    pub fn push(&self, relpath: &str) -> QueueResult<()> {
        let grown = self.append(relpath)?;
        self.persist(&grown)?;
        info!("queued: {}", relpath);
        Ok(())
    }

    /// Create the queue file from up to `n` random albums of the library.
    pub fn seed(&self, library: &Library, n: usize) -> QueueResult<usize> {
        let all = library.walk_albums();
        let count = n.min(all.len());
        let seeded = if count == 0 {
            Vec::new()
        } else {
            sample_items(all, count, &mut rand::thread_rng())?
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| self.io(source))?;
        }
        self.persist(&seeded)?;
        Ok(seeded.len())
    }

    fn io(&self, source: io::Error) -> QueueError {
        QueueError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

/// Split file content into entries; the empty element produced by the
/// trailing newline is not an entry.
pub fn parse(content: &str) -> Vec<String> {
    let mut items: Vec<String> = content.split('\n').map(str::to_string).collect();
    if items.last().is_some_and(|last| last.is_empty()) {
        items.pop();
    }
    items
}

/// File content for a sequence of entries.
pub fn render(items: &[String]) -> String {
    if items.is_empty() {
        return String::new();
    }
    let mut out = items.join("\n");
    out.push('\n');
    out
}

fn sample_items<R: Rng + ?Sized>(
    items: Vec<String>,
    n: usize,
    rng: &mut R,
) -> QueueResult<Vec<String>> {
    if n == 0 {
        return Ok(items);
    }
    if n > items.len() {
        return Err(QueueError::OutOfRange {
            requested: n,
            available: items.len(),
        });
    }
    Ok(index::sample(rng, items.len(), n)
        .into_iter()
        .map(|i| items[i].clone())
        .collect())
}

/// Unordered removal: the last entry takes the removed entry's slot.
/// Exactly one entry must match.
pub fn remove_entry(mut items: Vec<String>, relpath: &str) -> QueueResult<Vec<String>> {
    let count = items.iter().filter(|item| *item == relpath).count();
    match count {
        0 => Err(QueueError::NotQueued(relpath.to_string())),
        1 => {
            let before = items.len();
            if let Some(pos) = items.iter().position(|item| item == relpath) {
                items.swap_remove(pos);
            }
            debug_assert_eq!(before - items.len(), 1);
            Ok(items)
        }
        count => Err(QueueError::Duplicated {
            path: relpath.to_string(),
            count,
        }),
    }
}

pub fn append_entry(mut items: Vec<String>, relpath: &str) -> QueueResult<Vec<String>> {
    let before = items.len();
    items.push(relpath.to_string());
    debug_assert_eq!(items.len() - before, 1);
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;
    use tempfile::tempdir;

    fn store_with(content: &str) -> (tempfile::TempDir, QueueStore) {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("queue.txt");
        fs::write(&path, content).unwrap();
        (dir, QueueStore::new(path))
    }

    #[test]
    fn sample_zero_returns_file_order() {
        let (_dir, store) = store_with("A/1\nB/2\n");
        assert_eq!(store.sample(0).unwrap(), vec!["A/1", "B/2"]);
    }

    #[test]
    fn remove_then_persist_rewrites_file() {
        let (_dir, store) = store_with("A/1\nB/2\n");
        let remaining = store.remove("A/1").unwrap();
        store.persist(&remaining).unwrap();
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "B/2\n");
    }

    #[test]
    fn remove_absent_is_rejected() {
        let (_dir, store) = store_with("A/1\nB/2\n");
        assert!(matches!(store.remove("C/3"), Err(QueueError::NotQueued(_))));
    }

    #[test]
    fn remove_duplicated_is_rejected() {
        let (_dir, store) = store_with("A/1\nB/2\nA/1\n");
        assert!(matches!(
            store.remove("A/1"),
            Err(QueueError::Duplicated { count: 2, .. })
        ));
    }

    #[test]
    fn remove_is_unordered() {
        let items = vec!["1".to_string(), "2".into(), "3".into(), "4".into(), "5".into()];
        assert_eq!(remove_entry(items, "3").unwrap(), vec!["1", "2", "5", "4"]);
    }

    #[test]
    fn append_grows_by_one_and_keeps_trailing_newline() {
        let (_dir, store) = store_with("A/1\n");
        store.push("B/2").unwrap();
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "A/1\nB/2\n");
    }

    #[test]
    fn oversized_sample_is_out_of_range() {
        let (_dir, store) = store_with("A/1\nB/2\n");
        assert!(matches!(
            store.sample(3),
            Err(QueueError::OutOfRange { requested: 3, available: 2 })
        ));
    }

    #[test]
    fn empty_queue_round_trips() {
        let (_dir, store) = store_with("A/1\n");
        store.persist(&[]).unwrap();
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "");
        assert!(store.read().unwrap().is_empty());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempdir().expect("tempdir");
        let store = QueueStore::new(dir.path().join("missing.txt"));
        assert!(matches!(store.read(), Err(QueueError::Io { .. })));
    }

    fn relpaths() -> impl Strategy<Value = Vec<String>> {
        prop::collection::hash_set("[A-Za-z0-9 ]{1,8}/[A-Za-z0-9 ()]{1,12}", 0..40)
            .prop_map(|set| set.into_iter().collect())
    }

    proptest! {
        #[test]
        fn sample_returns_distinct_members(items in relpaths(), seed in any::<u64>(), frac in 0.0f64..=1.0) {
            let (_dir, store) = store_with(&render(&items));
            let n = (items.len() as f64 * frac).floor() as usize;
            let mut rng = StdRng::seed_from_u64(seed);

            let picked = store.sample_with(n, &mut rng).unwrap();
            let expected = if n == 0 { items.len() } else { n };
            prop_assert_eq!(picked.len(), expected);

            let unique: HashSet<&String> = picked.iter().collect();
            prop_assert_eq!(unique.len(), picked.len());
            prop_assert!(picked.iter().all(|p| items.contains(p)));
        }

        #[test]
        fn persist_then_read_round_trips(items in relpaths()) {
            let (_dir, store) = store_with("");
            store.persist(&items).unwrap();
            prop_assert_eq!(store.read().unwrap(), items);
        }

        #[test]
        fn remove_present_entry_shrinks_by_one(items in relpaths(), pick in any::<prop::sample::Index>()) {
            prop_assume!(!items.is_empty());
            let target = items[pick.index(items.len())].clone();
            let remaining = remove_entry(items.clone(), &target).unwrap();
            prop_assert_eq!(remaining.len(), items.len() - 1);
            prop_assert!(!remaining.contains(&target));
        }
    }
}
