// Library layout: root -> artist directories -> album directories.
// Anything below an album is opaque and only ever listed for previews or
// handed to the player as-is.

use anyhow::{Context, Result};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct Library {
    root: PathBuf,
}

impl Library {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a library-relative path.
    pub fn resolve(&self, relpath: &str) -> PathBuf {
        self.root.join(relpath)
    }

    pub fn exists(&self, relpath: &str) -> bool {
        self.resolve(relpath).exists()
    }

    pub fn is_dir(&self, relpath: &str) -> bool {
        self.resolve(relpath).is_dir()
    }

    /// Immediate children of the root, sorted by name.
    pub fn artists(&self) -> Result<Vec<String>> {
        let mut artists = descend(&self.root)
            .with_context(|| format!("failed to read library root {}", self.root.display()))?;
        artists.sort();
        Ok(artists)
    }

    /// Albums of one artist as relative paths, in year-suffix order.
    pub fn albums(&self, artist: &str) -> Result<Vec<String>> {
        let mut names = descend(&self.resolve(artist))
            .with_context(|| format!("failed to read artist directory {}", artist))?;
        names.sort();
        sort_by_year(&mut names);
        Ok(names
            .into_iter()
            .map(|album| format!("{}/{}", artist, album))
            .collect())
    }

    /// Children of an item, used as its preview.
    pub fn preview(&self, relpath: &str) -> Result<Vec<String>> {
        let mut children = descend(&self.resolve(relpath))?;
        children.sort();
        Ok(children)
    }

    /// Every depth-2 directory (artist/album) in the library.
    pub fn walk_albums(&self) -> Vec<String> {
        WalkDir::new(&self.root)
            .min_depth(2)
            .max_depth(2)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_dir())
            .filter_map(|entry| {
                let rel = entry.path().strip_prefix(&self.root).ok()?;
                let rel = rel.to_str()?;
                // queue entries always use '/' regardless of platform
                Some(rel.replace(std::path::MAIN_SEPARATOR, "/"))
            })
            .collect()
    }

    /// Log entries that are no longer valid album directories. Stops at the
    /// first valid entry; this is a cold-cache guard rail, not a full audit.
    pub fn audit(&self, relpaths: &[String]) {
        for rel in relpaths {
            let path = self.resolve(rel);
            match fs::metadata(&path) {
                Err(_) => warn!("not exist: {}", rel),
                Ok(meta) if !meta.is_dir() => warn!("not dir: {}", rel),
                Ok(_) => break,
            }
        }
    }
}

/// Basenames of the immediate children of `base`.
pub fn descend(base: &Path) -> Result<Vec<String>> {
    let mut children = Vec::new();
    for entry in fs::read_dir(base)? {
        let entry = entry?;
        children.push(entry.file_name().to_string_lossy().into_owned());
    }
    debug!("descend {}: {} entries", base.display(), children.len());
    Ok(children)
}

fn year_suffix() -> &'static Regex {
    static YEAR: OnceLock<Regex> = OnceLock::new();
    YEAR.get_or_init(|| Regex::new(r"\(([0-9]{4})\)$").expect("static regex"))
}

/// The "(YYYY)" suffix of an album name, if present.
pub fn album_year(name: &str) -> Option<&str> {
    year_suffix()
        .captures(name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Stable sort by year suffix. Names without a suffix come first, in their
/// original relative order; suffixed names are ordered by year.
pub fn sort_by_year<S: AsRef<str>>(albums: &mut [S]) {
    albums.sort_by(|a, b| album_year(a.as_ref()).cmp(&album_year(b.as_ref())));
}

/// Split "artist/album" into its two segments.
pub fn split_relpath(relpath: &str) -> Option<(&str, &str)> {
    relpath.split_once('/')
}

/// Final path segment, as shown in Albums mode.
pub fn basename(relpath: &str) -> &str {
    relpath.rsplit('/').next().unwrap_or(relpath)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn sorts_by_year_suffix() {
        let mut albums = vec!["a (1990)", "b (1989)", "c (1988)"];
        sort_by_year(&mut albums);
        assert_eq!(albums, vec!["c (1988)", "b (1989)", "a (1990)"]);
    }

    #[test]
    fn unsuffixed_albums_sort_first_and_stay_stable() {
        let mut albums = vec!["x (2001)", "live", "y (1999)", "demos", "z (1999)"];
        sort_by_year(&mut albums);
        assert_eq!(albums, vec!["live", "demos", "y (1999)", "z (1999)", "x (2001)"]);
    }

    #[test]
    fn year_needs_parenthesised_four_digits_at_the_end() {
        assert_eq!(album_year("Kind of Blue (1959)"), Some("1959"));
        assert_eq!(album_year("Kind of Blue (1959) [Mono]"), None);
        assert_eq!(album_year("Remixes (99)"), None);
    }

    #[test]
    fn albums_are_relative_and_year_ordered() {
        let dir = tempdir().expect("tempdir");
        for album in ["Late (2010)", "Early (1990)", "Bootlegs"] {
            fs::create_dir_all(dir.path().join("Artist").join(album)).unwrap();
        }
        let library = Library::new(dir.path().to_path_buf());

        let albums = library.albums("Artist").unwrap();
        assert_eq!(
            albums,
            vec!["Artist/Bootlegs", "Artist/Early (1990)", "Artist/Late (2010)"]
        );
    }

    #[test]
    fn walk_albums_only_reports_depth_two_dirs() {
        let dir = tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("A").join("One").join("CD1")).unwrap();
        fs::create_dir_all(dir.path().join("B").join("Two")).unwrap();
        fs::write(dir.path().join("B").join("cover.jpg"), b"").unwrap();
        let library = Library::new(dir.path().to_path_buf());

        let mut albums = library.walk_albums();
        albums.sort();
        assert_eq!(albums, vec!["A/One", "B/Two"]);
    }

    #[test]
    fn splits_relpaths() {
        assert_eq!(split_relpath("Artist/Album (2000)"), Some(("Artist", "Album (2000)")));
        assert_eq!(split_relpath("Artist"), None);
        assert_eq!(basename("Artist/Album"), "Album");
    }
}
