// Resume detection from the player's marker directory.
//
// When mpv is quit with `quit-watch-later`, it writes one file per
// interrupted item into its watch_later directory. The first line of each
// file is "# " followed by the absolute path of the file being played.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Length of the marker line prefix ("# ") in front of the path.
const MARKER_PREFIX_LEN: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resumable {
    pub relpath: String,
    pub modified: SystemTime,
}

#[derive(Debug, Clone)]
pub struct ResumeTracker {
    library_root: PathBuf,
    marker_dir: PathBuf,
}

impl ResumeTracker {
    pub fn new(library_root: PathBuf, marker_dir: PathBuf) -> Self {
        Self {
            library_root,
            marker_dir,
        }
    }

    /// The most recently interrupted album, if any.
    pub fn find_resumable(&self) -> Option<String> {
        self.find_all().into_iter().next().map(|r| r.relpath)
    }

    /// Every honored marker, most recently written first.
    pub fn find_all(&self) -> Vec<Resumable> {
        let mut found: Vec<Resumable> = self
            .markers()
            .into_iter()
            .filter_map(|marker| {
                let relpath = self.honor(&marker)?;
                let modified = fs::metadata(&marker)
                    .and_then(|m| m.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                Some(Resumable { relpath, modified })
            })
            .collect();

        found.sort_by(|a, b| b.modified.cmp(&a.modified));
        found
    }

    /// Whether the player left a marker for `relpath` when it exited.
    ///
    /// A marker refers to the album if it mentions the album's absolute path
    /// followed by a path separator or the end of a line; a bare prefix match
    /// ("Album" inside "Album (Deluxe)") does not count.
    pub fn will_resume(&self, relpath: &str) -> bool {
        let target = self.library_root.join(relpath);
        let target = target.to_string_lossy();

        self.markers().iter().any(|marker| match fs::read_to_string(marker) {
            Ok(content) => mentions(&content, &target),
            Err(e) => {
                warn!("could not read marker {}: {}", marker.display(), e);
                false
            }
        })
    }

    fn markers(&self) -> Vec<PathBuf> {
        if !self.marker_dir.is_dir() {
            debug!("no marker dir at {}", self.marker_dir.display());
            return Vec::new();
        }

        WalkDir::new(&self.marker_dir)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .collect()
    }

    // A marker is honored if its first line names an existing file under the
    // library root; the album is that file's directory.
    fn honor(&self, marker: &Path) -> Option<String> {
        let file = fs::File::open(marker).ok()?;
        let mut first = String::new();
        BufReader::new(file).read_line(&mut first).ok()?;

        let line = first.trim_end_matches(['\n', '\r']);
        let split = line.char_indices().nth(MARKER_PREFIX_LEN)?.0;
        let played = Path::new(&line[split..]);

        let meta = fs::metadata(played).ok()?;
        if meta.is_dir() || !played.starts_with(&self.library_root) {
            return None;
        }

        let album = played.parent()?.strip_prefix(&self.library_root).ok()?;
        let relpath = album.to_str()?.replace(std::path::MAIN_SEPARATOR, "/");
        if relpath.is_empty() {
            return None;
        }
        Some(relpath)
    }
}

fn mentions(content: &str, target: &str) -> bool {
    content.match_indices(target).any(|(start, matched)| {
        let rest = &content[start + matched.len()..];
        rest.is_empty() || rest.starts_with(['/', '\n', '\r', std::path::MAIN_SEPARATOR])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;
    use tempfile::tempdir;

    struct Fixture {
        _dir: tempfile::TempDir,
        root: PathBuf,
        markers: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempdir().expect("tempdir");
        let root = dir.path().join("lib");
        let markers = dir.path().join("watch_later");
        fs::create_dir_all(root.join("Artist").join("Album (2001)")).unwrap();
        fs::create_dir_all(root.join("Artist").join("Album (2001) (Deluxe)")).unwrap();
        fs::write(root.join("Artist").join("Album (2001)").join("01.flac"), b"").unwrap();
        fs::write(root.join("Artist").join("Album (2001) (Deluxe)").join("01.flac"), b"").unwrap();
        fs::create_dir_all(&markers).unwrap();
        Fixture {
            _dir: dir,
            root,
            markers,
        }
    }

    fn write_marker(fx: &Fixture, name: &str, played: &Path) {
        let content = format!("# {}\nstart=12.3\n", played.display());
        fs::write(fx.markers.join(name), content).unwrap();
    }

    #[test]
    fn finds_album_of_interrupted_file() {
        let fx = fixture();
        write_marker(&fx, "a", &fx.root.join("Artist/Album (2001)/01.flac"));
        let tracker = ResumeTracker::new(fx.root.clone(), fx.markers.clone());

        assert_eq!(tracker.find_resumable(), Some("Artist/Album (2001)".to_string()));
    }

    #[test]
    fn ignores_markers_outside_library_or_missing() {
        let fx = fixture();
        write_marker(&fx, "a", Path::new("/definitely/not/here.flac"));
        write_marker(&fx, "b", &fx.root.join("Artist"));
        let tracker = ResumeTracker::new(fx.root.clone(), fx.markers.clone());

        assert_eq!(tracker.find_resumable(), None);
    }

    #[test]
    fn most_recent_marker_wins() {
        let fx = fixture();
        write_marker(&fx, "old", &fx.root.join("Artist/Album (2001)/01.flac"));
        thread::sleep(Duration::from_millis(20));
        write_marker(&fx, "new", &fx.root.join("Artist/Album (2001) (Deluxe)/01.flac"));
        let tracker = ResumeTracker::new(fx.root.clone(), fx.markers.clone());

        assert_eq!(tracker.find_all().len(), 2);
        assert_eq!(
            tracker.find_resumable(),
            Some("Artist/Album (2001) (Deluxe)".to_string())
        );
    }

    #[test]
    fn missing_marker_dir_means_nothing_to_resume() {
        let fx = fixture();
        let tracker = ResumeTracker::new(fx.root.clone(), fx.markers.join("nope"));
        assert_eq!(tracker.find_resumable(), None);
        assert!(!tracker.will_resume("Artist/Album (2001)"));
    }

    #[test]
    fn will_resume_does_not_match_on_shared_prefix() {
        let fx = fixture();
        write_marker(&fx, "a", &fx.root.join("Artist/Album (2001) (Deluxe)/01.flac"));
        let tracker = ResumeTracker::new(fx.root.clone(), fx.markers.clone());

        assert!(tracker.will_resume("Artist/Album (2001) (Deluxe)"));
        assert!(!tracker.will_resume("Artist/Album (2001)"));
    }
}
