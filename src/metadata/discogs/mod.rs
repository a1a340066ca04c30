// Discogs rating after playback.
//
// Runs while the terminal is handed back to the line-oriented world (the
// TUI is suspended), so prompts are plain stdin/stdout.

mod client;
pub mod model;

pub use client::DiscogsClient;
pub use model::{Artist, Release, SearchResult};

use fuzzy_matcher::clangd::ClangdMatcher;
use fuzzy_matcher::FuzzyMatcher;
use std::fs;
use std::io::{self, BufRead, Write};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::Query;
use crate::config::DiscogsConfig;
use crate::library::{split_relpath, Library};

/// Candidates whose releases are fetched before asking.
const PREVIEW_ARTISTS: usize = 5;
const PREVIEW_RELEASES: usize = 3;

#[derive(Debug, Error)]
pub enum DiscogsError {
    #[error("release not found")]
    NotFound,
    #[error("release not rated")]
    NotRated,
    #[error("release not eligible for rating")]
    NotRateable,
    #[error("release already rated ({0})")]
    AlreadyRated(u8),
    #[error("unexpected response: {0}")]
    Unhandled(String),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("prompt failed: {0}")]
    Io(#[from] io::Error),
}

/// Line-based questions to the user.
pub trait Prompt {
    /// Show `question` and return the answer without its line ending. End
    /// of input reads as an empty answer.
    fn ask(&mut self, question: &str) -> io::Result<String>;

    fn say(&mut self, line: &str);
}

pub struct StdioPrompt;

impl Prompt for StdioPrompt {
    fn ask(&mut self, question: &str) -> io::Result<String> {
        let mut stdout = io::stdout();
        write!(stdout, "{}", question)?;
        stdout.flush()?;

        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        Ok(answer.trim().to_string())
    }

    fn say(&mut self, line: &str) {
        println!("{}", line);
    }
}

/// A rating answer: 1-5, empty to skip, anything else is asked again.
pub fn parse_rating(answer: &str) -> Option<Option<u8>> {
    match answer.trim() {
        "" => Some(None),
        s => match s.parse::<u8>() {
            Ok(n @ 1..=5) => Some(Some(n)),
            _ => None,
        },
    }
}

/// Candidates ordered by similarity to `name`; those that do not match at
/// all keep their relative order at the end.
pub fn rank_artists(name: &str, artists: Vec<Artist>) -> Vec<Artist> {
    let matcher = ClangdMatcher::default();
    let mut scored: Vec<(Option<i64>, Artist)> = artists
        .into_iter()
        .map(|artist| (matcher.fuzzy_match(&artist.name, name), artist))
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.into_iter().map(|(_, artist)| artist).collect()
}

/// Numbered pick from `artists`; empty answer picks nothing. `releases[i]`,
/// when present, lists a few titles under candidate `i`.
pub fn pick_artist<P: Prompt + ?Sized>(
    prompt: &mut P,
    artists: &[Artist],
    releases: &[Vec<Release>],
) -> io::Result<Option<usize>> {
    if artists.is_empty() {
        return Ok(None);
    }
    for (i, artist) in artists.iter().enumerate() {
        prompt.say(&format!("{:>3}. {}", i + 1, artist.name));
        for release in releases.get(i).into_iter().flatten().take(PREVIEW_RELEASES) {
            prompt.say(&format!("       {} {}", release.year, release.title));
        }
    }
    loop {
        let answer = prompt.ask(&format!("artist [1-{}, empty to skip]: ", artists.len()))?;
        if answer.is_empty() {
            return Ok(None);
        }
        match answer.parse::<usize>() {
            Ok(n) if (1..=artists.len()).contains(&n) => return Ok(Some(n - 1)),
            _ => prompt.say(&format!("invalid choice: {}", answer)),
        }
    }
}

/// Whether the library already holds an album of `artist_dir` whose name
/// starts with `title`.
pub fn in_library(library: &Library, artist_dir: &str, title: &str) -> bool {
    let Ok(entries) = fs::read_dir(library.resolve(artist_dir)) else {
        return false;
    };
    entries
        .filter_map(|entry| entry.ok())
        .any(|entry| entry.file_name().to_string_lossy().starts_with(title))
}

pub struct Rater {
    client: DiscogsClient,
    library: Library,
    prune: bool,
}

impl Rater {
    pub fn new(config: &DiscogsConfig, library: Library) -> Result<Self, DiscogsError> {
        Ok(Self {
            client: DiscogsClient::new(config)?,
            library,
            prune: config.prune_on_lowest_rating,
        })
    }

    /// Rate a release interactively: resolve it to a full release, skip it
    /// if already rated, ask for 1-5, then file it in the collection.
    pub async fn rate<P: Prompt + ?Sized>(&self, release: &Release, prompt: &mut P) -> Result<u8, DiscogsError> {
        if release.is_empty() {
            return Err(DiscogsError::NotFound);
        }
        if !release.is_rateable() {
            return Err(DiscogsError::NotRateable);
        }

        let full = if release.is_master() {
            self.client.release(release.primary).await?
        } else if release.is_artist_release() {
            self.client.release(release.id).await?
        } else {
            release.clone()
        };
        if full.is_empty() {
            return Err(DiscogsError::NotFound);
        }

        let current = self.client.rating(full.id).await?;
        if current != 0 {
            info!("already rated: {} {} ({})", full.id, full.title, current);
            return Err(DiscogsError::AlreadyRated(current));
        }

        prompt.say(&format!("{} :: {} :: {}", full.year, full.artist_name(), full.title));
        prompt.say(&format!("https://www.discogs.com/release/{}", full.id));
        let rating = loop {
            let answer = prompt.ask("rating: ")?;
            match parse_rating(&answer) {
                Some(Some(n)) => break n,
                Some(None) => return Err(DiscogsError::NotRated),
                None => prompt.say(&format!("invalid rating: {}", answer)),
            }
        };

        self.client.set_rating(full.id, rating).await?;
        self.client.add_to_collection(full.id).await?;
        info!("rated {} {}: {}", full.id, full.title, rating);
        Ok(rating)
    }

    /// Everything that follows a completed album: rate it, then either offer
    /// to prune the artist or look for another of their releases to rate.
    /// Failures are logged and end the flow.
    pub async fn after_album<P: Prompt + ?Sized>(&self, relpath: &str, prompt: &mut P) {
        if let Err(e) = self.try_after_album(relpath, prompt).await {
            warn!("rating flow for {} ended: {}", relpath, e);
        }
    }

    async fn try_after_album<P: Prompt + ?Sized>(&self, relpath: &str, prompt: &mut P) -> Result<(), DiscogsError> {
        let (Some(query), Some((artist_dir, _))) = (Query::from_relpath(relpath), split_relpath(relpath)) else {
            return Ok(());
        };

        let found = self.client.search(&query.search_artist, &query.album).await?;
        let primary = self.client.primary(&found).await?;
        let rated = match self.rate(&primary, prompt).await {
            Ok(n) => Some(n),
            Err(DiscogsError::Http(e)) => return Err(DiscogsError::Http(e)),
            Err(e) => {
                debug!("primary release not rated: {}", e);
                None
            }
        };

        if rated == Some(1) && !query.classical && self.prune {
            return self.offer_prune(artist_dir, prompt);
        }

        let candidates = self.client.search_artist(&query.artist).await?;
        let candidates = rank_artists(&query.artist, candidates);
        let mut releases = Vec::new();
        for artist in candidates.iter().take(PREVIEW_ARTISTS) {
            releases.push(self.client.artist_releases(artist).await?);
        }
        let Some(picked) = pick_artist(prompt, &candidates, &releases)? else {
            return Ok(());
        };
        let picked_releases = match releases.get_mut(picked) {
            Some(fetched) => std::mem::take(fetched),
            None => self.client.artist_releases(&candidates[picked]).await?,
        };

        for release in picked_releases {
            if in_library(&self.library, artist_dir, &release.title) {
                prompt.say(&format!("{}/{} (in library)", artist_dir, release.title));
                continue;
            }
            match self.rate(&release, prompt).await {
                Err(DiscogsError::AlreadyRated(_)) | Err(DiscogsError::NotRateable) => continue,
                Err(DiscogsError::Http(e)) => return Err(DiscogsError::Http(e)),
                _ => break,
            }
        }
        Ok(())
    }

    fn offer_prune<P: Prompt + ?Sized>(&self, artist_dir: &str, prompt: &mut P) -> Result<(), DiscogsError> {
        let path = self.library.resolve(artist_dir);
        if !path.is_dir() {
            return Ok(());
        }
        let answer = prompt.ask(&format!("Delete {}? [y/N] ", artist_dir))?;
        if answer == "y" {
            fs::remove_dir_all(&path)?;
            info!("deleted {}", path.display());
            prompt.say(&format!("Deleted {}", path.display()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use tempfile::tempdir;

    struct Scripted {
        answers: VecDeque<&'static str>,
        said: Vec<String>,
    }

    impl Scripted {
        fn new(answers: &[&'static str]) -> Self {
            Self {
                answers: answers.iter().copied().collect(),
                said: Vec::new(),
            }
        }
    }

    impl Prompt for Scripted {
        fn ask(&mut self, _question: &str) -> io::Result<String> {
            Ok(self.answers.pop_front().unwrap_or("").to_string())
        }

        fn say(&mut self, line: &str) {
            self.said.push(line.to_string());
        }
    }

    fn artist(name: &str) -> Artist {
        Artist {
            name: name.to_string(),
            ..Artist::default()
        }
    }

    #[test]
    fn ratings_are_one_to_five_or_empty() {
        assert_eq!(parse_rating("3"), Some(Some(3)));
        assert_eq!(parse_rating(" 5 "), Some(Some(5)));
        assert_eq!(parse_rating(""), Some(None));
        assert_eq!(parse_rating("0"), None);
        assert_eq!(parse_rating("6"), None);
        assert_eq!(parse_rating("x"), None);
    }

    #[test]
    fn picker_reprompts_until_valid() {
        let artists = vec![artist("Can"), artist("Cannibal Ox")];
        let mut prompt = Scripted::new(&["9", "nope", "2"]);
        assert_eq!(pick_artist(&mut prompt, &artists, &[]).unwrap(), Some(1));
        assert_eq!(prompt.said.iter().filter(|l| l.starts_with("invalid")).count(), 2);

        let mut prompt = Scripted::new(&[""]);
        assert_eq!(pick_artist(&mut prompt, &artists, &[]).unwrap(), None);
    }

    #[test]
    fn picker_lists_a_few_releases_per_artist() {
        let artists = vec![artist("Can"), artist("Cannibal Ox")];
        let release = |year, title: &str| Release {
            year,
            title: title.to_string(),
            ..Release::default()
        };
        let releases = vec![
            vec![
                release(1969, "Monster Movie"),
                release(1971, "Tago Mago"),
                release(1972, "Ege Bamyasi"),
                release(1973, "Future Days"),
            ],
            vec![release(2001, "The Cold Vein")],
        ];
        let mut prompt = Scripted::new(&["1"]);
        assert_eq!(pick_artist(&mut prompt, &artists, &releases).unwrap(), Some(0));
        assert_eq!(
            prompt.said,
            [
                "  1. Can",
                "       1969 Monster Movie",
                "       1971 Tago Mago",
                "       1972 Ege Bamyasi",
                "  2. Cannibal Ox",
                "       2001 The Cold Vein",
            ]
        );
    }

    #[test]
    fn closest_artist_ranks_first() {
        let ranked = rank_artists(
            "Can",
            vec![artist("Zorn"), artist("Cannibal Ox"), artist("Can")],
        );
        assert_eq!(ranked[0].name, "Can");
        assert_eq!(ranked.last().map(|a| a.name.as_str()), Some("Zorn"));
    }

    #[test]
    fn library_check_matches_album_prefix() {
        let dir = tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("Can/Tago Mago (1971)")).unwrap();
        let library = Library::new(dir.path().to_path_buf());
        assert!(in_library(&library, "Can", "Tago Mago"));
        assert!(!in_library(&library, "Can", "Ege Bamyasi"));
        assert!(!in_library(&library, "Nobody", "Tago Mago"));
    }

    #[test]
    fn prune_only_deletes_on_yes() {
        let dir = tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("Bad/Album")).unwrap();
        let config = DiscogsConfig {
            username: "me".to_string(),
            key: "k".to_string(),
            max_results: 10,
            prune_on_lowest_rating: true,
        };
        let rater = Rater::new(&config, Library::new(dir.path().to_path_buf())).unwrap();

        rater.offer_prune("Bad", &mut Scripted::new(&["n"])).unwrap();
        assert!(dir.path().join("Bad").exists());
        rater.offer_prune("Bad", &mut Scripted::new(&["y"])).unwrap();
        assert!(!dir.path().join("Bad").exists());
    }

    #[tokio::test]
    async fn empty_release_is_not_found() {
        let dir = tempdir().expect("tempdir");
        let rater = Rater::new(&DiscogsConfig::default(), Library::new(dir.path().to_path_buf())).unwrap();
        let err = rater.rate(&Release::default(), &mut Scripted::new(&[])).await;
        assert!(matches!(err, Err(DiscogsError::NotFound)));
    }
}
