// Discogs payloads. The same release shape comes back from search, master,
// artist-release and full-release endpoints with different subsets of
// fields filled in, so everything defaults and unknown fields are ignored.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Formats that are never offered for rating.
pub const IGNORED_FORMATS: &[&str] = &["Compilation", "DVD-V", "Shellac", "Single"];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Release {
    /// Master id for masters, release id otherwise.
    pub id: u64,
    /// In search results this is "Artist - Title".
    pub title: String,
    pub artists: Vec<Artist>,
    #[serde(deserialize_with = "lenient_year")]
    pub year: u32,
    pub resource_url: String,

    pub master_id: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub master_url: String,
    /// Masters only: the id of the main release.
    #[serde(rename = "main_release")]
    pub primary: u64,

    pub genre: Vec<String>,
    /// Search only: "release" or "master".
    #[serde(rename = "type")]
    pub release_type: String,

    // artist releases only
    pub artist: String,
    #[serde(deserialize_with = "null_as_default")]
    pub label: String,
    pub role: String,
    pub stats: HashMap<String, HashMap<String, u64>>,
    /// ", "-delimited in artist releases, a list in search results.
    pub(super) format: serde_json::Value,
}

impl Release {
    pub fn is_empty(&self) -> bool {
        self.id == 0
    }

    /// Entries of the artist-releases endpoint carry an `artist` field;
    /// nothing else does.
    pub fn is_artist_release(&self) -> bool {
        !self.artist.is_empty()
    }

    pub fn is_master(&self) -> bool {
        self.primary > 0
    }

    pub fn in_collection(&self) -> bool {
        self.stats
            .get("user")
            .and_then(|user| user.get("in_collection"))
            .is_some_and(|&n| n > 0)
    }

    pub fn formats(&self) -> Vec<String> {
        match &self.format {
            serde_json::Value::String(s) => s
                .split(", ")
                .filter(|f| !f.is_empty())
                .map(str::to_string)
                .collect(),
            serde_json::Value::Array(values) => values
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn is_ignored(&self) -> bool {
        self.formats()
            .iter()
            .any(|f| IGNORED_FORMATS.contains(&f.as_str()))
    }

    /// Artist releases already collected, credited in a non-main role, or
    /// of an ignored format are skipped. Other kinds are always rateable.
    pub fn is_rateable(&self) -> bool {
        if !self.is_artist_release() {
            return true;
        }
        !self.in_collection() && self.role == "Main" && !self.is_ignored()
    }

    /// First credited artist, for display.
    pub fn artist_name(&self) -> &str {
        self.artists
            .first()
            .map(|a| a.name.as_str())
            .unwrap_or(self.artist.as_str())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Artist {
    pub id: u64,
    /// `title` in search results, `name` everywhere else.
    #[serde(alias = "title")]
    pub name: String,
    pub resource_url: String,
    pub user_data: HashMap<String, bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchResult {
    pub results: Vec<Release>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ArtistSearch {
    pub results: Vec<Artist>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ArtistReleases {
    pub releases: Vec<Release>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RatingResponse {
    pub username: String,
    pub release_id: u64,
    pub rating: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct RatingUpdate<'a> {
    pub username: &'a str,
    pub release_id: u64,
    pub rating: u8,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// Years are numbers almost everywhere, but strings in search results.
fn lenient_year<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Year {
        Number(u32),
        Text(String),
    }

    Ok(match Option::<Year>::deserialize(deserializer)? {
        Some(Year::Number(n)) => n,
        Some(Year::Text(s)) => s.trim().parse().unwrap_or(0),
        None => 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_search_results() {
        let json = r#"{
            "pagination": {"page": 1},
            "results": [
                {"id": 11, "title": "Can - Tago Mago", "year": "1971", "master_id": 5,
                 "type": "release", "format": ["Vinyl", "LP"], "genre": ["Rock"],
                 "community": {"want": 1, "have": 2}},
                {"id": 12, "title": "Can - Tago Mago"}
            ]
        }"#;
        let result: SearchResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.results.len(), 2);
        assert_eq!(result.results[0].year, 1971);
        assert_eq!(result.results[0].master_id, 5);
        assert_eq!(result.results[0].formats(), vec!["Vinyl", "LP"]);
        assert_eq!(result.results[1].master_id, 0);
    }

    #[test]
    fn decodes_masters_and_full_releases() {
        let json = r#"{"id": 5, "main_release": 77, "title": "Tago Mago", "year": 1971,
                       "artists": [{"name": "Can", "id": 3}]}"#;
        let master: Release = serde_json::from_str(json).unwrap();
        assert!(master.is_master());
        assert!(master.is_rateable());
        assert_eq!(master.artist_name(), "Can");

        let json = r#"{"id": 77, "title": "Tago Mago", "year": null, "master_url": null,
                       "formats": [{"name": "Vinyl", "qty": "2"}]}"#;
        let release: Release = serde_json::from_str(json).unwrap();
        assert_eq!(release.year, 0);
        assert!(release.formats().is_empty());
    }

    #[test]
    fn artist_release_rateability() {
        let json = r#"{"releases": [
            {"id": 1, "title": "A", "artist": "Can", "role": "Main", "format": "CD, Album",
             "stats": {"user": {"in_collection": 0, "in_wantlist": 0}}},
            {"id": 2, "title": "B", "artist": "Can", "role": "Main",
             "stats": {"user": {"in_collection": 1, "in_wantlist": 0}}},
            {"id": 3, "title": "C", "artist": "Can", "role": "Appearance"},
            {"id": 4, "title": "D", "artist": "Can", "role": "Main", "format": "7\", Single"}
        ]}"#;
        let releases: ArtistReleases = serde_json::from_str(json).unwrap();
        let rateable: Vec<u64> = releases
            .releases
            .iter()
            .filter(|r| r.is_rateable())
            .map(|r| r.id)
            .collect();
        assert_eq!(rateable, vec![1]);
    }

    #[test]
    fn artist_search_uses_title_as_name() {
        let json = r#"{"results": [{"id": 9, "title": "Can", "user_data": {"in_collection": true}}]}"#;
        let found: ArtistSearch = serde_json::from_str(json).unwrap();
        assert_eq!(found.results[0].name, "Can");
    }

    #[test]
    fn rating_update_serializes() {
        let body = RatingUpdate {
            username: "me",
            release_id: 77,
            rating: 4,
        };
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"username":"me","release_id":77,"rating":4}"#
        );
    }
}
