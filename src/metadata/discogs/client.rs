// Thin async client over the few Discogs endpoints the rating flow needs.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CACHE_CONTROL};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::model::{
    Artist, ArtistReleases, ArtistSearch, RatingResponse, RatingUpdate, Release, SearchResult,
};
use super::DiscogsError;
use crate::config::DiscogsConfig;
use crate::metadata::alnum;

const API_PREFIX: &str = "https://api.discogs.com";
/// Collection folder every rated release is filed into ("Uncategorized").
const COLLECTION_FOLDER: u32 = 1;

#[derive(Debug, Clone)]
pub struct DiscogsClient {
    http: Client,
    base: String,
    username: String,
    max_results: usize,
}

impl DiscogsClient {
    pub fn new(config: &DiscogsConfig) -> Result<Self, DiscogsError> {
        let mut headers = HeaderMap::new();
        let token = HeaderValue::from_str(&format!("Discogs token={}", config.key))
            .map_err(|_| DiscogsError::Unhandled("key is not a valid header value".to_string()))?;
        headers.insert(AUTHORIZATION, token);
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));

        let http = Client::builder()
            .user_agent(concat!("plaque/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            base: API_PREFIX.to_string(),
            username: config.username.clone(),
            max_results: config.max_results,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base, path.trim_start_matches('/'));
        debug!("{} {}", method, url);
        self.http.request(method, url)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T, DiscogsError> {
        let resp = self.request(Method::GET, path).query(query).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            warn!("could not decode {} ({}): {}", path, status, e);
            DiscogsError::Unhandled(format!("{} returned {}", path, status))
        })
    }

    /// Releases matching an artist and title.
    pub async fn search(&self, artist: &str, album: &str) -> Result<SearchResult, DiscogsError> {
        let artist = alnum(artist);
        let album = alnum(album);
        debug!("searching {} / {}", artist, album);
        self.get(
            "database/search",
            &[("artist", artist.as_str()), ("release_title", album.as_str())],
        )
        .await
    }

    /// The first master among the leading results; failing that, the full
    /// release of the first result. An empty release when nothing matched.
    pub async fn primary(&self, result: &SearchResult) -> Result<Release, DiscogsError> {
        let Some(first) = result.results.first() else {
            return Ok(Release::default());
        };

        let master = result
            .results
            .iter()
            .take(self.max_results)
            .find(|r| r.master_id != 0);

        match master {
            Some(hit) => self.master(hit.master_id).await,
            None => self.release(first.id).await,
        }
    }

    pub async fn master(&self, id: u64) -> Result<Release, DiscogsError> {
        self.get(&format!("masters/{}", id), &[]).await
    }

    pub async fn release(&self, id: u64) -> Result<Release, DiscogsError> {
        self.get(&format!("releases/{}", id), &[]).await
    }

    /// Artists matching a name. Picking the right one is up to the caller.
    pub async fn search_artist(&self, name: &str) -> Result<Vec<Artist>, DiscogsError> {
        let q = alnum(name);
        let found: ArtistSearch = self
            .get("database/search", &[("q", q.as_str()), ("type", "artist")])
            .await?;
        Ok(found.results)
    }

    /// First page of an artist's releases, oldest first.
    pub async fn artist_releases(&self, artist: &Artist) -> Result<Vec<Release>, DiscogsError> {
        let found: ArtistReleases = self
            .get(
                &format!("artists/{}/releases", artist.id),
                &[("sort", "year"), ("per_page", "100"), ("page", "1")],
            )
            .await?;
        Ok(found.releases)
    }

    /// The user's current rating of a release; 0 means unrated.
    pub async fn rating(&self, release_id: u64) -> Result<u8, DiscogsError> {
        let current: RatingResponse = self
            .get(&format!("releases/{}/rating/{}", release_id, self.username), &[])
            .await?;
        Ok(current.rating)
    }

    pub async fn set_rating(&self, release_id: u64, rating: u8) -> Result<(), DiscogsError> {
        let body = RatingUpdate {
            username: &self.username,
            release_id,
            rating,
        };
        self.request(
            Method::PUT,
            &format!("releases/{}/rating/{}", release_id, self.username),
        )
        .json(&body)
        .send()
        .await?
        .error_for_status()?;
        Ok(())
    }

    pub async fn add_to_collection(&self, release_id: u64) -> Result<(), DiscogsError> {
        self.request(
            Method::POST,
            &format!(
                "users/{}/collection/folders/{}/releases/{}",
                self.username, COLLECTION_FOLDER, release_id
            ),
        )
        .send()
        .await?
        .error_for_status()?;
        Ok(())
    }
}
