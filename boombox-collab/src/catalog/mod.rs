use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;
use url::Url;

use crate::NewSong;

mod spotify;
pub use spotify::*;

lazy_static! {
    static ref TRACK_ID_REGEX: Regex = Regex::new(r"^[0-9A-Za-z]{22}$").unwrap();
    static ref TRACK_URI_REGEX: Regex = Regex::new(r"^spotify:track:([0-9A-Za-z]{22})$").unwrap();
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Track {0} does not exist at the provider")]
    TrackNotFound(String),
    #[error("The provider did not accept our credentials")]
    Unauthorized,
    #[error("The catalog is unavailable: {0}")]
    Unavailable(String),
}

/// A track as described by the external music catalog
#[derive(Debug, Clone)]
pub struct CatalogTrack {
    pub external_id: String,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub duration_ms: i32,
    pub artwork_url: Option<String>,
    pub uri: String,
}

/// Represents an external music catalog that can look up track metadata.
///
/// Only consulted the first time a track is added. Stored songs are reused by
/// their external id afterwards.
#[async_trait]
pub trait Catalog: Send + Sync + 'static {
    async fn track_by_id(&self, external_id: &str) -> Result<CatalogTrack, CatalogError>;
}

/// Extracts the provider track id from user input.
/// Accepts a bare id, a `spotify:track:` URI, or a share link.
pub fn extract_track_id(query: &str) -> Option<String> {
    let query = query.trim();

    if TRACK_ID_REGEX.is_match(query) {
        return Some(query.to_string());
    }

    if let Some(captures) = TRACK_URI_REGEX.captures(query) {
        return Some(captures[1].to_string());
    }

    let url = Url::parse(query).ok()?;

    if !url.host_str()?.ends_with("spotify.com") {
        return None;
    }

    let mut segments = url.path_segments()?;

    match (segments.next(), segments.next()) {
        (Some("track"), Some(id)) if TRACK_ID_REGEX.is_match(id) => Some(id.to_string()),
        _ => None,
    }
}

impl From<CatalogTrack> for NewSong {
    fn from(track: CatalogTrack) -> Self {
        Self {
            external_id: track.external_id,
            title: track.title,
            artist: track.artist,
            album: track.album,
            duration_ms: track.duration_ms,
            artwork_url: track.artwork_url,
            uri: track.uri,
        }
    }
}

/// A canned catalog used by tests
#[cfg(test)]
#[derive(Default)]
pub struct FixedCatalog {
    tracks: parking_lot::Mutex<std::collections::HashMap<String, CatalogTrack>>,
}

#[cfg(test)]
impl FixedCatalog {
    pub fn add(&self, track: CatalogTrack) {
        self.tracks.lock().insert(track.external_id.clone(), track);
    }
}

#[cfg(test)]
#[async_trait]
impl Catalog for FixedCatalog {
    async fn track_by_id(&self, external_id: &str) -> Result<CatalogTrack, CatalogError> {
        self.tracks
            .lock()
            .get(external_id)
            .cloned()
            .ok_or_else(|| CatalogError::TrackNotFound(external_id.to_string()))
    }
}
