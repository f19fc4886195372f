use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::{Catalog, CatalogError, CatalogTrack};

const ACCOUNTS_BASE: &str = "https://accounts.spotify.com";
const API_BASE: &str = "https://api.spotify.com/v1";

/// Spotify implementation of the catalog, using the client credentials flow
pub struct SpotifyCatalog {
    client: Client,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<AccessToken>>,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct TrackResponse {
    id: String,
    name: String,
    duration_ms: i32,
    uri: String,
    artists: Vec<ArtistResponse>,
    album: AlbumResponse,
}

#[derive(Debug, Deserialize)]
struct ArtistResponse {
    name: String,
}

#[derive(Debug, Deserialize)]
struct AlbumResponse {
    name: String,
    images: Vec<ImageResponse>,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    url: String,
    width: Option<u32>,
}

impl SpotifyCatalog {
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            client: Client::new(),
            client_id,
            client_secret,
            token: Default::default(),
        }
    }

    /// Returns a valid access token, requesting a new one when the cached one expired
    async fn access_token(&self) -> Result<String, CatalogError> {
        let cached = self.token.lock().clone();

        if let Some(token) = cached {
            if token.expires_at > Utc::now() {
                return Ok(token.value);
            }
        }

        let response = self
            .client
            .post(format!("{}/api/token", ACCOUNTS_BASE))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| CatalogError::Unavailable(e.to_string()))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(CatalogError::Unauthorized)
            }
            status if !status.is_success() => {
                return Err(CatalogError::Unavailable(status.to_string()))
            }
            _ => {}
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| CatalogError::Unavailable(e.to_string()))?;

        // Renew a minute early so a token never expires mid-request
        let token = AccessToken {
            value: body.access_token.clone(),
            expires_at: Utc::now() + Duration::seconds(body.expires_in - 60),
        };

        *self.token.lock() = Some(token);

        Ok(body.access_token)
    }
}

#[async_trait]
impl Catalog for SpotifyCatalog {
    async fn track_by_id(&self, external_id: &str) -> Result<CatalogTrack, CatalogError> {
        let token = self.access_token().await?;

        let response = self
            .client
            .get(format!("{}/tracks/{}", API_BASE, external_id))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| CatalogError::Unavailable(e.to_string()))?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST => {
                return Err(CatalogError::TrackNotFound(external_id.to_string()))
            }
            status => {
                let message = response
                    .text()
                    .await
                    .ok()
                    .and_then(|body| serde_json::from_str::<serde_json::Value>(&body).ok())
                    .and_then(|value| value["error"]["message"].as_str().map(str::to_string))
                    .unwrap_or_else(|| status.to_string());

                return Err(CatalogError::Unavailable(message));
            }
        }

        let track: TrackResponse = response
            .json()
            .await
            .map_err(|e| CatalogError::Unavailable(e.to_string()))?;

        Ok(track.into())
    }
}

impl From<TrackResponse> for CatalogTrack {
    fn from(track: TrackResponse) -> Self {
        let mut images = track.album.images;

        // Sort to get the biggest image at the end
        images.sort_by_key(|image| image.width.unwrap_or(0));
        let artwork_url = images.pop().map(|image| image.url);

        let artist = track
            .artists
            .iter()
            .map(|artist| artist.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        Self {
            external_id: track.id,
            title: track.name,
            artist,
            album: Some(track.album.name),
            duration_ms: track.duration_ms,
            artwork_url,
            uri: track.uri,
        }
    }
}
