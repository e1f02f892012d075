//! Spotify Web API client used as the listening data source.
//!
//! The access token is passed explicitly to each call, nothing is cached here.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use super::normalizer::{
    RawArtist, RawAudioFeatures, RawImage, RawListeningData, RawPlaylist, RawTrack,
};
use super::source::{FetchedListeningData, ProfileSource, ProfileSourceError, SourceAccount};

pub const SPOTIFY_API_BASE: &str = "https://api.spotify.com/v1";

/// The audio-features endpoint accepts at most this many ids per request.
const MAX_AUDIO_FEATURE_IDS: usize = 100;

#[derive(Deserialize)]
struct Paged<T> {
    items: Vec<T>,
}

#[derive(Deserialize)]
struct SpotifyUser {
    id: String,
    display_name: Option<String>,
    email: Option<String>,
    #[serde(default)]
    images: Vec<RawImage>,
}

#[derive(Deserialize)]
struct SpotifyArtist {
    id: String,
    name: String,
    #[serde(default)]
    genres: Vec<String>,
    popularity: Option<i64>,
    #[serde(default)]
    images: Vec<RawImage>,
}

#[derive(Deserialize)]
struct SpotifyArtistRef {
    name: String,
}

#[derive(Deserialize)]
struct SpotifyAlbum {
    name: String,
}

#[derive(Deserialize)]
struct SpotifyTrack {
    id: String,
    name: String,
    #[serde(default)]
    artists: Vec<SpotifyArtistRef>,
    album: Option<SpotifyAlbum>,
    popularity: Option<i64>,
}

#[derive(Deserialize)]
struct SpotifyPlaylistTracks {
    total: u32,
}

#[derive(Deserialize)]
struct SpotifyPlaylist {
    id: String,
    name: String,
    tracks: Option<SpotifyPlaylistTracks>,
}

#[derive(Deserialize)]
struct AudioFeaturesResponse {
    audio_features: Vec<Option<RawAudioFeatures>>,
}

pub struct SpotifyProfileSource {
    client: Client,
    api_base: String,
}

impl SpotifyProfileSource {
    pub fn new(api_base: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        access_token: &str,
        path_and_query: &str,
    ) -> Result<T, ProfileSourceError> {
        let url = format!("{}{}", self.api_base, path_and_query);
        debug!("GET {}", url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!("Spotify request {} failed with status {}", path_and_query, status);
            return Err(ProfileSourceError::Status {
                endpoint: path_and_query.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.json::<T>().await?)
    }

    async fn fetch_audio_features(
        &self,
        access_token: &str,
        track_ids: &[String],
    ) -> Result<Vec<Option<RawAudioFeatures>>, ProfileSourceError> {
        if track_ids.is_empty() {
            return Ok(vec![]);
        }
        let ids = track_ids
            .iter()
            .take(MAX_AUDIO_FEATURE_IDS)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(",");
        let response: AudioFeaturesResponse = self
            .get(access_token, &format!("/audio-features?ids={}", ids))
            .await?;
        Ok(response.audio_features)
    }
}

#[async_trait]
impl ProfileSource for SpotifyProfileSource {
    async fn fetch_listening_data(
        &self,
        access_token: &str,
    ) -> Result<FetchedListeningData, ProfileSourceError> {
        let (user, artists, tracks, playlists) = futures::try_join!(
            self.get::<SpotifyUser>(access_token, "/me"),
            self.get::<Paged<SpotifyArtist>>(
                access_token,
                "/me/top/artists?limit=50&time_range=medium_term"
            ),
            self.get::<Paged<SpotifyTrack>>(
                access_token,
                "/me/top/tracks?limit=50&time_range=medium_term"
            ),
            self.get::<Paged<SpotifyPlaylist>>(access_token, "/me/playlists?limit=50"),
        )?;

        let track_ids: Vec<String> = tracks.items.iter().map(|t| t.id.clone()).collect();
        let audio_features = self.fetch_audio_features(access_token, &track_ids).await?;

        let account = SourceAccount {
            display_name: user.display_name.unwrap_or_else(|| user.id.clone()),
            avatar_url: user.images.first().map(|i| i.url.clone()),
            email: user.email,
            external_id: user.id,
        };

        let data = RawListeningData {
            top_artists: artists
                .items
                .into_iter()
                .map(|a| RawArtist {
                    id: a.id,
                    name: a.name,
                    genres: a.genres,
                    popularity: a.popularity,
                    images: a.images,
                })
                .collect(),
            top_tracks: tracks
                .items
                .into_iter()
                .map(|t| RawTrack {
                    id: t.id,
                    name: t.name,
                    artist_names: t.artists.into_iter().map(|a| a.name).collect(),
                    album_name: t.album.map(|a| a.name),
                    popularity: t.popularity,
                })
                .collect(),
            playlists: playlists
                .items
                .into_iter()
                .map(|p| RawPlaylist {
                    id: p.id,
                    name: p.name,
                    track_count: p.tracks.map(|t| t.total),
                })
                .collect(),
            audio_features,
        };

        Ok(FetchedListeningData { account, data })
    }
}
