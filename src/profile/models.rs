//! Canonical listening profile models

use serde::{Deserialize, Serialize};

pub const MAX_TOP_ARTISTS: usize = 50;
pub const MAX_TOP_GENRES: usize = 20;
pub const MAX_TOP_TRACKS: usize = 50;
pub const MAX_PLAYLISTS: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub popularity: u8,
}

/// One entry of a genre histogram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenreCount {
    pub genre: String,
    pub count: u32,
}

/// Averages over a user's top tracks, each in [0, 1].
///
/// Missing values deserialize to 0, which is also the "no signal" state.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioFeatures {
    pub danceability: f64,
    pub energy: f64,
    pub valence: f64,
    pub acousticness: f64,
    pub instrumentalness: f64,
}

impl AudioFeatures {
    pub fn as_array(&self) -> [f64; 5] {
        [
            self.danceability,
            self.energy,
            self.valence,
            self.acousticness,
            self.instrumentalness,
        ]
    }

    pub fn uniform(value: f64) -> Self {
        Self {
            danceability: value,
            energy: value,
            valence: value,
            acousticness: value,
            instrumentalness: value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artist_names: Vec<String>,
    #[serde(default)]
    pub album_name: Option<String>,
    #[serde(default)]
    pub popularity: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub track_count: u32,
}

/// Per-user summary of music taste, as consumed by the compatibility scorer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ListeningProfile {
    #[serde(default)]
    pub top_artists: Vec<Artist>,
    #[serde(default)]
    pub top_genres: Vec<GenreCount>,
    #[serde(default)]
    pub audio_features: AudioFeatures,
    #[serde(default)]
    pub top_tracks: Vec<TrackSummary>,
    #[serde(default)]
    pub playlists: Vec<PlaylistSummary>,
}

impl ListeningProfile {
    pub fn is_empty(&self) -> bool {
        self.top_artists.is_empty() && self.top_genres.is_empty()
    }
}
