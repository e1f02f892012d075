//! Turns raw listening data from a music service into a [`ListeningProfile`].

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::models::{
    Artist, AudioFeatures, GenreCount, ListeningProfile, PlaylistSummary, TrackSummary,
    MAX_PLAYLISTS, MAX_TOP_ARTISTS, MAX_TOP_GENRES, MAX_TOP_TRACKS,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawImage {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawArtist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub popularity: Option<i64>,
    #[serde(default)]
    pub images: Vec<RawImage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTrack {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artist_names: Vec<String>,
    #[serde(default)]
    pub album_name: Option<String>,
    #[serde(default)]
    pub popularity: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPlaylist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub track_count: Option<u32>,
}

/// One per-track audio analysis sample.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RawAudioFeatures {
    pub danceability: f64,
    pub energy: f64,
    pub valence: f64,
    pub acousticness: f64,
    pub instrumentalness: f64,
}

/// Everything fetched from the music service for one user.
///
/// `audio_features` entries are `None` for tracks the service could not analyse.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawListeningData {
    pub top_artists: Vec<RawArtist>,
    pub top_tracks: Vec<RawTrack>,
    pub playlists: Vec<RawPlaylist>,
    pub audio_features: Vec<Option<RawAudioFeatures>>,
}

fn clamp_popularity(value: Option<i64>) -> u8 {
    value.unwrap_or(0).clamp(0, 100) as u8
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Tallies one occurrence per (artist, genre) pair and keeps the
/// [`MAX_TOP_GENRES`] most frequent genres. Equal counts keep first-seen order.
pub fn extract_top_genres(artists: &[Artist]) -> Vec<GenreCount> {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut tally: Vec<GenreCount> = Vec::new();

    for artist in artists {
        let mut seen_for_artist: HashSet<&str> = HashSet::new();
        for genre in &artist.genres {
            if !seen_for_artist.insert(genre.as_str()) {
                continue;
            }
            match positions.get(genre.as_str()) {
                Some(&position) => tally[position].count += 1,
                None => {
                    positions.insert(genre.as_str(), tally.len());
                    tally.push(GenreCount {
                        genre: genre.clone(),
                        count: 1,
                    });
                }
            }
        }
    }

    // sort_by is stable, ties stay in first-seen order
    tally.sort_by(|a, b| b.count.cmp(&a.count));
    tally.truncate(MAX_TOP_GENRES);
    tally
}

/// Arithmetic mean of each feature over the resolved samples.
/// With no resolved samples every average is 0.
pub fn average_audio_features(samples: &[Option<RawAudioFeatures>]) -> AudioFeatures {
    let resolved: Vec<&RawAudioFeatures> = samples.iter().flatten().collect();
    if resolved.is_empty() {
        return AudioFeatures::default();
    }

    let n = resolved.len() as f64;
    let mean = |pick: fn(&RawAudioFeatures) -> f64| {
        clamp_unit(resolved.iter().map(|s| pick(s)).sum::<f64>() / n)
    };

    AudioFeatures {
        danceability: mean(|s| s.danceability),
        energy: mean(|s| s.energy),
        valence: mean(|s| s.valence),
        acousticness: mean(|s| s.acousticness),
        instrumentalness: mean(|s| s.instrumentalness),
    }
}

pub fn normalize(raw: &RawListeningData) -> ListeningProfile {
    let top_artists: Vec<Artist> = raw
        .top_artists
        .iter()
        .take(MAX_TOP_ARTISTS)
        .map(|a| Artist {
            id: a.id.clone(),
            name: a.name.clone(),
            genres: a.genres.clone(),
            popularity: clamp_popularity(a.popularity),
        })
        .collect();

    let top_genres = extract_top_genres(&top_artists);

    let top_tracks = raw
        .top_tracks
        .iter()
        .take(MAX_TOP_TRACKS)
        .map(|t| TrackSummary {
            id: t.id.clone(),
            name: t.name.clone(),
            artist_names: t.artist_names.clone(),
            album_name: t.album_name.clone(),
            popularity: clamp_popularity(t.popularity),
        })
        .collect();

    let playlists = raw
        .playlists
        .iter()
        .take(MAX_PLAYLISTS)
        .map(|p| PlaylistSummary {
            id: p.id.clone(),
            name: p.name.clone(),
            track_count: p.track_count.unwrap_or(0),
        })
        .collect();

    ListeningProfile {
        top_artists,
        top_genres,
        audio_features: average_audio_features(&raw.audio_features),
        top_tracks,
        playlists,
    }
}
