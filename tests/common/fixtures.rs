//! Listening data payloads used across tests

use ibeshi_server::profile::normalizer::{
    RawArtist, RawAudioFeatures, RawListeningData, RawPlaylist, RawTrack,
};
use serde_json::{json, Value};

/// Raw payload for `PUT /v1/profile`: one artist per id, all tagged with
/// `genres`, and one track whose audio features are all `audio`.
pub fn raw_profile(artist_ids: &[&str], genres: &[&str], audio: f64) -> Value {
    let artists: Vec<Value> = artist_ids
        .iter()
        .map(|id| {
            json!({
                "id": id,
                "name": format!("Artist {}", id),
                "genres": genres,
                "popularity": 60,
            })
        })
        .collect();
    json!({
        "top_artists": artists,
        "top_tracks": [{ "id": "t1", "name": "Track One", "artist_names": ["Artist"] }],
        "playlists": [{ "id": "p1", "name": "Favourites", "track_count": 12 }],
        "audio_features": [{
            "danceability": audio,
            "energy": audio,
            "valence": audio,
            "acousticness": audio,
            "instrumentalness": audio,
        }],
    })
}

/// What the stub source returns for the valid token.
pub fn stub_listening_data() -> RawListeningData {
    RawListeningData {
        top_artists: vec![
            RawArtist {
                id: "4Z8W4fKeB5YxbusRsdQVPb".to_string(),
                name: "Radiohead".to_string(),
                genres: vec!["alternative rock".to_string(), "art rock".to_string()],
                popularity: Some(80),
                images: vec![],
            },
            RawArtist {
                id: "0oSGxfWSnnOXhD2fKuz2Gy".to_string(),
                name: "David Bowie".to_string(),
                genres: vec!["art rock".to_string(), "glam rock".to_string()],
                popularity: Some(77),
                images: vec![],
            },
        ],
        top_tracks: vec![RawTrack {
            id: "6LgJvl0Xdtc73RJ1mmpotq".to_string(),
            name: "Reckoner".to_string(),
            artist_names: vec!["Radiohead".to_string()],
            album_name: Some("In Rainbows".to_string()),
            popularity: Some(70),
        }],
        playlists: vec![RawPlaylist {
            id: "37i9dQZF1DXcBWIGoYBM5M".to_string(),
            name: "Road trip".to_string(),
            track_count: Some(40),
        }],
        audio_features: vec![
            Some(RawAudioFeatures {
                danceability: 0.4,
                energy: 0.6,
                valence: 0.2,
                acousticness: 0.3,
                instrumentalness: 0.5,
            }),
            None,
        ],
    }
}
