//! Listening profiles: models, normalization and the external data source.

pub mod models;
pub mod normalizer;
mod source;
pub mod spotify;

pub use models::{
    Artist, AudioFeatures, GenreCount, ListeningProfile, PlaylistSummary, TrackSummary,
};
pub use normalizer::{normalize, RawListeningData};
pub use source::{FetchedListeningData, ProfileSource, ProfileSourceError, SourceAccount};
pub use spotify::{SpotifyProfileSource, SPOTIFY_API_BASE};
