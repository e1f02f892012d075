//! Compatibility between two listening profiles.
//!
//! The score is a weighted sum of three dimensions (artist overlap, genre
//! match, audio similarity), each a percentage. The breakdown keeps the
//! rounded percentages plus the shared artists and genres for display.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::profile::{Artist, AudioFeatures, GenreCount, ListeningProfile};

const ARTIST_WEIGHT: f64 = 0.4;
const GENRE_WEIGHT: f64 = 0.4;
const AUDIO_WEIGHT: f64 = 0.2;

/// Max number of names listed in `common_artists` and `common_genres`.
pub const MAX_COMMON_ENTRIES: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityDetails {
    pub artist_overlap: u8,
    pub genre_match: u8,
    pub audio_similarity: u8,
    pub common_artists: Vec<String>,
    pub common_genres: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityScore {
    pub total: u8,
    pub details: CompatibilityDetails,
}

fn to_percent(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}

/// Jaccard index of the two artist id sets, as a percentage.
pub fn artist_overlap(a: &[Artist], b: &[Artist]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let ids_a: HashSet<&str> = a.iter().map(|x| x.id.as_str()).collect();
    let ids_b: HashSet<&str> = b.iter().map(|x| x.id.as_str()).collect();

    let shared = ids_a.intersection(&ids_b).count();
    let union = ids_a.union(&ids_b).count();
    shared as f64 / union as f64 * 100.0
}

/// Rewards genres that are dominant for both users, not merely shared.
///
/// Each shared genre contributes the mean of its weight in both histograms,
/// a weight being the genre count relative to that histogram's max count.
/// The sum is divided by the size of the smaller histogram.
pub fn genre_match(a: &[GenreCount], b: &[GenreCount]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let counts_a: HashMap<&str, u32> = a.iter().map(|g| (g.genre.as_str(), g.count)).collect();
    let counts_b: HashMap<&str, u32> = b.iter().map(|g| (g.genre.as_str(), g.count)).collect();

    let max_a = counts_a.values().copied().max().unwrap_or(0);
    let max_b = counts_b.values().copied().max().unwrap_or(0);
    if max_a == 0 || max_b == 0 {
        return 0.0;
    }

    let mut weighted = 0.0;
    let mut shared = 0;
    for (genre, count_a) in &counts_a {
        if let Some(count_b) = counts_b.get(genre) {
            shared += 1;
            let weight_a = *count_a as f64 / max_a as f64;
            let weight_b = *count_b as f64 / max_b as f64;
            weighted += (weight_a + weight_b) / 2.0;
        }
    }
    if shared == 0 {
        return 0.0;
    }

    let best_case = counts_a.len().min(counts_b.len()) as f64;
    weighted / best_case * 100.0
}

/// One minus the mean absolute difference of the five features, as a percentage.
pub fn audio_similarity(a: &AudioFeatures, b: &AudioFeatures) -> f64 {
    let values_a = a.as_array();
    let values_b = b.as_array();
    let total_difference: f64 = values_a
        .iter()
        .zip(values_b.iter())
        .map(|(x, y)| (x - y).abs())
        .sum();
    (1.0 - total_difference / values_a.len() as f64) * 100.0
}

/// Shared artist names, sorted by name then id. Names come from `a`.
pub fn common_artists(a: &[Artist], b: &[Artist]) -> Vec<String> {
    let ids_b: HashSet<&str> = b.iter().map(|x| x.id.as_str()).collect();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut shared: Vec<(&str, &str)> = a
        .iter()
        .filter(|x| ids_b.contains(x.id.as_str()) && seen.insert(x.id.as_str()))
        .map(|x| (x.name.as_str(), x.id.as_str()))
        .collect();
    shared.sort();
    shared
        .into_iter()
        .take(MAX_COMMON_ENTRIES)
        .map(|(name, _)| name.to_string())
        .collect()
}

pub fn common_genres(a: &[GenreCount], b: &[GenreCount]) -> Vec<String> {
    let genres_b: HashSet<&str> = b.iter().map(|g| g.genre.as_str()).collect();
    let mut shared: Vec<&str> = a
        .iter()
        .map(|g| g.genre.as_str())
        .filter(|g| genres_b.contains(g))
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    shared.sort_unstable();
    shared
        .into_iter()
        .take(MAX_COMMON_ENTRIES)
        .map(str::to_string)
        .collect()
}

/// Scores two profiles. Never fails, empty inputs score 0 in their dimension.
///
/// A profile without artists has no defined overlap, so the total is 0
/// whatever the other dimensions say. Sub-scores are still reported.
pub fn score(a: &ListeningProfile, b: &ListeningProfile) -> CompatibilityScore {
    let artists = artist_overlap(&a.top_artists, &b.top_artists);
    let genres = genre_match(&a.top_genres, &b.top_genres);
    let audio = audio_similarity(&a.audio_features, &b.audio_features);

    // Total is rounded once, from the unrounded sub-scores.
    let total = if a.top_artists.is_empty() || b.top_artists.is_empty() {
        0.0
    } else {
        ARTIST_WEIGHT * artists + GENRE_WEIGHT * genres + AUDIO_WEIGHT * audio
    };

    CompatibilityScore {
        total: to_percent(total),
        details: CompatibilityDetails {
            artist_overlap: to_percent(artists),
            genre_match: to_percent(genres),
            audio_similarity: to_percent(audio),
            common_artists: common_artists(&a.top_artists, &b.top_artists),
            common_genres: common_genres(&a.top_genres, &b.top_genres),
        },
    }
}
