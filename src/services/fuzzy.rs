//! Fuzzy scoring for release candidates and track files
//!
//! Scores are integers on a 0-100 scale. The core metric is a token set
//! ratio: both strings are split into word sets and the shared words are
//! compared against each side's leftovers, which makes the score tolerant
//! of word order and of extra words such as edition or format tags.

use std::collections::BTreeSet;

use rapidfuzz::distance::indel;

/// Score thresholds and weights used to accept matches
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchThresholds {
    /// Combined score must be strictly greater than this
    pub combined: f64,
    /// Album axis score must be strictly greater than this
    pub album: u32,
    /// Artist axis score must be strictly greater than this
    pub artist: u32,
    /// Added to a file's score when its leading track number agrees
    pub track_number_bonus: u32,
    /// Weight of the artist axis in the combined score (album gets the rest)
    pub artist_weight: f64,
}

impl Default for MatchThresholds {
    fn default() -> Self {
        Self {
            combined: 70.0,
            album: 60,
            artist: 60,
            track_number_bonus: 15,
            artist_weight: 0.6,
        }
    }
}

/// Lower-case and reduce to alphanumeric words
fn preprocess(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .to_lowercase()
}

/// Plain indel ratio on a 0-100 scale
fn ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 100.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    indel::normalized_similarity(a.chars(), b.chars()) * 100.0
}

fn join_tokens<'a>(tokens: impl Iterator<Item = &'a &'a str>) -> String {
    tokens.copied().collect::<Vec<_>>().join(" ")
}

/// Token set similarity between two strings (0-100).
///
/// Returns 0 if either side has no words. Returns 100 when one side's words
/// are a subset of the other's.
pub fn token_set_ratio(a: &str, b: &str) -> u32 {
    let a = preprocess(a);
    let b = preprocess(b);
    let tokens_a: BTreeSet<&str> = a.split_whitespace().collect();
    let tokens_b: BTreeSet<&str> = b.split_whitespace().collect();

    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0;
    }

    let intersection = join_tokens(tokens_a.intersection(&tokens_b));
    let diff_ab = join_tokens(tokens_a.difference(&tokens_b));
    let diff_ba = join_tokens(tokens_b.difference(&tokens_a));

    if !intersection.is_empty() && (diff_ab.is_empty() || diff_ba.is_empty()) {
        return 100;
    }

    let combined_ab = format!("{} {}", intersection, diff_ab).trim().to_string();
    let combined_ba = format!("{} {}", intersection, diff_ba).trim().to_string();

    let best = ratio(&intersection, &combined_ab)
        .max(ratio(&intersection, &combined_ba))
        .max(ratio(&combined_ab, &combined_ba));

    best.round() as u32
}

/// Scores of one indexer candidate against a release
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateScore {
    /// Weighted artist/album score, or the single available axis
    pub combined: f64,
    /// `None` when the release has no artist to compare against
    pub artist: Option<u32>,
    pub album: u32,
}

impl CandidateScore {
    /// Build a score from its axes, weighting artist by `artist_weight`
    pub fn from_axes(artist: Option<u32>, album: u32, thresholds: &MatchThresholds) -> Self {
        let combined = match artist {
            Some(artist) => {
                artist as f64 * thresholds.artist_weight
                    + album as f64 * (1.0 - thresholds.artist_weight)
            }
            None => album as f64,
        };
        Self {
            combined,
            artist,
            album,
        }
    }

    /// Whether the candidate passes every acceptance threshold
    pub fn is_accepted(&self, thresholds: &MatchThresholds) -> bool {
        if let Some(artist) = self.artist {
            // zero artist overlap is never a match, whatever the title says
            if artist == 0 || artist <= thresholds.artist {
                return false;
            }
        }
        self.combined > thresholds.combined && self.album > thresholds.album
    }
}

/// Score a candidate title against a release's artist and album.
///
/// The candidate title is expected to be sanitized already. A blank
/// artist drops the artist axis and the album score is used directly.
pub fn score_candidate(
    artist: &str,
    album: &str,
    candidate_title: &str,
    thresholds: &MatchThresholds,
) -> CandidateScore {
    let artist_score = if artist.trim().is_empty() {
        None
    } else {
        Some(token_set_ratio(artist, candidate_title))
    };
    let album_score = token_set_ratio(album, candidate_title);
    CandidateScore::from_axes(artist_score, album_score, thresholds)
}
