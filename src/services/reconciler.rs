//! File reconciler
//!
//! Maps the audio files of a finished download onto a release's canonical
//! track list. Tracks are processed in ascending position order and each one
//! takes the best-scoring file still in the pool. Assignment is greedy: a
//! file claimed by an earlier track is never reconsidered for a later one,
//! even if the later track would have fit it better.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use super::catalog::{Catalog, CatalogTrack};
use super::fuzzy::{MatchThresholds, token_set_ratio};
use super::text_utils::sanitize_title;

/// Audio file extensions considered during reconciliation (lower-case)
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "wav", "aac", "ogg", "m4a", "alac", "wma"];

/// File name recorded for a track no file matched
pub const UNMATCHED_FILE_NAME: &str = "<NO MATCH>";

/// Leading track number followed by a separator, e.g. "01 - ", "1.", "07_"
static LEADING_TRACK_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d{1,3})(?:\s*[-._)]+\s*|\s+)(.*)$").expect("static regex")
});

/// An audio file found in a download directory
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFile {
    pub file_name: String,
    pub path: PathBuf,
    /// Title tag, if the file has a readable one
    pub tag_title: Option<String>,
}

/// Result of matching one canonical track
#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    /// Source file name, or [`UNMATCHED_FILE_NAME`]
    pub file_name: String,
    /// Source path; empty when unmatched
    pub path: PathBuf,
    pub track: CatalogTrack,
    pub score: u32,
}

impl MatchOutcome {
    fn unmatched(track: CatalogTrack) -> Self {
        Self {
            file_name: UNMATCHED_FILE_NAME.to_string(),
            path: PathBuf::new(),
            track,
            score: 0,
        }
    }

    pub fn is_matched(&self) -> bool {
        self.score > 0 && !self.path.as_os_str().is_empty()
    }
}

/// Check whether a path has an allowed audio extension (case-insensitive)
pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| AUDIO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Read the title tag of an audio file using lofty
pub fn read_title_tag(path: &Path) -> Option<String> {
    use lofty::prelude::*;
    use lofty::probe::Probe;

    let tagged_file = Probe::open(path).ok()?.read().ok()?;
    let tag = tagged_file.primary_tag().or_else(|| tagged_file.first_tag())?;
    tag.title()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Recursively collect audio files under `dir`, sorted by path.
/// A missing directory yields no files.
pub fn find_audio_files(dir: &Path) -> Vec<AudioFile> {
    if !dir.is_dir() {
        debug!(path = %dir.display(), "Download directory does not exist");
        return Vec::new();
    }

    let mut files: Vec<AudioFile> = WalkDir::new(dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "Skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && is_audio_file(entry.path()))
        .map(|entry| AudioFile {
            file_name: entry.file_name().to_string_lossy().to_string(),
            tag_title: read_title_tag(entry.path()),
            path: entry.into_path(),
        })
        .collect();

    files.sort_by(|a, b| a.path.cmp(&b.path));
    files
}

/// Split "01 - Title" into (1, "Title")
pub fn parse_leading_track_number(stem: &str) -> Option<(u32, String)> {
    let captures = LEADING_TRACK_NUMBER.captures(stem)?;
    let number = captures.get(1)?.as_str().parse().ok()?;
    let rest = captures.get(2).map(|m| m.as_str()).unwrap_or("").to_string();
    Some((number, rest))
}

/// Score one file against one track.
///
/// A title tag wins when present. Otherwise the file name is used; a leading
/// track number equal to the track's position adds the configured bonus,
/// but only on top of a non-zero title score.
pub fn score_file(file: &AudioFile, track: &CatalogTrack, thresholds: &MatchThresholds) -> u32 {
    let target = sanitize_title(&track.title);

    if let Some(tag_title) = &file.tag_title {
        return token_set_ratio(&sanitize_title(tag_title), &target);
    }

    let stem = Path::new(&file.file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    match parse_leading_track_number(&stem) {
        Some((number, rest)) => {
            let score = token_set_ratio(&sanitize_title(&rest), &target);
            if score > 0 && number == track.position {
                score + thresholds.track_number_bonus
            } else {
                score
            }
        }
        None => token_set_ratio(&sanitize_title(&stem), &target),
    }
}

/// Greedily assign files to tracks in ascending position order.
///
/// Returns one outcome per track, in position order. Ties go to the file
/// that sorts first.
pub fn match_files(
    tracks: &[CatalogTrack],
    files: Vec<AudioFile>,
    thresholds: &MatchThresholds,
) -> Vec<MatchOutcome> {
    let mut ordered: Vec<&CatalogTrack> = tracks.iter().collect();
    ordered.sort_by_key(|t| t.position);

    let mut pool = files;
    let mut outcomes = Vec::with_capacity(ordered.len());

    for track in ordered {
        let mut best: Option<(usize, u32)> = None;
        for (idx, file) in pool.iter().enumerate() {
            let score = score_file(file, track, thresholds);
            if score > best.map(|(_, s)| s).unwrap_or(0) {
                best = Some((idx, score));
            }
        }

        match best {
            Some((idx, score)) => {
                let file = pool.remove(idx);
                debug!(
                    position = track.position,
                    track = %track.title,
                    file = %file.file_name,
                    score,
                    "Matched track to file"
                );
                outcomes.push(MatchOutcome {
                    file_name: file.file_name,
                    path: file.path,
                    track: track.clone(),
                    score,
                });
            }
            None => {
                debug!(position = track.position, track = %track.title, "No file matched track");
                outcomes.push(MatchOutcome::unmatched(track.clone()));
            }
        }
    }

    outcomes
}

/// Matches a completed download's files against the catalog
pub struct FileReconciler {
    catalog: Arc<dyn Catalog>,
    thresholds: MatchThresholds,
}

impl FileReconciler {
    pub fn new(catalog: Arc<dyn Catalog>, thresholds: MatchThresholds) -> Self {
        Self {
            catalog,
            thresholds,
        }
    }

    /// Match the audio files under `dir` to the tracks of `release_id`
    pub async fn reconcile(&self, release_id: Uuid, dir: &Path) -> Result<Vec<MatchOutcome>> {
        let tracks = self
            .catalog
            .release_tracks(release_id)
            .await
            .with_context(|| format!("Failed to load track list for release {}", release_id))?;

        let scan_dir = dir.to_path_buf();
        let files = tokio::task::spawn_blocking(move || find_audio_files(&scan_dir))
            .await
            .context("Audio file scan task panicked")?;

        let file_count = files.len();
        let outcomes = match_files(&tracks, files, &self.thresholds);
        let matched = outcomes.iter().filter(|o| o.is_matched()).count();

        info!(
            release_id = %release_id,
            path = %dir.display(),
            tracks = tracks.len(),
            files = file_count,
            matched,
            "Reconciled download against track list"
        );

        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn track(position: u32, title: &str) -> CatalogTrack {
        CatalogTrack {
            recording_id: Uuid::new_v4(),
            title: title.to_string(),
            position,
            artist: "Artist".to_string(),
            album: "Album".to_string(),
            cover_url: None,
        }
    }

    fn file(name: &str) -> AudioFile {
        AudioFile {
            file_name: name.to_string(),
            path: PathBuf::from("/downloads/album").join(name),
            tag_title: None,
        }
    }

    #[test]
    fn test_parse_leading_track_number() {
        assert_eq!(
            parse_leading_track_number("01 - Come Together"),
            Some((1, "Come Together".to_string()))
        );
        assert_eq!(
            parse_leading_track_number("07_Here_Comes_The_Sun"),
            Some((7, "Here_Comes_The_Sun".to_string()))
        );
        assert_eq!(parse_leading_track_number("3. Something"), Some((3, "Something".to_string())));
        assert_eq!(parse_leading_track_number("1979"), None);
        assert_eq!(parse_leading_track_number("Come Together"), None);
    }

    #[test]
    fn test_is_audio_file() {
        assert!(is_audio_file(Path::new("a/01.FLAC")));
        assert!(is_audio_file(Path::new("b.m4a")));
        assert!(!is_audio_file(Path::new("cover.jpg")));
        assert!(!is_audio_file(Path::new("notes")));
    }

    #[test]
    fn test_score_file_prefers_tag_title() {
        let t = MatchThresholds::default();
        let mut f = file("01 - Track01.mp3");
        f.tag_title = Some("Come Together".to_string());
        assert_eq!(score_file(&f, &track(1, "Come Together"), &t), 100);
    }

    #[test]
    fn test_score_file_track_number_bonus() {
        let t = MatchThresholds::default();
        let f = file("02 - Something.flac");
        assert_eq!(score_file(&f, &track(2, "Something"), &t), 115);
        assert_eq!(score_file(&f, &track(3, "Something"), &t), 100);
    }

    #[test]
    fn test_bonus_needs_title_overlap() {
        let t = MatchThresholds::default();
        let f = file("02 - xyz.flac");
        assert_eq!(score_file(&f, &track(2, "Qqq"), &t), 0);
    }

    #[test]
    fn test_greedy_assignment_follows_position_order() {
        // Sum-optimal would give track 1 "Moon River" and track 2 "Blue Moon";
        // greedy lets track 1 keep its best file.
        let t = MatchThresholds::default();
        let tracks = vec![track(2, "Blue Moon"), track(1, "Moon")];
        let files = vec![file("01 Blue Moon.mp3"), file("02 Moon River.mp3")];

        let outcomes = match_files(&tracks, files, &t);

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].track.position, 1);
        assert_eq!(outcomes[0].file_name, "01 Blue Moon.mp3");
        assert_eq!(outcomes[0].score, 115);
        assert_eq!(outcomes[1].track.position, 2);
        assert_eq!(outcomes[1].file_name, "02 Moon River.mp3");
        assert!(outcomes[1].score < 100);
    }

    #[test]
    fn test_unmatched_track_gets_sentinel() {
        let t = MatchThresholds::default();
        let tracks = vec![track(1, "Come Together"), track(2, "Something")];
        let files = vec![file("01 - Come Together.mp3")];

        let outcomes = match_files(&tracks, files, &t);

        assert!(outcomes[0].is_matched());
        assert_eq!(outcomes[1].file_name, UNMATCHED_FILE_NAME);
        assert_eq!(outcomes[1].path, PathBuf::new());
        assert_eq!(outcomes[1].score, 0);
        assert!(!outcomes[1].is_matched());
    }

    #[test]
    fn test_find_audio_files_missing_dir() {
        assert!(find_audio_files(Path::new("/definitely/not/here")).is_empty());
    }

    #[test]
    fn test_find_audio_files_recurses_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("CD2")).unwrap();
        std::fs::write(dir.path().join("01 - One.mp3"), b"not really audio").unwrap();
        std::fs::write(dir.path().join("CD2").join("01 - Two.FLAC"), b"nope").unwrap();
        std::fs::write(dir.path().join("cover.jpg"), b"jpg").unwrap();

        let files = find_audio_files(dir.path());
        let names: Vec<_> = files.iter().map(|f| f.file_name.as_str()).collect();
        assert_eq!(names, vec!["01 - One.mp3", "01 - Two.FLAC"]);
        assert!(files.iter().all(|f| f.tag_title.is_none()));
    }
}
