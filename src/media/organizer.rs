//! Library placer
//!
//! Moves reconciled files into the library under
//! `<root>/<ARTIST>/<ALBUM>/<recording-id>.<ext>`. Artist and album are
//! normalised with [`library_component`], so every release by the same
//! artist lands in the same folder regardless of how the download was named.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::services::catalog::CatalogTrack;
use crate::services::reconciler::{MatchOutcome, is_audio_file};
use crate::services::text_utils::library_component;

/// `<ARTIST>/<ALBUM>` relative to the library root
pub fn relative_folder(track: &CatalogTrack) -> PathBuf {
    PathBuf::from(library_component(&track.artist)).join(library_component(&track.album))
}

/// Final library path of `source` once placed as `track`. The source
/// extension is kept as-is.
pub fn destination_path(library_root: &Path, track: &CatalogTrack, source: &Path) -> PathBuf {
    let file_name = match source.extension().and_then(|e| e.to_str()) {
        Some(ext) if !ext.is_empty() => format!("{}.{}", track.recording_id, ext),
        _ => track.recording_id.to_string(),
    };
    library_root.join(relative_folder(track)).join(file_name)
}

/// Find the placed file of a recording, whatever its extension
pub fn locate_recording(library_root: &Path, track: &CatalogTrack) -> Option<PathBuf> {
    let folder = library_root.join(relative_folder(track));
    let stem = track.recording_id.to_string();

    let mut found: Vec<PathBuf> = std::fs::read_dir(&folder)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path.file_stem().and_then(|s| s.to_str()) == Some(stem.as_str())
                && is_audio_file(path)
        })
        .collect();
    found.sort();
    found.into_iter().next()
}

/// Counts from one placement pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PlacementSummary {
    pub placed: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct LibraryPlacer {
    library_root: PathBuf,
}

impl LibraryPlacer {
    pub fn new(library_root: impl Into<PathBuf>) -> Self {
        Self {
            library_root: library_root.into(),
        }
    }

    pub fn library_root(&self) -> &Path {
        &self.library_root
    }

    /// Move every matched file into the library. Failures are logged per
    /// file and never stop the rest of the batch.
    pub async fn place(&self, outcomes: &[MatchOutcome]) -> PlacementSummary {
        let mut summary = PlacementSummary::default();

        for outcome in outcomes {
            if !outcome.is_matched() {
                debug!(
                    position = outcome.track.position,
                    track = %outcome.track.title,
                    "Skipping unmatched track"
                );
                summary.skipped += 1;
                continue;
            }

            let dest = destination_path(&self.library_root, &outcome.track, &outcome.path);
            match move_file(&outcome.path, &dest).await {
                Ok(()) => {
                    debug!(
                        source = %outcome.path.display(),
                        dest = %dest.display(),
                        recording_id = %outcome.track.recording_id,
                        "Placed file in library"
                    );
                    summary.placed += 1;
                }
                Err(e) => {
                    error!(
                        source = %outcome.path.display(),
                        dest = %dest.display(),
                        error = %e,
                        "Failed to place file in library"
                    );
                    summary.failed += 1;
                }
            }
        }

        info!(
            placed = summary.placed,
            skipped = summary.skipped,
            failed = summary.failed,
            "Library placement finished"
        );
        summary
    }
}

/// Move a file, creating parent directories and replacing any existing
/// destination
async fn move_file(source: &Path, dest: &Path) -> io::Result<()> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    if tokio::fs::try_exists(dest).await.unwrap_or(false) {
        tokio::fs::remove_file(dest).await?;
    }

    // Rename only works within one filesystem; downloads often live elsewhere
    match tokio::fs::rename(source, dest).await {
        Ok(()) => Ok(()),
        Err(e) => {
            warn!(
                source = %source.display(),
                error = %e,
                "Rename failed, falling back to copy"
            );
            tokio::fs::copy(source, dest).await?;
            tokio::fs::remove_file(source).await?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn track(position: u32, title: &str) -> CatalogTrack {
        CatalogTrack {
            recording_id: Uuid::new_v4(),
            title: title.to_string(),
            position,
            artist: "Sigur Rós".to_string(),
            album: "( )".to_string(),
            cover_url: None,
        }
    }

    fn outcome(track: CatalogTrack, path: PathBuf, score: u32) -> MatchOutcome {
        MatchOutcome {
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            path,
            track,
            score,
        }
    }

    #[test]
    fn test_destination_path() {
        let t = track(1, "Untitled 1");
        let dest = destination_path(Path::new("/music"), &t, Path::new("/dl/01 Untitled.flac"));
        assert_eq!(
            dest,
            PathBuf::from(format!("/music/SIGUR%RÓS/(%)/{}.flac", t.recording_id))
        );
    }

    #[tokio::test]
    async fn test_place_moves_matched_files() {
        let downloads = TempDir::new().unwrap();
        let library = TempDir::new().unwrap();

        let src = downloads.path().join("01 Untitled.flac");
        tokio::fs::write(&src, b"audio").await.unwrap();
        let t = track(1, "Untitled 1");

        let placer = LibraryPlacer::new(library.path());
        let summary = placer.place(&[outcome(t.clone(), src.clone(), 100)]).await;

        assert_eq!(summary.placed, 1);
        assert!(!src.exists());
        let dest = destination_path(library.path(), &t, &src);
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), b"audio");
        assert_eq!(locate_recording(library.path(), &t), Some(dest));
    }

    #[tokio::test]
    async fn test_place_overwrites_existing_file() {
        let downloads = TempDir::new().unwrap();
        let library = TempDir::new().unwrap();
        let t = track(2, "Untitled 2");

        let src = downloads.path().join("02.mp3");
        tokio::fs::write(&src, b"new").await.unwrap();
        let dest = destination_path(library.path(), &t, &src);
        tokio::fs::create_dir_all(dest.parent().unwrap()).await.unwrap();
        tokio::fs::write(&dest, b"old").await.unwrap();

        let summary = LibraryPlacer::new(library.path())
            .place(&[outcome(t, src, 90)])
            .await;

        assert_eq!(summary.placed, 1);
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_place_skips_unmatched_and_continues_after_errors() {
        let downloads = TempDir::new().unwrap();
        let library = TempDir::new().unwrap();

        let missing = outcome(track(1, "Gone"), downloads.path().join("gone.mp3"), 80);
        let zero = outcome(track(2, "Zero"), downloads.path().join("zero.mp3"), 0);
        let empty = outcome(track(3, "Empty"), PathBuf::new(), 50);

        let src = downloads.path().join("04 Ok.ogg");
        tokio::fs::write(&src, b"ok").await.unwrap();
        let ok_track = track(4, "Ok");
        let ok = outcome(ok_track.clone(), src, 100);

        let summary = LibraryPlacer::new(library.path())
            .place(&[missing, zero, empty, ok])
            .await;

        assert_eq!(
            summary,
            PlacementSummary {
                placed: 1,
                skipped: 2,
                failed: 1
            }
        );
        assert!(locate_recording(library.path(), &ok_track).is_some());
    }

    #[test]
    fn test_locate_recording_missing_folder() {
        let library = TempDir::new().unwrap();
        assert_eq!(locate_recording(library.path(), &track(1, "X")), None);
    }
}
