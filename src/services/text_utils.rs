//! Shared text normalization utilities
//!
//! Titles coming from indexers, audio tags and filenames are noisy. These
//! helpers bring them into a comparable shape before fuzzy scoring, and
//! turn catalog names into folder names that are safe on disk.

use once_cell::sync::Lazy;
use regex::Regex;

/// Tokens that show up in release titles but say nothing about the music.
const NOISE_WORDS: &[&str] = &["flac", "mp3", "pmedia", "vinyl", "cd", "album"];

/// Delimiter used in place of spaces in folder names.
pub const FOLDER_DELIMITER: char = '%';

/// Folder component used when a name sanitizes down to nothing.
pub const UNKNOWN_COMPONENT: &str = "UNKNOWN";

static SQUARE_BRACKETS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[[^\]]*\]").expect("static regex"));
static PARENTHESES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\([^\)]*\)").expect("static regex"));
static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").expect("static regex"));
static OTHER_SYMBOLS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\p{So}+").expect("static regex"));
static NOISE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\b(?:{})\b", NOISE_WORDS.join("|"))).expect("static regex")
});
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));
static QUERY_PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[-'()\[\]]").expect("static regex"));
static FOLDER_ILLEGAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9%\(\)\[\]\-_.]").expect("static regex"));
static DELIMITER_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"%+").expect("static regex"));

/// Collapse whitespace runs to a single space and trim.
fn collapse_whitespace(s: &str) -> String {
    WHITESPACE.replace_all(s, " ").trim().to_string()
}

/// Normalize a free-text title for token comparison.
///
/// Removes `[...]` and `(...)` spans, punctuation, "other symbol" characters
/// (emoji, dingbats) and the noise vocabulary, then collapses whitespace.
/// Case is preserved; scoring lower-cases on its own.
///
/// # Example
/// ```ignore
/// assert_eq!(sanitize_title("Artist (Deluxe) [2020] FLAC"), "Artist");
/// ```
pub fn sanitize_title(title: &str) -> String {
    let s = SQUARE_BRACKETS.replace_all(title, "");
    let s = PARENTHESES.replace_all(&s, "");
    let s = NON_WORD.replace_all(&s, "");
    let s = OTHER_SYMBOLS.replace_all(&s, "");
    let s = NOISE.replace_all(&s, "");
    collapse_whitespace(&s)
}

/// Prepare a query variant for the indexer search box.
///
/// Dashes, apostrophes and brackets confuse most indexer search engines,
/// so they become spaces.
pub fn sanitize_query(query: &str) -> String {
    let s = QUERY_PUNCTUATION.replace_all(query, " ");
    collapse_whitespace(&s)
}

/// Turn a candidate's display title into the download folder name handed
/// to the torrent client.
///
/// Spaces become the delimiter, anything outside a small ASCII allow-list is
/// dropped and repeated delimiters are collapsed. Blank input yields an
/// empty string, meaning "let the client pick".
pub fn sanitize_folder_name(name: &str) -> String {
    if name.trim().is_empty() {
        return String::new();
    }

    let s = name.replace(' ', &FOLDER_DELIMITER.to_string());
    let s = FOLDER_ILLEGAL.replace_all(&s, "");
    DELIMITER_RUNS
        .replace_all(&s, FOLDER_DELIMITER.to_string().as_str())
        .to_string()
}

/// Turn an artist or album name into one component of the library layout.
///
/// Upper-cased, spaces replaced by the delimiter, characters that are
/// illegal in file names removed, delimiter runs collapsed and trimmed from
/// both ends. Never returns an empty string or a path separator.
pub fn library_component(name: &str) -> String {
    let upper = name.trim().to_uppercase().replace(' ', &FOLDER_DELIMITER.to_string());
    let cleaned = sanitize_filename::sanitize_with_options(
        upper,
        sanitize_filename::Options {
            windows: true,
            truncate: true,
            replacement: "",
        },
    );
    let collapsed = DELIMITER_RUNS.replace_all(&cleaned, FOLDER_DELIMITER.to_string().as_str());
    let trimmed = collapsed.trim_matches(FOLDER_DELIMITER);

    // "." and ".." are legal file names but not usable as folders here
    if trimmed.is_empty() || trimmed.chars().all(|c| c == '.') {
        UNKNOWN_COMPONENT.to_string()
    } else {
        trimmed.to_string()
    }
}
