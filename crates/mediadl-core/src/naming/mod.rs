//! Output filename derivation for staged downloads.
//!
//! The base is the job title; the extension comes from the first resolved
//! URI's path when it is a known video extension, else [`FALLBACK_EXTENSION`].
//! Same inputs always give the same name.

mod sanitize;

pub use sanitize::{sanitize_base_name, NAME_MAX};

/// Extensions recognised from a URI path.
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mkv", "mp4", "m4v", "avi", "mov", "wmv", "flv", "webm", "mpg", "mpeg", "ts", "m2ts", "ogv",
    "3gp",
];

pub const FALLBACK_EXTENSION: &str = "mkv";

/// Base used when the title sanitizes to nothing.
const DEFAULT_BASE: &str = "download";

/// Known video extension of the last path segment of `uri`, lowercased.
pub fn video_extension_from_uri(uri: &str) -> Option<&'static str> {
    let parsed = url::Url::parse(uri).ok()?;
    let segment = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
    let (_, ext) = segment.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    VIDEO_EXTENSIONS.iter().copied().find(|known| *known == ext)
}

/// `<sanitized title>.<ext>` for a job, e.g. `("Alien: Covenant", ".../a.MP4")`
/// gives `Alien - Covenant.mp4`.
pub fn derive_output_filename(title: &str, first_uri: Option<&str>) -> String {
    let ext = first_uri
        .and_then(video_extension_from_uri)
        .unwrap_or(FALLBACK_EXTENSION);
    let max_base = NAME_MAX - ext.len() - 1;

    let mut base = sanitize_base_name(title, max_base);
    // Titles that already end in the extension would otherwise double it.
    let suffix = format!(".{ext}");
    if base.len() > suffix.len() && base.to_ascii_lowercase().ends_with(&suffix) {
        base.truncate(base.len() - suffix.len());
        base = sanitize_base_name(&base, max_base);
    }
    if base.is_empty() {
        base = DEFAULT_BASE.to_string();
    }
    format!("{base}.{ext}")
}
