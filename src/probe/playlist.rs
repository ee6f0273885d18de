//! Structural validation of HLS playlists
//!
//! Mirrors that lost a channel often answer 200 with an HTML error page or an
//! empty body. A playlist only counts when it starts with `#EXTM3U` and lists
//! at least one media entry.

use url::Url;

use crate::utils::error::ProbeError;
use crate::utils::strip_query;

/// Header every M3U playlist starts with
pub const PLAYLIST_HEADER: &str = "#EXTM3U";

const MEDIA_EXTENSIONS: &[&str] = &[".m3u8", ".ts", ".aac", ".m4s", ".mp4"];

/// Check the playlist header and the presence of media entries
pub fn validate_playlist(body: &str) -> Result<(), ProbeError> {
    let trimmed = body.trim_start_matches('\u{feff}').trim_start();
    if !trimmed.starts_with(PLAYLIST_HEADER) {
        return Err(ProbeError::InvalidPayload(format!(
            "missing {PLAYLIST_HEADER} header"
        )));
    }

    if media_entries(trimmed).next().is_none() {
        return Err(ProbeError::InvalidPayload(
            "playlist lists no media entries".to_string(),
        ));
    }

    Ok(())
}

/// Non-comment lines that reference media
pub fn media_entries(body: &str) -> impl Iterator<Item = &str> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter(|line| {
            let path = strip_query(line).to_ascii_lowercase();
            MEDIA_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
        })
}

/// Resolve the first media entry against the playlist URL
pub fn first_segment_url(playlist_url: &str, body: &str) -> Result<Option<String>, ProbeError> {
    let Some(entry) = media_entries(body).next() else {
        return Ok(None);
    };

    let base = Url::parse(playlist_url).map_err(|e| ProbeError::InvalidUrl(e.to_string()))?;
    let resolved = base
        .join(entry)
        .map_err(|e| ProbeError::InvalidUrl(format!("{entry}: {e}")))?;

    Ok(Some(resolved.to_string()))
}
