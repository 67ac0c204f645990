use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

lazy_static! {
    /// The recognized URL shapes, tried in order. Each captures the raw id
    /// up to the first query/fragment delimiter.
    static ref URL_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"youtube\.com/watch\?.*v=([^&#?/\s]+)").unwrap(),
        Regex::new(r"youtu\.be/([^&#?/\s]+)").unwrap(),
        Regex::new(r"youtube\.com/embed/([^&#?/\s]+)").unwrap(),
        Regex::new(r"youtube\.com/v/([^&#?/\s]+)").unwrap(),
    ];
    static ref ID_SHAPE: Regex = Regex::new(r"^[A-Za-z0-9_-]{11}$").unwrap();
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VideoError {
    #[error("Not a recognized YouTube URL")]
    UnrecognizedUrl,
    #[error("Invalid video ID: {0}")]
    InvalidId(String),
    #[error("Title lookup failed")]
    LookupFailed,
}

/// Extracts a normalized video id from a URL, stripping trailing
/// query-parameter and fragment noise.
pub fn extract_video_id(url: &str) -> Result<String, VideoError> {
    let raw = URL_PATTERNS
        .iter()
        .find_map(|pattern| pattern.captures(url))
        .and_then(|captures| captures.get(1))
        .ok_or(VideoError::UnrecognizedUrl)?
        .as_str();

    // Anything past a delimiter the capture may have swallowed
    let id = raw
        .split(['&', '#', '?'])
        .next()
        .unwrap_or_default()
        .to_string();

    if !ID_SHAPE.is_match(&id) {
        return Err(VideoError::InvalidId(id));
    }

    Ok(id)
}

#[derive(Debug, Deserialize)]
struct OEmbedResponse {
    title: String,
}

/// Resolves a video id to its display title through the oEmbed endpoint.
/// Best-effort: callers fall back to a placeholder on failure.
pub async fn lookup_title(video_id: &str) -> Result<String, VideoError> {
    let url = format!(
        "https://www.youtube.com/oembed?url=https://www.youtube.com/watch?v={}&format=json",
        video_id
    );

    let response = reqwest::get(&url)
        .await
        .map_err(|_| VideoError::LookupFailed)?;

    let body: OEmbedResponse = response.json().await.map_err(|_| VideoError::LookupFailed)?;

    Ok(body.title)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_extraction() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&list=xyz").unwrap(),
            "dQw4w9WgXcQ"
        );
        assert_eq!(
            extract_video_id("https://youtu.be/dQw4w9WgXcQ?t=10").unwrap(),
            "dQw4w9WgXcQ"
        );
        assert_eq!(
            extract_video_id("https://www.youtube.com/embed/dQw4w9WgXcQ").unwrap(),
            "dQw4w9WgXcQ"
        );
        assert_eq!(
            extract_video_id("https://www.youtube.com/v/dQw4w9WgXcQ#fragment").unwrap(),
            "dQw4w9WgXcQ"
        );
        assert_eq!(
            extract_video_id("www.youtube.com/watch?feature=share&v=dQw4w9WgXcQ").unwrap(),
            "dQw4w9WgXcQ"
        );
    }

    #[test]
    fn test_unrecognized_urls() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/"),
            Err(VideoError::UnrecognizedUrl)
        );
        assert_eq!(
            extract_video_id("https://example.com/watch?v=dQw4w9WgXcQ"),
            Err(VideoError::UnrecognizedUrl)
        );
        assert_eq!(
            extract_video_id("not a url at all"),
            Err(VideoError::UnrecognizedUrl)
        );
    }

    #[test]
    fn test_malformed_ids() {
        // Too short after stripping noise
        assert!(matches!(
            extract_video_id("https://youtu.be/abc"),
            Err(VideoError::InvalidId(_))
        ));
        // Illegal characters
        assert!(matches!(
            extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXc!"),
            Err(VideoError::InvalidId(_))
        ));
        // Too long
        assert!(matches!(
            extract_video_id("https://youtu.be/dQw4w9WgXcQQQ"),
            Err(VideoError::InvalidId(_))
        ));
    }
}
