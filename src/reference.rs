//! Image references and the payloads that carry them.
//!
//! An [`ImageReference`] is an opaque locator. Two references denote the same
//! update only when their strings are equal; nothing is normalised.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageReference(Arc<str>);

impl ImageReference {
    /// Builds a reference, rejecting blank locators.
    pub fn parse(raw: &str) -> Result<Self, CandidateError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CandidateError::EmptyReference);
        }
        Ok(Self(Arc::from(trimmed)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Appends a `random=<nonce>` query parameter so that successive polls of
    /// one URL are distinct references and bypass intermediate caches.
    pub fn with_cache_bust(&self, nonce: u64) -> Self {
        let separator = if self.0.contains('?') { '&' } else { '?' };
        Self(Arc::from(format!("{}{separator}random={nonce}", self.0)))
    }

    /// Where the bytes for this reference come from.
    pub fn location(&self) -> SourceLocation {
        let raw = self.as_str();
        let lower = raw.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            SourceLocation::Http(raw.to_string())
        } else if let Some(path) = raw.strip_prefix("file://") {
            SourceLocation::File(PathBuf::from(path))
        } else {
            SourceLocation::File(PathBuf::from(raw))
        }
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<&str> for ImageReference {
    type Error = CandidateError;

    fn try_from(raw: &str) -> Result<Self, Self::Error> {
        Self::parse(raw)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    Http(String),
    File(PathBuf),
}

/// Why a submitted payload never became a candidate.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CandidateError {
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("payload has no `imageSource` field")]
    MissingImageSource,

    #[error("image reference is empty")]
    EmptyReference,
}

/// Shape of a push notification: `{"imageSource": "<locator>"}`. Unknown
/// fields are ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PushPayload {
    image_source: Option<String>,
}

/// Extracts the reference carried by a push payload.
pub fn parse_push_payload(raw: &str) -> Result<ImageReference, CandidateError> {
    let payload: PushPayload =
        serde_json::from_str(raw).map_err(|e| CandidateError::InvalidJson(e.to_string()))?;
    let source = payload
        .image_source
        .ok_or(CandidateError::MissingImageSource)?;
    ImageReference::parse(&source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_by_value() {
        let a = ImageReference::parse("img://a").unwrap();
        let b = ImageReference::parse("img://a").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, ImageReference::parse("img://b").unwrap());
    }

    #[test]
    fn blank_references_are_rejected() {
        assert_eq!(
            ImageReference::parse("   "),
            Err(CandidateError::EmptyReference)
        );
    }

    #[test]
    fn cache_bust_picks_the_right_separator() {
        let plain = ImageReference::parse("https://picsum.photos/800/450").unwrap();
        assert_eq!(
            plain.with_cache_bust(7).as_str(),
            "https://picsum.photos/800/450?random=7"
        );
        let query = ImageReference::parse("https://host/img?w=10").unwrap();
        assert_eq!(query.with_cache_bust(7).as_str(), "https://host/img?w=10&random=7");
    }

    #[test]
    fn locations() {
        let http = ImageReference::parse("HTTPS://host/a.png").unwrap();
        assert!(matches!(http.location(), SourceLocation::Http(_)));
        let file = ImageReference::parse("file:///tmp/a.png").unwrap();
        assert_eq!(file.location(), SourceLocation::File(PathBuf::from("/tmp/a.png")));
        let bare = ImageReference::parse("photos/a.jpg").unwrap();
        assert_eq!(bare.location(), SourceLocation::File(PathBuf::from("photos/a.jpg")));
    }

    #[test]
    fn push_payloads() {
        let ok = parse_push_payload(r#"{"imageSource":"img://a","sender":"ctl"}"#).unwrap();
        assert_eq!(ok.as_str(), "img://a");

        assert_eq!(
            parse_push_payload(r#"{"other":1}"#),
            Err(CandidateError::MissingImageSource)
        );
        assert_eq!(
            parse_push_payload(r#"{"imageSource":""}"#),
            Err(CandidateError::EmptyReference)
        );
        assert!(matches!(
            parse_push_payload("not json"),
            Err(CandidateError::InvalidJson(_))
        ));
    }
}
