#![forbid(unsafe_code)]

//! Fetch-service wire contract.
//!
//! The article fetch service is an external collaborator reachable through an
//! HTTP GET-style endpoint. The request carries the cursor (the identifier of
//! the article the reader is currently on); the reply body is a flat JSON
//! object carrying exactly one of:
//!
//! - `{"last": true}` — no further content exists (terminal signal),
//! - `{"error": "..."}` — application-level failure (fatal for the page load),
//! - `{"content", "url", "title", "id", "last": false}` — the next article.
//!
//! [`NextArticleReply`] maps that tri-state body onto an enum; anything else
//! is a decode error. [`RequestGuard`] models the service's own admission
//! rule: only same-site, script-initiated (AJAX) requests are served.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use url::Url;
use url::form_urlencoded;

use crate::error::PaginationError;

/// Service action name carried in the request query string.
pub const FETCH_ACTION: &str = "load_next_post";

/// Header marker the service requires on every fetch request.
pub const REQUESTED_WITH: &str = "XMLHttpRequest";

// ---------------------------------------------------------------------------
// Article identifiers
// ---------------------------------------------------------------------------

/// Opaque article identifier used as the pagination cursor.
///
/// The service historically returns numeric ids but the engine never
/// interprets them; both JSON numbers and strings are accepted and the
/// canonical form is the decimal/string rendering.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArticleId(String);

impl ArticleId {
    /// The canonical string form, as sent back in the request query.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for ArticleId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for ArticleId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for ArticleId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ArticleId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Serialize for ArticleId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ArticleId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Number(id) => Self(id.to_string()),
            Raw::Text(id) => Self(id),
        })
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// A "give me the article after this one" request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NextArticleRequest {
    /// Identifier of the article the reader is currently on.
    pub cursor: ArticleId,
}

impl NextArticleRequest {
    /// Create a request for the article following `cursor`.
    #[must_use]
    pub fn new(cursor: ArticleId) -> Self {
        Self { cursor }
    }

    /// Encoded query-string pairs (`action=load_next_post&post=<id>`).
    #[must_use]
    pub fn query_string(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .append_pair("action", FETCH_ACTION)
            .append_pair("post", self.cursor.as_str())
            .finish()
    }

    /// Full request URL against the configured endpoint.
    #[must_use]
    pub fn url_for(&self, endpoint: &str) -> String {
        let separator = if endpoint.contains('?') { '&' } else { '?' };
        format!("{endpoint}{separator}{}", self.query_string())
    }
}

// ---------------------------------------------------------------------------
// Reply
// ---------------------------------------------------------------------------

/// Decoded fetch-service reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextArticleReply {
    /// No further content exists; pagination is exhausted for this sequence.
    Last,
    /// Application-level failure (e.g. unconfigured template on the server).
    Error(String),
    /// The next article, rendered and ready to append.
    Article {
        /// Opaque HTML fragment for the article body.
        content: String,
        /// Canonical URL of the article.
        url: String,
        /// Document title for the article.
        title: String,
        /// Identifier of the article; becomes the new cursor.
        id: ArticleId,
    },
}

/// Flat wire shape of the reply body.
#[derive(Debug, Default, Serialize, Deserialize)]
struct RawReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<ArticleId>,
}

impl NextArticleReply {
    /// Decode a reply body.
    ///
    /// Mirrors the service's field precedence: an `error` field wins over
    /// everything, then a true `last` flag, then the success-field set.
    pub fn from_json(body: &str) -> Result<Self, PaginationError> {
        let raw: RawReply = serde_json::from_str(body)
            .map_err(|err| PaginationError::Decode(err.to_string()))?;
        Self::try_from(raw)
    }

    /// Encode the reply as its wire JSON body.
    #[must_use]
    pub fn to_json(&self) -> String {
        // RawReply is a flat map of plain values; serialization cannot fail.
        serde_json::to_string(&self.to_raw()).unwrap_or_default()
    }

    fn to_raw(&self) -> RawReply {
        match self {
            Self::Last => RawReply {
                last: Some(true),
                ..RawReply::default()
            },
            Self::Error(message) => RawReply {
                error: Some(message.clone()),
                ..RawReply::default()
            },
            Self::Article {
                content,
                url,
                title,
                id,
            } => RawReply {
                last: Some(false),
                content: Some(content.clone()),
                url: Some(url.clone()),
                title: Some(title.clone()),
                id: Some(id.clone()),
                error: None,
            },
        }
    }
}

impl TryFrom<RawReply> for NextArticleReply {
    type Error = PaginationError;

    fn try_from(raw: RawReply) -> Result<Self, PaginationError> {
        if let Some(message) = raw.error {
            return Ok(Self::Error(message));
        }
        if raw.last == Some(true) {
            return Ok(Self::Last);
        }
        match (raw.content, raw.url, raw.title, raw.id) {
            (Some(content), Some(url), Some(title), Some(id)) => Ok(Self::Article {
                content,
                url,
                title,
                id,
            }),
            _ => Err(PaginationError::Decode(
                "reply carries neither last, error, nor a complete article".to_string(),
            )),
        }
    }
}

impl<'de> Deserialize<'de> for NextArticleReply {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawReply::deserialize(deserializer)?;
        Self::try_from(raw).map_err(|err| D::Error::custom(err.to_string()))
    }
}

impl Serialize for NextArticleReply {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_raw().serialize(serializer)
    }
}

// ---------------------------------------------------------------------------
// Same-site AJAX guard
// ---------------------------------------------------------------------------

/// Admission rule the fetch service applies to incoming requests.
///
/// Requests must be script-initiated (the `X-Requested-With: XMLHttpRequest`
/// marker) and come from a page on the service's own host; anything else is
/// rejected outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestGuard {
    site_host: String,
}

impl RequestGuard {
    /// Build a guard for the given site URL.
    pub fn new(site_url: &str) -> Result<Self, PaginationError> {
        let parsed = Url::parse(site_url)
            .map_err(|err| PaginationError::Decode(format!("invalid site url: {err}")))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| PaginationError::Decode("site url has no host".to_string()))?;
        Ok(Self {
            site_host: host.to_ascii_lowercase(),
        })
    }

    /// Whether a request with the given `Referer` and `X-Requested-With`
    /// values is admissible.
    #[must_use]
    pub fn permits(&self, referer: Option<&str>, requested_with: Option<&str>) -> bool {
        if requested_with != Some(REQUESTED_WITH) {
            return false;
        }
        let Some(referer) = referer else {
            return false;
        };
        let Ok(parsed) = Url::parse(referer) else {
            return false;
        };
        parsed
            .host_str()
            .is_some_and(|host| host.eq_ignore_ascii_case(&self.site_host))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn request_query_encodes_cursor() {
        let request = NextArticleRequest::new(ArticleId::from(17u64));
        assert_eq!(request.query_string(), "action=load_next_post&post=17");
    }

    #[test]
    fn request_url_appends_query() {
        let request = NextArticleRequest::new(ArticleId::from(5u64));
        assert_eq!(
            request.url_for("https://example.org/ajax"),
            "https://example.org/ajax?action=load_next_post&post=5"
        );
        assert_eq!(
            request.url_for("https://example.org/ajax?lang=bg"),
            "https://example.org/ajax?lang=bg&action=load_next_post&post=5"
        );
    }

    #[test]
    fn request_query_escapes_unusual_ids() {
        let request = NextArticleRequest::new(ArticleId::from("a b&c"));
        assert_eq!(request.query_string(), "action=load_next_post&post=a+b%26c");
    }

    #[test]
    fn decode_last() {
        let reply = NextArticleReply::from_json(r#"{"last": true}"#).unwrap();
        assert_eq!(reply, NextArticleReply::Last);
    }

    #[test]
    fn decode_error() {
        let reply = NextArticleReply::from_json(r#"{"error": "no template"}"#).unwrap();
        assert_eq!(reply, NextArticleReply::Error("no template".to_string()));
    }

    #[test]
    fn decode_article_with_numeric_id() {
        let body = r#"{"content":"<p>B</p>","url":"/b","title":"B","id":42,"last":false}"#;
        let reply = NextArticleReply::from_json(body).unwrap();
        assert_eq!(
            reply,
            NextArticleReply::Article {
                content: "<p>B</p>".to_string(),
                url: "/b".to_string(),
                title: "B".to_string(),
                id: ArticleId::from(42u64),
            }
        );
    }

    #[test]
    fn decode_article_with_string_id() {
        let body = r#"{"content":"x","url":"/x","title":"X","id":"post-9"}"#;
        match NextArticleReply::from_json(body).unwrap() {
            NextArticleReply::Article { id, .. } => assert_eq!(id.as_str(), "post-9"),
            other => panic!("expected article, got {other:?}"),
        }
    }

    #[test]
    fn error_field_wins_over_success_fields() {
        let body = r#"{"error":"boom","content":"x","url":"/x","title":"X","id":1}"#;
        assert_eq!(
            NextArticleReply::from_json(body).unwrap(),
            NextArticleReply::Error("boom".to_string())
        );
    }

    #[test]
    fn incomplete_article_is_a_decode_error() {
        let err = NextArticleReply::from_json(r#"{"content":"x","url":"/x"}"#).unwrap_err();
        assert!(matches!(err, PaginationError::Decode(_)));
    }

    #[test]
    fn non_json_body_is_a_decode_error() {
        let err = NextArticleReply::from_json("<html>school of hard 404s</html>").unwrap_err();
        assert!(matches!(err, PaginationError::Decode(_)));
    }

    #[test]
    fn reply_wire_round_trip() {
        for reply in [
            NextArticleReply::Last,
            NextArticleReply::Error("x".to_string()),
            NextArticleReply::Article {
                content: "<p>hi</p>".to_string(),
                url: "https://example.org/hi".to_string(),
                title: "Hi".to_string(),
                id: ArticleId::from(3u64),
            },
        ] {
            let decoded = NextArticleReply::from_json(&reply.to_json()).unwrap();
            assert_eq!(decoded, reply);
        }
    }

    #[test]
    fn guard_requires_ajax_marker_and_same_host() {
        let guard = RequestGuard::new("https://example.org").unwrap();
        assert!(guard.permits(Some("https://example.org/post/1"), Some(REQUESTED_WITH)));
        // Host comparison is case-insensitive.
        assert!(guard.permits(Some("https://EXAMPLE.org/post/1"), Some(REQUESTED_WITH)));
        // Missing or wrong marker.
        assert!(!guard.permits(Some("https://example.org/post/1"), None));
        assert!(!guard.permits(Some("https://example.org/post/1"), Some("fetch")));
        // Cross-origin referer, or none at all.
        assert!(!guard.permits(Some("https://evil.example.net/"), Some(REQUESTED_WITH)));
        assert!(!guard.permits(None, Some(REQUESTED_WITH)));
        // Unparseable referer.
        assert!(!guard.permits(Some("not a url"), Some(REQUESTED_WITH)));
    }

    #[test]
    fn guard_rejects_hostless_site() {
        assert!(RequestGuard::new("file:///tmp/x").is_err());
    }

    proptest! {
        #[test]
        fn article_id_query_round_trips(id in "[a-zA-Z0-9 _%&=-]{1,24}") {
            let request = NextArticleRequest::new(ArticleId::from(id.as_str()));
            let query = request.query_string();
            let decoded: Vec<(String, String)> =
                form_urlencoded::parse(query.as_bytes()).into_owned().collect();
            prop_assert_eq!(decoded[1].1.as_str(), id.as_str());
        }
    }
}
