#![forbid(unsafe_code)]

//! Virtual pageview reporting.
//!
//! When the active section changes, the controller produces the section URL
//! with scheme and host stripped (analytics backends expect a path-only page
//! path) and the host hands it to whichever [`AnalyticsReporter`] the page
//! carries. Absence of any integration is not an error: reporting is simply
//! skipped through [`NoopReporter`].

use tracing::debug;
use url::Url;

/// Sink for virtual pageview events.
pub trait AnalyticsReporter {
    /// Report one virtual pageview for a path-only URL
    /// (path + query + fragment, no scheme or host).
    fn report_pageview(&mut self, page_path: &str);
}

/// Strip scheme and host from a canonical URL, keeping path, query, and
/// fragment.
///
/// Inputs that are not absolute http(s) URLs (already-relative paths, odd
/// schemes) pass through unchanged — exactly what a path-only input needs.
#[must_use]
pub fn page_path(canonical_url: &str) -> String {
    let Ok(parsed) = Url::parse(canonical_url) else {
        return canonical_url.to_string();
    };
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return canonical_url.to_string();
    }
    let mut path = parsed.path().to_string();
    if let Some(query) = parsed.query() {
        path.push('?');
        path.push_str(query);
    }
    if let Some(fragment) = parsed.fragment() {
        path.push('#');
        path.push_str(fragment);
    }
    path
}

/// Reporter used when neither analytics integration is installed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReporter;

impl AnalyticsReporter for NoopReporter {
    fn report_pageview(&mut self, page_path: &str) {
        debug!(
            target: "autopager.analytics",
            page_path = %page_path,
            "no analytics integration installed; pageview skipped"
        );
    }
}

/// Reporter that records every pageview, for tests and harnesses.
#[derive(Debug, Clone, Default)]
pub struct RecordingReporter {
    pageviews: Vec<String>,
}

impl RecordingReporter {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded page paths, oldest first.
    #[must_use]
    pub fn pageviews(&self) -> &[String] {
        &self.pageviews
    }
}

impl AnalyticsReporter for RecordingReporter {
    fn report_pageview(&mut self, page_path: &str) {
        self.pageviews.push(page_path.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn strips_scheme_and_host() {
        assert_eq!(page_path("https://example.org/post/42"), "/post/42");
        assert_eq!(page_path("http://example.org/post/42"), "/post/42");
    }

    #[test]
    fn keeps_query_and_fragment() {
        assert_eq!(
            page_path("https://example.org/post?lang=bg#comments"),
            "/post?lang=bg#comments"
        );
    }

    #[test]
    fn host_root_becomes_slash() {
        assert_eq!(page_path("https://example.org"), "/");
    }

    #[test]
    fn relative_paths_pass_through() {
        assert_eq!(page_path("/already/relative"), "/already/relative");
    }

    #[test]
    fn non_http_schemes_pass_through() {
        assert_eq!(page_path("mailto:someone@example.org"), "mailto:someone@example.org");
    }

    #[test]
    fn recording_reporter_keeps_order() {
        let mut reporter = RecordingReporter::new();
        reporter.report_pageview("/a");
        reporter.report_pageview("/b");
        assert_eq!(reporter.pageviews(), ["/a", "/b"]);
    }
}
