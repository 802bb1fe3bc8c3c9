#![forbid(unsafe_code)]

//! Visit-log records.
//!
//! A loosely coupled, secondary concern: once per page view, the origin URL,
//! the visitor's IP, and a browser fingerprint are handed to a [`VisitSink`].
//! AJAX-originated and admin views are never logged, and a page view is
//! logged at most once no matter how often the host asks. Persistence is an
//! external collaborator; this module only defines the record shape and the
//! once-per-view discipline.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Browser fingerprint captured with a visit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrowserInfo {
    /// Browser family name, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Browser version string, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Operating system / platform, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    /// Raw user-agent header.
    #[serde(rename = "browser_UA", default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Any further detection fields, carried verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One visit-log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitRecord {
    /// Full URL of the visited page.
    pub site_url: String,
    /// Visitor IP address (v4 or v6).
    pub user_ip: IpAddr,
    /// Browser fingerprint.
    pub browser_info: BrowserInfo,
    /// When the visit was recorded.
    pub date_visited: DateTime<Utc>,
}

/// What kind of request produced the page view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewContext {
    /// A regular front-end page view — the only kind that is logged.
    Page,
    /// A script-initiated (AJAX) request.
    Ajax,
    /// An admin-area view.
    Admin,
}

/// Destination for visit records.
pub trait VisitSink {
    /// Persist one record.
    fn record(&mut self, record: VisitRecord);
}

/// In-memory sink for tests and harnesses.
#[derive(Debug, Clone, Default)]
pub struct MemoryVisitSink {
    records: Vec<VisitRecord>,
}

impl MemoryVisitSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded visits, oldest first.
    #[must_use]
    pub fn records(&self) -> &[VisitRecord] {
        &self.records
    }
}

impl VisitSink for MemoryVisitSink {
    fn record(&mut self, record: VisitRecord) {
        self.records.push(record);
    }
}

/// Once-per-page-view visit logger.
#[derive(Debug, Clone)]
pub struct VisitLogger<S> {
    sink: S,
    recorded: bool,
}

impl<S: VisitSink> VisitLogger<S> {
    /// Wrap a sink.
    #[must_use]
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            recorded: false,
        }
    }

    /// Offer a visit for logging. Returns whether it was recorded.
    ///
    /// AJAX and admin contexts are skipped, and only the first page-context
    /// offer per page load is recorded.
    pub fn observe(&mut self, context: ViewContext, record: VisitRecord) -> bool {
        if context != ViewContext::Page {
            debug!(
                target: "autopager.visit",
                context = ?context,
                "non-page view; visit not logged"
            );
            return false;
        }
        if self.recorded {
            debug!(target: "autopager.visit", "visit already logged for this page view");
            return false;
        }
        self.recorded = true;
        self.sink.record(record);
        true
    }

    /// The wrapped sink.
    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record() -> VisitRecord {
        VisitRecord {
            site_url: "https://example.org/post/1".to_string(),
            user_ip: "203.0.113.9".parse().unwrap(),
            browser_info: BrowserInfo {
                name: Some("Firefox".to_string()),
                user_agent: Some("Mozilla/5.0".to_string()),
                ..BrowserInfo::default()
            },
            date_visited: "2020-05-04T12:00:00Z".parse().unwrap(),
        }
    }

    #[test]
    fn logs_first_page_view_only() {
        let mut logger = VisitLogger::new(MemoryVisitSink::new());
        assert!(logger.observe(ViewContext::Page, record()));
        assert!(!logger.observe(ViewContext::Page, record()));
        assert_eq!(logger.sink().records().len(), 1);
    }

    #[test]
    fn skips_ajax_and_admin_views() {
        let mut logger = VisitLogger::new(MemoryVisitSink::new());
        assert!(!logger.observe(ViewContext::Ajax, record()));
        assert!(!logger.observe(ViewContext::Admin, record()));
        assert_eq!(logger.sink().records().len(), 0);
        // A real page view afterwards still logs.
        assert!(logger.observe(ViewContext::Page, record()));
    }

    #[test]
    fn record_serde_round_trip() {
        let original = record();
        let json = serde_json::to_string(&original).unwrap();
        let decoded: VisitRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn browser_info_preserves_unknown_fields() {
        let json = r#"{"name":"Firefox","browser_UA":"Mozilla/5.0","upgrade":false}"#;
        let info: BrowserInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.extra.get("upgrade"), Some(&serde_json::Value::Bool(false)));
        let out = serde_json::to_string(&info).unwrap();
        assert!(out.contains("\"upgrade\":false"));
    }
}
