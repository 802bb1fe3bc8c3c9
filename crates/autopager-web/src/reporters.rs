#![forbid(unsafe_code)]

//! Analytics integration detection and pageview call planning.
//!
//! Pages carry one of two analytics integrations, or none:
//!
//! - the tag-based integration (`gtag`), configured per installed tracker id,
//! - the legacy universal tracker (`ga`), driven by a set/send pair.
//!
//! Detection happens once at init against the page's globals; the decision
//! logic and the exact calls each integration needs are pure and live here,
//! so the wasm glue only has to probe globals and invoke the planned calls
//! through reflection. When neither integration is present, pageviews are
//! silently skipped — that is not an error.

use autopager_core::analytics::{AnalyticsReporter, NoopReporter};
use tracing::debug;

/// What the page's global scope offers for analytics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalyticsCapabilities {
    /// A callable tag-based `gtag` global is installed.
    pub has_gtag: bool,
    /// A callable legacy universal `ga` global is installed.
    pub has_legacy: bool,
    /// Tracker ids enumerated from the installed trackers.
    pub tracker_ids: Vec<String>,
}

/// Which reporting strategy to use for this page load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReporterKind {
    /// Tag-based: one `gtag('config', id, {page_path})` per tracker.
    Tag,
    /// Legacy universal: `ga('set','page',p)` then `ga('send','pageview')`.
    Legacy,
    /// Neither integration installed; skip reporting.
    Noop,
}

/// Pick the reporting strategy for the detected capabilities.
///
/// The tag-based integration wins when present; the legacy tracker is the
/// fallback; with neither, reporting is a no-op.
#[must_use]
pub fn select_reporter(caps: &AnalyticsCapabilities) -> ReporterKind {
    let kind = if caps.has_gtag {
        ReporterKind::Tag
    } else if caps.has_legacy {
        ReporterKind::Legacy
    } else {
        ReporterKind::Noop
    };
    debug!(
        target: "autopager.analytics",
        kind = ?kind,
        trackers = caps.tracker_ids.len(),
        "analytics reporter selected"
    );
    kind
}

/// One concrete invocation against a page analytics global.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageviewCall {
    /// `gtag('config', tracker_id, {'page_path': page_path})`
    TagConfig {
        /// Tracker to configure.
        tracker_id: String,
        /// Path-only URL for the pageview.
        page_path: String,
    },
    /// `ga('set', 'page', page_path)`
    LegacySetPage {
        /// Path-only URL for the pageview.
        page_path: String,
    },
    /// `ga('send', 'pageview')`
    LegacySendPageview,
}

/// Plan the calls one virtual pageview needs for the selected strategy.
///
/// The tag-based plan configures every installed tracker; with no tracker
/// ids enumerated there is nothing to configure and the plan is empty.
#[must_use]
pub fn pageview_calls(
    kind: ReporterKind,
    tracker_ids: &[String],
    page_path: &str,
) -> Vec<PageviewCall> {
    match kind {
        ReporterKind::Tag => tracker_ids
            .iter()
            .map(|tracker_id| PageviewCall::TagConfig {
                tracker_id: tracker_id.clone(),
                page_path: page_path.to_string(),
            })
            .collect(),
        ReporterKind::Legacy => vec![
            PageviewCall::LegacySetPage {
                page_path: page_path.to_string(),
            },
            PageviewCall::LegacySendPageview,
        ],
        ReporterKind::Noop => Vec::new(),
    }
}

/// Reporter that plans calls and hands them to an executor closure.
///
/// The wasm glue supplies an executor that performs each call through
/// reflection; tests supply executors that record them.
pub struct PlannedReporter<E> {
    kind: ReporterKind,
    tracker_ids: Vec<String>,
    execute: E,
}

impl<E: FnMut(&PageviewCall)> PlannedReporter<E> {
    /// Build a reporter for the detected capabilities.
    pub fn new(caps: &AnalyticsCapabilities, execute: E) -> Self {
        Self {
            kind: select_reporter(caps),
            tracker_ids: caps.tracker_ids.clone(),
            execute,
        }
    }

    /// Selected strategy.
    #[must_use]
    pub fn kind(&self) -> ReporterKind {
        self.kind
    }

    /// Adopt a fresh capability probe.
    ///
    /// Analytics snippets load asynchronously, so a probe taken at page init
    /// usually predates them; callers re-probe the globals at every tracking
    /// event. A fresh probe that finds an integration replaces the current
    /// selection (and tracker ids); one that finds nothing keeps the last
    /// known selection.
    pub fn refresh(&mut self, caps: &AnalyticsCapabilities) {
        let kind = select_reporter(caps);
        if kind == ReporterKind::Noop {
            return;
        }
        self.kind = kind;
        self.tracker_ids = caps.tracker_ids.clone();
    }
}

impl<E: FnMut(&PageviewCall)> AnalyticsReporter for PlannedReporter<E> {
    fn report_pageview(&mut self, page_path: &str) {
        if self.kind == ReporterKind::Noop {
            // Same silent skip as the dedicated no-op reporter.
            NoopReporter.report_pageview(page_path);
            return;
        }
        for call in pageview_calls(self.kind, &self.tracker_ids, page_path) {
            (self.execute)(&call);
        }
    }
}
