#![forbid(unsafe_code)]

//! Continuous-pagination controller.
//!
//! One [`PaginationController`] exists per page load. The host feeds it
//! scroll positions and fetch-service replies; the controller returns
//! directives (start a fetch, append a fragment, settle-scroll, rewrite the
//! address bar and report a pageview, surface an error) that the host
//! executes. The controller itself never touches the network or the DOM.
//!
//! # Fetch-cycle discipline
//!
//! The host detaches its scroll listener the moment [`ScrollDirective::BeginFetch`]
//! is returned and re-attaches it only on [`ReplyDirective::Resume`] or after
//! the settle animation from [`PaginationController::commit_append`] finishes
//! and [`PaginationController::finish_cycle`] is called. The phase gate backs
//! this up: a fetch can only start from [`Phase::Idle`], so even a host that
//! keeps delivering scroll events mid-cycle cannot trigger a second request.
//! On [`ReplyDirective::Fail`] the listener is never restored — a
//! misconfigured service is not worth retrying for the rest of the page load.
//!
//! # Known limitation
//!
//! There is no request timeout. A hung fetch leaves the controller in
//! [`Phase::Fetching`] indefinitely and pagination stays suspended for the
//! remainder of the page load.

use core::time::Duration;

use tracing::{debug, warn};

use crate::analytics::page_path;
use crate::protocol::{ArticleId, NextArticleReply};
use crate::section::{ORIGIN_DOM_ORDER, Section, SectionIndex};

/// How close (in document units) to the content bottom a scroll position must
/// get before the next article is fetched. Fixed by design, not configurable.
pub const FETCH_LOOKAHEAD: f64 = 300.0;

/// Offset below a freshly appended section's top that the viewport settles
/// on, so the new article's heading sits just under the viewport top.
pub const SETTLE_NUDGE: f64 = 10.0;

/// Duration of the settle scroll animation.
pub const SETTLE_DURATION: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// Phases and directives
// ---------------------------------------------------------------------------

/// Controller lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Tracking scroll positions; a fetch may start.
    Idle,
    /// A fetch-and-append cycle is in flight (including its settle animation).
    Fetching,
    /// The service reported no further content; tracking continues, fetching
    /// never resumes.
    Exhausted,
    /// The service reported an application error; the feature is permanently
    /// inactive for this page load.
    Failed,
}

/// What the host should do in response to a scroll event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrollDirective {
    /// Detach the scroll listener and issue one fetch for the article after
    /// `cursor`.
    BeginFetch {
        /// Cursor to send to the fetch service.
        cursor: ArticleId,
    },
    /// Apply the tracking side effects, if any.
    Track(Option<TrackingUpdate>),
}

/// Address-bar, title, and analytics side effects for a newly active section.
///
/// Produced at most once per section activation: repeated scroll events
/// inside the same section yield `Track(None)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingUpdate {
    /// Canonical URL to show in the address bar (no navigation).
    pub url: String,
    /// Document title to apply.
    pub title: String,
    /// Path-only URL for the virtual pageview report.
    pub page_path: String,
}

/// What the host should do with a decoded fetch-service reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyDirective {
    /// Append the fragment (wrapped in a float-clearing block container) as
    /// the content root's last child, measure it, then call
    /// [`PaginationController::commit_append`].
    Append(PendingAppend),
    /// No more content; re-attach the scroll listener. Future scroll events
    /// fall through to section tracking only.
    Resume,
    /// Application error; surface `message` to the user and leave the scroll
    /// listener detached permanently.
    Fail {
        /// User-visible error message from the service.
        message: String,
    },
}

/// An article fragment accepted from the service but not yet in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAppend {
    /// Opaque HTML fragment to append.
    pub html: String,
    /// Canonical URL of the appended article.
    pub url: String,
    /// Document title of the appended article.
    pub title: String,
    /// Identifier of the appended article; becomes the cursor once committed.
    pub id: ArticleId,
}

/// Geometry of a just-appended section element, measured by the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AppendedGeometry {
    /// Absolute document offset of the appended element's top.
    pub top_offset: f64,
    /// Rendered outer height of the appended element, margins included.
    pub outer_height: f64,
    /// Index of the element among sibling appended sections.
    pub dom_order_index: i32,
    /// Content root's scroll height after the append.
    pub content_height: f64,
}

/// Smooth-scroll instruction issued after an append commits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SettleScrollTo {
    /// Scroll position to animate to (new section top plus [`SETTLE_NUDGE`]).
    pub target: f64,
    /// Animation duration; the fetch cycle ends only after it completes.
    pub duration: Duration,
}

// ---------------------------------------------------------------------------
// Origin page
// ---------------------------------------------------------------------------

/// Snapshot of the original page taken at init, seeding the section index.
#[derive(Debug, Clone, PartialEq)]
pub struct OriginPage {
    /// Content root's top offset in document coordinates.
    pub top_offset: f64,
    /// Content root's outer height (margins included).
    pub outer_height: f64,
    /// Content root's scroll height.
    pub content_height: f64,
    /// The page's current address.
    pub url: String,
    /// The page's current document title.
    pub title: String,
    /// Identifier of the article the page shows (the first cursor).
    pub article_id: ArticleId,
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Per-page-load pagination state machine.
#[derive(Debug, Clone)]
pub struct PaginationController {
    sections: SectionIndex,
    content_height: f64,
    phase: Phase,
    cursor: ArticleId,
    current_url: String,
    failure: Option<String>,
}

impl PaginationController {
    /// Create the controller for a freshly loaded page.
    #[must_use]
    pub fn new(origin: OriginPage) -> Self {
        let section = Section {
            top_offset: origin.top_offset,
            bottom_offset: origin.top_offset + origin.outer_height,
            dom_order_index: ORIGIN_DOM_ORDER,
            canonical_url: origin.url.clone(),
            title: origin.title,
        };
        debug!(
            target: "autopager.controller",
            content_height = origin.content_height,
            cursor = %origin.article_id,
            "controller initialized"
        );
        Self {
            sections: SectionIndex::new(section),
            content_height: origin.content_height,
            phase: Phase::Idle,
            cursor: origin.article_id,
            current_url: origin.url,
            failure: None,
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Tracked sections, oldest first.
    #[must_use]
    pub fn sections(&self) -> &SectionIndex {
        &self.sections
    }

    /// Current cursor (identifier of the newest loaded article).
    #[must_use]
    pub fn cursor(&self) -> &ArticleId {
        &self.cursor
    }

    /// Cached content-root scroll height.
    #[must_use]
    pub fn content_height(&self) -> f64 {
        self.content_height
    }

    /// Address currently shown in the browser, as far as the controller knows.
    #[must_use]
    pub fn current_url(&self) -> &str {
        &self.current_url
    }

    /// Message from a fatal service error, if one occurred.
    #[must_use]
    pub fn failure_message(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Process one scroll event.
    ///
    /// Starts a fetch cycle when idle and within [`FETCH_LOOKAHEAD`] of the
    /// content bottom; otherwise resolves the active section and returns its
    /// tracking side effects (if the active section changed).
    pub fn on_scroll(&mut self, scroll_position: f64) -> ScrollDirective {
        if self.phase == Phase::Idle && scroll_position > self.content_height - FETCH_LOOKAHEAD {
            self.phase = Phase::Fetching;
            debug!(
                target: "autopager.controller",
                scroll_position,
                content_height = self.content_height,
                cursor = %self.cursor,
                "lookahead threshold crossed; starting fetch cycle"
            );
            return ScrollDirective::BeginFetch {
                cursor: self.cursor.clone(),
            };
        }
        ScrollDirective::Track(self.track(scroll_position))
    }

    /// Process a decoded fetch-service reply.
    pub fn apply_reply(&mut self, reply: NextArticleReply) -> ReplyDirective {
        if self.phase != Phase::Fetching {
            warn!(
                target: "autopager.fetch",
                phase = ?self.phase,
                "service reply arrived outside a fetch cycle"
            );
        }
        match reply {
            NextArticleReply::Error(message) => {
                self.phase = Phase::Failed;
                self.failure = Some(message.clone());
                warn!(
                    target: "autopager.fetch",
                    message = %message,
                    "service reported an application error; pagination disabled"
                );
                ReplyDirective::Fail { message }
            }
            NextArticleReply::Last => {
                self.phase = Phase::Exhausted;
                debug!(
                    target: "autopager.fetch",
                    "no further content; pagination exhausted"
                );
                ReplyDirective::Resume
            }
            NextArticleReply::Article {
                content,
                url,
                title,
                id,
            } => ReplyDirective::Append(PendingAppend {
                html: content,
                url,
                title,
                id,
            }),
        }
    }

    /// Record a fragment the host has appended and measured.
    ///
    /// Pushes the new section, refreshes the cached content height, advances
    /// the cursor, and instructs the host to settle-scroll the viewport onto
    /// the new section. The cycle stays open until [`Self::finish_cycle`].
    pub fn commit_append(
        &mut self,
        pending: PendingAppend,
        geometry: AppendedGeometry,
    ) -> SettleScrollTo {
        self.sections.push(Section {
            top_offset: geometry.top_offset,
            bottom_offset: geometry.top_offset + geometry.outer_height,
            dom_order_index: geometry.dom_order_index,
            canonical_url: pending.url,
            title: pending.title,
        });
        self.content_height = geometry.content_height;
        self.cursor = pending.id;
        debug!(
            target: "autopager.controller",
            sections = self.sections.len(),
            content_height = self.content_height,
            cursor = %self.cursor,
            "section appended"
        );
        SettleScrollTo {
            target: geometry.top_offset + SETTLE_NUDGE,
            duration: SETTLE_DURATION,
        }
    }

    /// Close the fetch cycle after the settle animation completes. The host
    /// re-attaches its scroll listener after calling this.
    pub fn finish_cycle(&mut self) {
        if self.phase == Phase::Fetching {
            self.phase = Phase::Idle;
            debug!(target: "autopager.controller", "fetch cycle complete");
        }
    }

    /// Resolve the active section and produce side effects when it changed.
    fn track(&mut self, scroll_position: f64) -> Option<TrackingUpdate> {
        let active = self.sections.resolve(scroll_position);
        // resolve() returns an in-bounds index.
        let section = self.sections.get(active)?;
        if section.canonical_url == self.current_url {
            return None;
        }
        self.current_url = section.canonical_url.clone();
        let update = TrackingUpdate {
            url: section.canonical_url.clone(),
            title: section.title.clone(),
            page_path: page_path(&section.canonical_url),
        };
        debug!(
            target: "autopager.controller",
            url = %update.url,
            page_path = %update.page_path,
            "active section changed"
        );
        Some(update)
    }
}
