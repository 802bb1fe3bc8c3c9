#![forbid(unsafe_code)]

//! Scripted deterministic pagination sessions.
//!
//! [`ScriptedPage`] stands in for a real browser page: it owns a
//! [`PaginationController`], a simple vertical layout model (every fragment
//! lands at the current document bottom with a fixed height), a canned queue
//! of service replies, and a model of the browser chrome (address bar,
//! title, alert box, scroll listener attachment).
//!
//! Feeding it scroll positions drives exactly the host protocol the wasm
//! glue implements — detach on fetch, settle animation ticked frame by
//! frame, re-attach on completion, never re-attach after a failure — and
//! records every observable side effect as a [`SessionEvent`]. Events
//! serialize to JSONL for golden assertions.
//!
//! A scripted reply queue that runs dry models a hung network request: the
//! controller stays in `Fetching` and the listener stays detached, which is
//! exactly the engine's (documented) no-timeout behavior.

use std::collections::VecDeque;
use std::time::Duration;

use autopager_core::controller::{
    AppendedGeometry, OriginPage, PaginationController, ReplyDirective, ScrollDirective,
};
use autopager_core::protocol::NextArticleReply;
use serde::Serialize;

use crate::settle::SettleScroll;

/// Frame interval used to tick settle animations.
const FRAME: Duration = Duration::from_millis(16);

/// One observable side effect of a scripted session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A fetch request was issued.
    Fetch {
        /// Cursor sent with the request.
        cursor: String,
    },
    /// A fragment was appended to the content root.
    Append {
        /// Canonical URL of the appended article.
        url: String,
        /// New content-root height after the append.
        content_height: f64,
    },
    /// The settle animation ran to completion.
    Settle {
        /// Final scroll position.
        target: f64,
        /// Animation length in milliseconds.
        duration_ms: u64,
        /// Frames ticked before completion.
        frames: u32,
    },
    /// The address bar and title were rewritten.
    HistoryUpdate {
        /// New visible URL.
        url: String,
        /// New document title.
        title: String,
    },
    /// A virtual pageview was reported.
    Pageview {
        /// Path-only URL.
        page_path: String,
    },
    /// The service signaled exhaustion; the listener was re-attached.
    Exhausted,
    /// A fatal error was surfaced to the user; the listener stays detached.
    Alert {
        /// User-visible message.
        message: String,
    },
}

/// A scripted browser page driving a [`PaginationController`].
#[derive(Debug, Clone)]
pub struct ScriptedPage {
    controller: PaginationController,
    replies: VecDeque<NextArticleReply>,
    fragment_height: f64,
    listener_attached: bool,
    fetches_issued: usize,
    clock: Duration,
    scroll_position: f64,
    address: String,
    title: String,
    events: Vec<SessionEvent>,
}

impl ScriptedPage {
    /// Create a page with the given origin snapshot. Fragments default to
    /// 800 units tall.
    #[must_use]
    pub fn new(origin: OriginPage) -> Self {
        let address = origin.url.clone();
        let title = origin.title.clone();
        Self {
            controller: PaginationController::new(origin),
            replies: VecDeque::new(),
            fragment_height: 800.0,
            listener_attached: true,
            fetches_issued: 0,
            clock: Duration::ZERO,
            scroll_position: 0.0,
            address,
            title,
            events: Vec::new(),
        }
    }

    /// Override the layout model's fragment height.
    #[must_use]
    pub fn with_fragment_height(mut self, height: f64) -> Self {
        self.fragment_height = height;
        self
    }

    /// Queue the service reply for the next fetch.
    pub fn push_reply(&mut self, reply: NextArticleReply) {
        self.replies.push_back(reply);
    }

    /// Deliver one scroll event, exactly as the browser would: ignored
    /// entirely while the listener is detached.
    pub fn scroll(&mut self, position: f64) {
        if !self.listener_attached {
            return;
        }
        self.scroll_position = position;
        match self.controller.on_scroll(position) {
            ScrollDirective::BeginFetch { cursor } => {
                self.listener_attached = false;
                self.fetches_issued += 1;
                self.events.push(SessionEvent::Fetch {
                    cursor: cursor.to_string(),
                });
                self.deliver_reply();
            }
            ScrollDirective::Track(update) => {
                if let Some(update) = update {
                    self.address = update.url.clone();
                    self.title = update.title.clone();
                    self.events.push(SessionEvent::HistoryUpdate {
                        url: update.url,
                        title: update.title,
                    });
                    self.events.push(SessionEvent::Pageview {
                        page_path: update.page_path,
                    });
                }
            }
        }
    }

    /// The underlying controller.
    #[must_use]
    pub fn controller(&self) -> &PaginationController {
        &self.controller
    }

    /// Whether the scroll listener is currently attached.
    #[must_use]
    pub fn listener_attached(&self) -> bool {
        self.listener_attached
    }

    /// Total fetch requests issued.
    #[must_use]
    pub fn fetches_issued(&self) -> usize {
        self.fetches_issued
    }

    /// Current address-bar URL.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Current document title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// All recorded events, oldest first.
    #[must_use]
    pub fn events(&self) -> &[SessionEvent] {
        &self.events
    }

    /// Recorded page paths, oldest first.
    #[must_use]
    pub fn pageviews(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|event| match event {
                SessionEvent::Pageview { page_path } => Some(page_path.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Messages surfaced through the alert box.
    #[must_use]
    pub fn alerts(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|event| match event {
                SessionEvent::Alert { message } => Some(message.as_str()),
                _ => None,
            })
            .collect()
    }

    /// The session's event log as JSONL.
    #[must_use]
    pub fn jsonl(&self) -> String {
        let mut out = String::new();
        for event in &self.events {
            // SessionEvent is a flat tagged struct; serialization cannot fail.
            if let Ok(line) = serde_json::to_string(event) {
                out.push_str(&line);
                out.push('\n');
            }
        }
        out
    }

    fn deliver_reply(&mut self) {
        let Some(reply) = self.replies.pop_front() else {
            // Hung request: no reply ever arrives, the cycle never closes.
            return;
        };
        match self.controller.apply_reply(reply) {
            ReplyDirective::Fail { message } => {
                self.events.push(SessionEvent::Alert { message });
                // Listener intentionally never re-attached.
            }
            ReplyDirective::Resume => {
                self.events.push(SessionEvent::Exhausted);
                self.listener_attached = true;
            }
            ReplyDirective::Append(pending) => {
                // Layout model: the fragment lands at the current document
                // bottom, fragment_height tall, margins included.
                let top = self.controller.content_height();
                let geometry = AppendedGeometry {
                    top_offset: top,
                    outer_height: self.fragment_height,
                    dom_order_index: (self.controller.sections().len() - 1) as i32,
                    content_height: top + self.fragment_height,
                };
                let url = pending.url.clone();
                let settle = self.controller.commit_append(pending, geometry);
                self.events.push(SessionEvent::Append {
                    url,
                    content_height: geometry.content_height,
                });

                // Run the settle animation frame by frame on the page clock.
                let mut glide = SettleScroll::new(
                    self.scroll_position,
                    settle.target,
                    self.clock,
                    settle.duration,
                );
                let mut frames = 0u32;
                while !glide.is_done() {
                    self.clock += FRAME;
                    self.scroll_position = glide.tick(self.clock);
                    frames += 1;
                }
                self.events.push(SessionEvent::Settle {
                    target: settle.target,
                    duration_ms: settle.duration.as_millis() as u64,
                    frames,
                });

                self.controller.finish_cycle();
                self.listener_attached = true;
                // Settling moved the viewport, so the browser fires one more
                // scroll event at the final position.
                self.scroll(self.scroll_position);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autopager_core::protocol::ArticleId;
    use pretty_assertions::assert_eq;

    fn origin() -> OriginPage {
        OriginPage {
            top_offset: 0.0,
            outer_height: 1000.0,
            content_height: 1000.0,
            url: "https://example.org/a".to_string(),
            title: "A".to_string(),
            article_id: ArticleId::from(7u64),
        }
    }

    fn article(url: &str, title: &str, id: u64) -> NextArticleReply {
        NextArticleReply::Article {
            content: format!("<p>{title}</p>"),
            url: url.to_string(),
            title: title.to_string(),
            id: ArticleId::from(id),
        }
    }

    #[test]
    fn successful_cycle_updates_chrome_and_logs_events() {
        let mut page = ScriptedPage::new(origin());
        page.push_reply(article("/b", "B", 42));

        page.scroll(701.0);

        assert_eq!(page.fetches_issued(), 1);
        assert_eq!(page.address(), "/b");
        assert_eq!(page.title(), "B");
        assert!(page.listener_attached());
        assert_eq!(page.pageviews(), ["/b"]);

        let kinds: Vec<&str> = page
            .events()
            .iter()
            .map(|event| match event {
                SessionEvent::Fetch { .. } => "fetch",
                SessionEvent::Append { .. } => "append",
                SessionEvent::Settle { .. } => "settle",
                SessionEvent::HistoryUpdate { .. } => "history",
                SessionEvent::Pageview { .. } => "pageview",
                SessionEvent::Exhausted => "exhausted",
                SessionEvent::Alert { .. } => "alert",
            })
            .collect();
        assert_eq!(kinds, ["fetch", "append", "settle", "history", "pageview"]);
    }

    #[test]
    fn hung_request_suspends_the_session() {
        let mut page = ScriptedPage::new(origin());
        // No reply queued: the request hangs forever.
        page.scroll(701.0);
        assert_eq!(page.fetches_issued(), 1);
        assert!(!page.listener_attached());

        // Every further scroll event is dropped at the listener.
        page.scroll(900.0);
        page.scroll(5000.0);
        assert_eq!(page.fetches_issued(), 1);
        assert!(page.events().iter().all(|event| !matches!(
            event,
            SessionEvent::HistoryUpdate { .. } | SessionEvent::Pageview { .. }
        )));
    }

    #[test]
    fn jsonl_has_one_line_per_event() {
        let mut page = ScriptedPage::new(origin());
        page.push_reply(NextArticleReply::Last);
        page.scroll(701.0);
        let jsonl = page.jsonl();
        assert_eq!(jsonl.lines().count(), page.events().len());
        assert!(jsonl.contains(r#""event":"exhausted""#));
    }
}
