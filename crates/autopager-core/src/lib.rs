#![forbid(unsafe_code)]

//! Host-agnostic continuous-pagination engine.
//!
//! `autopager-core` owns everything about "infinite scroll" article
//! pagination that does not require a browser:
//!
//! - **Host-driven I/O**: the embedding environment feeds scroll positions
//!   and fetch-service replies into [`PaginationController`] and executes the
//!   directives it returns (append a fragment, settle-scroll, rewrite the
//!   address bar, report a pageview).
//! - **Deterministic state**: the controller is an explicit state machine
//!   (`Idle → Fetching → Idle | Exhausted | Failed`); at most one fetch cycle
//!   can ever be in flight because only `Idle` can start one.
//! - **No blocking / no threads**: suitable for `wasm32-unknown-unknown`.
//!
//! The browser glue (scroll listeners, `fetch`, History API, analytics
//! globals) lives in `autopager-web`.

pub mod analytics;
pub mod config;
pub mod controller;
pub mod error;
pub mod protocol;
pub mod section;
pub mod visit;

pub use analytics::{AnalyticsReporter, NoopReporter, RecordingReporter, page_path};
pub use config::{ConfigError, PageConfig};
pub use controller::{
    AppendedGeometry, FETCH_LOOKAHEAD, OriginPage, PaginationController, PendingAppend, Phase,
    ReplyDirective, SETTLE_DURATION, SETTLE_NUDGE, ScrollDirective, SettleScrollTo,
    TrackingUpdate,
};
pub use error::PaginationError;
pub use protocol::{ArticleId, NextArticleReply, NextArticleRequest, RequestGuard};
pub use section::{Section, SectionIndex};
pub use visit::{BrowserInfo, MemoryVisitSink, ViewContext, VisitLogger, VisitRecord, VisitSink};
