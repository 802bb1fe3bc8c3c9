//! End-to-end pagination sessions driven through the scripted harness.

use autopager_core::controller::{OriginPage, Phase};
use autopager_core::protocol::{ArticleId, NextArticleReply};
use autopager_web::harness::{ScriptedPage, SessionEvent};
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
        content: format!("<article>{title}</article>"),
        url: url.to_string(),
        title: title.to_string(),
        id: ArticleId::from(id),
    }
}

#[test]
fn lookahead_threshold_is_exactly_300_units() {
    let mut page = ScriptedPage::new(origin());
    page.push_reply(article("/b", "B", 42));

    // 1000-unit page: 699 and 700 stay idle, 701 crosses the threshold.
    page.scroll(699.0);
    page.scroll(700.0);
    assert_eq!(page.fetches_issued(), 0);
    assert_eq!(page.controller().phase(), Phase::Idle);

    page.scroll(701.0);
    assert_eq!(page.fetches_issued(), 1);
}

#[test]
fn full_reading_session() {
    let mut page = ScriptedPage::new(origin());
    page.push_reply(article("/b", "B", 42));
    page.push_reply(article("/c", "C", 43));
    page.push_reply(NextArticleReply::Last);

    // First threshold crossing loads B; the settle-triggered scroll event
    // lands inside B, so the chrome already shows B's URL and title.
    page.scroll(701.0);
    assert_eq!(page.address(), "/b");
    assert_eq!(page.title(), "B");
    assert_eq!(page.controller().sections().len(), 2);
    assert_eq!(page.controller().cursor(), &ArticleId::from(42u64));

    // Reading on through B loads C the same way.
    page.scroll(1501.0);
    assert_eq!(page.address(), "/c");
    assert_eq!(page.controller().sections().len(), 3);
    assert_eq!(page.controller().cursor(), &ArticleId::from(43u64));

    // The service runs out of content; tracking keeps working.
    page.scroll(2301.0);
    assert_eq!(page.controller().phase(), Phase::Exhausted);
    assert!(page.listener_attached());

    page.scroll(200.0);
    assert_eq!(page.address(), "https://example.org/a");
    assert_eq!(page.title(), "A");

    // Exhaustion is terminal: a deep scroll never fetches again, and a
    // position past every span falls back to the origin section (no change).
    page.scroll(10_000.0);
    assert_eq!(page.fetches_issued(), 3);
    assert_eq!(page.pageviews(), ["/b", "/c", "/a"]);
}

#[test]
fn at_most_one_fetch_per_cycle() {
    let mut page = ScriptedPage::new(origin());
    // The request hangs, so the listener stays detached.
    page.scroll(701.0);
    for position in [702.0, 1500.0, 9000.0] {
        page.scroll(position);
    }
    assert_eq!(page.fetches_issued(), 1);
    assert_eq!(page.controller().phase(), Phase::Fetching);
    assert!(!page.listener_attached());
}

#[test]
fn service_error_disables_pagination_for_the_page_load() {
    let mut page = ScriptedPage::new(origin());
    page.push_reply(NextArticleReply::Error("no template found".to_string()));
    page.push_reply(article("/never", "Never", 99));

    page.scroll(701.0);
    assert_eq!(page.alerts(), ["no template found"]);
    assert_eq!(page.controller().phase(), Phase::Failed);
    assert!(!page.listener_attached());

    // The queued article is unreachable: scroll events no longer register.
    page.scroll(701.0);
    page.scroll(5000.0);
    assert_eq!(page.fetches_issued(), 1);
    assert_eq!(page.controller().sections().len(), 1);
}

#[test]
fn tracking_side_effects_are_idempotent_per_section() {
    let mut page = ScriptedPage::new(origin());
    page.push_reply(article("/b", "B", 42));
    page.scroll(701.0);
    assert_eq!(page.pageviews(), ["/b"]);

    // Wandering within B adds nothing; crossing back and forth adds one
    // update per crossing.
    page.scroll(1200.0);
    page.scroll(1300.0);
    assert_eq!(page.pageviews(), ["/b"]);

    page.scroll(100.0);
    page.scroll(1200.0);
    assert_eq!(page.pageviews(), ["/b", "/a", "/b"]);
}

#[test]
fn settle_animation_runs_and_cycle_closes_after_it() {
    let mut page = ScriptedPage::new(origin());
    page.push_reply(article("/b", "B", 42));
    page.scroll(701.0);

    let settle = page
        .events()
        .iter()
        .find_map(|event| match event {
            SessionEvent::Settle {
                target,
                duration_ms,
                frames,
            } => Some((*target, *duration_ms, *frames)),
            _ => None,
        })
        .expect("settle event recorded");
    // New section top is the old document bottom; the viewport settles 10
    // units below it over 100ms.
    assert_eq!(settle.0, 1010.0);
    assert_eq!(settle.1, 100);
    assert!(settle.2 >= 1);
    assert_eq!(page.controller().phase(), Phase::Idle);
    assert!(page.listener_attached());
}

#[test]
fn session_log_serializes_to_jsonl() {
    let mut page = ScriptedPage::new(origin());
    page.push_reply(article("/b", "B", 42));
    page.push_reply(NextArticleReply::Last);
    page.scroll(701.0);
    page.scroll(1501.0);

    let jsonl = page.jsonl();
    assert_eq!(jsonl.lines().count(), page.events().len());
    assert!(jsonl.contains(r#"{"event":"fetch","cursor":"7"}"#));
    assert!(jsonl.contains(r#""event":"exhausted""#));
    assert!(
        jsonl
            .lines()
            .all(|line| serde_json::from_str::<serde_json::Value>(line).is_ok())
    );
}
