#![forbid(unsafe_code)]

//! Browser glue: the `#[wasm_bindgen]` surface.
//!
//! [`AutopagerWeb`] wires a [`PaginationController`] to the real page:
//!
//! - one `scroll` listener on `window`, detached for the whole of a
//!   fetch-and-append cycle and never restored after a fatal service error,
//! - `fetch` against the configured endpoint with the same-site AJAX marker
//!   header, decoded through the core wire protocol,
//! - fragment appends into the configured content root (wrapped in a
//!   float-clearing block container), measured for the section index,
//! - the settle glide driven by `requestAnimationFrame`,
//! - history/title rewrites and analytics calls planned by [`reporters`].
//!
//! There is deliberately no request timeout: a hung fetch leaves the feature
//! suspended for the rest of the page load.
//!
//! [`reporters`]: crate::reporters

use core::time::Duration;
use std::cell::RefCell;
use std::rc::Rc;

use autopager_core::analytics::AnalyticsReporter;
use autopager_core::config::PageConfig;
use autopager_core::controller::{
    AppendedGeometry, OriginPage, PaginationController, PendingAppend, Phase, ReplyDirective,
    ScrollDirective, TrackingUpdate,
};
use autopager_core::error::PaginationError;
use autopager_core::protocol::{ArticleId, NextArticleReply, NextArticleRequest, REQUESTED_WITH};
use js_sys::{Array, Function, Object, Reflect};
use tracing::{debug, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{JsFuture, spawn_local};
use web_sys::{
    CssStyleDeclaration, Document, Element, Headers, HtmlElement, Request, RequestInit, Response,
    Window,
};
use web_time::Instant;

use crate::reporters::{AnalyticsCapabilities, PageviewCall, PlannedReporter};
use crate::settle::SettleScroll;

// ---------------------------------------------------------------------------
// Shared page state
// ---------------------------------------------------------------------------

type PageviewExecutor = Box<dyn FnMut(&PageviewCall)>;

struct Inner {
    controller: PaginationController,
    endpoint: String,
    root: Element,
    reporter: PlannedReporter<PageviewExecutor>,
    listener_attached: bool,
    scroll_closure: Option<Closure<dyn FnMut()>>,
    raf_closure: Option<Closure<dyn FnMut(f64)>>,
    settle: Option<SettleScroll>,
    settle_epoch: Option<Duration>,
}

/// Continuous pagination for the current page.
///
/// Constructed once per page load from the injected configuration object;
/// lives until page unload. The internal closures keep the state alive for
/// the page lifetime, which is exactly the lifecycle the feature needs.
#[wasm_bindgen]
pub struct AutopagerWeb {
    inner: Rc<RefCell<Inner>>,
}

#[wasm_bindgen]
impl AutopagerWeb {
    /// Boot pagination from the injected JSON configuration
    /// (`{"ajax_url": ..., "post_id": ..., "main_element": ...}`).
    ///
    /// Fails fast with a user-visible alert when the configuration is
    /// invalid or no element matches the content-root selector.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str) -> Result<AutopagerWeb, JsValue> {
        let config = match PageConfig::from_json(config_json) {
            Ok(config) => config,
            Err(err) => {
                let err = PaginationError::from(err);
                alert(&err.to_string());
                return Err(JsValue::from_str(&err.to_string()));
            }
        };

        let window = window()?;
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("no document"))?;

        let selector = config.content_root().to_string();
        let Some(root) = locate_root(&document, &selector) else {
            let err = PaginationError::ContentRootNotFound(selector);
            alert(&err.to_string());
            return Err(JsValue::from_str(&err.to_string()));
        };

        let url = window.location().href()?;
        let title = document.title();
        let scroll_pos = scroll_position(&document);
        let rect = root.get_bounding_client_rect();
        let origin = OriginPage {
            top_offset: rect.top() + scroll_pos,
            outer_height: outer_height(&window, &root),
            content_height: f64::from(root.scroll_height()),
            url,
            title,
            article_id: config.article_id.clone(),
        };

        let reporter = PlannedReporter::new(&detect_capabilities(), pageview_executor());
        let inner = Rc::new(RefCell::new(Inner {
            controller: PaginationController::new(origin),
            endpoint: config.endpoint_url.clone(),
            root,
            reporter,
            listener_attached: false,
            scroll_closure: None,
            raf_closure: None,
            settle: None,
            settle_epoch: None,
        }));
        attach_scroll_listener(&inner)?;
        debug!(target: "autopager.controller", "pagination active");
        Ok(AutopagerWeb { inner })
    }

    /// Number of loaded sections (the original page counts as one).
    #[wasm_bindgen(js_name = sectionCount)]
    #[must_use]
    pub fn section_count(&self) -> u32 {
        self.inner.borrow().controller.sections().len() as u32
    }

    /// Current controller phase (`idle` / `fetching` / `exhausted` / `failed`).
    #[wasm_bindgen(js_name = phase)]
    #[must_use]
    pub fn phase(&self) -> String {
        match self.inner.borrow().controller.phase() {
            Phase::Idle => "idle",
            Phase::Fetching => "fetching",
            Phase::Exhausted => "exhausted",
            Phase::Failed => "failed",
        }
        .to_string()
    }

    /// The address the controller believes the browser currently shows.
    #[wasm_bindgen(js_name = currentUrl)]
    #[must_use]
    pub fn current_url(&self) -> String {
        self.inner.borrow().controller.current_url().to_string()
    }
}

// ---------------------------------------------------------------------------
// DOM helpers
// ---------------------------------------------------------------------------

fn window() -> Result<Window, JsValue> {
    web_sys::window().ok_or_else(|| JsValue::from_str("no window"))
}

fn alert(message: &str) {
    if let Ok(window) = window() {
        let _ = window.alert_with_message(message);
    }
}

/// Find the content root by CSS selector, falling back to a bare tag name.
fn locate_root(document: &Document, selector: &str) -> Option<Element> {
    if let Ok(Some(element)) = document.query_selector(selector) {
        return Some(element);
    }
    document.get_elements_by_tag_name(selector).item(0)
}

/// Current vertical scroll position, root element first, body as fallback.
fn scroll_position(document: &Document) -> f64 {
    let from_root = document
        .document_element()
        .map_or(0, |element| element.scroll_top());
    if from_root != 0 {
        return f64::from(from_root);
    }
    document
        .body()
        .map_or(0.0, |body| f64::from(body.scroll_top()))
}

fn style_px(style: &CssStyleDeclaration, property: &str) -> f64 {
    style
        .get_property_value(property)
        .ok()
        .and_then(|value| value.trim_end_matches("px").parse::<f64>().ok())
        .unwrap_or(0.0)
}

/// Rendered height of an element including its vertical margins.
fn outer_height(window: &Window, element: &Element) -> f64 {
    let base = element.dyn_ref::<HtmlElement>().map_or_else(
        || element.get_bounding_client_rect().height(),
        |html| f64::from(html.offset_height()),
    );
    let margins = window
        .get_computed_style(element)
        .ok()
        .flatten()
        .map_or(0.0, |style| {
            style_px(&style, "margin-top") + style_px(&style, "margin-bottom")
        });
    base + margins
}

/// Position of an appended element among its sibling section containers.
fn section_index(element: &Element) -> i32 {
    let mut index = 0;
    let mut current = element.previous_element_sibling();
    while let Some(sibling) = current {
        if sibling.matches(".section").unwrap_or(false) {
            index += 1;
        }
        current = sibling.previous_element_sibling();
    }
    index
}

// ---------------------------------------------------------------------------
// Scroll listener
// ---------------------------------------------------------------------------

fn attach_scroll_listener(inner: &Rc<RefCell<Inner>>) -> Result<(), JsValue> {
    {
        let mut borrow = inner.borrow_mut();
        if borrow.listener_attached {
            return Ok(());
        }
        if borrow.scroll_closure.is_none() {
            let handle = Rc::clone(inner);
            borrow.scroll_closure = Some(Closure::<dyn FnMut()>::new(move || {
                on_scroll_event(&handle);
            }));
        }
        borrow.listener_attached = true;
    }
    let window = window()?;
    let borrow = inner.borrow();
    if let Some(closure) = borrow.scroll_closure.as_ref() {
        window.add_event_listener_with_callback("scroll", closure.as_ref().unchecked_ref())?;
    }
    Ok(())
}

fn detach_scroll_listener(inner: &Rc<RefCell<Inner>>) -> Result<(), JsValue> {
    {
        let mut borrow = inner.borrow_mut();
        if !borrow.listener_attached {
            return Ok(());
        }
        borrow.listener_attached = false;
    }
    let window = window()?;
    let borrow = inner.borrow();
    if let Some(closure) = borrow.scroll_closure.as_ref() {
        window.remove_event_listener_with_callback("scroll", closure.as_ref().unchecked_ref())?;
    }
    Ok(())
}

fn on_scroll_event(inner: &Rc<RefCell<Inner>>) {
    let Some(document) = web_sys::window().and_then(|w| w.document()) else {
        return;
    };
    let directive = {
        let mut borrow = inner.borrow_mut();
        let position = scroll_position(&document);
        borrow.controller.on_scroll(position)
    };
    match directive {
        ScrollDirective::BeginFetch { cursor } => {
            let _ = detach_scroll_listener(inner);
            begin_fetch(inner, cursor);
        }
        ScrollDirective::Track(Some(update)) => apply_tracking(inner, &update),
        ScrollDirective::Track(None) => {}
    }
}

// ---------------------------------------------------------------------------
// Fetch cycle
// ---------------------------------------------------------------------------

fn begin_fetch(inner: &Rc<RefCell<Inner>>, cursor: ArticleId) {
    let url = {
        let borrow = inner.borrow();
        NextArticleRequest::new(cursor).url_for(&borrow.endpoint)
    };
    let handle = Rc::clone(inner);
    spawn_local(async move {
        let started = Instant::now();
        match fetch_reply(&url).await {
            Ok(reply) => {
                debug!(
                    target: "autopager.fetch",
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "service reply received"
                );
                handle_reply(&handle, reply);
            }
            Err(err) => {
                // No timeout, no retry: a transport failure suspends the
                // feature for the rest of the page load, like a hung request.
                warn!(
                    target: "autopager.fetch",
                    error = ?err,
                    "fetch transport failure; pagination suspended"
                );
            }
        }
    });
}

async fn fetch_reply(url: &str) -> Result<NextArticleReply, JsValue> {
    let window = window()?;
    let init = RequestInit::new();
    init.set_method("GET");
    let headers = Headers::new()?;
    headers.set("X-Requested-With", REQUESTED_WITH)?;
    init.set_headers(headers.as_ref());
    let request = Request::new_with_str_and_init(url, &init)?;
    let response: Response = JsFuture::from(window.fetch_with_request(&request))
        .await?
        .dyn_into()?;
    let body = JsFuture::from(response.text()?)
        .await?
        .as_string()
        .ok_or_else(|| JsValue::from_str("non-text response body"))?;
    NextArticleReply::from_json(&body).map_err(|err| JsValue::from_str(&err.to_string()))
}

fn handle_reply(inner: &Rc<RefCell<Inner>>, reply: NextArticleReply) {
    let directive = inner.borrow_mut().controller.apply_reply(reply);
    match directive {
        ReplyDirective::Fail { message } => {
            // Fatal for the page load; the scroll listener stays detached.
            alert(&message);
        }
        ReplyDirective::Resume => {
            let _ = attach_scroll_listener(inner);
        }
        ReplyDirective::Append(pending) => {
            if let Err(err) = append_fragment(inner, pending) {
                warn!(
                    target: "autopager.controller",
                    error = ?err,
                    "failed to append fetched fragment; pagination suspended"
                );
            }
        }
    }
}

fn append_fragment(inner: &Rc<RefCell<Inner>>, pending: PendingAppend) -> Result<(), JsValue> {
    let window = window()?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("no document"))?;
    {
        let mut borrow = inner.borrow_mut();
        let wrapped = format!(
            "<div class=\"section\" style=\"clear:both\">{}</div>",
            pending.html
        );
        borrow.root.insert_adjacent_html("beforeend", &wrapped)?;
        let element = borrow
            .root
            .last_element_child()
            .ok_or_else(|| JsValue::from_str("appended section not found"))?;

        let position = scroll_position(&document);
        let geometry = AppendedGeometry {
            top_offset: element.get_bounding_client_rect().top() + position,
            outer_height: outer_height(&window, &element),
            dom_order_index: section_index(&element),
            content_height: f64::from(borrow.root.scroll_height()),
        };
        let settle = borrow.controller.commit_append(pending, geometry);
        borrow.settle = Some(SettleScroll::new(
            position,
            settle.target,
            Duration::ZERO,
            settle.duration,
        ));
        borrow.settle_epoch = None;
    }
    request_settle_frame(inner)
}

// ---------------------------------------------------------------------------
// Settle animation (requestAnimationFrame driven)
// ---------------------------------------------------------------------------

fn request_settle_frame(inner: &Rc<RefCell<Inner>>) -> Result<(), JsValue> {
    {
        let mut borrow = inner.borrow_mut();
        if borrow.raf_closure.is_none() {
            let handle = Rc::clone(inner);
            borrow.raf_closure = Some(Closure::<dyn FnMut(f64)>::new(move |timestamp: f64| {
                on_settle_frame(&handle, timestamp);
            }));
        }
    }
    let window = window()?;
    let borrow = inner.borrow();
    if let Some(closure) = borrow.raf_closure.as_ref() {
        window.request_animation_frame(closure.as_ref().unchecked_ref())?;
    }
    Ok(())
}

fn on_settle_frame(inner: &Rc<RefCell<Inner>>, timestamp_ms: f64) {
    let now = Duration::from_secs_f64(timestamp_ms.max(0.0) / 1000.0);
    let step = {
        let mut borrow = inner.borrow_mut();
        let epoch = *borrow.settle_epoch.get_or_insert(now);
        borrow
            .settle
            .as_mut()
            .map(|glide| (glide.tick(now.saturating_sub(epoch)), glide.is_done()))
    };
    let Some((position, done)) = step else {
        return;
    };
    if let Ok(window) = window() {
        window.scroll_to_with_x_and_y(0.0, position);
    }
    if done {
        {
            let mut borrow = inner.borrow_mut();
            borrow.settle = None;
            borrow.settle_epoch = None;
            borrow.controller.finish_cycle();
        }
        // Only now is the cycle over; the user can drive the next fetch.
        let _ = attach_scroll_listener(inner);
    } else {
        let _ = request_settle_frame(inner);
    }
}

// ---------------------------------------------------------------------------
// Analytics bridge
// ---------------------------------------------------------------------------

fn apply_tracking(inner: &Rc<RefCell<Inner>>, update: &TrackingUpdate) {
    let Ok(window) = window() else {
        return;
    };
    if let Ok(history) = window.history() {
        let _ = history.replace_state_with_url(&JsValue::NULL, &update.title, Some(&update.url));
    }
    if let Some(document) = window.document() {
        document.set_title(&update.title);
    }
    // Analytics snippets load asynchronously and are rarely installed by
    // init, so the globals are probed again at every tracking event.
    let caps = detect_capabilities();
    let mut borrow = inner.borrow_mut();
    borrow.reporter.refresh(&caps);
    borrow.reporter.report_pageview(&update.page_path);
}

fn pageview_executor() -> PageviewExecutor {
    Box::new(|call| {
        if let Err(err) = execute_pageview_call(call) {
            warn!(
                target: "autopager.analytics",
                error = ?err,
                "analytics call failed"
            );
        }
    })
}

/// Probe the page globals for analytics integrations.
fn detect_capabilities() -> AnalyticsCapabilities {
    let global = js_sys::global();
    let gtag = Reflect::get(&global, &JsValue::from_str("gtag"))
        .ok()
        .filter(JsValue::is_function);
    let ga = Reflect::get(&global, &JsValue::from_str("ga"))
        .ok()
        .filter(JsValue::is_function);
    let tracker_ids = ga.as_ref().map_or_else(Vec::new, enumerate_tracker_ids);
    AnalyticsCapabilities {
        has_gtag: gtag.is_some(),
        has_legacy: ga.is_some(),
        tracker_ids,
    }
}

/// `ga.getAll().map(t => t.get('trackingId'))`.
fn enumerate_tracker_ids(ga: &JsValue) -> Vec<String> {
    let Ok(get_all) = Reflect::get(ga, &JsValue::from_str("getAll")) else {
        return Vec::new();
    };
    let Some(get_all) = get_all.dyn_ref::<Function>() else {
        return Vec::new();
    };
    let Ok(trackers) = get_all.call0(ga) else {
        return Vec::new();
    };
    let mut ids = Vec::new();
    for tracker in Array::from(&trackers).iter() {
        let Ok(get) = Reflect::get(&tracker, &JsValue::from_str("get")) else {
            continue;
        };
        let Some(get) = get.dyn_ref::<Function>() else {
            continue;
        };
        if let Ok(id) = get.call1(&tracker, &JsValue::from_str("trackingId")) {
            if let Some(id) = id.as_string() {
                ids.push(id);
            }
        }
    }
    ids
}

fn execute_pageview_call(call: &PageviewCall) -> Result<(), JsValue> {
    let global = js_sys::global();
    match call {
        PageviewCall::TagConfig {
            tracker_id,
            page_path,
        } => {
            let gtag: Function =
                Reflect::get(&global, &JsValue::from_str("gtag"))?.dyn_into()?;
            let options = Object::new();
            Reflect::set(
                &options,
                &JsValue::from_str("page_path"),
                &JsValue::from_str(page_path),
            )?;
            gtag.call3(
                &JsValue::NULL,
                &JsValue::from_str("config"),
                &JsValue::from_str(tracker_id),
                &options,
            )?;
        }
        PageviewCall::LegacySetPage { page_path } => {
            let ga: Function = Reflect::get(&global, &JsValue::from_str("ga"))?.dyn_into()?;
            ga.call3(
                &JsValue::NULL,
                &JsValue::from_str("set"),
                &JsValue::from_str("page"),
                &JsValue::from_str(page_path),
            )?;
        }
        PageviewCall::LegacySendPageview => {
            let ga: Function = Reflect::get(&global, &JsValue::from_str("ga"))?.dyn_into()?;
            ga.call2(
                &JsValue::NULL,
                &JsValue::from_str("send"),
                &JsValue::from_str("pageview"),
            )?;
        }
    }
    Ok(())
}
