#![forbid(unsafe_code)]

//! Browser frontend for the autopager engine.
//!
//! `autopager-core` is host-agnostic; this crate supplies the browser half:
//!
//! - [`settle`] — the deterministic smooth-scroll animation that closes a
//!   fetch-and-append cycle.
//! - [`reporters`] — runtime capability detection for the page's analytics
//!   integration (tag-based `gtag`, legacy universal tracker, or none) and
//!   the calls each integration needs for a virtual pageview.
//! - [`harness`] — a scripted, fully deterministic session driver used by
//!   integration tests: synthetic geometry, canned service replies, JSONL
//!   event logs.
//! - `wasm` (on `wasm32` targets) — the `#[wasm_bindgen]` surface wiring the
//!   engine to real DOM scroll events, `fetch`, and the History API.
//!
//! Everything except the `wasm` module compiles and tests on native targets.

pub mod harness;
pub mod reporters;
pub mod settle;

#[cfg(target_arch = "wasm32")]
pub mod wasm;
