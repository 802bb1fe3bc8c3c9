#![forbid(unsafe_code)]

//! Section index: which article is under the viewport.
//!
//! A [`Section`] is a contiguous vertical span of the document corresponding
//! to one loaded article — the original page, or one appended fragment. Its
//! offsets are captured **once**, at append time, and never recomputed; after
//! layout shifts the spans are a best-effort partition of scroll positions,
//! and overlaps are resolved in favor of the most recently appended section
//! (last match wins).
//!
//! The index is append-only: entry 0 is always the original page and is
//! never removed, and no entry is ever mutated after it is pushed.

use smallvec::SmallVec;

/// Dom-order index of the original page section, which has no sibling index.
pub const ORIGIN_DOM_ORDER: i32 = -1;

/// One tracked vertical span of the document.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    /// Vertical position where the section begins, in absolute document
    /// coordinates, captured when the section was appended.
    pub top_offset: f64,
    /// `top_offset` plus the rendered outer height (margins included) at
    /// capture time.
    pub bottom_offset: f64,
    /// Index of the section's root element among sibling appended sections;
    /// [`ORIGIN_DOM_ORDER`] for the original page.
    pub dom_order_index: i32,
    /// The URL this section represents; drives address-bar and analytics
    /// updates while the section is active.
    pub canonical_url: String,
    /// Document title to apply while the section is active.
    pub title: String,
}

impl Section {
    /// Whether `scroll_position` falls inside this section's span.
    #[must_use]
    pub fn contains(&self, scroll_position: f64) -> bool {
        scroll_position >= self.top_offset && scroll_position <= self.bottom_offset
    }
}

/// Append-only, creation-ordered collection of sections.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionIndex {
    sections: SmallVec<[Section; 4]>,
}

impl SectionIndex {
    /// Seed the index with the original page section.
    #[must_use]
    pub fn new(origin: Section) -> Self {
        let mut sections = SmallVec::new();
        sections.push(origin);
        Self { sections }
    }

    /// Number of tracked sections (always at least 1).
    #[must_use]
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// The index is never empty: entry 0 is the original page.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Section at `index`, if present.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Section> {
        self.sections.get(index)
    }

    /// Most recently appended section.
    #[must_use]
    pub fn last(&self) -> &Section {
        // Invariant: seeded with the origin section, never drained.
        &self.sections[self.sections.len() - 1]
    }

    /// Append a newly created section.
    pub fn push(&mut self, section: Section) {
        self.sections.push(section);
    }

    /// Iterate sections oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter()
    }

    /// Resolve which section is active for `scroll_position`.
    ///
    /// Scans all sections in creation order and keeps the **last** one whose
    /// span contains the position, so that when spans overlap (the common
    /// case right after an append) the most recently appended section wins.
    /// With no match the original page (index 0) is active.
    #[must_use]
    pub fn resolve(&self, scroll_position: f64) -> usize {
        let mut active = 0;
        for (index, section) in self.sections.iter().enumerate() {
            if section.contains(scroll_position) {
                active = index;
            }
        }
        active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn section(top: f64, bottom: f64, url: &str) -> Section {
        Section {
            top_offset: top,
            bottom_offset: bottom,
            dom_order_index: 0,
            canonical_url: url.to_string(),
            title: url.to_string(),
        }
    }

    fn origin() -> Section {
        Section {
            dom_order_index: ORIGIN_DOM_ORDER,
            ..section(0.0, 100.0, "/origin")
        }
    }

    #[test]
    fn seeded_with_origin() {
        let index = SectionIndex::new(origin());
        assert_eq!(index.len(), 1);
        assert_eq!(index.get(0).unwrap().dom_order_index, ORIGIN_DOM_ORDER);
        assert!(!index.is_empty());
    }

    #[test]
    fn no_match_resolves_to_origin() {
        let mut index = SectionIndex::new(origin());
        index.push(section(200.0, 300.0, "/b"));
        assert_eq!(index.resolve(150.0), 0);
        assert_eq!(index.resolve(-10.0), 0);
    }

    #[test]
    fn overlapping_spans_resolve_to_later_section() {
        let mut index = SectionIndex::new(origin());
        index.push(section(50.0, 150.0, "/b"));
        // [0,100] and [50,150] overlap; 75 is inside both.
        assert_eq!(index.resolve(75.0), 1);
        // 25 is only inside the origin span.
        assert_eq!(index.resolve(25.0), 0);
    }

    #[test]
    fn boundaries_are_inclusive() {
        let index = SectionIndex::new(origin());
        assert_eq!(index.resolve(0.0), 0);
        assert_eq!(index.resolve(100.0), 0);
    }

    #[test]
    fn push_never_mutates_existing_entries() {
        let mut index = SectionIndex::new(origin());
        let before = index.get(0).unwrap().clone();
        index.push(section(100.0, 900.0, "/b"));
        index.push(section(900.0, 1700.0, "/c"));
        assert_eq!(index.get(0).unwrap(), &before);
        assert_eq!(index.last().canonical_url, "/c");
        assert_eq!(index.len(), 3);
    }

    proptest! {
        #[test]
        fn resolve_is_always_in_bounds(
            spans in proptest::collection::vec((0.0f64..10_000.0, 0.0f64..10_000.0), 0..16),
            pos in -100.0f64..11_000.0,
        ) {
            let mut index = SectionIndex::new(origin());
            for (i, (a, b)) in spans.iter().enumerate() {
                index.push(Section {
                    top_offset: a.min(*b),
                    bottom_offset: a.max(*b),
                    dom_order_index: i as i32,
                    canonical_url: format!("/{i}"),
                    title: format!("{i}"),
                });
            }
            let active = index.resolve(pos);
            prop_assert!(active < index.len());
        }

        #[test]
        fn resolve_prefers_latest_containing_span(pos in 0.0f64..100.0) {
            let mut index = SectionIndex::new(origin());
            // Second span covers the whole origin span; every position inside
            // both must resolve to the later one.
            index.push(section(0.0, 100.0, "/b"));
            prop_assert_eq!(index.resolve(pos), 1);
        }
    }
}
