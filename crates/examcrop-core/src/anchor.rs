//! Anchor location: where on the page does a segment start?
//!
//! A start marker is either a trusted `"x,y"` coordinate pair or a short
//! literal snippet. Snippets are matched against the page's reading-order
//! text after normalization (NFKC, lowercase, collapsed whitespace), the same
//! concatenate-then-map-back approach as a positional text search.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::error::GeometryError;
use crate::geometry::{BBox, Point};
use crate::layout::{PageLayout, TextSpan};
use crate::segment::Segment;

static COORDINATE_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\(?\s*(-?\d+(?:\.\d+)?)\s*,\s*(-?\d+(?:\.\d+)?)\s*\)?\s*$")
        .expect("valid coordinate marker regex")
});

/// Options controlling marker matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorOptions {
    /// Number of leading marker words used for matching. Default: 8.
    pub max_words: usize,
    /// Retry with all whitespace removed when the spaced search fails.
    /// Catches words split across spans. Default: true.
    pub squash_whitespace_fallback: bool,
}

impl Default for AnchorOptions {
    fn default() -> Self {
        Self {
            max_words: 8,
            squash_whitespace_fallback: true,
        }
    }
}

/// Where a start marker resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnchorPosition {
    /// A coordinate marker, trusted as given.
    Point(Point),
    /// Union box of the span run containing a text match.
    Text(BBox),
}

impl AnchorPosition {
    pub fn top(&self) -> f64 {
        match self {
            AnchorPosition::Point(p) => p.y,
            AnchorPosition::Text(b) => b.top,
        }
    }

    pub fn bottom(&self) -> f64 {
        match self {
            AnchorPosition::Point(p) => p.y,
            AnchorPosition::Text(b) => b.bottom,
        }
    }

    pub fn x0(&self) -> f64 {
        match self {
            AnchorPosition::Point(p) => p.x,
            AnchorPosition::Text(b) => b.x0,
        }
    }

    pub fn x1(&self) -> f64 {
        match self {
            AnchorPosition::Point(p) => p.x,
            AnchorPosition::Text(b) => b.x1,
        }
    }

    /// The anchor as a box; zero-sized for coordinate anchors.
    pub fn bbox(&self) -> BBox {
        match self {
            AnchorPosition::Point(p) => BBox::new(p.x, p.y, p.x, p.y),
            AnchorPosition::Text(b) => *b,
        }
    }
}

/// A resolved anchor: 1-based page number plus position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub page: usize,
    pub position: AnchorPosition,
}

/// Parse a `"x,y"` marker into a point.
pub fn parse_coordinate_marker(marker: &str) -> Option<Point> {
    let caps = COORDINATE_MARKER.captures(marker)?;
    let x = caps.get(1)?.as_str().parse().ok()?;
    let y = caps.get(2)?.as_str().parse().ok()?;
    Some(Point::new(x, y))
}

/// NFKC + lowercase + whitespace collapsed to single spaces, trimmed.
pub fn normalize_text(text: &str) -> String {
    let folded: String = text.nfkc().collect::<String>().to_lowercase();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First `max_words` words of a marker, normalized.
fn marker_needle(marker: &str, max_words: usize) -> String {
    let normalized = normalize_text(marker);
    normalized
        .split(' ')
        .take(max_words.max(1))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Search for a normalized marker in spans given in reading order.
///
/// The algorithm:
/// 1. Normalize each span and concatenate them with single spaces, recording
///    which span every byte of the haystack came from.
/// 2. Find the first occurrence of the marker's leading words.
/// 3. Map the match back to the run of spans it touches and return their
///    union box.
///
/// Returns `None` for an empty marker or when nothing matches.
pub fn find_marker(spans: &[&TextSpan], marker: &str, options: &AnchorOptions) -> Option<BBox> {
    let needle = marker_needle(marker, options.max_words);
    if needle.is_empty() || spans.is_empty() {
        return None;
    }

    let (haystack, owners) = build_haystack(spans, " ");
    if let Some(bbox) = match_to_bbox(&haystack, &owners, &needle, spans) {
        return Some(bbox);
    }

    if options.squash_whitespace_fallback {
        let squashed_needle: String = needle.split(' ').collect();
        let (haystack, owners) = build_haystack(spans, "");
        let squashed: String = haystack.split(' ').collect();
        let squashed_owners: Vec<usize> = haystack
            .char_indices()
            .filter(|(_, c)| *c != ' ')
            .flat_map(|(i, c)| std::iter::repeat_n(owners[i], c.len_utf8()))
            .collect();
        return match_to_bbox(&squashed, &squashed_owners, &squashed_needle, spans);
    }
    None
}

fn build_haystack(spans: &[&TextSpan], separator: &str) -> (String, Vec<usize>) {
    let mut haystack = String::new();
    let mut owners: Vec<usize> = Vec::new();
    for (i, span) in spans.iter().enumerate() {
        let text = normalize_text(&span.text);
        if text.is_empty() {
            continue;
        }
        if !haystack.is_empty() && !separator.is_empty() {
            haystack.push_str(separator);
            // The separator belongs to the span that follows it.
            owners.extend(std::iter::repeat_n(i, separator.len()));
        }
        haystack.push_str(&text);
        owners.extend(std::iter::repeat_n(i, text.len()));
    }
    (haystack, owners)
}

fn match_to_bbox(
    haystack: &str,
    owners: &[usize],
    needle: &str,
    spans: &[&TextSpan],
) -> Option<BBox> {
    if needle.is_empty() {
        return None;
    }
    let start = haystack.find(needle)?;
    let end = start + needle.len();
    let first = *owners.get(start)?;
    let last = *owners.get(end.checked_sub(1)?)?;
    BBox::union_all(spans[first..=last].iter().map(|s| &s.bbox))
}

/// Resolve a segment's start marker against its pages.
///
/// Coordinate markers resolve on the first listed page. Text markers are
/// tried on every listed page in order; the first page with a match wins.
pub fn locate_anchor(
    segment: &Segment,
    pages: &[PageLayout],
    options: &AnchorOptions,
) -> Result<Anchor, GeometryError> {
    let not_found = || GeometryError::AnchorNotFound {
        segment_id: segment.id.clone(),
        marker: segment.start_marker.clone(),
        pages: segment.page_nums.clone(),
    };

    if let Some(point) = parse_coordinate_marker(&segment.start_marker) {
        let page = *segment.page_nums.first().ok_or_else(not_found)?;
        return Ok(Anchor {
            page,
            position: AnchorPosition::Point(point),
        });
    }

    for &page_num in &segment.page_nums {
        let Some(page) = page_num.checked_sub(1).and_then(|i| pages.get(i)) else {
            continue;
        };
        let spans = page.spans_in_reading_order();
        if let Some(bbox) = find_marker(&spans, &segment.start_marker, options) {
            return Ok(Anchor {
                page: page_num,
                position: AnchorPosition::Text(bbox),
            });
        }
    }
    Err(not_found())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::{SegmentKind, SegmentRole};

    fn span(text: &str, x0: f64, top: f64, x1: f64, bottom: f64) -> TextSpan {
        TextSpan::new(text, BBox::new(x0, top, x1, bottom))
    }

    fn segment(marker: &str, pages: Vec<usize>) -> Segment {
        Segment {
            id: "Q1".to_string(),
            kind: SegmentKind::Question,
            role: SegmentRole::Question,
            text: String::new(),
            start_marker: marker.to_string(),
            page_nums: pages,
            multi_page: false,
            references: Vec::new(),
        }
    }

    fn page_with(index: usize, spans: Vec<TextSpan>) -> PageLayout {
        let mut page = PageLayout::new(index, 612.0, 792.0);
        page.spans = spans;
        page
    }

    #[test]
    fn coordinate_markers() {
        assert_eq!(parse_coordinate_marker("72,540"), Some(Point::new(72.0, 540.0)));
        assert_eq!(
            parse_coordinate_marker(" 72.5 , 100.25 "),
            Some(Point::new(72.5, 100.25))
        );
        assert_eq!(parse_coordinate_marker("(10, 20)"), Some(Point::new(10.0, 20.0)));
        assert_eq!(parse_coordinate_marker("1. Sea x"), None);
        assert_eq!(parse_coordinate_marker("3, 4, 5"), None);
    }

    #[test]
    fn normalization_collapses_whitespace_and_case() {
        assert_eq!(normalize_text("  Hola \n  MUNDO\t"), "hola mundo");
        assert_eq!(normalize_text("ﬁn"), "fin");
    }

    #[test]
    fn finds_marker_across_spans() {
        let spans = [
            span("5.", 50.0, 100.0, 60.0, 112.0),
            span("Un  auto", 62.0, 100.0, 110.0, 112.0),
            span("recorre", 112.0, 100.0, 160.0, 112.0),
            span("unrelated", 50.0, 300.0, 120.0, 312.0),
        ];
        let refs: Vec<&TextSpan> = spans.iter().collect();
        let bbox = find_marker(&refs, "5. UN AUTO recorre 120 km", &AnchorOptions::default());
        // Marker is longer than the page text, so only the first words match
        // when max_words is small enough.
        assert!(bbox.is_none());

        let opts = AnchorOptions {
            max_words: 4,
            ..AnchorOptions::default()
        };
        let bbox = find_marker(&refs, "5. UN AUTO recorre 120 km", &opts).unwrap();
        assert_eq!(bbox, BBox::new(50.0, 100.0, 160.0, 112.0));
        assert!(bbox.area() > 0.0);
    }

    #[test]
    fn squashed_fallback_joins_split_words() {
        let spans = [
            span("Pregun", 50.0, 100.0, 80.0, 112.0),
            span("ta 7", 80.0, 100.0, 100.0, 112.0),
        ];
        let refs: Vec<&TextSpan> = spans.iter().collect();
        let bbox = find_marker(&refs, "Pregunta 7", &AnchorOptions::default()).unwrap();
        assert_eq!(bbox, BBox::new(50.0, 100.0, 100.0, 112.0));

        let strict = AnchorOptions {
            squash_whitespace_fallback: false,
            ..AnchorOptions::default()
        };
        assert!(find_marker(&refs, "Pregunta 7", &strict).is_none());
    }

    #[test]
    fn empty_marker_never_matches() {
        let spans = [span("text", 0.0, 0.0, 10.0, 10.0)];
        let refs: Vec<&TextSpan> = spans.iter().collect();
        assert!(find_marker(&refs, "   ", &AnchorOptions::default()).is_none());
    }

    #[test]
    fn locate_prefers_first_listed_page_with_match() {
        let pages = vec![
            page_with(0, vec![span("cover", 10.0, 10.0, 50.0, 20.0)]),
            page_with(1, vec![span("12. Considere", 50.0, 400.0, 150.0, 412.0)]),
            page_with(2, vec![span("12. Considere", 50.0, 80.0, 150.0, 92.0)]),
        ];
        let anchor =
            locate_anchor(&segment("12. Considere", vec![2, 3]), &pages, &AnchorOptions::default())
                .unwrap();
        assert_eq!(anchor.page, 2);
        assert_eq!(anchor.position.top(), 400.0);
    }

    #[test]
    fn locate_coordinate_marker_uses_first_page() {
        let pages = vec![page_with(0, vec![]), page_with(1, vec![])];
        let anchor =
            locate_anchor(&segment("72,300", vec![2]), &pages, &AnchorOptions::default()).unwrap();
        assert_eq!(anchor.page, 2);
        assert_eq!(anchor.position, AnchorPosition::Point(Point::new(72.0, 300.0)));
    }

    #[test]
    fn locate_reports_anchor_not_found() {
        let pages = vec![page_with(0, vec![span("nothing here", 0.0, 0.0, 50.0, 10.0)])];
        let err =
            locate_anchor(&segment("4. Missing", vec![1]), &pages, &AnchorOptions::default())
                .unwrap_err();
        assert!(matches!(err, GeometryError::AnchorNotFound { .. }));
    }
}
