//! Range boundaries, ordering and normalization.
//!
//! A [`Range`] is a pair of `(container, offset)` boundaries. Offsets are
//! character offsets inside text nodes and child indices inside elements.
//! Boundaries are ordered by their child-index path from the root, which is
//! what the selection-state classification and common-ancestor queries build on.

use crate::dom::{self, DocumentModel, NodeId};
use crate::error::{RangeEdge, StyleError};

/// One end of a range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Boundary {
    pub container: NodeId,
    pub offset: usize,
}

impl Boundary {
    pub fn new(container: NodeId, offset: usize) -> Self {
        Self { container, offset }
    }
}

/// A start/end pair of boundaries. Engine operations always return ranges
/// with `start` not after `end`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Range {
    pub start: Boundary,
    pub end: Boundary,
}

impl Range {
    pub fn new(start: Boundary, end: Boundary) -> Self {
        Self { start, end }
    }

    /// Range spanning `start..end` offsets of a single container.
    pub fn within(container: NodeId, start: usize, end: usize) -> Self {
        Self::new(Boundary::new(container, start), Boundary::new(container, end))
    }

    /// Collapsed range at one position.
    pub fn caret(container: NodeId, offset: usize) -> Self {
        Self::within(container, offset, offset)
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }
}

/// How much of a node a range covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectionState {
    Full,
    Partial,
    None,
}

/// Child-index path from the root down to `node`.
pub fn node_path<D: DocumentModel + ?Sized>(doc: &D, node: NodeId) -> Vec<usize> {
    let mut path = Vec::new();
    let mut current = node;
    while let Some(parent) = doc.parent(current) {
        path.push(doc.index_in_parent(current).unwrap_or(0));
        current = parent;
    }
    path.reverse();
    path
}

/// Path of a boundary point: the container path with the offset appended.
pub fn boundary_path<D: DocumentModel + ?Sized>(doc: &D, boundary: Boundary) -> Vec<usize> {
    let mut path = node_path(doc, boundary.container);
    path.push(boundary.offset);
    path
}

/// Boundary paths just before the first and just after the last position
/// inside `node`.
fn content_bounds<D: DocumentModel + ?Sized>(doc: &D, node: NodeId) -> (Vec<usize>, Vec<usize>) {
    let mut first = node;
    while let Some(&child) = doc.children(first).first() {
        first = child;
    }
    let mut last = node;
    while let Some(&child) = doc.children(last).last() {
        last = child;
    }
    let mut start = node_path(doc, first);
    start.push(0);
    let mut end = node_path(doc, last);
    end.push(doc.node_len(last));
    (start, end)
}

/// Classifies `node` against `range`. A node is `Full` when everything inside
/// it lies within the range and `None` when nothing does.
pub fn selection_state<D: DocumentModel + ?Sized>(
    doc: &D,
    range: &Range,
    node: NodeId,
) -> SelectionState {
    let rs = boundary_path(doc, range.start);
    let re = boundary_path(doc, range.end);
    let (cs, ce) = content_bounds(doc, node);
    if rs <= cs && ce <= re {
        SelectionState::Full
    } else if ce <= rs || cs >= re {
        SelectionState::None
    } else {
        SelectionState::Partial
    }
}

/// Deepest node containing both boundaries, or `None` for detached ranges.
pub fn common_ancestor<D: DocumentModel + ?Sized>(doc: &D, range: &Range) -> Option<NodeId> {
    let (a, b) = (range.start.container, range.end.container);
    if !doc.is_attached(a) || !doc.is_attached(b) {
        return None;
    }
    if a == b {
        return Some(a);
    }
    let end_chain = dom::ancestors_inclusive(doc, b);
    dom::ancestors_inclusive(doc, a)
        .into_iter()
        .find(|n| end_chain.contains(n))
}

fn check_edge<D: DocumentModel + ?Sized>(
    doc: &D,
    boundary: Boundary,
    edge: RangeEdge,
) -> Result<(), StyleError> {
    let length = doc.node_len(boundary.container);
    if boundary.offset > length {
        tracing::warn!(
            target: "weaver::style::range",
            %edge,
            offset = boundary.offset,
            length,
            container = %boundary.container,
            "range offset exceeds container length"
        );
        return Err(StyleError::OutOfBounds {
            edge,
            offset: boundary.offset,
            length,
        });
    }
    Ok(())
}

/// Validates both boundaries without reordering them.
pub fn validate<D: DocumentModel + ?Sized>(doc: &D, range: &Range) -> Result<(), StyleError> {
    if !doc.is_attached(range.start.container) || !doc.is_attached(range.end.container) {
        return Err(StyleError::InvalidRange);
    }
    check_edge(doc, range.start, RangeEdge::Start)?;
    check_edge(doc, range.end, RangeEdge::End)
}

/// Converts a host selection into an engine range: validated, and with
/// reversed (backwards) selections swapped so `start` precedes `end`.
pub fn to_engine_range<D: DocumentModel + ?Sized>(
    doc: &D,
    range: Range,
) -> Result<Range, StyleError> {
    validate(doc, &range)?;
    if boundary_path(doc, range.end) < boundary_path(doc, range.start) {
        Ok(Range::new(range.end, range.start))
    } else {
        Ok(range)
    }
}

/// Widens a range to the full extent of its start and end containers:
/// offset 0 of the start container through the length of the end container.
pub fn expand_collapsed<D: DocumentModel + ?Sized>(
    doc: &D,
    range: &Range,
) -> Result<Range, StyleError> {
    if !doc.is_attached(range.start.container) || !doc.is_attached(range.end.container) {
        return Err(StyleError::InvalidRange);
    }
    Ok(Range::new(
        Boundary::new(range.start.container, 0),
        Boundary::new(range.end.container, doc.node_len(range.end.container)),
    ))
}

/// Non-empty text nodes fully covered by the range, in document order.
pub fn text_nodes_in_range<D: DocumentModel + ?Sized>(doc: &D, range: &Range) -> Vec<NodeId> {
    let Some(ancestor) = common_ancestor(doc, range) else {
        return Vec::new();
    };
    dom::text_descendants(doc, ancestor)
        .into_iter()
        .filter(|&t| doc.node_len(t) > 0)
        .filter(|&t| selection_state(doc, range, t) == SelectionState::Full)
        .collect()
}

/// Element ancestors (innermost first, root excluded) at the effective
/// start of the range: the first non-empty text the range touches, or the
/// start container when it touches none.
pub fn effective_markup_at_start<D: DocumentModel + ?Sized>(doc: &D, range: &Range) -> Vec<NodeId> {
    let root = doc.root();
    let first_text = common_ancestor(doc, range).and_then(|ancestor| {
        dom::text_descendants(doc, ancestor).into_iter().find(|&t| {
            doc.node_len(t) > 0 && selection_state(doc, range, t) != SelectionState::None
        })
    });
    let anchor = first_text.unwrap_or(range.start.container);
    dom::ancestors_inclusive(doc, anchor)
        .into_iter()
        .filter(|&n| n != root && doc.is_element(n))
        .collect()
}

/// Range boundaries expressed as character offsets relative to a block, so a
/// range can be rebuilt after the text nodes under it were split or merged.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct TextAnchors {
    root: NodeId,
    start: usize,
    end: usize,
    collapsed: bool,
}

fn char_offset<D: DocumentModel + ?Sized>(doc: &D, root: NodeId, boundary: Boundary) -> usize {
    let bpath = boundary_path(doc, boundary);
    let mut total = 0;
    for text in dom::text_descendants(doc, root) {
        let len = doc.node_len(text);
        if text == boundary.container {
            return total + boundary.offset.min(len);
        }
        let mut end = node_path(doc, text);
        end.push(len);
        if end <= bpath {
            total += len;
        } else {
            break;
        }
    }
    total
}

impl TextAnchors {
    pub(crate) fn capture<D: DocumentModel + ?Sized>(doc: &D, range: &Range) -> Self {
        let root = common_ancestor(doc, range)
            .map(|a| dom::nearest_block(doc, a))
            .unwrap_or_else(|| doc.root());
        Self {
            root,
            start: char_offset(doc, root, range.start),
            end: char_offset(doc, root, range.end),
            collapsed: range.is_collapsed(),
        }
    }

    fn locate<D: DocumentModel + ?Sized>(&self, doc: &D, offset: usize, forward: bool) -> Boundary {
        let texts: Vec<NodeId> = dom::text_descendants(doc, self.root)
            .into_iter()
            .filter(|&t| doc.node_len(t) > 0)
            .collect();
        let mut cumulative = 0;
        for &text in &texts {
            let len = doc.node_len(text);
            let inside = if forward {
                offset < cumulative + len
            } else {
                offset <= cumulative + len
            };
            if inside {
                return Boundary::new(text, offset.saturating_sub(cumulative));
            }
            cumulative += len;
        }
        match texts.last() {
            Some(&last) => Boundary::new(last, doc.node_len(last)),
            None => Boundary::new(self.root, 0),
        }
    }

    /// Rebuilds the range: the start binds to the following text, the end to
    /// the preceding one.
    pub(crate) fn resolve<D: DocumentModel + ?Sized>(&self, doc: &D) -> Range {
        let start = self.locate(doc, self.start, true);
        if self.collapsed {
            return Range::new(start, start);
        }
        Range::new(start, self.locate(doc, self.end, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDocument;

    fn doc(markup: &str) -> MemoryDocument {
        MemoryDocument::from_markup(markup).unwrap()
    }

    #[test]
    fn test_selection_state_classifies_nodes() {
        let d = doc("<p>one <b>two</b> three</p>");
        let one = d.find_text("one ").unwrap();
        let two = d.find_text("two").unwrap();
        let three = d.find_text(" three").unwrap();
        let range = Range::new(Boundary::new(one, 2), Boundary::new(three, 0));

        assert_eq!(selection_state(&d, &range, one), SelectionState::Partial);
        assert_eq!(selection_state(&d, &range, two), SelectionState::Full);
        assert_eq!(selection_state(&d, &range, three), SelectionState::None);
    }

    #[test]
    fn test_reversed_range_is_normalized() {
        let d = doc("<p>hello world</p>");
        let t = d.find_text("hello world").unwrap();
        let reversed = Range::within(t, 8, 2);
        let normalized = to_engine_range(&d, reversed).unwrap();
        assert_eq!(normalized, Range::within(t, 2, 8));
    }

    #[test]
    fn test_out_of_bounds_offset_is_rejected() {
        let d = doc("<p>abc</p>");
        let t = d.find_text("abc").unwrap();
        let err = to_engine_range(&d, Range::within(t, 1, 9)).unwrap_err();
        assert_eq!(
            err,
            StyleError::OutOfBounds {
                edge: RangeEdge::End,
                offset: 9,
                length: 3
            }
        );
        assert_eq!(err.to_string(), "endOffset 9 exceeds container length 3");
    }

    #[test]
    fn test_detached_container_is_invalid() {
        let mut d = doc("<p>abc</p>");
        let loose = d.create_text("loose");
        assert_eq!(
            to_engine_range(&d, Range::caret(loose, 0)),
            Err(StyleError::InvalidRange)
        );
        assert_eq!(
            expand_collapsed(&d, &Range::caret(loose, 0)),
            Err(StyleError::InvalidRange)
        );
    }

    #[test]
    fn test_common_ancestor() {
        let d = doc("<p>one <b>two</b></p><p>three</p>");
        let one = d.find_text("one ").unwrap();
        let two = d.find_text("two").unwrap();
        let three = d.find_text("three").unwrap();
        let p = d.parent(one).unwrap();

        assert_eq!(common_ancestor(&d, &Range::within(one, 0, 2)), Some(one));
        assert_eq!(
            common_ancestor(&d, &Range::new(Boundary::new(one, 0), Boundary::new(two, 1))),
            Some(p)
        );
        assert_eq!(
            common_ancestor(&d, &Range::new(Boundary::new(one, 0), Boundary::new(three, 1))),
            Some(d.root())
        );
    }

    #[test]
    fn test_expand_collapsed_covers_container() {
        let d = doc("<p>hello world!</p>");
        let t = d.find_text("hello world!").unwrap();
        let expanded = expand_collapsed(&d, &Range::caret(t, 4)).unwrap();
        assert_eq!(expanded, Range::within(t, 0, 12));
    }

    #[test]
    fn test_effective_markup_skips_partially_touched_empty_start() {
        let d = doc("<p>ab<b>cd</b></p>");
        let ab = d.find_text("ab").unwrap();
        let cd = d.find_text("cd").unwrap();
        let range = Range::new(Boundary::new(ab, 2), Boundary::new(cd, 2));
        let markup = effective_markup_at_start(&d, &range);
        let b = d.parent(cd).unwrap();
        assert_eq!(markup.first(), Some(&b));
    }

    #[test]
    fn test_anchors_survive_split_and_merge() {
        let mut d = doc("<p>hello world</p>");
        let t = d.find_text("hello world").unwrap();
        let range = Range::within(t, 3, 8);
        let anchors = TextAnchors::capture(&d, &range);

        let tail = d.split_text(t, 5).unwrap();
        let resolved = anchors.resolve(&d);
        assert_eq!(resolved.start, Boundary::new(t, 3));
        assert_eq!(resolved.end, Boundary::new(tail, 3));
    }
}
