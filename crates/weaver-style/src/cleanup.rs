//! Transform-then-unwrap cleanup over the elements a range fully covers.
//!
//! Each pass runs a caller transform on every fully selected element (text
//! nodes stand in for their parent), then unwraps generic wrappers the
//! transform left without attributes. [`recursive_cleanup`] repeats passes
//! until one removes nothing or the pass cap is hit.

use crate::dom::{self, DocumentModel, NodeId};
use crate::error::StyleError;
use crate::range::{self, Range, SelectionState, TextAnchors};

/// Result of one cleanup pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CleanupPass {
    /// Wrappers unwrapped in this pass.
    pub removed: usize,
    /// The range re-pointed at the content after unwrapping.
    pub range: Range,
}

/// Result of a bounded sequence of passes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CleanupOutcome {
    /// False when the cap stopped the loop while passes were still removing.
    pub converged: bool,
    pub passes: usize,
    pub removed: usize,
    /// `None` when the range had no common ancestor and nothing ran.
    pub range: Option<Range>,
}

/// Fully selected elements in pre-order, from the outermost covered ancestor
/// of the range down, root excluded.
fn fully_selected_elements<D: DocumentModel + ?Sized>(
    doc: &D,
    range: &Range,
    ancestor: NodeId,
) -> Vec<NodeId> {
    let root = doc.root();
    let mut nodes: Vec<NodeId> = dom::ancestors_inclusive(doc, ancestor)
        .into_iter()
        .skip(1)
        .filter(|&n| n != root)
        .collect();
    nodes.reverse();
    nodes.extend(dom::descendants_inclusive(doc, ancestor));

    let mut out: Vec<NodeId> = Vec::new();
    for node in nodes {
        if doc.is_text(node) && doc.node_len(node) == 0 {
            continue;
        }
        if range::selection_state(doc, range, node) != SelectionState::Full {
            continue;
        }
        let Some(element) = dom::element_of(doc, node) else {
            continue;
        };
        if element != root && !out.contains(&element) {
            out.push(element);
        }
    }
    out
}

/// One cleanup pass. `Ok(None)` when the range has no common ancestor.
pub fn element_cleanup<D, F>(
    doc: &mut D,
    range: &Range,
    wrapper_tag: &str,
    transform: &mut F,
) -> Result<Option<CleanupPass>, StyleError>
where
    D: DocumentModel + ?Sized,
    F: FnMut(&mut D, NodeId),
{
    let Some(ancestor) = range::common_ancestor(doc, range) else {
        return Ok(None);
    };
    range::validate(doc, range)?;
    let anchors = TextAnchors::capture(doc, range);
    let elements = fully_selected_elements(doc, range, ancestor);

    let mut removed = 0;
    for element in elements {
        if !doc.is_attached(element) {
            continue;
        }
        transform(doc, element);
        let bare = doc
            .tag_name(element)
            .is_some_and(|t| t.eq_ignore_ascii_case(wrapper_tag))
            && doc.attribute_count(element) == 0;
        if bare {
            if let Some(parent) = doc.parent(element) {
                dom::unwrap(doc, element);
                dom::merge_adjacent(doc, parent, wrapper_tag);
                removed += 1;
            }
        }
    }
    let range = anchors.resolve(doc);
    tracing::trace!(target: "weaver::style::cleanup", removed, "cleanup pass");
    Ok(Some(CleanupPass { removed, range }))
}

/// Repeats [`element_cleanup`] while passes keep unwrapping, at most
/// `max_passes` times.
pub fn recursive_cleanup<D, F>(
    doc: &mut D,
    range: &Range,
    wrapper_tag: &str,
    max_passes: usize,
    mut transform: F,
) -> Result<CleanupOutcome, StyleError>
where
    D: DocumentModel + ?Sized,
    F: FnMut(&mut D, NodeId),
{
    let mut outcome = CleanupOutcome {
        converged: true,
        passes: 0,
        removed: 0,
        range: None,
    };
    let mut current = *range;
    while outcome.passes < max_passes.max(1) {
        let Some(pass) = element_cleanup(doc, &current, wrapper_tag, &mut transform)? else {
            return Ok(outcome);
        };
        outcome.passes += 1;
        outcome.removed += pass.removed;
        outcome.range = Some(pass.range);
        current = pass.range;
        if pass.removed == 0 {
            return Ok(outcome);
        }
    }
    outcome.converged = false;
    tracing::debug!(
        target: "weaver::style::cleanup",
        passes = outcome.passes,
        removed = outcome.removed,
        "cleanup pass cap reached before convergence"
    );
    Ok(outcome)
}
