//! Class application over ranges.
//!
//! A [`ClassApplier`] owns one class identity and keeps the wrapper structure
//! for it minimal. Applying splits the boundary text nodes so only the covered
//! characters are styled, reuses an enclosing element when every significant
//! text inside it is covered, and skips text that already sits under an
//! element with the class. Removing isolates the covered part of each carrier
//! so text outside the range keeps the class, and unwraps carriers left
//! without attributes.
//!
//! Block elements are never split or wrapped. A block carrying the class only
//! loses it when the range covers it completely.

use std::collections::BTreeSet;

use smol_str::SmolStr;

use crate::config::ApplierOptions;
use crate::dom::{self, DocumentModel, NodeId};
use crate::error::StyleError;
use crate::range::{self, Boundary, Range, SelectionState, TextAnchors};
use crate::types::{Mutation, NoOpReason};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassApplier {
    class: SmolStr,
    tag: SmolStr,
    options: ApplierOptions,
}

/// Splits the text nodes at both ends of `range` so that each boundary falls
/// between nodes. Returns the equivalent range over the split nodes and the
/// parents whose children changed.
pub(crate) fn split_boundaries<D: DocumentModel + ?Sized>(
    doc: &mut D,
    range: &Range,
) -> (Range, Vec<NodeId>) {
    let mut touched = Vec::new();
    let mut start = range.start;
    let mut end = range.end;

    if doc.is_text(end.container)
        && end.offset > 0
        && end.offset < doc.node_len(end.container)
        && doc.split_text(end.container, end.offset).is_some()
    {
        touched.extend(doc.parent(end.container));
    }
    if doc.is_text(start.container)
        && start.offset > 0
        && start.offset < doc.node_len(start.container)
    {
        if let Some(tail) = doc.split_text(start.container, start.offset) {
            touched.extend(doc.parent(tail));
            if end.container == start.container {
                end = Boundary::new(tail, end.offset - start.offset);
            }
            start = Boundary::new(tail, 0);
        }
    }
    (Range::new(start, end), touched)
}

impl ClassApplier {
    pub fn new(class: impl Into<SmolStr>, tag: impl Into<SmolStr>, options: ApplierOptions) -> Self {
        Self {
            class: class.into(),
            tag: tag.into(),
            options,
        }
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    fn is_wrapper<D: DocumentModel + ?Sized>(&self, doc: &D, node: NodeId) -> bool {
        doc.tag_name(node)
            .is_some_and(|t| t.eq_ignore_ascii_case(&self.tag))
    }

    /// Whitespace-only text containing a line break directly under a block.
    fn is_ignorable<D: DocumentModel + ?Sized>(&self, doc: &D, text: NodeId) -> bool {
        if !self.options.ignore_white_space {
            return false;
        }
        let Some(content) = doc.text(text) else {
            return false;
        };
        content.contains('\n')
            && content.chars().all(char::is_whitespace)
            && doc.parent(text).is_some_and(|p| doc.is_block(p))
    }

    fn in_scope<D: DocumentModel + ?Sized>(&self, doc: &D, node: NodeId) -> bool {
        !self.options.editable_only || doc.is_editable(node)
    }

    fn carries_class<D: DocumentModel + ?Sized>(&self, doc: &D, node: NodeId) -> bool {
        doc.is_element(node) && doc.has_class(node, &self.class)
    }

    fn is_covered<D: DocumentModel + ?Sized>(&self, doc: &D, text: NodeId) -> bool {
        let root = doc.root();
        dom::ancestors_inclusive(doc, text)
            .into_iter()
            .take_while(|&n| n != root)
            .any(|n| self.carries_class(doc, n))
    }

    /// Text the applier would style: non-empty, in scope and not ignorable.
    fn significant_texts<D: DocumentModel + ?Sized>(&self, doc: &D, range: &Range) -> Vec<NodeId> {
        range::text_nodes_in_range(doc, range)
            .into_iter()
            .filter(|&t| self.in_scope(doc, t) && !self.is_ignorable(doc, t))
            .collect()
    }

    /// Climbs from `text` while the parent is an inline, editable element
    /// whose significant text is entirely in `selected`.
    fn hoist<D: DocumentModel + ?Sized>(
        &self,
        doc: &D,
        text: NodeId,
        selected: &BTreeSet<NodeId>,
    ) -> NodeId {
        let root = doc.root();
        let mut target = text;
        while let Some(parent) = doc.parent(target) {
            if parent == root || doc.is_block(parent) || !self.in_scope(doc, parent) {
                break;
            }
            let all_selected = dom::text_descendants(doc, parent)
                .into_iter()
                .filter(|&t| doc.node_len(t) > 0 && !self.is_ignorable(doc, t))
                .all(|t| selected.contains(&t));
            if !all_selected {
                break;
            }
            target = parent;
        }
        target
    }

    fn normalize<D: DocumentModel + ?Sized>(&self, doc: &mut D, parents: &[NodeId]) {
        if !self.options.normalize {
            return;
        }
        let unique: BTreeSet<NodeId> = parents.iter().copied().collect();
        for parent in unique {
            if doc.is_attached(parent) {
                dom::merge_adjacent(doc, parent, &self.tag);
            }
        }
    }

    /// Wraps every significant text node in `range` that is not already
    /// under the class.
    pub fn apply<D: DocumentModel + ?Sized>(
        &self,
        doc: &mut D,
        range: &Range,
    ) -> Result<Mutation, StyleError> {
        range::validate(doc, range)?;
        if range.is_collapsed() {
            return Ok(Mutation::Unchanged(NoOpReason::Collapsed));
        }
        let anchors = TextAnchors::capture(doc, range);
        let (work, mut touched) = split_boundaries(doc, range);

        let selected: BTreeSet<NodeId> = self
            .significant_texts(doc, &work)
            .into_iter()
            .filter(|&t| !self.is_covered(doc, t))
            .collect();
        let ordered: Vec<NodeId> = range::text_nodes_in_range(doc, &work)
            .into_iter()
            .filter(|t| selected.contains(t))
            .collect();

        let mut targets: Vec<NodeId> = Vec::new();
        for text in ordered {
            let chain = dom::ancestors_inclusive(doc, text);
            if targets.iter().any(|t| chain.contains(t)) {
                continue;
            }
            targets.push(self.hoist(doc, text, &selected));
        }

        for &target in &targets {
            // A bare wrapper gets its own carrier.
            if doc.is_element(target) && self.is_wrapper(doc, target) && doc.attribute_count(target) > 0 {
                doc.add_class(target, &self.class);
            } else {
                let wrapper = doc.create_element(&self.tag);
                doc.add_class(wrapper, &self.class);
                dom::wrap(doc, target, wrapper);
            }
            touched.extend(doc.parent(target));
            if let Some(outer) = doc.parent(target).and_then(|p| doc.parent(p)) {
                touched.push(outer);
            }
        }
        tracing::trace!(
            target: "weaver::style::applier",
            class = %self.class,
            targets = targets.len(),
            "apply"
        );
        self.normalize(doc, &touched);

        if targets.is_empty() {
            Ok(Mutation::Unchanged(NoOpReason::AlreadyApplied))
        } else {
            Ok(Mutation::Changed(anchors.resolve(doc)))
        }
    }

    /// Strips the class from everything `range` covers.
    pub fn remove<D: DocumentModel + ?Sized>(
        &self,
        doc: &mut D,
        range: &Range,
    ) -> Result<Mutation, StyleError> {
        range::validate(doc, range)?;
        if range.is_collapsed() {
            return Ok(Mutation::Unchanged(NoOpReason::Collapsed));
        }
        let anchors = TextAnchors::capture(doc, range);
        let (work, mut touched) = split_boundaries(doc, range);
        let root = doc.root();
        let mut removed = 0usize;

        let texts: Vec<NodeId> = range::text_nodes_in_range(doc, &work)
            .into_iter()
            .filter(|&t| self.in_scope(doc, t))
            .collect();

        for (index, &text) in texts.iter().enumerate() {
            // Innermost inline carrier first; each pass peels one level.
            while let Some(carrier) = dom::ancestors_inclusive(doc, text)
                .into_iter()
                .take_while(|&n| n != root)
                .find(|&n| self.carries_class(doc, n) && !doc.is_block(n))
            {
                let group: Vec<NodeId> = texts[index..]
                    .iter()
                    .copied()
                    .take_while(|&t| dom::ancestors_inclusive(doc, t).contains(&carrier))
                    .collect();
                let last = group.last().copied().unwrap_or(text);
                let holder = dom::split_before(doc, carrier, text);
                let holder = dom::split_after(doc, holder, last);

                doc.remove_class(holder, &self.class);
                removed += 1;
                touched.extend(doc.parent(holder));
                if self.is_wrapper(doc, holder) && doc.attribute_count(holder) == 0 {
                    dom::unwrap(doc, holder);
                }
            }
        }

        if let Some(ancestor) = range::common_ancestor(doc, &work) {
            let mut candidates = dom::ancestors_inclusive(doc, ancestor);
            candidates.extend(dom::descendants_inclusive(doc, ancestor).into_iter().skip(1));
            for block in candidates {
                if block != root
                    && doc.is_block(block)
                    && self.carries_class(doc, block)
                    && self.in_scope(doc, block)
                    && range::selection_state(doc, &work, block) == SelectionState::Full
                {
                    doc.remove_class(block, &self.class);
                    removed += 1;
                }
            }
        }
        tracing::trace!(
            target: "weaver::style::applier",
            class = %self.class,
            removed,
            "remove"
        );
        self.normalize(doc, &touched);

        if removed == 0 {
            Ok(Mutation::Unchanged(NoOpReason::AlreadyApplied))
        } else {
            Ok(Mutation::Changed(anchors.resolve(doc)))
        }
    }

    /// Removes the class when the start of the range already has it,
    /// applies it otherwise.
    pub fn toggle<D: DocumentModel + ?Sized>(
        &self,
        doc: &mut D,
        range: &Range,
    ) -> Result<Mutation, StyleError> {
        range::validate(doc, range)?;
        let applied = self.is_applied_at_start(doc, range);
        tracing::debug!(
            target: "weaver::style::applier",
            class = %self.class,
            remove = applied,
            "toggle"
        );
        if applied {
            self.remove(doc, range)
        } else {
            self.apply(doc, range)
        }
    }

    /// Whether the effective markup at the start of `range` carries the class.
    pub fn is_applied_at_start<D: DocumentModel + ?Sized>(&self, doc: &D, range: &Range) -> bool {
        range::effective_markup_at_start(doc, range)
            .into_iter()
            .any(|n| self.carries_class(doc, n))
    }

    /// Whether every significant text the range touches is under the class.
    pub fn is_applied_to_range<D: DocumentModel + ?Sized>(&self, doc: &D, range: &Range) -> bool {
        let Some(ancestor) = range::common_ancestor(doc, range) else {
            return false;
        };
        let touched: Vec<NodeId> = dom::text_descendants(doc, ancestor)
            .into_iter()
            .filter(|&t| {
                doc.node_len(t) > 0
                    && self.in_scope(doc, t)
                    && !self.is_ignorable(doc, t)
                    && range::selection_state(doc, range, t) != SelectionState::None
            })
            .collect();
        !touched.is_empty() && touched.iter().all(|&t| self.is_covered(doc, t))
    }
}
