//! Document model abstraction and structural tree edits.
//!
//! The engine never touches a concrete tree. Everything it needs from the host
//! document goes through [`DocumentModel`], so the same code runs against a
//! browser DOM binding or the in-memory [`MemoryDocument`](crate::MemoryDocument).
//!
//! The free functions below are the structural edits the appliers and the
//! cleanup engine are built from: wrapping, unwrapping, splitting an element
//! around a descendant, and merging adjacent equivalent siblings.

use smol_str::SmolStr;

/// Opaque handle to a node owned by a [`DocumentModel`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Text,
}

const BLOCK_TAGS: &[&str] = &[
    "address",
    "article",
    "aside",
    "blockquote",
    "body",
    "dd",
    "div",
    "dl",
    "dt",
    "figcaption",
    "figure",
    "footer",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "header",
    "hr",
    "li",
    "main",
    "nav",
    "ol",
    "p",
    "pre",
    "section",
    "table",
    "tbody",
    "td",
    "tfoot",
    "th",
    "thead",
    "tr",
    "ul",
];

/// Whether `tag` names a block-level element.
pub fn is_block_tag(tag: &str) -> bool {
    BLOCK_TAGS.iter().any(|t| t.eq_ignore_ascii_case(tag))
}

/// Capability contract for the mutable document tree.
///
/// Text lengths and offsets are measured in characters, not bytes.
/// Implementations must drop the `class` attribute once the last class is
/// removed, and the `style` attribute once the last property is removed, so
/// that [`attribute_count`](Self::attribute_count) reaches zero for a bare
/// wrapper.
pub trait DocumentModel {
    /// The document root. Never split, unwrapped or detached by the engine.
    fn root(&self) -> NodeId;

    /// Node kind, or `None` if the handle is unknown.
    fn kind(&self, node: NodeId) -> Option<NodeKind>;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    fn children(&self, node: NodeId) -> Vec<NodeId>;

    /// Lowercase tag name for elements, `None` for text.
    fn tag_name(&self, node: NodeId) -> Option<SmolStr>;

    /// Text content of a text node, `None` for elements.
    fn text(&self, node: NodeId) -> Option<String>;

    fn set_text(&mut self, node: NodeId, text: &str);

    fn classes(&self, node: NodeId) -> Vec<SmolStr>;

    fn add_class(&mut self, node: NodeId, class: &str);

    /// Removes `class`; the class attribute disappears once no class is left.
    fn remove_class(&mut self, node: NodeId, class: &str);

    /// Inline style value for a hyphenated CSS property.
    fn style(&self, node: NodeId, property: &str) -> Option<SmolStr>;

    fn styles(&self, node: NodeId) -> Vec<(SmolStr, SmolStr)>;

    fn set_style(&mut self, node: NodeId, property: &str, value: &str);

    /// Removes `property`; the style attribute disappears once empty.
    fn remove_style(&mut self, node: NodeId, property: &str);

    fn attribute(&self, node: NodeId, name: &str) -> Option<SmolStr>;

    /// Every attribute in serialized form, `class` and `style` included.
    fn attributes(&self, node: NodeId) -> Vec<(SmolStr, SmolStr)>;

    /// Creates a detached element.
    fn create_element(&mut self, tag: &str) -> NodeId;

    /// Creates a detached text node.
    fn create_text(&mut self, text: &str) -> NodeId;

    /// Detached copy of `node` with the same tag and attributes but no children.
    fn clone_shallow(&mut self, node: NodeId) -> NodeId;

    /// Inserts `child` into `parent` before `reference`, or last when
    /// `reference` is `None`. The child is detached from its old parent first.
    fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>);

    /// Removes `node` from its parent. The node and its subtree stay valid.
    fn detach(&mut self, node: NodeId);

    fn is_text(&self, node: NodeId) -> bool {
        self.kind(node) == Some(NodeKind::Text)
    }

    fn is_element(&self, node: NodeId) -> bool {
        self.kind(node) == Some(NodeKind::Element)
    }

    /// Character count for text nodes, child count for elements.
    fn node_len(&self, node: NodeId) -> usize {
        match self.kind(node) {
            Some(NodeKind::Text) => self.text(node).map_or(0, |t| t.chars().count()),
            Some(NodeKind::Element) => self.children(node).len(),
            None => 0,
        }
    }

    fn attribute_count(&self, node: NodeId) -> usize {
        self.attributes(node).len()
    }

    fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.classes(node).iter().any(|c| c == class)
    }

    fn index_in_parent(&self, node: NodeId) -> Option<usize> {
        let parent = self.parent(node)?;
        self.children(parent).iter().position(|&c| c == node)
    }

    fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent(node)?;
        let children = self.children(parent);
        let index = children.iter().position(|&c| c == node)?;
        children.get(index + 1).copied()
    }

    /// Whether a chain of parents connects `node` to the root.
    fn is_attached(&self, node: NodeId) -> bool {
        if self.kind(node).is_none() {
            return false;
        }
        let root = self.root();
        let mut current = node;
        while current != root {
            match self.parent(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
        true
    }

    fn is_block(&self, node: NodeId) -> bool {
        self.tag_name(node).is_some_and(|tag| is_block_tag(&tag))
    }

    /// Content-editable state inherited from the nearest ancestor-or-self
    /// carrying a `contenteditable` attribute.
    fn is_editable(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if let Some(value) = self.attribute(n, "contenteditable") {
                return !value.eq_ignore_ascii_case("false");
            }
            current = self.parent(n);
        }
        false
    }

    /// Splits a text node at a character offset. The original node keeps the
    /// head, the returned node holds the tail and is inserted right after.
    fn split_text(&mut self, node: NodeId, offset: usize) -> Option<NodeId> {
        let text = self.text(node)?;
        let split_at = match text.char_indices().nth(offset) {
            Some((byte, _)) => byte,
            None if offset == text.chars().count() => text.len(),
            None => return None,
        };
        let parent = self.parent(node)?;
        let next = self.next_sibling(node);
        let (head, tail) = text.split_at(split_at);
        let tail_node = self.create_text(tail);
        self.set_text(node, head);
        self.insert_before(parent, tail_node, next);
        Some(tail_node)
    }
}

/// Element for a node: the node itself, or the parent of a text node.
pub fn element_of<D: DocumentModel + ?Sized>(doc: &D, node: NodeId) -> Option<NodeId> {
    match doc.kind(node)? {
        NodeKind::Element => Some(node),
        NodeKind::Text => doc.parent(node),
    }
}

/// `node` followed by its ancestors, innermost first, up to the root.
pub fn ancestors_inclusive<D: DocumentModel + ?Sized>(doc: &D, node: NodeId) -> Vec<NodeId> {
    let mut out = vec![node];
    let mut current = node;
    while let Some(parent) = doc.parent(current) {
        out.push(parent);
        current = parent;
    }
    out
}

/// Nearest block-level ancestor-or-self, falling back to the root.
pub fn nearest_block<D: DocumentModel + ?Sized>(doc: &D, node: NodeId) -> NodeId {
    ancestors_inclusive(doc, node)
        .into_iter()
        .find(|&n| doc.is_block(n))
        .unwrap_or_else(|| doc.root())
}

/// Pre-order walk of `node` and all its descendants.
pub fn descendants_inclusive<D: DocumentModel + ?Sized>(doc: &D, node: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack = vec![node];
    while let Some(n) = stack.pop() {
        out.push(n);
        let children = doc.children(n);
        stack.extend(children.into_iter().rev());
    }
    out
}

/// Text nodes under `node` (or `node` itself) in document order.
pub fn text_descendants<D: DocumentModel + ?Sized>(doc: &D, node: NodeId) -> Vec<NodeId> {
    descendants_inclusive(doc, node)
        .into_iter()
        .filter(|&n| doc.is_text(n))
        .collect()
}

/// Puts `wrapper` in place of `node` and moves `node` inside it.
pub fn wrap<D: DocumentModel + ?Sized>(doc: &mut D, node: NodeId, wrapper: NodeId) -> bool {
    let Some(parent) = doc.parent(node) else {
        return false;
    };
    doc.insert_before(parent, wrapper, Some(node));
    doc.insert_before(wrapper, node, None);
    true
}

/// Splices the children of `element` into its parent at its position and
/// detaches it.
pub fn unwrap<D: DocumentModel + ?Sized>(doc: &mut D, element: NodeId) -> bool {
    let Some(parent) = doc.parent(element) else {
        return false;
    };
    for child in doc.children(element) {
        doc.insert_before(parent, child, Some(element));
    }
    doc.detach(element);
    true
}

fn place_after<D: DocumentModel + ?Sized>(doc: &mut D, node: NodeId, new: NodeId) {
    if let Some(parent) = doc.parent(node) {
        let next = doc.next_sibling(node);
        doc.insert_before(parent, new, next);
    }
}

/// Splits `ancestor` so that `node` and everything after it moves into a
/// shallow copy placed right after `ancestor`. Levels where `node` is already
/// the first child are not copied. Returns the element that now holds `node`
/// at the `ancestor` level.
pub fn split_before<D: DocumentModel + ?Sized>(
    doc: &mut D,
    ancestor: NodeId,
    node: NodeId,
) -> NodeId {
    if ancestor == node || !ancestors_inclusive(doc, node).contains(&ancestor) {
        return node;
    }
    let mut current = node;
    while let Some(parent) = doc.parent(current) {
        let siblings = doc.children(parent);
        let index = siblings.iter().position(|&c| c == current).unwrap_or(0);
        let right = if index == 0 {
            parent
        } else {
            let copy = doc.clone_shallow(parent);
            place_after(doc, parent, copy);
            for &moved in &siblings[index..] {
                doc.insert_before(copy, moved, None);
            }
            copy
        };
        if parent == ancestor {
            return right;
        }
        current = right;
    }
    current
}

/// Mirror of [`split_before`]: everything after `node` moves into a copy of
/// `ancestor`. Returns the element that still holds `node`.
pub fn split_after<D: DocumentModel + ?Sized>(
    doc: &mut D,
    ancestor: NodeId,
    node: NodeId,
) -> NodeId {
    if ancestor == node || !ancestors_inclusive(doc, node).contains(&ancestor) {
        return node;
    }
    let mut current = node;
    while let Some(parent) = doc.parent(current) {
        let siblings = doc.children(parent);
        let index = siblings.iter().position(|&c| c == current).unwrap_or(0);
        if index + 1 < siblings.len() {
            let copy = doc.clone_shallow(parent);
            place_after(doc, parent, copy);
            for &moved in &siblings[index + 1..] {
                doc.insert_before(copy, moved, None);
            }
        }
        if parent == ancestor {
            return parent;
        }
        current = parent;
    }
    current
}

/// Splits `ancestor` on both sides of `node` so the returned piece contains
/// nothing but the chain leading down to `node`.
pub fn isolate<D: DocumentModel + ?Sized>(doc: &mut D, ancestor: NodeId, node: NodeId) -> NodeId {
    let holder = split_before(doc, ancestor, node);
    split_after(doc, holder, node)
}

fn sorted(mut items: Vec<(SmolStr, SmolStr)>) -> Vec<(SmolStr, SmolStr)> {
    items.sort();
    items
}

/// Attribute equality that ignores class and style ordering.
pub fn same_attributes<D: DocumentModel + ?Sized>(doc: &D, a: NodeId, b: NodeId) -> bool {
    let mut classes_a = doc.classes(a);
    let mut classes_b = doc.classes(b);
    classes_a.sort();
    classes_b.sort();
    if classes_a != classes_b || sorted(doc.styles(a)) != sorted(doc.styles(b)) {
        return false;
    }
    let others = |n| {
        sorted(
            doc.attributes(n)
                .into_iter()
                .filter(|(k, _)| k != "class" && k != "style")
                .collect(),
        )
    };
    others(a) == others(b)
}

fn is_tag<D: DocumentModel + ?Sized>(doc: &D, node: NodeId, tag: &str) -> bool {
    doc.tag_name(node).is_some_and(|t| t.eq_ignore_ascii_case(tag))
}

/// Merges adjacent text nodes and adjacent `wrapper_tag` elements with equal
/// attributes among the children of `parent`, recursing into merged wrappers.
pub fn merge_adjacent<D: DocumentModel + ?Sized>(doc: &mut D, parent: NodeId, wrapper_tag: &str) {
    let mut children = doc.children(parent);
    let mut i = 0;
    while i + 1 < children.len() {
        let (left, right) = (children[i], children[i + 1]);
        if doc.is_text(left) && doc.is_text(right) {
            let mut joined = doc.text(left).unwrap_or_default();
            joined.push_str(&doc.text(right).unwrap_or_default());
            doc.set_text(left, &joined);
            doc.detach(right);
            children.remove(i + 1);
            continue;
        }
        if is_tag(doc, left, wrapper_tag)
            && is_tag(doc, right, wrapper_tag)
            && same_attributes(doc, left, right)
        {
            for moved in doc.children(right) {
                doc.insert_before(left, moved, None);
            }
            doc.detach(right);
            children.remove(i + 1);
            merge_adjacent(doc, left, wrapper_tag);
            continue;
        }
        i += 1;
    }
}
