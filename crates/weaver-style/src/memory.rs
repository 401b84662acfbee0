//! In-memory document and host.
//!
//! [`MemoryDocument`] is an arena tree implementing [`DocumentModel`], with a
//! small markup reader and writer so trees can be written down as text.
//! [`MemoryHost`] wraps it with a selection, a notification log, computed
//! style overrides and an injectable width measurer.

use std::collections::BTreeMap;

use smol_str::SmolStr;

use crate::dom::{DocumentModel, NodeId, NodeKind};
use crate::error::MarkupError;
use crate::host::{ChangeMetadata, EditorHost};
use crate::range::Range;

const VOID_TAGS: &[&str] = &["br", "hr", "img", "input", "wbr"];

#[derive(Clone, Debug)]
enum NodeData {
    Element {
        tag: SmolStr,
        classes: Vec<SmolStr>,
        styles: Vec<(SmolStr, SmolStr)>,
        attrs: Vec<(SmolStr, SmolStr)>,
        children: Vec<NodeId>,
    },
    Text(String),
}

#[derive(Clone, Debug)]
struct NodeEntry {
    parent: Option<NodeId>,
    data: NodeData,
}

/// Arena-backed document tree. The root is an editable `body`.
#[derive(Clone, Debug)]
pub struct MemoryDocument {
    nodes: Vec<NodeEntry>,
    root: NodeId,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            root: NodeId(0),
        };
        let root = doc.create_element("body");
        doc.set_attr(root, "contenteditable", "true");
        doc.root = root;
        doc
    }

    /// Builds a document whose root holds the parsed markup.
    pub fn from_markup(markup: &str) -> Result<Self, MarkupError> {
        let mut doc = Self::new();
        let root = doc.root;
        Parser::new(markup, &mut doc).parse_into(root)?;
        Ok(doc)
    }

    /// Serializes the children of the root.
    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        for child in self.children(self.root) {
            self.write_node(child, &mut out);
        }
        out
    }

    /// First attached text node whose content equals `text`.
    pub fn find_text(&self, text: &str) -> Option<NodeId> {
        crate::dom::text_descendants(self, self.root)
            .into_iter()
            .find(|&n| self.text(n).as_deref() == Some(text))
    }

    /// First attached element with the given tag.
    pub fn find_element(&self, tag: &str) -> Option<NodeId> {
        crate::dom::descendants_inclusive(self, self.root)
            .into_iter()
            .find(|&n| self.tag_name(n).is_some_and(|t| t == tag))
    }

    pub fn elements_with_class(&self, class: &str) -> Vec<NodeId> {
        crate::dom::descendants_inclusive(self, self.root)
            .into_iter()
            .filter(|&n| self.has_class(n, class))
            .collect()
    }

    pub fn append_element(&mut self, parent: NodeId, tag: &str) -> NodeId {
        let el = self.create_element(tag);
        self.insert_before(parent, el, None);
        el
    }

    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        let t = self.create_text(text);
        self.insert_before(parent, t, None);
        t
    }

    /// Sets a plain attribute. `class` and `style` are routed to their maps.
    pub fn set_attr(&mut self, node: NodeId, name: &str, value: &str) {
        match name {
            "class" => {
                for class in value.split_whitespace() {
                    self.add_class(node, class);
                }
            }
            "style" => {
                for (prop, val) in parse_style_attr(value) {
                    self.set_style(node, &prop, &val);
                }
            }
            _ => {
                if let Some(NodeData::Element { attrs, .. }) = self.data_mut(node) {
                    match attrs.iter_mut().find(|(k, _)| k == name) {
                        Some(entry) => entry.1 = value.into(),
                        None => attrs.push((name.into(), value.into())),
                    }
                }
            }
        }
    }

    fn entry(&self, node: NodeId) -> Option<&NodeEntry> {
        self.nodes.get(node.0 as usize)
    }

    fn data_mut(&mut self, node: NodeId) -> Option<&mut NodeData> {
        self.nodes.get_mut(node.0 as usize).map(|e| &mut e.data)
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeEntry { parent: None, data });
        id
    }

    fn write_node(&self, node: NodeId, out: &mut String) {
        let Some(entry) = self.entry(node) else {
            return;
        };
        match &entry.data {
            NodeData::Text(text) => escape_into(text, false, out),
            NodeData::Element { tag, children, .. } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in self.attributes(node) {
                    out.push(' ');
                    out.push_str(&name);
                    out.push_str("=\"");
                    escape_into(&value, true, out);
                    out.push('"');
                }
                out.push('>');
                if VOID_TAGS.contains(&tag.as_str()) {
                    return;
                }
                for &child in children {
                    self.write_node(child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }
}

impl DocumentModel for MemoryDocument {
    fn root(&self) -> NodeId {
        self.root
    }

    fn kind(&self, node: NodeId) -> Option<NodeKind> {
        self.entry(node).map(|e| match e.data {
            NodeData::Element { .. } => NodeKind::Element,
            NodeData::Text(_) => NodeKind::Text,
        })
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.entry(node)?.parent
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        match self.entry(node).map(|e| &e.data) {
            Some(NodeData::Element { children, .. }) => children.clone(),
            _ => Vec::new(),
        }
    }

    fn tag_name(&self, node: NodeId) -> Option<SmolStr> {
        match &self.entry(node)?.data {
            NodeData::Element { tag, .. } => Some(tag.clone()),
            NodeData::Text(_) => None,
        }
    }

    fn text(&self, node: NodeId) -> Option<String> {
        match &self.entry(node)?.data {
            NodeData::Text(text) => Some(text.clone()),
            NodeData::Element { .. } => None,
        }
    }

    fn set_text(&mut self, node: NodeId, value: &str) {
        if let Some(NodeData::Text(text)) = self.data_mut(node) {
            *text = value.to_owned();
        }
    }

    fn classes(&self, node: NodeId) -> Vec<SmolStr> {
        match self.entry(node).map(|e| &e.data) {
            Some(NodeData::Element { classes, .. }) => classes.clone(),
            _ => Vec::new(),
        }
    }

    fn add_class(&mut self, node: NodeId, class: &str) {
        if let Some(NodeData::Element { classes, .. }) = self.data_mut(node) {
            if !classes.iter().any(|c| c == class) {
                classes.push(class.into());
            }
        }
    }

    fn remove_class(&mut self, node: NodeId, class: &str) {
        if let Some(NodeData::Element { classes, .. }) = self.data_mut(node) {
            classes.retain(|c| c != class);
        }
    }

    fn style(&self, node: NodeId, property: &str) -> Option<SmolStr> {
        match &self.entry(node)?.data {
            NodeData::Element { styles, .. } => styles
                .iter()
                .find(|(k, _)| k == property)
                .map(|(_, v)| v.clone()),
            NodeData::Text(_) => None,
        }
    }

    fn styles(&self, node: NodeId) -> Vec<(SmolStr, SmolStr)> {
        match self.entry(node).map(|e| &e.data) {
            Some(NodeData::Element { styles, .. }) => styles.clone(),
            _ => Vec::new(),
        }
    }

    fn set_style(&mut self, node: NodeId, property: &str, value: &str) {
        if value.is_empty() {
            self.remove_style(node, property);
            return;
        }
        if let Some(NodeData::Element { styles, .. }) = self.data_mut(node) {
            match styles.iter_mut().find(|(k, _)| k == property) {
                Some(entry) => entry.1 = value.into(),
                None => styles.push((property.into(), value.into())),
            }
        }
    }

    fn remove_style(&mut self, node: NodeId, property: &str) {
        if let Some(NodeData::Element { styles, .. }) = self.data_mut(node) {
            styles.retain(|(k, _)| k != property);
        }
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<SmolStr> {
        self.attributes(node)
            .into_iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    fn attributes(&self, node: NodeId) -> Vec<(SmolStr, SmolStr)> {
        let Some(NodeData::Element {
            classes,
            styles,
            attrs,
            ..
        }) = self.entry(node).map(|e| &e.data)
        else {
            return Vec::new();
        };
        let mut out = attrs.clone();
        if !classes.is_empty() {
            out.push(("class".into(), classes.join(" ").into()));
        }
        if !styles.is_empty() {
            let joined: Vec<String> = styles.iter().map(|(k, v)| format!("{k}: {v}")).collect();
            out.push(("style".into(), joined.join("; ").into()));
        }
        out
    }

    fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeData::Element {
            tag: tag.to_ascii_lowercase().into(),
            classes: Vec::new(),
            styles: Vec::new(),
            attrs: Vec::new(),
            children: Vec::new(),
        })
    }

    fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeData::Text(text.to_owned()))
    }

    fn clone_shallow(&mut self, node: NodeId) -> NodeId {
        let data = match self.entry(node).map(|e| &e.data) {
            Some(NodeData::Element {
                tag,
                classes,
                styles,
                attrs,
                ..
            }) => NodeData::Element {
                tag: tag.clone(),
                classes: classes.clone(),
                styles: styles.clone(),
                attrs: attrs.clone(),
                children: Vec::new(),
            },
            Some(NodeData::Text(text)) => NodeData::Text(text.clone()),
            None => NodeData::Text(String::new()),
        };
        self.push(data)
    }

    fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        if parent == child || self.entry(child).is_none() {
            return;
        }
        self.detach(child);
        let Some(NodeData::Element { children, .. }) = self.data_mut(parent) else {
            return;
        };
        let index = reference
            .and_then(|r| children.iter().position(|&c| c == r))
            .unwrap_or(children.len());
        children.insert(index, child);
        if let Some(entry) = self.nodes.get_mut(child.0 as usize) {
            entry.parent = Some(parent);
        }
    }

    fn detach(&mut self, node: NodeId) {
        let Some(parent) = self.parent(node) else {
            return;
        };
        if let Some(NodeData::Element { children, .. }) = self.data_mut(parent) {
            children.retain(|&c| c != node);
        }
        if let Some(entry) = self.nodes.get_mut(node.0 as usize) {
            entry.parent = None;
        }
    }
}

fn parse_style_attr(value: &str) -> Vec<(String, String)> {
    value
        .split(';')
        .filter_map(|decl| {
            let (prop, val) = decl.split_once(':')?;
            let (prop, val) = (prop.trim(), val.trim());
            (!prop.is_empty() && !val.is_empty())
                .then(|| (prop.to_ascii_lowercase(), val.to_owned()))
        })
        .collect()
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_owned();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest.find(';').and_then(|semi| {
            let c = match &rest[1..semi] {
                "amp" => '&',
                "lt" => '<',
                "gt" => '>',
                "quot" => '"',
                "apos" | "#39" => '\'',
                "nbsp" => '\u{a0}',
                _ => return None,
            };
            Some((c, semi + 1))
        });
        match decoded {
            Some((c, len)) => {
                out.push(c);
                rest = &rest[len..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    doc: &'a mut MemoryDocument,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str, doc: &'a mut MemoryDocument) -> Self {
        Self { input, pos: 0, doc }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let rest = self.rest();
        let end = rest.find(|c: char| !pred(c)).unwrap_or(rest.len());
        self.pos += end;
        &rest[..end]
    }

    fn parse_into(&mut self, root: NodeId) -> Result<(), MarkupError> {
        let mut stack: Vec<(NodeId, SmolStr)> = Vec::new();
        while !self.rest().is_empty() {
            let parent = stack.last().map_or(root, |(n, _)| *n);
            if let Some(after) = self.rest().strip_prefix("</") {
                let close = after.find('>').ok_or(MarkupError::Unterminated)?;
                let found = after[..close].trim().to_ascii_lowercase();
                self.pos += 2 + close + 1;
                match stack.pop() {
                    Some((_, expected)) if expected == found.as_str() => {}
                    Some((_, expected)) => {
                        return Err(MarkupError::Mismatched {
                            expected: expected.to_string(),
                            found,
                        });
                    }
                    None => {
                        return Err(MarkupError::Mismatched {
                            expected: String::new(),
                            found,
                        });
                    }
                }
            } else if self.rest().starts_with('<') {
                self.pos += 1;
                let (element, tag, open) = self.parse_open_tag()?;
                self.doc.insert_before(parent, element, None);
                if open {
                    stack.push((element, tag));
                }
            } else {
                let text = self.take_while(|c| c != '<');
                let node = self.doc.create_text(&decode_entities(text));
                self.doc.insert_before(parent, node, None);
            }
        }
        match stack.pop() {
            Some((_, tag)) => Err(MarkupError::Unclosed(tag.to_string())),
            None => Ok(()),
        }
    }

    /// Parses after `<`. Returns the element, its tag and whether it stays open.
    fn parse_open_tag(&mut self) -> Result<(NodeId, SmolStr, bool), MarkupError> {
        let name = self.take_while(|c| c.is_ascii_alphanumeric() || c == '-');
        if name.is_empty() {
            return Err(MarkupError::EmptyTag);
        }
        let tag: SmolStr = name.to_ascii_lowercase().into();
        let element = self.doc.create_element(&tag);
        loop {
            self.skip_whitespace();
            let rest = self.rest();
            if rest.is_empty() {
                return Err(MarkupError::Unterminated);
            }
            if let Some(after) = rest.strip_prefix("/>") {
                self.pos = self.input.len() - after.len();
                return Ok((element, tag, false));
            }
            if rest.starts_with('>') {
                self.pos += 1;
                let open = !VOID_TAGS.contains(&tag.as_str());
                return Ok((element, tag, open));
            }
            let attr = self
                .take_while(|c| !c.is_whitespace() && c != '=' && c != '>' && c != '/')
                .to_ascii_lowercase();
            if attr.is_empty() {
                return Err(MarkupError::Unterminated);
            }
            self.skip_whitespace();
            let value = if self.rest().starts_with('=') {
                self.pos += 1;
                self.skip_whitespace();
                let quote = match self.rest().chars().next() {
                    Some(q @ ('"' | '\'')) => q,
                    _ => return Err(MarkupError::UnquotedAttribute(attr)),
                };
                self.pos += 1;
                let raw = self.take_while(|c| c != quote);
                if self.rest().is_empty() {
                    return Err(MarkupError::Unterminated);
                }
                self.pos += 1;
                decode_entities(raw)
            } else {
                String::new()
            };
            self.doc.set_attr(element, &attr, &value);
        }
    }
}

/// Which width [`MemoryHost`]'s measurer is asked for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Width {
    /// Width available inside a block.
    Available,
    /// Rendered width of an element's content.
    Content,
}

pub type Measurer = Box<dyn Fn(&MemoryDocument, NodeId, Width) -> Option<f64>>;

/// [`EditorHost`] over a [`MemoryDocument`].
pub struct MemoryHost {
    pub doc: MemoryDocument,
    pub selection: Option<Range>,
    /// Every notification the engine delivered, in order.
    pub notifications: Vec<ChangeMetadata>,
    /// Number of `set_active_range` calls.
    pub selection_writes: usize,
    computed: BTreeMap<(NodeId, SmolStr), SmolStr>,
    measure: Option<Measurer>,
}

impl std::fmt::Debug for MemoryHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryHost")
            .field("doc", &self.doc)
            .field("selection", &self.selection)
            .field("notifications", &self.notifications)
            .field("selection_writes", &self.selection_writes)
            .field("computed", &self.computed)
            .field("measure", &self.measure.is_some())
            .finish()
    }
}

impl MemoryHost {
    pub fn new(doc: MemoryDocument) -> Self {
        Self {
            doc,
            selection: None,
            notifications: Vec::new(),
            selection_writes: 0,
            computed: BTreeMap::new(),
            measure: None,
        }
    }

    pub fn from_markup(markup: &str) -> Result<Self, MarkupError> {
        MemoryDocument::from_markup(markup).map(Self::new)
    }

    pub fn with_measurer(
        mut self,
        measure: impl Fn(&MemoryDocument, NodeId, Width) -> Option<f64> + 'static,
    ) -> Self {
        self.measure = Some(Box::new(measure));
        self
    }

    /// Pins the computed value of `property` on `element`, e.g. a stylesheet rule.
    pub fn set_computed(&mut self, element: NodeId, property: &str, value: &str) {
        self.computed.insert((element, property.into()), value.into());
    }

    /// Selects `start..end` characters of the first text node equal to `text`.
    pub fn select_text(&mut self, text: &str, start: usize, end: usize) -> Option<Range> {
        let node = self.doc.find_text(text)?;
        let range = Range::within(node, start, end);
        self.selection = Some(range);
        Some(range)
    }
}

impl EditorHost for MemoryHost {
    type Document = MemoryDocument;

    fn document(&self) -> &MemoryDocument {
        &self.doc
    }

    fn document_mut(&mut self) -> &mut MemoryDocument {
        &mut self.doc
    }

    fn active_range(&self) -> Option<Range> {
        self.selection
    }

    fn set_active_range(&mut self, range: Range) {
        self.selection = Some(range);
        self.selection_writes += 1;
    }

    /// Pinned values first, then inline values inherited from ancestors.
    fn computed_value(&self, element: NodeId, property: &str) -> Option<SmolStr> {
        crate::dom::ancestors_inclusive(&self.doc, element)
            .into_iter()
            .find_map(|n| {
                self.computed
                    .get(&(n, SmolStr::new(property)))
                    .cloned()
                    .or_else(|| self.doc.style(n, property))
            })
    }

    fn available_width(&self, element: NodeId) -> Option<f64> {
        let measure = self.measure.as_ref()?;
        measure(&self.doc, element, Width::Available)
    }

    fn content_width(&self, element: NodeId) -> Option<f64> {
        let measure = self.measure.as_ref()?;
        measure(&self.doc, element, Width::Content)
    }

    fn notify_content_changed(&mut self, metadata: &ChangeMetadata) {
        self.notifications.push(metadata.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom;

    #[test]
    fn test_markup_round_trip_preserves_attribute_order() {
        let markup = r#"<p id="a" class="x y" style="font-size: 12px; color: red">one<br>two &amp; <b>three</b></p>"#;
        let doc = MemoryDocument::from_markup(markup).unwrap();
        assert_eq!(doc.to_markup(), markup);
    }

    #[test]
    fn test_markup_errors() {
        assert_eq!(
            MemoryDocument::from_markup("<p>x</b>").unwrap_err(),
            MarkupError::Mismatched {
                expected: "p".into(),
                found: "b".into()
            }
        );
        assert_eq!(
            MemoryDocument::from_markup("<p>x").unwrap_err(),
            MarkupError::Unclosed("p".into())
        );
        assert_eq!(
            MemoryDocument::from_markup("<p class=x>").unwrap_err(),
            MarkupError::UnquotedAttribute("class".into())
        );
        assert_eq!(
            MemoryDocument::from_markup("< p>").unwrap_err(),
            MarkupError::EmptyTag
        );
    }

    #[test]
    fn test_empty_class_and_style_attributes_disappear() {
        let mut doc = MemoryDocument::from_markup(r#"<span class="a" style="color: red">x</span>"#)
            .unwrap();
        let span = doc.find_element("span").unwrap();
        assert_eq!(doc.attribute_count(span), 2);
        doc.remove_class(span, "a");
        doc.remove_style(span, "color");
        assert_eq!(doc.attribute_count(span), 0);
        assert_eq!(doc.to_markup(), "<span>x</span>");
    }

    #[test]
    fn test_split_text_and_isolate() {
        let mut doc = MemoryDocument::from_markup(r#"<p><span class="a">abcdef</span></p>"#).unwrap();
        let text = doc.find_text("abcdef").unwrap();
        let tail = doc.split_text(text, 2).unwrap();
        doc.split_text(tail, 2).unwrap();
        let span = doc.find_element("span").unwrap();
        let holder = dom::isolate(&mut doc, span, tail);

        assert_eq!(doc.parent(tail), Some(holder));
        assert_eq!(
            doc.to_markup(),
            r#"<p><span class="a">ab</span><span class="a">cd</span><span class="a">ef</span></p>"#
        );
    }

    #[test]
    fn test_merge_adjacent_joins_equal_wrappers() {
        let mut doc = MemoryDocument::from_markup(
            r#"<p><span class="a b">x</span><span class="b a">y</span><span class="c">z</span></p>"#,
        )
        .unwrap();
        let p = doc.find_element("p").unwrap();
        dom::merge_adjacent(&mut doc, p, "span");
        assert_eq!(
            doc.to_markup(),
            r#"<p><span class="a b">xy</span><span class="c">z</span></p>"#
        );
    }

    #[test]
    fn test_unwrap_splices_children() {
        let mut doc = MemoryDocument::from_markup("<p>a<span>b<i>c</i></span>d</p>").unwrap();
        let span = doc.find_element("span").unwrap();
        assert!(dom::unwrap(&mut doc, span));
        assert!(!doc.is_attached(span));
        assert_eq!(doc.to_markup(), "<p>ab<i>c</i>d</p>");
    }

    #[test]
    fn test_editability_follows_nearest_flag() {
        let doc = MemoryDocument::from_markup(
            r#"<p>yes</p><div contenteditable="false"><p>no</p></div>"#,
        )
        .unwrap();
        assert!(doc.is_editable(doc.find_text("yes").unwrap()));
        assert!(!doc.is_editable(doc.find_text("no").unwrap()));
    }

    #[test]
    fn test_computed_value_inherits_inline_styles() {
        let mut host =
            MemoryHost::from_markup(r#"<p style="font-size: 20px"><b>x</b></p>"#).unwrap();
        let b = host.doc.find_element("b").unwrap();
        assert_eq!(host.computed_value(b, "font-size").as_deref(), Some("20px"));
        host.set_computed(b, "font-size", "24px");
        assert_eq!(host.computed_value(b, "font-size").as_deref(), Some("24px"));
        assert_eq!(host.computed_value(b, "line-height"), None);
    }
}
