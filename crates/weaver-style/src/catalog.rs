//! Selector-scoped catalog of toggleable classes.

use std::collections::BTreeMap;

use smol_str::SmolStr;

use crate::dom::{DocumentModel, NodeId};

#[derive(Clone, Debug, PartialEq, Eq)]
enum Selector {
    Any,
    Tag(SmolStr),
    Class(SmolStr),
    TagClass(SmolStr, SmolStr),
}

impl Selector {
    fn parse(selector: &str) -> Self {
        let selector = selector.trim();
        if selector == "*" {
            return Selector::Any;
        }
        match selector.split_once('.') {
            Some(("", class)) => Selector::Class(class.into()),
            Some((tag, class)) => Selector::TagClass(tag.to_ascii_lowercase().into(), class.into()),
            None => Selector::Tag(selector.to_ascii_lowercase().into()),
        }
    }

    fn matches<D: DocumentModel + ?Sized>(&self, doc: &D, element: NodeId) -> bool {
        let tag_is = |tag: &str| doc.tag_name(element).is_some_and(|t| t == tag);
        match self {
            Selector::Any => doc.is_element(element),
            Selector::Tag(tag) => tag_is(tag),
            Selector::Class(class) => doc.has_class(element, class),
            Selector::TagClass(tag, class) => tag_is(tag) && doc.has_class(element, class),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct CatalogEntry {
    pub title: SmolStr,
    pub class: SmolStr,
}

/// Classes offered per selector, e.g. `{"h1": {"Awesome": "awesome"}}`.
#[derive(Clone, Debug, Default)]
pub struct ClassCatalog {
    groups: Vec<(Selector, Vec<CatalogEntry>)>,
}

impl ClassCatalog {
    pub fn new(config: &BTreeMap<SmolStr, BTreeMap<SmolStr, SmolStr>>) -> Self {
        let groups = config
            .iter()
            .map(|(selector, classes)| {
                let entries = classes
                    .iter()
                    .map(|(title, class)| CatalogEntry {
                        title: title.clone(),
                        class: class.clone(),
                    })
                    .collect();
                (Selector::parse(selector), entries)
            })
            .collect();
        Self { groups }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn title_for(&self, class: &str) -> Option<&str> {
        self.groups
            .iter()
            .flat_map(|(_, entries)| entries)
            .find(|e| e.class == class)
            .map(|e| e.title.as_str())
    }

    /// Entries whose selector matches any element of `markup`, typically the
    /// effective markup at the start of the selection.
    pub fn available<D: DocumentModel + ?Sized>(&self, doc: &D, markup: &[NodeId]) -> Vec<CatalogEntry> {
        let mut out: Vec<CatalogEntry> = Vec::new();
        for (selector, entries) in &self.groups {
            if markup.iter().any(|&el| selector.matches(doc, el)) {
                for entry in entries {
                    if !out.contains(entry) {
                        out.push(entry.clone());
                    }
                }
            }
        }
        out
    }

    /// Catalog entries for the classes present on `element`.
    pub fn active<D: DocumentModel + ?Sized>(&self, doc: &D, element: NodeId) -> Vec<CatalogEntry> {
        doc.classes(element)
            .iter()
            .filter_map(|class| {
                self.title_for(class).map(|title| CatalogEntry {
                    title: title.into(),
                    class: class.clone(),
                })
            })
            .collect()
    }
}
