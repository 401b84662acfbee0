//! The host editor seen from the engine.

use smol_str::SmolStr;

use crate::config::Slot;
use crate::dom::{DocumentModel, NodeId};
use crate::range::Range;

/// Payload handed to the host's change tracking.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChangeMetadata {
    /// Operation that produced the change, e.g. `"fontSize"` or `"reset"`.
    pub reason: SmolStr,
    /// Numeric slots written by the operation.
    pub slots: Vec<Slot>,
}

impl ChangeMetadata {
    pub fn new(reason: impl Into<SmolStr>) -> Self {
        Self {
            reason: reason.into(),
            slots: Vec::new(),
        }
    }

    pub fn slot(slot: Slot) -> Self {
        Self {
            reason: slot.name().into(),
            slots: vec![slot],
        }
    }
}

/// Collaborators the engine consumes from the editor: the live selection,
/// layout queries, and a change-notification sink.
///
/// Measurement and computed style are optional capabilities. Hosts without a
/// layout engine keep the defaults, which make autofit report itself as
/// unmeasurable and make value reads fall back to slot defaults.
pub trait EditorHost {
    type Document: DocumentModel;

    fn document(&self) -> &Self::Document;

    fn document_mut(&mut self) -> &mut Self::Document;

    /// The live selection, if the editable region has one.
    fn active_range(&self) -> Option<Range>;

    /// Replaces the live selection.
    fn set_active_range(&mut self, range: Range);

    /// Resolved value of a CSS property on `element`, e.g. `"16px"`.
    fn computed_value(&self, _element: NodeId, _property: &str) -> Option<SmolStr> {
        None
    }

    /// Width available to content inside `element` (a block).
    fn available_width(&self, _element: NodeId) -> Option<f64> {
        None
    }

    /// Rendered width of the content of `element`.
    fn content_width(&self, _element: NodeId) -> Option<f64> {
        None
    }

    fn notify_content_changed(&mut self, _metadata: &ChangeMetadata) {}
}

/// Points the live selection at `range`.
pub fn select_range<H: EditorHost + ?Sized>(host: &mut H, range: Range) {
    tracing::trace!(target: "weaver::style::selection", ?range, "select range");
    host.set_active_range(range);
}
