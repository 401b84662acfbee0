//! Numeric style slots: reading, stepping, setting and autofit.
//!
//! Writes go through one remove-then-apply cycle ([`change_style`]):
//!
//! 1. a collapsed selection is widened to its whole container;
//! 2. a bounded cleanup strips the previous representation of every written
//!    slot from the fully selected elements;
//! 3. each new value is applied over the range, either as a template class or
//!    as a temporary class that is then turned into the inline property;
//! 4. the selection is re-pointed at the result and a trailing content-changed
//!    notification is scheduled.
//!
//! While a hot key is held the controller skips the cycle and writes the
//! inline property straight onto the selection's anchor element. The previous
//! inline values are remembered so [`finish_repeat`](NumericStyleController::finish_repeat)
//! can put them back and commit the final value through the full cycle.

use std::collections::BTreeMap;

use smol_str::SmolStr;
use web_time::Instant;

use crate::applier::ClassApplier;
use crate::cleanup;
use crate::coalescer::EventCoalescer;
use crate::config::{ApplierOptions, Slot, SlotConfig, StorageStrategy, StyleConfig};
use crate::dom::{self, DocumentModel, NodeId};
use crate::error::StyleError;
use crate::host::{self, ChangeMetadata, EditorHost};
use crate::range::{self, Range};
use crate::style;
use crate::types::{Direction, Mutation, NoOpReason};

const TMP_CLASS_PREFIX: &str = "tmp-style-";

/// One property write in a [`change_style`] cycle. `None` only clears.
#[derive(Clone, Debug, PartialEq)]
pub struct StyleWrite {
    pub storage: StorageStrategy,
    pub value: Option<String>,
}

impl StyleWrite {
    pub fn inline(property: &str, value: Option<String>) -> Self {
        Self {
            storage: StorageStrategy::InlineProperty(property.into()),
            value,
        }
    }

    fn strip<D: DocumentModel + ?Sized>(&self, doc: &mut D, element: NodeId) {
        match &self.storage {
            StorageStrategy::InlineProperty(property) => {
                style::remove_style(doc, element, property);
            }
            StorageStrategy::ClassTemplate(_) => {
                for class in doc.classes(element) {
                    if self.storage.matches_class(&class) {
                        style::remove_class(doc, element, &class);
                    }
                }
            }
        }
    }
}

/// Shared settings for [`change_style`].
#[derive(Clone, Debug)]
pub struct CycleOptions {
    pub wrapper_tag: SmolStr,
    pub cleanup_iterations: usize,
    pub applier: ApplierOptions,
}

impl CycleOptions {
    pub fn from_config(config: &StyleConfig) -> Self {
        Self {
            wrapper_tag: config.wrapper_tag.clone(),
            cleanup_iterations: config.cleanup_iterations,
            applier: config.applier.clone(),
        }
    }
}

/// Range the next write targets: the live selection, validated, and widened
/// to its containers when collapsed.
pub(crate) fn target_range<H: EditorHost + ?Sized>(host: &mut H) -> Result<Option<Range>, StyleError> {
    let Some(selection) = host.active_range() else {
        return Ok(None);
    };
    let range = range::to_engine_range(host.document(), selection)?;
    if !range.is_collapsed() {
        return Ok(Some(range));
    }
    let expanded = range::expand_collapsed(host.document(), &range)?;
    if expanded.is_collapsed() {
        return Ok(None);
    }
    host::select_range(host, expanded);
    Ok(Some(expanded))
}

/// Runs the remove-then-apply cycle for `writes` over the live selection.
pub fn change_style<H: EditorHost + ?Sized>(
    host: &mut H,
    coalescer: &mut EventCoalescer,
    options: &CycleOptions,
    writes: &[StyleWrite],
    metadata: ChangeMetadata,
    now: Instant,
) -> Result<Mutation, StyleError> {
    let Some(range) = target_range(host)? else {
        return Ok(Mutation::Unchanged(NoOpReason::Collapsed));
    };

    let outcome = cleanup::recursive_cleanup(
        host.document_mut(),
        &range,
        &options.wrapper_tag,
        options.cleanup_iterations,
        |doc, element| {
            for write in writes {
                write.strip(doc, element);
            }
        },
    )?;
    let Some(mut range) = outcome.range else {
        return Ok(Mutation::Unchanged(NoOpReason::NoCommonAncestor));
    };
    host::select_range(host, range);

    for write in writes {
        let Some(value) = &write.value else {
            continue;
        };
        match &write.storage {
            StorageStrategy::ClassTemplate(_) => {
                let Some(class) = write.storage.render_class(value) else {
                    continue;
                };
                let applier = ClassApplier::new(class, options.wrapper_tag.clone(), options.applier.clone());
                if let Mutation::Changed(applied) = applier.apply(host.document_mut(), &range)? {
                    range = applied;
                }
            }
            StorageStrategy::InlineProperty(property) => {
                let tmp = format!("{TMP_CLASS_PREFIX}{property}");
                let applier = ClassApplier::new(tmp.as_str(), options.wrapper_tag.clone(), options.applier.clone());
                if let Mutation::Changed(applied) = applier.apply(host.document_mut(), &range)? {
                    range = applied;
                }
                let doc = host.document_mut();
                let root = doc.root();
                for element in dom::descendants_inclusive(doc, root) {
                    if doc.has_class(element, &tmp) {
                        doc.remove_class(element, &tmp);
                        doc.set_style(element, property, value);
                    }
                }
            }
        }
        host::select_range(host, range);
    }

    tracing::debug!(
        target: "weaver::style::controller",
        reason = %metadata.reason,
        passes = outcome.passes,
        converged = outcome.converged,
        "style changed"
    );
    coalescer.schedule(now, metadata);
    Ok(Mutation::Changed(range))
}

/// Live values and write paths for the numeric slots.
#[derive(Clone, Debug)]
pub struct NumericStyleController {
    slots: BTreeMap<Slot, SlotConfig>,
    cycle: CycleOptions,
    autofit_margin: f64,
    values: BTreeMap<Slot, f64>,
    /// Inline values the fast path overwrote, keyed by element and property.
    repeat_origin: BTreeMap<(NodeId, SmolStr), Option<SmolStr>>,
    /// Last value written per slot during key repeat.
    repeat_values: BTreeMap<Slot, f64>,
}

impl NumericStyleController {
    pub fn new(config: &StyleConfig) -> Self {
        Self {
            slots: config.slots.clone(),
            cycle: CycleOptions::from_config(config),
            autofit_margin: config.autofit_margin,
            values: config.slots.iter().map(|(&s, c)| (s, c.value)).collect(),
            repeat_origin: BTreeMap::new(),
            repeat_values: BTreeMap::new(),
        }
    }

    pub fn slot_config(&self, slot: Slot) -> Result<&SlotConfig, StyleError> {
        self.slots.get(&slot).ok_or(StyleError::UnknownSlot(slot))
    }

    /// Value last read or written for `slot`.
    pub fn live_value(&self, slot: Slot) -> Option<f64> {
        self.values.get(&slot).copied()
    }

    /// Re-reads every slot from the current selection.
    pub fn refresh<H: EditorHost + ?Sized>(&mut self, host: &H) {
        let slots: Vec<Slot> = self.slots.keys().copied().collect();
        for slot in slots {
            if let Ok(value) = self.get_value(host, slot) {
                self.values.insert(slot, value);
            }
        }
    }

    fn inline_property(cfg: &SlotConfig, slot: Slot) -> SmolStr {
        match &cfg.storage {
            StorageStrategy::InlineProperty(property) => property.clone(),
            StorageStrategy::ClassTemplate(_) => slot.css_property().into(),
        }
    }

    /// Innermost element of the live selection.
    fn anchor_element<H: EditorHost + ?Sized>(host: &H) -> Option<NodeId> {
        let doc = host.document();
        let selection = host.active_range()?;
        let ancestor = range::common_ancestor(doc, &selection)?;
        dom::element_of(doc, ancestor)
    }

    /// Current value of `slot` for the selection.
    ///
    /// Looks for the nearest ancestor with an inline value (or a template
    /// class encoding one), then the host's computed style of the anchor
    /// element, then the configured default.
    pub fn get_value<H: EditorHost + ?Sized>(&self, host: &H, slot: Slot) -> Result<f64, StyleError> {
        let cfg = self.slot_config(slot)?;
        let Some(anchor) = Self::anchor_element(host) else {
            return Ok(cfg.value);
        };
        let doc = host.document();
        let property = Self::inline_property(cfg, slot);
        for element in dom::ancestors_inclusive(doc, anchor) {
            if let Some(value) = doc
                .style(element, &property)
                .and_then(|css| style::parse_value(&css, &cfg.unit))
            {
                return Ok(value);
            }
            if let Some(value) = doc
                .classes(element)
                .iter()
                .find_map(|class| cfg.storage.parse_class(class))
            {
                return Ok(value);
            }
        }
        Ok(host
            .computed_value(anchor, slot.css_property())
            .and_then(|css| style::parse_value(&css, &cfg.unit))
            .unwrap_or(cfg.value))
    }

    /// Moves `slot` one step (or one page) in `direction`. Values that would
    /// leave the slot bounds are rejected and leave everything unchanged.
    pub fn step<H: EditorHost + ?Sized>(
        &mut self,
        host: &mut H,
        coalescer: &mut EventCoalescer,
        slot: Slot,
        direction: Direction,
        use_page: bool,
        now: Instant,
    ) -> Result<Mutation, StyleError> {
        let cfg = self.slot_config(slot)?;
        let delta = if use_page { cfg.step * cfg.page } else { cfg.step };
        let current = self.get_value(host, slot)?;
        let next = style::float_fix(current + direction.sign() * delta);
        if !cfg.contains(next) {
            tracing::debug!(
                target: "weaver::style::controller",
                %slot,
                current,
                next,
                "step rejected: outside slot bounds"
            );
            return Ok(Mutation::Unchanged(NoOpReason::Rejected));
        }
        self.write(host, coalescer, slot, next, now)
    }

    /// Writes an explicit value. Out-of-range values are an error; callers
    /// clamp first.
    pub fn set_value<H: EditorHost + ?Sized>(
        &mut self,
        host: &mut H,
        coalescer: &mut EventCoalescer,
        slot: Slot,
        value: f64,
        now: Instant,
    ) -> Result<Mutation, StyleError> {
        let cfg = self.slot_config(slot)?;
        if !cfg.contains(value) {
            return Err(StyleError::ValueOutOfRange {
                slot,
                value,
                min: cfg.min,
                max: cfg.max,
            });
        }
        self.write(host, coalescer, slot, style::float_fix(value), now)
    }

    fn write<H: EditorHost + ?Sized>(
        &mut self,
        host: &mut H,
        coalescer: &mut EventCoalescer,
        slot: Slot,
        value: f64,
        now: Instant,
    ) -> Result<Mutation, StyleError> {
        let result = if coalescer.is_repeating() {
            self.write_direct(host, coalescer, slot, value, now)?
        } else {
            self.write_cycle(host, coalescer, slot, value, now)?
        };
        if result.is_changed() {
            self.values.insert(slot, value);
            let resets = self.slot_config(slot)?.resets.clone();
            for reset in resets {
                if let Ok(cfg) = self.slot_config(reset) {
                    let default = cfg.value;
                    self.values.insert(reset, default);
                }
            }
        }
        Ok(result)
    }

    fn writes_for(&self, slot: Slot, value: f64) -> Result<Vec<StyleWrite>, StyleError> {
        let cfg = self.slot_config(slot)?;
        let rendered = match &cfg.storage {
            StorageStrategy::InlineProperty(_) => style::format_css(value, &cfg.unit),
            StorageStrategy::ClassTemplate(_) => style::format_value(value),
        };
        let mut writes = vec![StyleWrite {
            storage: cfg.storage.clone(),
            value: Some(rendered),
        }];
        for reset in &cfg.resets {
            let reset_cfg = self.slot_config(*reset)?;
            writes.push(StyleWrite {
                storage: reset_cfg.storage.clone(),
                value: None,
            });
        }
        Ok(writes)
    }

    fn write_cycle<H: EditorHost + ?Sized>(
        &self,
        host: &mut H,
        coalescer: &mut EventCoalescer,
        slot: Slot,
        value: f64,
        now: Instant,
    ) -> Result<Mutation, StyleError> {
        let mut writes = self.writes_for(slot, value)?;
        // A value written by the fast path must not survive as inline style
        // under a template class.
        if matches!(self.slot_config(slot)?.storage, StorageStrategy::ClassTemplate(_)) {
            writes.push(StyleWrite::inline(slot.css_property(), None));
        }
        change_style(host, coalescer, &self.cycle, &writes, ChangeMetadata::slot(slot), now)
    }

    /// Key-repeat path: inline write on the anchor element only.
    fn write_direct<H: EditorHost + ?Sized>(
        &mut self,
        host: &mut H,
        coalescer: &mut EventCoalescer,
        slot: Slot,
        value: f64,
        now: Instant,
    ) -> Result<Mutation, StyleError> {
        let Some(selection) = host.active_range() else {
            return Ok(Mutation::Unchanged(NoOpReason::Inactive));
        };
        let selection = range::to_engine_range(host.document(), selection)?;
        let Some(anchor) = Self::anchor_element(host) else {
            return Ok(Mutation::Unchanged(NoOpReason::NoCommonAncestor));
        };
        let cfg = self.slot_config(slot)?;
        let property = Self::inline_property(cfg, slot);
        let css = style::format_css(value, &cfg.unit);
        let mut cleared = Vec::new();
        for reset in &cfg.resets {
            cleared.push(Self::inline_property(self.slot_config(*reset)?, *reset));
        }

        let doc = host.document_mut();
        for prop in std::iter::once(&property).chain(cleared.iter()) {
            self.repeat_origin
                .entry((anchor, prop.clone()))
                .or_insert_with(|| doc.style(anchor, prop));
        }
        doc.set_style(anchor, &property, &css);
        for prop in &cleared {
            doc.remove_style(anchor, prop);
        }
        self.repeat_values.insert(slot, value);
        tracing::trace!(
            target: "weaver::style::controller",
            %slot,
            value,
            element = %anchor,
            "direct write during key repeat"
        );
        coalescer.schedule(now, ChangeMetadata::slot(slot));
        Ok(Mutation::Changed(selection))
    }

    /// Whether key-repeat writes are waiting for [`finish_repeat`](Self::finish_repeat).
    pub fn has_repeat_writes(&self) -> bool {
        !self.repeat_values.is_empty()
    }

    /// Forgets the key-repeat bookkeeping without touching the document.
    pub fn abandon_repeat(&mut self) {
        if self.has_repeat_writes() {
            tracing::debug!(
                target: "weaver::style::controller",
                slots = self.repeat_values.len(),
                "key repeat abandoned"
            );
        }
        self.repeat_origin.clear();
        self.repeat_values.clear();
    }

    /// Puts back the inline values the fast path overwrote and commits the
    /// last repeated value of each slot through the full cycle.
    pub fn finish_repeat<H: EditorHost + ?Sized>(
        &mut self,
        host: &mut H,
        coalescer: &mut EventCoalescer,
        now: Instant,
    ) -> Result<Mutation, StyleError> {
        let origin = std::mem::take(&mut self.repeat_origin);
        let values = std::mem::take(&mut self.repeat_values);
        if values.is_empty() {
            return Ok(Mutation::Unchanged(NoOpReason::AlreadyApplied));
        }
        let doc = host.document_mut();
        for ((element, property), previous) in origin {
            match previous {
                Some(css) => doc.set_style(element, &property, &css),
                None => doc.remove_style(element, &property),
            }
        }
        let mut result = Mutation::Unchanged(NoOpReason::AlreadyApplied);
        for (slot, value) in values {
            result = self.write(host, coalescer, slot, value, now)?;
        }
        Ok(result)
    }

    /// Finds the largest font size whose content still fits the width of the
    /// selection's block and commits it, minus the configured margin.
    ///
    /// The scan raises the font size of the selection's anchor element one
    /// unit at a time from the slot minimum, with wrapping turned off, and
    /// stops at the first size that overflows or at the slot maximum. Inline
    /// font sizes below the anchor are lifted for the scan so the whole
    /// selection follows the trial size. Everything touched is restored
    /// before committing.
    pub fn autofit_font_size<H: EditorHost + ?Sized>(
        &mut self,
        host: &mut H,
        coalescer: &mut EventCoalescer,
        now: Instant,
    ) -> Result<Mutation, StyleError> {
        let cfg = self.slot_config(Slot::FontSize)?.clone();
        let Some(selection) = host.active_range() else {
            return Ok(Mutation::Unchanged(NoOpReason::Inactive));
        };
        range::to_engine_range(host.document(), selection)?;
        let Some(container) = Self::anchor_element(host) else {
            return Ok(Mutation::Unchanged(NoOpReason::NoCommonAncestor));
        };
        let block = dom::nearest_block(host.document(), container);
        let Some(max_width) = host.available_width(block) else {
            return Ok(Mutation::Unchanged(NoOpReason::Unmeasurable));
        };

        let saved_white_space = host.document().style(container, "white-space");
        let saved_font_size = host.document().style(container, "font-size");
        let carriers: Vec<(NodeId, SmolStr)> = dom::descendants_inclusive(host.document(), container)
            .into_iter()
            .skip(1)
            .filter_map(|n| host.document().style(n, "font-size").map(|css| (n, css)))
            .collect();
        let doc = host.document_mut();
        doc.set_style(container, "white-space", "nowrap");
        for (carrier, _) in &carriers {
            doc.remove_style(*carrier, "font-size");
        }

        let mut fitted = None;
        let mut measured = true;
        let mut size = cfg.min;
        loop {
            host.document_mut()
                .set_style(container, "font-size", &style::format_css(size, &cfg.unit));
            match host.content_width(container) {
                None => {
                    measured = false;
                    break;
                }
                Some(width) if width > max_width => break,
                Some(_) => fitted = Some(size),
            }
            if size >= cfg.max {
                break;
            }
            size = (size + 1.0).min(cfg.max);
        }

        let doc = host.document_mut();
        match saved_white_space {
            Some(css) => doc.set_style(container, "white-space", &css),
            None => doc.remove_style(container, "white-space"),
        }
        match saved_font_size {
            Some(css) => doc.set_style(container, "font-size", &css),
            None => doc.remove_style(container, "font-size"),
        }
        for (carrier, css) in &carriers {
            doc.set_style(*carrier, "font-size", css);
        }

        if !measured && fitted.is_none() {
            return Ok(Mutation::Unchanged(NoOpReason::Unmeasurable));
        }
        let commit = fitted
            .map(|f| (f - self.autofit_margin).max(cfg.min))
            .unwrap_or(cfg.min);
        tracing::debug!(
            target: "weaver::style::controller",
            max_width,
            fitted = ?fitted,
            commit,
            "autofit"
        );
        self.set_value(host, coalescer, Slot::FontSize, commit, now)
    }
}
