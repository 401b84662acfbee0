//! The engine façade: one editable region, its host, and every style
//! operation over the live selection.
//!
//! `StyleEngine` owns the host, the debounce/key-repeat coalescer, the event
//! bus, the numeric controller and the keymap. After every mutation it
//! re-points the selection at the result and publishes a selection change
//! through the coalescer's channel filter, which also refreshes the live slot
//! values. Content-changed notifications are delivered from [`StyleEngine::poll`].

use smol_str::SmolStr;
use web_time::{Duration, Instant};

use crate::applier::ClassApplier;
use crate::bus::{Channel, Event, EventBus, SubscriptionId};
use crate::catalog::{CatalogEntry, ClassCatalog};
use crate::cleanup::{self, CleanupOutcome, CleanupPass};
use crate::coalescer::EventCoalescer;
use crate::config::{Slot, StyleConfig};
use crate::controller::{self, CycleOptions, NumericStyleController, StyleWrite};
use crate::dom::{self, DocumentModel, NodeId};
use crate::error::{ConfigError, StyleError};
use crate::host::{self, ChangeMetadata, EditorHost};
use crate::keymap::{KeyCombo, Keymap};
use crate::range::{self, Range};
use crate::style;
use crate::types::{Direction, Mutation, NoOpReason};

#[derive(Clone, Copy, Debug)]
enum ClassOp {
    Apply,
    Remove,
    Toggle,
}

pub struct StyleEngine<H: EditorHost> {
    host: H,
    config: StyleConfig,
    cycle: CycleOptions,
    coalescer: EventCoalescer,
    bus: EventBus,
    controller: NumericStyleController,
    keymap: Keymap,
    catalog: ClassCatalog,
}

impl<H: EditorHost + std::fmt::Debug> std::fmt::Debug for StyleEngine<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StyleEngine")
            .field("host", &self.host)
            .field("coalescer", &self.coalescer)
            .field("bus", &self.bus)
            .field("keymap_len", &self.keymap.len())
            .finish_non_exhaustive()
    }
}

impl<H: EditorHost> StyleEngine<H> {
    pub fn new(host: H, config: StyleConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let keymap = Keymap::from_config(&config.hot_keys)?;
        Ok(Self {
            host,
            cycle: CycleOptions::from_config(&config),
            coalescer: EventCoalescer::new(Duration::from_millis(config.quiet_window_ms)),
            bus: EventBus::new(),
            controller: NumericStyleController::new(&config),
            catalog: ClassCatalog::new(&config.class_catalog),
            keymap,
            config,
        })
    }

    pub fn with_defaults(host: H) -> Result<Self, ConfigError> {
        Self::new(host, StyleConfig::default())
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }

    pub fn config(&self) -> &StyleConfig {
        &self.config
    }

    pub fn coalescer(&self) -> &EventCoalescer {
        &self.coalescer
    }

    pub fn catalog(&self) -> &ClassCatalog {
        &self.catalog
    }

    // === Editable region lifecycle ===

    pub fn activate(&mut self) {
        tracing::debug!(target: "weaver::style::engine", "editable activated");
        self.coalescer.activate();
    }

    /// Leaves key-repeat state. Values written while a key was held stay as
    /// inline styles on their element and are not committed. A notification
    /// still pending fires as a no-op.
    pub fn deactivate(&mut self) {
        tracing::debug!(target: "weaver::style::engine", "editable deactivated");
        self.coalescer.deactivate();
        self.controller.abandon_repeat();
    }

    pub fn is_active(&self) -> bool {
        self.coalescer.is_active()
    }

    // === Events ===

    pub fn on_selection_change(&mut self, handler: impl FnMut(&Event) + 'static) -> SubscriptionId {
        self.bus.subscribe(Channel::SelectionChanged, handler)
    }

    pub fn on_content_change(&mut self, handler: impl FnMut(&Event) + 'static) -> SubscriptionId {
        self.bus.subscribe(Channel::ContentChanged, handler)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    /// Publishes through the key-repeat filter. Returns whether the event
    /// was admitted.
    pub fn publish(&mut self, event: Event) -> bool {
        if !self.coalescer.admits(event.channel()) {
            return false;
        }
        self.bus.publish(&event);
        true
    }

    /// Tells the engine the live selection moved. Refreshes live slot values
    /// when the publish is admitted.
    pub fn selection_changed(&mut self) {
        let selection = self.host.active_range();
        if self.publish(Event::SelectionChanged(selection)) {
            self.controller.refresh(&self.host);
        }
    }

    /// Delivers the debounced content-changed notification once it is due.
    pub fn poll(&mut self, now: Instant) -> Option<ChangeMetadata> {
        let metadata = self.coalescer.poll(now)?;
        self.host.notify_content_changed(&metadata);
        self.publish(Event::ContentChanged(metadata.clone()));
        Some(metadata)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.coalescer.next_deadline()
    }

    fn finish(&mut self, result: Mutation, metadata: ChangeMetadata, now: Instant) -> Mutation {
        if let Mutation::Changed(range) = result {
            host::select_range(&mut self.host, range);
            self.coalescer.schedule(now, metadata);
            self.selection_changed();
        }
        result
    }

    // === Class operations ===

    fn applier(&self, class: &str) -> ClassApplier {
        ClassApplier::new(class, self.config.wrapper_tag.clone(), self.config.applier.clone())
    }

    /// Explicit ranges are validated and widened when collapsed. `None`
    /// targets the live selection, which is re-pointed when widened.
    fn resolve_range(&mut self, range: Option<Range>) -> Result<Option<Range>, StyleError> {
        let Some(range) = range else {
            return controller::target_range(&mut self.host);
        };
        let range = range::to_engine_range(self.host.document(), range)?;
        if !range.is_collapsed() {
            return Ok(Some(range));
        }
        let expanded = range::expand_collapsed(self.host.document(), &range)?;
        Ok((!expanded.is_collapsed()).then_some(expanded))
    }

    fn class_op(
        &mut self,
        op: ClassOp,
        class: &str,
        range: Option<Range>,
        now: Instant,
    ) -> Result<Mutation, StyleError> {
        let Some(range) = self.resolve_range(range)? else {
            return Ok(Mutation::Unchanged(NoOpReason::Collapsed));
        };
        let applier = self.applier(class);
        let doc = self.host.document_mut();
        let result = match op {
            ClassOp::Apply => applier.apply(doc, &range)?,
            ClassOp::Remove => applier.remove(doc, &range)?,
            ClassOp::Toggle => applier.toggle(doc, &range)?,
        };
        Ok(self.finish(result, ChangeMetadata::new(class), now))
    }

    pub fn apply_class(&mut self, class: &str, range: Option<Range>, now: Instant) -> Result<Mutation, StyleError> {
        self.class_op(ClassOp::Apply, class, range, now)
    }

    pub fn remove_class(&mut self, class: &str, range: Option<Range>, now: Instant) -> Result<Mutation, StyleError> {
        self.class_op(ClassOp::Remove, class, range, now)
    }

    pub fn toggle_class(&mut self, class: &str, range: Option<Range>, now: Instant) -> Result<Mutation, StyleError> {
        self.class_op(ClassOp::Toggle, class, range, now)
    }

    /// Whether the start of the live selection carries `class`.
    pub fn is_class_applied(&self, class: &str) -> bool {
        self.host
            .active_range()
            .is_some_and(|range| self.applier(class).is_applied_at_start(self.host.document(), &range))
    }

    /// Toggles one class of the configured font group after stripping the
    /// other members from everything the selection fully covers.
    pub fn toggle_exclusive_class(
        &mut self,
        class: &str,
        range: Option<Range>,
        now: Instant,
    ) -> Result<Mutation, StyleError> {
        let Some(target) = self.resolve_range(range)? else {
            return Ok(Mutation::Unchanged(NoOpReason::Collapsed));
        };
        let others: Vec<SmolStr> = self
            .config
            .font_classes
            .iter()
            .filter(|c| c.as_str() != class)
            .cloned()
            .collect();
        let mut stripped = 0usize;
        let outcome = cleanup::recursive_cleanup(
            self.host.document_mut(),
            &target,
            &self.cycle.wrapper_tag,
            self.cycle.cleanup_iterations,
            |doc, element| {
                for other in &others {
                    if style::remove_class(doc, element, other) {
                        stripped += 1;
                    }
                }
            },
        )?;
        let target = outcome.range.unwrap_or(target);
        let applier = self.applier(class);
        let mut result = applier.toggle(self.host.document_mut(), &target)?;
        if !result.is_changed() && (stripped > 0 || outcome.removed > 0) {
            result = Mutation::Changed(target);
        }
        Ok(self.finish(result, ChangeMetadata::new(class), now))
    }

    /// Catalog classes offered for the effective markup at the start of the
    /// live selection.
    pub fn available_classes(&self) -> Result<Vec<CatalogEntry>, StyleError> {
        let Some(selection) = self.host.active_range() else {
            return Ok(Vec::new());
        };
        let doc = self.host.document();
        let range = range::to_engine_range(doc, selection)?;
        let markup = range::effective_markup_at_start(doc, &range);
        Ok(self.catalog.available(doc, &markup))
    }

    /// Catalog classes present on the selection's common ancestor element.
    pub fn active_classes(&self) -> Vec<CatalogEntry> {
        let doc = self.host.document();
        self.host
            .active_range()
            .and_then(|range| range::common_ancestor(doc, &range))
            .and_then(|node| dom::element_of(doc, node))
            .map(|element| self.catalog.active(doc, element))
            .unwrap_or_default()
    }

    // === Cleanup ===

    /// Live selection normalized for cleanup. Collapsed ranges are kept as is.
    fn cleanup_range(&self) -> Result<Option<Range>, StyleError> {
        self.host
            .active_range()
            .map(|selection| range::to_engine_range(self.host.document(), selection))
            .transpose()
    }

    /// Runs one cleanup pass of `transform` over the live selection.
    pub fn cleanup<F>(&mut self, mut transform: F, now: Instant) -> Result<Option<CleanupPass>, StyleError>
    where
        F: FnMut(&mut H::Document, NodeId),
    {
        let Some(selection) = self.cleanup_range()? else {
            return Ok(None);
        };
        let mut transformed = false;
        let mut tracked = |doc: &mut H::Document, element: NodeId| {
            transformed |= transform_changed(doc, element, &mut transform);
        };
        let pass = cleanup::element_cleanup(
            self.host.document_mut(),
            &selection,
            &self.cycle.wrapper_tag,
            &mut tracked,
        )?;
        if let Some(pass) = pass.filter(|p| transformed || p.removed > 0) {
            self.finish(Mutation::Changed(pass.range), ChangeMetadata::new("cleanup"), now);
        }
        Ok(pass)
    }

    /// Repeats cleanup passes over the live selection until one unwraps
    /// nothing, at most `max_iterations` times (the configured cap if `None`).
    pub fn recursive_cleanup<F>(
        &mut self,
        mut transform: F,
        max_iterations: Option<usize>,
        now: Instant,
    ) -> Result<CleanupOutcome, StyleError>
    where
        F: FnMut(&mut H::Document, NodeId),
    {
        let Some(selection) = self.cleanup_range()? else {
            return Ok(CleanupOutcome {
                converged: true,
                passes: 0,
                removed: 0,
                range: None,
            });
        };
        let mut transformed = false;
        let outcome = cleanup::recursive_cleanup(
            self.host.document_mut(),
            &selection,
            &self.cycle.wrapper_tag,
            max_iterations.unwrap_or(self.cycle.cleanup_iterations),
            |doc: &mut H::Document, element: NodeId| {
                transformed |= transform_changed(doc, element, &mut transform);
            },
        )?;
        if let Some(range) = outcome.range.filter(|_| transformed || outcome.removed > 0) {
            self.finish(Mutation::Changed(range), ChangeMetadata::new("cleanup"), now);
        }
        Ok(outcome)
    }

    /// Strips every class and inline property outside the reset whitelist
    /// from what the selection fully covers. Collapsed selections are left
    /// alone.
    pub fn reset_styles(&mut self, now: Instant) -> Result<Mutation, StyleError> {
        let Some(selection) = self.host.active_range() else {
            return Ok(Mutation::Unchanged(NoOpReason::Inactive));
        };
        let range = range::to_engine_range(self.host.document(), selection)?;
        if range.is_collapsed() {
            return Ok(Mutation::Unchanged(NoOpReason::Collapsed));
        }
        let whitelist = &self.config.reset_whitelist;
        let mut stripped = 0usize;
        let outcome = cleanup::recursive_cleanup(
            self.host.document_mut(),
            &range,
            &self.cycle.wrapper_tag,
            self.cycle.cleanup_iterations,
            |doc, element| {
                for class in doc.classes(element) {
                    if !whitelist.classes.contains(&class) && style::remove_class(doc, element, &class) {
                        stripped += 1;
                    }
                }
                for (property, _) in doc.styles(element) {
                    if !whitelist.styles.contains(&property) && style::remove_style(doc, element, &property) {
                        stripped += 1;
                    }
                }
            },
        )?;
        let result = match outcome.range {
            Some(range) if stripped > 0 || outcome.removed > 0 => Mutation::Changed(range),
            Some(_) => Mutation::Unchanged(NoOpReason::AlreadyApplied),
            None => Mutation::Unchanged(NoOpReason::NoCommonAncestor),
        };
        tracing::debug!(target: "weaver::style::engine", stripped, "reset styles");
        Ok(self.finish(result, ChangeMetadata::new("reset"), now))
    }

    /// Sets (or with `None` clears) an arbitrary inline property over the
    /// live selection.
    pub fn set_inline_style(
        &mut self,
        property: &str,
        value: Option<&str>,
        now: Instant,
    ) -> Result<Mutation, StyleError> {
        let writes = [StyleWrite::inline(property, value.map(str::to_owned))];
        let result = controller::change_style(
            &mut self.host,
            &mut self.coalescer,
            &self.cycle,
            &writes,
            ChangeMetadata::new(property),
            now,
        )?;
        if result.is_changed() {
            self.selection_changed();
        }
        Ok(result)
    }

    // === Numeric slots ===

    pub fn get_value(&self, slot: Slot) -> Result<f64, StyleError> {
        self.controller.get_value(&self.host, slot)
    }

    /// Value shown for `slot` since the last selection change or write.
    pub fn live_value(&self, slot: Slot) -> Option<f64> {
        self.controller.live_value(slot)
    }

    pub fn set_value(&mut self, slot: Slot, value: f64, now: Instant) -> Result<Mutation, StyleError> {
        let result = self
            .controller
            .set_value(&mut self.host, &mut self.coalescer, slot, value, now)?;
        self.after_numeric(result)
    }

    pub fn step(
        &mut self,
        slot: Slot,
        direction: Direction,
        use_page: bool,
        now: Instant,
    ) -> Result<Mutation, StyleError> {
        let result = self.controller.step(
            &mut self.host,
            &mut self.coalescer,
            slot,
            direction,
            use_page,
            now,
        )?;
        self.after_numeric(result)
    }

    pub fn increment(&mut self, slot: Slot, use_page: bool, now: Instant) -> Result<Mutation, StyleError> {
        self.step(slot, Direction::Increase, use_page, now)
    }

    pub fn decrement(&mut self, slot: Slot, use_page: bool, now: Instant) -> Result<Mutation, StyleError> {
        self.step(slot, Direction::Decrease, use_page, now)
    }

    pub fn autofit(&mut self, now: Instant) -> Result<Mutation, StyleError> {
        let result = self
            .controller
            .autofit_font_size(&mut self.host, &mut self.coalescer, now)?;
        self.after_numeric(result)
    }

    fn after_numeric(&mut self, result: Mutation) -> Result<Mutation, StyleError> {
        if result.is_changed() {
            self.selection_changed();
        }
        Ok(result)
    }

    // === Keys ===

    /// Handles a key-down. `None` when the combo is not bound or no
    /// editable region is active.
    pub fn key_down(&mut self, combo: &KeyCombo, now: Instant) -> Result<Option<Mutation>, StyleError> {
        if !self.coalescer.is_active() {
            return Ok(None);
        }
        let Some(shortcut) = self.keymap.lookup(combo) else {
            return Ok(None);
        };
        if !self.coalescer.is_repeating() {
            tracing::debug!(target: "weaver::style::engine", %combo, "key repeat started");
            self.coalescer.begin_repeat();
        }
        self.step(shortcut.slot, shortcut.direction, shortcut.use_page, now)
            .map(Some)
    }

    /// Handles a key-up: leaves key-repeat state and commits the values
    /// written while the key was held. `None` when the key is not bound or
    /// no repeat is in progress.
    pub fn key_up(&mut self, combo: &KeyCombo, now: Instant) -> Result<Option<Mutation>, StyleError> {
        if !self.coalescer.is_repeating() || !self.keymap.binds_key(&combo.key) {
            return Ok(None);
        }
        tracing::debug!(target: "weaver::style::engine", %combo, "key repeat finished");
        self.coalescer.end_repeat();
        let result = self
            .controller
            .finish_repeat(&mut self.host, &mut self.coalescer, now)?;
        self.after_numeric(result).map(Some)
    }
}

/// Runs `transform` on `element` and reports whether its classes or inline
/// styles differ afterwards.
fn transform_changed<D, F>(doc: &mut D, element: NodeId, transform: &mut F) -> bool
where
    D: DocumentModel + ?Sized,
    F: FnMut(&mut D, NodeId),
{
    let before = (style::class_names(doc, element), style::inline_styles(doc, element));
    transform(doc, element);
    before != (style::class_names(doc, element), style::inline_styles(doc, element))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryHost;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn engine(markup: &str) -> StyleEngine<MemoryHost> {
        let mut engine = StyleEngine::with_defaults(MemoryHost::from_markup(markup).unwrap()).unwrap();
        engine.activate();
        engine
    }

    #[test]
    fn test_collapsed_selection_is_widened_and_reselected() {
        let mut e = engine("<p>hello world!</p>");
        let text = e.host().doc.find_text("hello world!").unwrap();
        e.host_mut().selection = Some(Range::caret(text, 4));

        let m = e.apply_class("hi", None, Instant::now()).unwrap();
        assert!(m.is_changed());
        insta::assert_snapshot!(e.host().doc.to_markup(), @r#"<p><span class="hi">hello world!</span></p>"#);
        let selection = e.host().selection.unwrap();
        assert_eq!(selection.start.offset, 0);
        assert_eq!(selection.end.offset, 12);
    }

    #[test]
    fn test_mutation_publishes_selection_and_schedules_notification() {
        let mut e = engine("<p>abc</p>");
        let seen = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&seen);
        e.on_selection_change(move |_| *sink.borrow_mut() += 1);
        e.host_mut().select_text("abc", 0, 3).unwrap();
        let now = Instant::now();

        e.toggle_class("x", None, now).unwrap();
        assert_eq!(*seen.borrow(), 1);
        assert_eq!(e.next_deadline(), Some(now + Duration::from_millis(500)));
        assert_eq!(e.poll(now + Duration::from_millis(500)), Some(ChangeMetadata::new("x")));
        assert_eq!(e.host().notifications, vec![ChangeMetadata::new("x")]);
    }

    #[test]
    fn test_reset_keeps_whitelist() {
        let config = StyleConfig::from_json(
            r#"{ "resetWhitelist": { "classes": ["keep"], "styles": ["color"] } }"#,
        )
        .unwrap();
        let host = MemoryHost::from_markup(
            r#"<p>a<span class="x keep" style="color: red; font-size: 20px">bc</span><span class="y">d</span></p>"#,
        )
        .unwrap();
        let mut e = StyleEngine::new(host, config).unwrap();
        let bc = e.host().doc.find_text("bc").unwrap();
        let d = e.host().doc.find_text("d").unwrap();
        e.host_mut().selection = Some(Range::new(
            range::Boundary::new(bc, 0),
            range::Boundary::new(d, 1),
        ));

        assert!(e.reset_styles(Instant::now()).unwrap().is_changed());
        insta::assert_snapshot!(
            e.host().doc.to_markup(),
            @r#"<p>a<span class="keep" style="color: red">bc</span>d</p>"#
        );
    }

    #[test]
    fn test_reset_on_caret_is_noop() {
        let mut e = engine(r#"<p><span class="x">abc</span></p>"#);
        let text = e.host().doc.find_text("abc").unwrap();
        e.host_mut().selection = Some(Range::caret(text, 1));
        assert_eq!(
            e.reset_styles(Instant::now()).unwrap(),
            Mutation::Unchanged(NoOpReason::Collapsed)
        );
    }

    #[test]
    fn test_inline_style_set_and_clear() {
        let mut e = engine("<p>abc</p>");
        e.host_mut().select_text("abc", 1, 2).unwrap();
        let now = Instant::now();
        e.set_inline_style("color", Some("red"), now).unwrap();
        insta::assert_snapshot!(e.host().doc.to_markup(), @r#"<p>a<span style="color: red">b</span>c</p>"#);

        e.set_inline_style("color", None, now).unwrap();
        assert_eq!(e.host().doc.to_markup(), "<p>abc</p>");
    }

    fn strip_all(doc: &mut crate::memory::MemoryDocument, element: NodeId) {
        for class in doc.classes(element) {
            doc.remove_class(element, &class);
        }
        for (property, _) in doc.styles(element) {
            doc.remove_style(element, &property);
        }
    }

    #[test]
    fn test_cleanup_normalizes_backwards_selection() {
        let mut e = engine(r#"<p>a<span class="x">bc</span>d</p>"#);
        let a = e.host().doc.find_text("a").unwrap();
        let d = e.host().doc.find_text("d").unwrap();
        e.host_mut().selection = Some(Range::new(range::Boundary::new(d, 1), range::Boundary::new(a, 0)));

        let pass = e.cleanup(strip_all, Instant::now()).unwrap().unwrap();
        assert_eq!(pass.removed, 1);
        assert_eq!(e.host().doc.to_markup(), "<p>abcd</p>");
        assert!(e.next_deadline().is_some());
    }

    #[test]
    fn test_recursive_cleanup_normalizes_backwards_selection() {
        let mut e = engine(r#"<p>a<span class="x">bc</span>d</p>"#);
        let a = e.host().doc.find_text("a").unwrap();
        let d = e.host().doc.find_text("d").unwrap();
        e.host_mut().selection = Some(Range::new(range::Boundary::new(d, 1), range::Boundary::new(a, 0)));

        let outcome = e.recursive_cleanup(strip_all, None, Instant::now()).unwrap();
        assert_eq!(outcome.removed, 1);
        assert_eq!(e.host().doc.to_markup(), "<p>abcd</p>");
    }

    #[test]
    fn test_cleanup_that_changes_nothing_schedules_nothing() {
        let mut e = engine(r#"<p>a<span class="x">bc</span>d</p>"#);
        e.host_mut().select_text("bc", 0, 2).unwrap();
        let now = Instant::now();

        let pass = e.cleanup(|_, _| {}, now).unwrap().unwrap();
        assert_eq!(pass.removed, 0);
        let outcome = e.recursive_cleanup(|_, _| {}, None, now).unwrap();
        assert_eq!(outcome.removed, 0);
        assert!(e.next_deadline().is_none());

        e.cleanup(|doc, el| doc.set_style(el, "color", "red"), now).unwrap();
        assert!(e.next_deadline().is_some());
    }

    #[test]
    fn test_unbound_keys_are_ignored() {
        let mut e = engine("<p>abc</p>");
        e.host_mut().select_text("abc", 0, 3).unwrap();
        let now = Instant::now();
        assert_eq!(e.key_down(&KeyCombo::new("left"), now).unwrap(), None);
        assert_eq!(e.key_up(&KeyCombo::new("a"), now).unwrap(), None);
        assert!(!e.coalescer().is_repeating());
    }
}
