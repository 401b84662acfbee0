use std::cell::RefCell;
use std::rc::Rc;

use weaver_style::{
    ChangeMetadata, Direction, DocumentModel, Duration, Event, Instant, KeyCombo, MemoryHost,
    Mutation, NoOpReason, Slot, StyleConfig, StyleEngine, Width, dom, style,
};

fn engine(markup: &str, text: &str) -> StyleEngine<MemoryHost> {
    let mut host = MemoryHost::from_markup(markup).unwrap();
    let len = text.chars().count();
    host.select_text(text, 0, len).unwrap();
    let mut engine = StyleEngine::with_defaults(host).unwrap();
    engine.activate();
    engine
}

#[test]
fn test_page_step_respects_bounds() {
    let mut e = engine(r#"<p style="font-size: 125px">abc</p>"#, "abc");
    let before = e.host().doc.to_markup();
    assert_eq!(
        e.increment(Slot::FontSize, true, Instant::now()).unwrap(),
        Mutation::Unchanged(NoOpReason::Rejected)
    );
    assert_eq!(e.get_value(Slot::FontSize).unwrap(), 125.0);
    assert_eq!(e.host().doc.to_markup(), before);

    let mut e = engine("<p>abc</p>", "abc");
    assert!(e.increment(Slot::FontSize, true, Instant::now()).unwrap().is_changed());
    assert_eq!(e.get_value(Slot::FontSize).unwrap(), 26.0);
    assert_eq!(e.live_value(Slot::FontSize), Some(26.0));
}

#[test]
fn test_decrement_stops_at_minimum() {
    let mut e = engine(r#"<p style="font-size: 11px">abc</p>"#, "abc");
    let now = Instant::now();
    assert!(e.decrement(Slot::FontSize, false, now).unwrap().is_changed());
    assert_eq!(e.get_value(Slot::FontSize).unwrap(), 10.0);
    assert_eq!(
        e.decrement(Slot::FontSize, false, now).unwrap(),
        Mutation::Unchanged(NoOpReason::Rejected)
    );
}

/// Content width is `font-size * per_unit` while wrapping is off, and
/// unbounded otherwise so a scan that forgot `nowrap` never fits.
fn measured(markup: &str, text: &str, per_unit: f64) -> StyleEngine<MemoryHost> {
    let mut host = MemoryHost::from_markup(markup)
        .unwrap()
        .with_measurer(move |doc, el, width| match width {
            Width::Available => Some(200.0),
            Width::Content => {
                if doc.style(el, "white-space").as_deref() != Some("nowrap") {
                    return Some(f64::INFINITY);
                }
                let size = doc.style(el, "font-size")?;
                style::parse_value(&size, "px").map(|fs| fs * per_unit)
            }
        });
    host.select_text(text, 0, text.chars().count()).unwrap();
    let mut engine = StyleEngine::with_defaults(host).unwrap();
    engine.activate();
    engine
}

#[test]
fn test_autofit_largest_fitting_size() {
    let mut e = measured(r#"<p style="white-space: pre-line">headline</p>"#, "headline", 18.0);
    assert!(e.autofit(Instant::now()).unwrap().is_changed());
    assert_eq!(e.get_value(Slot::FontSize).unwrap(), 11.0);
    let p = e.host().doc.find_element("p").unwrap();
    assert_eq!(e.host().doc.style(p, "white-space").as_deref(), Some("pre-line"));
    insta::assert_snapshot!(
        e.host().doc.to_markup(),
        @r#"<p style="white-space: pre-line"><span style="font-size: 11px">headline</span></p>"#
    );
}

#[test]
fn test_autofit_exits_at_maximum_and_restores_white_space() {
    let mut e = measured(r#"<p style="white-space: normal">x</p>"#, "x", 1.0);
    e.autofit(Instant::now()).unwrap();
    assert_eq!(e.get_value(Slot::FontSize).unwrap(), 128.0);
    let p = e.host().doc.find_element("p").unwrap();
    assert_eq!(e.host().doc.style(p, "white-space").as_deref(), Some("normal"));
}

#[test]
fn test_autofit_margin_is_subtracted() {
    let config = StyleConfig::from_json(r#"{ "autofitMargin": 2 }"#).unwrap();
    let mut host = MemoryHost::from_markup("<p>headline</p>")
        .unwrap()
        .with_measurer(|doc, el, width| match width {
            Width::Available => Some(200.0),
            Width::Content => {
                let size = doc.style(el, "font-size")?;
                style::parse_value(&size, "px").map(|fs| fs * 18.0)
            }
        });
    host.select_text("headline", 0, 8).unwrap();
    let mut e = StyleEngine::new(host, config).unwrap();
    e.autofit(Instant::now()).unwrap();
    assert_eq!(e.get_value(Slot::FontSize).unwrap(), 10.0);
}

#[test]
fn test_autofit_lifts_font_sizes_inside_selection() {
    let mut host = MemoryHost::from_markup(
        r#"<p><span style="font-size: 40px">head</span><span style="font-size: 40px">line</span></p>"#,
    )
    .unwrap()
    .with_measurer(|doc, el, width| match width {
        Width::Available => Some(200.0),
        Width::Content => {
            let mut total = 0.0;
            for text in dom::text_descendants(doc, el) {
                let size = dom::ancestors_inclusive(doc, text)
                    .into_iter()
                    .find_map(|n| doc.style(n, "font-size"))
                    .and_then(|css| style::parse_value(&css, "px"))?;
                total += doc.node_len(text) as f64 * size * 2.0;
            }
            Some(total)
        }
    });
    let head = host.doc.find_text("head").unwrap();
    let line = host.doc.find_text("line").unwrap();
    host.selection = Some(weaver_style::Range::new(
        weaver_style::Boundary::new(head, 0),
        weaver_style::Boundary::new(line, 4),
    ));
    let mut e = StyleEngine::with_defaults(host).unwrap();
    e.activate();

    assert!(e.autofit(Instant::now()).unwrap().is_changed());
    assert_eq!(e.get_value(Slot::FontSize).unwrap(), 12.0);
    assert!(!e.host().doc.to_markup().contains("40px"));
}

#[test]
fn test_font_size_change_resets_line_height() {
    let mut e = engine(r#"<p style="line-height: 2em">abc</p>"#, "abc");
    let now = Instant::now();
    assert_eq!(e.get_value(Slot::LineHeight).unwrap(), 2.0);
    e.set_value(Slot::FontSize, 20.0, now).unwrap();
    assert_eq!(e.live_value(Slot::LineHeight), Some(1.2));
    insta::assert_snapshot!(
        e.host().doc.to_markup(),
        @r#"<p><span style="font-size: 20px">abc</span></p>"#
    );
}

#[derive(Default)]
struct Counts {
    selection: usize,
    content: usize,
}

fn counted(markup: &str, text: &str) -> (StyleEngine<MemoryHost>, Rc<RefCell<Counts>>) {
    let mut e = engine(markup, text);
    let counts = Rc::new(RefCell::new(Counts::default()));
    let sink = Rc::clone(&counts);
    e.on_selection_change(move |_| sink.borrow_mut().selection += 1);
    let sink = Rc::clone(&counts);
    e.on_content_change(move |event| {
        assert!(matches!(event, Event::ContentChanged(_)));
        sink.borrow_mut().content += 1;
    });
    (e, counts)
}

#[test]
fn test_key_repeat_burst_coalesces_notifications() {
    let (mut e, counts) = counted(r#"<p style="font-size: 40px">headline</p>"#, "headline");
    let combo: KeyCombo = "ctrl+left".parse().unwrap();
    let t0 = Instant::now();
    let gap = Duration::from_millis(30);

    let mut last = t0;
    for i in 0..20 {
        last = t0 + gap * i;
        let m = e.key_down(&combo, last).unwrap();
        assert!(m.is_some_and(|m| m.is_changed()));
        assert_eq!(e.poll(last), None);
    }
    assert_eq!(counts.borrow().selection, 0);
    assert_eq!(e.coalescer().suppressed(), 20);
    assert_eq!(e.get_value(Slot::FontSize).unwrap(), 20.0);

    assert_eq!(e.poll(last + Duration::from_millis(499)), None);
    assert_eq!(counts.borrow().content, 0);
    assert_eq!(
        e.poll(last + Duration::from_millis(500)),
        Some(ChangeMetadata::slot(Slot::FontSize))
    );
    assert_eq!(e.poll(last + Duration::from_secs(10)), None);
    assert_eq!(counts.borrow().content, 1);
    assert_eq!(counts.borrow().selection, 0);
    assert_eq!(e.host().notifications.len(), 1);
}

#[test]
fn test_key_up_commits_through_full_cycle() {
    let (mut e, counts) = counted(r#"<p style="font-size: 40px">headline</p>"#, "headline");
    let now = Instant::now();
    let combo = KeyCombo::new("left").ctrl();
    for _ in 0..3 {
        e.key_down(&combo, now).unwrap();
    }
    insta::assert_snapshot!(e.host().doc.to_markup(), @r#"<p style="font-size: 37px">headline</p>"#);

    let up = now + Duration::from_millis(100);
    let m = e.key_up(&KeyCombo::new("left"), up).unwrap();
    assert!(m.is_some_and(|m| m.is_changed()));
    assert!(!e.coalescer().is_repeating());
    insta::assert_snapshot!(
        e.host().doc.to_markup(),
        @r#"<p><span style="font-size: 37px">headline</span></p>"#
    );
    assert_eq!(counts.borrow().selection, 1);
    assert_eq!(e.next_deadline(), Some(up + Duration::from_millis(500)));
}

#[test]
fn test_page_step_with_shift() {
    let (mut e, _) = counted("<p>abc</p>", "abc");
    let now = Instant::now();
    e.key_down(&KeyCombo::new("right").ctrl().shift(), now).unwrap();
    e.key_up(&KeyCombo::new("right"), now).unwrap();
    assert_eq!(e.get_value(Slot::FontSize).unwrap(), 26.0);

    e.step(Slot::LineHeight, Direction::Increase, false, now).unwrap();
    assert_eq!(e.get_value(Slot::LineHeight).unwrap(), 1.3);
}

#[test]
fn test_deactivation_mid_repeat_forgets_held_values() {
    let (mut e, _) = counted("<p>first</p><p>second</p>", "first");
    let now = Instant::now();
    let combo = KeyCombo::new("right").ctrl();
    for _ in 0..3 {
        e.key_down(&combo, now).unwrap();
    }
    insta::assert_snapshot!(e.host().doc.to_markup(), @r#"<p style="font-size: 19px">first</p><p>second</p>"#);

    e.deactivate();
    e.activate();
    e.host_mut().select_text("second", 0, 6).unwrap();
    assert_eq!(e.key_up(&KeyCombo::new("right"), now).unwrap(), None);
    assert_eq!(
        e.host().doc.to_markup(),
        r#"<p style="font-size: 19px">first</p><p>second</p>"#
    );
}

#[test]
fn test_hot_keys_need_an_active_region() {
    let mut host = MemoryHost::from_markup("<p>abc</p>").unwrap();
    host.select_text("abc", 0, 3).unwrap();
    let mut e = StyleEngine::with_defaults(host).unwrap();
    let combo = KeyCombo::new("right").ctrl();

    assert_eq!(e.key_down(&combo, Instant::now()).unwrap(), None);
    assert!(!e.coalescer().is_repeating());
    assert_eq!(e.host().doc.to_markup(), "<p>abc</p>");

    e.activate();
    assert!(e.key_down(&combo, Instant::now()).unwrap().is_some());
    e.deactivate();
    assert_eq!(e.key_down(&combo, Instant::now()).unwrap(), None);
}

#[test]
fn test_deactivated_region_drops_pending_notification() {
    let (mut e, counts) = counted("<p>abc</p>", "abc");
    let now = Instant::now();
    e.set_value(Slot::FontSize, 18.0, now).unwrap();
    e.deactivate();
    assert_eq!(e.poll(now + Duration::from_secs(1)), None);
    assert_eq!(counts.borrow().content, 0);
    assert!(e.host().notifications.is_empty());
}
