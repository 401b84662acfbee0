use weaver_style::{
    CatalogEntry, ConfigError, Instant, MemoryHost, Mutation, Slot, StorageStrategy, StyleConfig,
    StyleEngine,
};

fn entry(title: &str, class: &str) -> CatalogEntry {
    CatalogEntry {
        title: title.into(),
        class: class.into(),
    }
}

#[test]
fn test_settings_merge_over_defaults() {
    let config = StyleConfig::from_json(
        r#"{
            "slots": { "lineHeight": { "max": 4, "step": 0.25 } },
            "hotKeys": { "increaseLetterSpacing": "alt+right" },
            "quietWindowMs": 250,
            "fontClasses": ["serif", "mono"]
        }"#,
    )
    .unwrap();
    let line_height = config.slot(Slot::LineHeight).unwrap();
    assert_eq!(line_height.max, 4.0);
    assert_eq!(line_height.step, 0.25);
    assert_eq!(line_height.min, 0.0);
    assert_eq!(line_height.unit, "em");
    assert_eq!(config.hot_keys.len(), 5);
    assert_eq!(config.quiet_window_ms, 250);
    assert_eq!(config.wrapper_tag, "span");
    assert_eq!(
        config.slot(Slot::FontSize).unwrap().storage,
        StorageStrategy::InlineProperty("font-size".into())
    );
}

#[test]
fn test_invalid_settings_are_rejected() {
    for json in [
        r#"{ "slots": { "fontSize": { "min": 50, "max": 20 } } }"#,
        r#"{ "slots": { "wordSpacing": { "step": 0 } } }"#,
        r#"{ "slots": { "fontSize": { "storage": { "classTemplate": "fs" } } } }"#,
        r#"{ "hotKeys": { "jumpAround": "ctrl+j" } }"#,
    ] {
        assert!(
            matches!(StyleConfig::from_json(json), Err(ConfigError::Invalid(_))),
            "{json}"
        );
    }
    assert!(matches!(
        StyleConfig::from_json("{ not json"),
        Err(ConfigError::Json(_))
    ));

    let config =
        StyleConfig::from_json(r#"{ "hotKeys": { "increaseFontSize": "hyper+x" } }"#).unwrap();
    let host = MemoryHost::from_markup("<p>x</p>").unwrap();
    assert!(StyleEngine::new(host, config).is_err());
}

#[test]
fn test_custom_quiet_window() {
    let config = StyleConfig::from_json(r#"{ "quietWindowMs": 100 }"#).unwrap();
    let mut host = MemoryHost::from_markup("<p>abc</p>").unwrap();
    host.select_text("abc", 0, 3).unwrap();
    let mut e = StyleEngine::new(host, config).unwrap();
    e.activate();
    let now = Instant::now();
    e.set_value(Slot::WordSpacing, 0.5, now).unwrap();
    assert_eq!(
        e.next_deadline(),
        Some(now + weaver_style::Duration::from_millis(100))
    );
}

fn catalog_engine() -> StyleEngine<MemoryHost> {
    let config = StyleConfig::from_json(
        r#"{ "classCatalog": {
            "*": { "Fancy": "fancy" },
            "h1": { "Awesome": "awesome" },
            "p.lead": { "Huge": "huge" }
        } }"#,
    )
    .unwrap();
    let host = MemoryHost::from_markup(
        r#"<h1>title</h1><p class="lead fancy">body</p>"#,
    )
    .unwrap();
    let mut e = StyleEngine::new(host, config).unwrap();
    e.activate();
    e
}

#[test]
fn test_catalog_follows_selection() {
    let mut e = catalog_engine();
    e.host_mut().select_text("title", 0, 5).unwrap();
    assert_eq!(
        e.available_classes().unwrap(),
        vec![entry("Fancy", "fancy"), entry("Awesome", "awesome")]
    );
    assert!(e.active_classes().is_empty());

    e.host_mut().select_text("body", 1, 3).unwrap();
    assert_eq!(
        e.available_classes().unwrap(),
        vec![entry("Fancy", "fancy"), entry("Huge", "huge")]
    );
    assert_eq!(e.active_classes(), vec![entry("Fancy", "fancy")]);
}

#[test]
fn test_catalog_toggle_on_caret_covers_container() {
    let mut e = catalog_engine();
    let title = e.host().doc.find_text("title").unwrap();
    e.host_mut().selection = Some(weaver_style::Range::caret(title, 2));

    assert!(e.toggle_class("awesome", None, Instant::now()).unwrap().is_changed());
    insta::assert_snapshot!(
        e.host().doc.to_markup(),
        @r#"<h1><span class="awesome">title</span></h1><p class="lead fancy">body</p>"#
    );
    assert!(e.is_class_applied("awesome"));
}

#[test]
fn test_exclusive_font_classes() {
    let config = StyleConfig::from_json(r#"{ "fontClasses": ["serif", "mono", "sans"] }"#).unwrap();
    let mut host = MemoryHost::from_markup(r#"<p><span class="serif">abc</span>def</p>"#).unwrap();
    host.select_text("abc", 0, 3).unwrap();
    let mut e = StyleEngine::new(host, config).unwrap();
    e.activate();
    let now = Instant::now();

    assert!(e.toggle_exclusive_class("mono", None, now).unwrap().is_changed());
    insta::assert_snapshot!(
        e.host().doc.to_markup(),
        @r#"<p><span class="mono">abc</span>def</p>"#
    );

    let m = e.toggle_exclusive_class("mono", None, now).unwrap();
    assert!(matches!(m, Mutation::Changed(_)));
    assert_eq!(e.host().doc.to_markup(), "<p>abcdef</p>");
}
