//! Style engine configuration.
//!
//! [`StyleConfig::default`] yields the stock slot table. User settings are
//! JSON and are merged over the defaults field by field, so a settings file
//! only has to name what it changes:
//!
//! ```json
//! { "slots": { "fontSize": { "max": 96 } }, "quietWindowMs": 250 }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::error::ConfigError;

/// A bounded numeric style dimension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Slot {
    FontSize,
    LineHeight,
    LetterSpacing,
    WordSpacing,
}

impl Slot {
    pub const ALL: [Slot; 4] = [
        Slot::FontSize,
        Slot::LineHeight,
        Slot::LetterSpacing,
        Slot::WordSpacing,
    ];

    /// Camel-case name used in settings and hot-key actions.
    pub fn name(self) -> &'static str {
        match self {
            Slot::FontSize => "fontSize",
            Slot::LineHeight => "lineHeight",
            Slot::LetterSpacing => "letterSpacing",
            Slot::WordSpacing => "wordSpacing",
        }
    }

    /// Hyphenated CSS property name.
    pub fn css_property(self) -> &'static str {
        match self {
            Slot::FontSize => "font-size",
            Slot::LineHeight => "line-height",
            Slot::LetterSpacing => "letter-spacing",
            Slot::WordSpacing => "word-spacing",
        }
    }

    pub fn from_name(name: &str) -> Option<Slot> {
        Slot::ALL.into_iter().find(|s| s.name() == name)
    }
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// How a slot value is persisted on wrapper elements.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StorageStrategy {
    /// Inline style property, e.g. `font-size`.
    InlineProperty(SmolStr),
    /// Class name pattern containing a `{value}` placeholder, e.g. `fs-{value}`.
    ClassTemplate(SmolStr),
}

const PLACEHOLDER: &str = "{value}";

impl StorageStrategy {
    /// Class name for `value` under a template strategy.
    pub fn render_class(&self, value: &str) -> Option<String> {
        match self {
            StorageStrategy::ClassTemplate(template) => Some(template.replace(PLACEHOLDER, value)),
            StorageStrategy::InlineProperty(_) => None,
        }
    }

    /// Extracts the numeric value encoded in `class`, if it is an instance of
    /// this template.
    pub fn parse_class(&self, class: &str) -> Option<f64> {
        let StorageStrategy::ClassTemplate(template) = self else {
            return None;
        };
        let (prefix, suffix) = template.split_once(PLACEHOLDER)?;
        let middle = class.strip_prefix(prefix)?.strip_suffix(suffix)?;
        middle.parse().ok()
    }

    /// Whether `class` is any instance of this template.
    pub fn matches_class(&self, class: &str) -> bool {
        self.parse_class(class).is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotConfig {
    pub unit: SmolStr,
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub page: f64,
    /// Default value used when nothing in the tree or computed style applies.
    pub value: f64,
    pub storage: StorageStrategy,
    /// Slots cleared whenever this slot is written.
    #[serde(default)]
    pub resets: Vec<Slot>,
}

impl SlotConfig {
    fn inline(slot: Slot, unit: &str, min: f64, max: f64, step: f64, value: f64) -> Self {
        Self {
            unit: unit.into(),
            min,
            max,
            step,
            page: 10.0,
            value,
            storage: StorageStrategy::InlineProperty(slot.css_property().into()),
            resets: Vec::new(),
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Behaviour flags for class appliers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApplierOptions {
    /// Skip whitespace-only text containing a line break that sits directly
    /// under a block.
    pub ignore_white_space: bool,
    /// Only touch text inside a content-editable region.
    pub editable_only: bool,
    /// Merge adjacent equivalent wrappers and adjacent text after mutating.
    pub normalize: bool,
}

impl Default for ApplierOptions {
    fn default() -> Self {
        Self {
            ignore_white_space: true,
            editable_only: true,
            normalize: true,
        }
    }
}

/// Classes and inline properties that survive a style reset.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResetWhitelist {
    pub classes: Vec<SmolStr>,
    pub styles: Vec<SmolStr>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StyleConfig {
    pub slots: BTreeMap<Slot, SlotConfig>,
    /// Action name (`increaseFontSize`, ...) to space-separated key combos.
    pub hot_keys: BTreeMap<SmolStr, SmolStr>,
    /// Tag used for generic styling wrappers.
    pub wrapper_tag: SmolStr,
    /// Quiet period before the trailing content-changed notification.
    pub quiet_window_ms: u64,
    pub cleanup_iterations: usize,
    /// Subtracted from the fitted font size before it is committed.
    pub autofit_margin: f64,
    pub applier: ApplierOptions,
    /// Mutually exclusive font classes.
    pub font_classes: Vec<SmolStr>,
    pub reset_whitelist: ResetWhitelist,
    /// Selector (`*`, `p`, `.lead`, `p.lead`) to `title -> class`.
    pub class_catalog: BTreeMap<SmolStr, BTreeMap<SmolStr, SmolStr>>,
}

impl Default for StyleConfig {
    fn default() -> Self {
        let mut font_size = SlotConfig::inline(Slot::FontSize, "px", 10.0, 128.0, 1.0, 16.0);
        font_size.resets = vec![Slot::LineHeight];
        let slots = BTreeMap::from([
            (Slot::FontSize, font_size),
            (
                Slot::LineHeight,
                SlotConfig::inline(Slot::LineHeight, "em", 0.0, 3.0, 0.1, 1.2),
            ),
            (
                Slot::LetterSpacing,
                SlotConfig::inline(Slot::LetterSpacing, "em", -1.0, 3.0, 0.1, 0.0),
            ),
            (
                Slot::WordSpacing,
                SlotConfig::inline(Slot::WordSpacing, "em", -1.0, 2.0, 0.1, 0.0),
            ),
        ]);
        let hot_keys = [
            ("decreaseFontSize", "ctrl+left ctrl+shift+left"),
            ("increaseFontSize", "ctrl+right ctrl+shift+right"),
            ("decreaseLineHeight", "ctrl+up ctrl+shift+up"),
            ("increaseLineHeight", "ctrl+down ctrl+shift+down"),
        ]
        .into_iter()
        .map(|(k, v)| (SmolStr::new(k), SmolStr::new(v)))
        .collect();
        Self {
            slots,
            hot_keys,
            wrapper_tag: "span".into(),
            quiet_window_ms: 500,
            cleanup_iterations: 10,
            autofit_margin: 0.0,
            applier: ApplierOptions::default(),
            font_classes: Vec::new(),
            reset_whitelist: ResetWhitelist::default(),
            class_catalog: BTreeMap::new(),
        }
    }
}

/// Partial slot settings; `None` keeps the default.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SlotOverride {
    unit: Option<SmolStr>,
    min: Option<f64>,
    max: Option<f64>,
    step: Option<f64>,
    page: Option<f64>,
    value: Option<f64>,
    storage: Option<StorageStrategy>,
    resets: Option<Vec<Slot>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct UserSettings {
    slots: BTreeMap<Slot, SlotOverride>,
    hot_keys: Option<BTreeMap<SmolStr, SmolStr>>,
    wrapper_tag: Option<SmolStr>,
    quiet_window_ms: Option<u64>,
    cleanup_iterations: Option<usize>,
    autofit_margin: Option<f64>,
    applier: Option<ApplierOptions>,
    font_classes: Option<Vec<SmolStr>>,
    reset_whitelist: Option<ResetWhitelist>,
    class_catalog: Option<BTreeMap<SmolStr, BTreeMap<SmolStr, SmolStr>>>,
}

impl StyleConfig {
    /// Parses user settings and merges them over the defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let settings: UserSettings = serde_json::from_str(json)?;
        let mut config = Self::default();
        config.merge(settings);
        config.validate()?;
        Ok(config)
    }

    fn merge(&mut self, settings: UserSettings) {
        for (slot, o) in settings.slots {
            let Some(base) = self.slots.get(&slot).cloned() else {
                continue;
            };
            let merged = SlotConfig {
                unit: o.unit.unwrap_or(base.unit),
                min: o.min.unwrap_or(base.min),
                max: o.max.unwrap_or(base.max),
                step: o.step.unwrap_or(base.step),
                page: o.page.unwrap_or(base.page),
                value: o.value.unwrap_or(base.value),
                storage: o.storage.unwrap_or(base.storage),
                resets: o.resets.unwrap_or(base.resets),
            };
            self.slots.insert(slot, merged);
        }
        if let Some(hot_keys) = settings.hot_keys {
            self.hot_keys.extend(hot_keys);
        }
        if let Some(tag) = settings.wrapper_tag {
            self.wrapper_tag = tag;
        }
        if let Some(ms) = settings.quiet_window_ms {
            self.quiet_window_ms = ms;
        }
        if let Some(n) = settings.cleanup_iterations {
            self.cleanup_iterations = n;
        }
        if let Some(margin) = settings.autofit_margin {
            self.autofit_margin = margin;
        }
        if let Some(applier) = settings.applier {
            self.applier = applier;
        }
        if let Some(classes) = settings.font_classes {
            self.font_classes = classes;
        }
        if let Some(whitelist) = settings.reset_whitelist {
            self.reset_whitelist = whitelist;
        }
        if let Some(catalog) = settings.class_catalog {
            self.class_catalog.extend(catalog);
        }
    }

    /// Rejects settings the engine cannot operate with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wrapper_tag.is_empty() {
            return Err(ConfigError::Invalid("wrapperTag must not be empty".into()));
        }
        for (slot, cfg) in &self.slots {
            if cfg.min > cfg.max {
                return Err(ConfigError::Invalid(format!(
                    "{slot}: min {} is greater than max {}",
                    cfg.min, cfg.max
                )));
            }
            if cfg.step <= 0.0 || cfg.page <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{slot}: step and page must be positive"
                )));
            }
            if let StorageStrategy::ClassTemplate(template) = &cfg.storage {
                if !template.contains(PLACEHOLDER) {
                    return Err(ConfigError::Invalid(format!(
                        "{slot}: class template {template:?} has no {PLACEHOLDER} placeholder"
                    )));
                }
            }
        }
        if let Some(action) = self
            .hot_keys
            .keys()
            .find(|action| crate::keymap::parse_action(action).is_none())
        {
            return Err(ConfigError::Invalid(format!("unknown hot key action {action}")));
        }
        Ok(())
    }

    pub fn slot(&self, slot: Slot) -> Option<&SlotConfig> {
        self.slots.get(&slot)
    }
}
