//! Hot-key bindings for stepping numeric slots.
//!
//! Bindings come from `hotKeys` in [`StyleConfig`](crate::StyleConfig): an
//! action name such as `increaseFontSize` mapped to space-separated combos
//! like `"ctrl+right ctrl+shift+right"`. Holding shift selects the page step.

use std::collections::BTreeMap;
use std::str::FromStr;

use smol_str::SmolStr;

use crate::config::Slot;
use crate::error::ConfigError;
use crate::types::Direction;

/// A key with its modifier state. Key names are lowercase.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct KeyCombo {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub meta: bool,
    pub key: SmolStr,
}

impl KeyCombo {
    pub fn new(key: &str) -> Self {
        Self {
            ctrl: false,
            shift: false,
            alt: false,
            meta: false,
            key: key.to_ascii_lowercase().into(),
        }
    }

    pub fn ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn alt(mut self) -> Self {
        self.alt = true;
        self
    }

    pub fn meta(mut self) -> Self {
        self.meta = true;
        self
    }
}

impl FromStr for KeyCombo {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut combo = KeyCombo::new("");
        let mut parts = s.split('+').map(str::trim).peekable();
        while let Some(part) = parts.next() {
            let part = part.to_ascii_lowercase();
            if parts.peek().is_none() {
                combo.key = part.into();
                break;
            }
            match part.as_str() {
                "ctrl" | "control" => combo.ctrl = true,
                "shift" => combo.shift = true,
                "alt" => combo.alt = true,
                "meta" | "cmd" => combo.meta = true,
                other => {
                    return Err(ConfigError::Invalid(format!(
                        "unknown modifier {other:?} in key combo {s:?}"
                    )));
                }
            }
        }
        if combo.key.is_empty() {
            return Err(ConfigError::Invalid(format!("key combo {s:?} has no key")));
        }
        Ok(combo)
    }
}

impl std::fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (on, name) in [
            (self.ctrl, "ctrl+"),
            (self.alt, "alt+"),
            (self.meta, "meta+"),
            (self.shift, "shift+"),
        ] {
            if on {
                f.write_str(name)?;
            }
        }
        f.write_str(&self.key)
    }
}

/// Splits `increaseFontSize` into its slot and direction.
pub fn parse_action(action: &str) -> Option<(Slot, Direction)> {
    let (direction, rest) = if let Some(rest) = action.strip_prefix("increase") {
        (Direction::Increase, rest)
    } else if let Some(rest) = action.strip_prefix("decrease") {
        (Direction::Decrease, rest)
    } else {
        return None;
    };
    let mut chars = rest.chars();
    let first = chars.next()?;
    let name: String = first.to_lowercase().chain(chars).collect();
    Slot::from_name(&name).map(|slot| (slot, direction))
}

/// What a bound key does.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Shortcut {
    pub slot: Slot,
    pub direction: Direction,
    pub use_page: bool,
}

#[derive(Clone, Debug, Default)]
pub struct Keymap {
    bindings: Vec<(KeyCombo, Slot, Direction)>,
}

impl Keymap {
    pub fn from_config(hot_keys: &BTreeMap<SmolStr, SmolStr>) -> Result<Self, ConfigError> {
        let mut bindings = Vec::new();
        for (action, combos) in hot_keys {
            let (slot, direction) = parse_action(action)
                .ok_or_else(|| ConfigError::Invalid(format!("unknown hot key action {action}")))?;
            for combo in combos.split_whitespace() {
                bindings.push((combo.parse()?, slot, direction));
            }
        }
        Ok(Self { bindings })
    }

    pub fn lookup(&self, combo: &KeyCombo) -> Option<Shortcut> {
        self.bindings
            .iter()
            .find(|(bound, _, _)| bound == combo)
            .map(|&(_, slot, direction)| Shortcut {
                slot,
                direction,
                use_page: combo.shift,
            })
    }

    /// Whether any binding uses this key, regardless of modifiers. Used to
    /// match key-ups, which may arrive after the modifiers were released.
    pub fn binds_key(&self, key: &str) -> bool {
        self.bindings.iter().any(|(bound, _, _)| bound.key == key)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
