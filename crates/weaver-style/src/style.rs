//! Small helpers over class lists and inline style maps.

use smol_str::SmolStr;

use crate::dom::{DocumentModel, NodeId};

/// Removes an inline property. Returns whether it was present.
pub fn remove_style<D: DocumentModel + ?Sized>(doc: &mut D, element: NodeId, property: &str) -> bool {
    let present = doc.style(element, property).is_some();
    if present {
        doc.remove_style(element, property);
    }
    present
}

/// Removes a class. Returns whether it was present.
pub fn remove_class<D: DocumentModel + ?Sized>(doc: &mut D, element: NodeId, class: &str) -> bool {
    let present = doc.has_class(element, class);
    if present {
        doc.remove_class(element, class);
    }
    present
}

pub fn class_names<D: DocumentModel + ?Sized>(doc: &D, element: NodeId) -> Vec<SmolStr> {
    doc.classes(element)
}

pub fn inline_styles<D: DocumentModel + ?Sized>(doc: &D, element: NodeId) -> Vec<(SmolStr, SmolStr)> {
    doc.styles(element)
}

/// Parses `"<number><unit>"`. An empty unit accepts a bare number.
pub fn parse_value(css: &str, unit: &str) -> Option<f64> {
    let css = css.trim();
    let number = if unit.is_empty() {
        css
    } else {
        css.strip_suffix(unit)?
    };
    number.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Rounds away binary noise from repeated decimal steps, e.g. `1.2 + 0.1`.
pub fn float_fix(value: f64) -> f64 {
    (value * 1e10).round() / 1e10
}

/// Shortest decimal form; `16.0` renders as `16`.
pub fn format_value(value: f64) -> String {
    format!("{}", float_fix(value))
}

/// CSS text for a value in a unit, e.g. `1.3em`.
pub fn format_css(value: f64, unit: &str) -> String {
    format!("{}{unit}", format_value(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("16px", "px"), Some(16.0));
        assert_eq!(parse_value(" 1.5em ", "em"), Some(1.5));
        assert_eq!(parse_value("-0.1em", "em"), Some(-0.1));
        assert_eq!(parse_value("16px", "em"), None);
        assert_eq!(parse_value("normal", "px"), None);
        assert_eq!(parse_value("1.2", ""), Some(1.2));
    }

    #[test]
    fn test_float_fix_and_format() {
        assert_eq!(float_fix(1.2 + 0.1), 1.3);
        assert_eq!(format_value(16.0), "16");
        assert_eq!(format_css(1.2 + 0.1, "em"), "1.3em");
        assert_eq!(format_css(-0.1, "em"), "-0.1em");
    }
}
