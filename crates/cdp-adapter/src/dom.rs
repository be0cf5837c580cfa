//! In-page element resolution.
//!
//! Element queries run as a single `Runtime.evaluate` call: the locator is resolved against the
//! live DOM and the result is summarized into an [`ElementSnapshot`].

use mapsync_core_types::{Locator, Point};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{AdapterError, AdapterErrorKind};

/// What the page reported about a locator at one instant.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ElementSnapshot {
    /// Number of elements the locator matches, ignoring `nth`.
    pub count: usize,
    pub visible: bool,
    pub text: Option<String>,
    pub attribute: Option<String>,
    pub center: Option<Point>,
}

#[derive(Deserialize)]
struct RawSnapshot {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    count: usize,
    #[serde(default)]
    visible: bool,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    attribute: Option<String>,
    #[serde(default)]
    x: Option<f64>,
    #[serde(default)]
    y: Option<f64>,
}

const RESOLVER: &str = r#"
(args) => {
  let nodes;
  try {
    nodes = Array.from(document.querySelectorAll(args.css));
  } catch (e) {
    return { error: String(e && e.message || e) };
  }
  if (args.text !== null) {
    const hits = nodes.filter((n) => (n.textContent || '').includes(args.text));
    nodes = hits.filter((n) => !hits.some((o) => o !== n && n.contains(o)));
  }
  const count = nodes.length;
  const el = args.nth === null ? nodes[0] : nodes[args.nth];
  if (!el) {
    return { count, visible: false };
  }
  if (args.scroll) {
    el.scrollIntoView({ block: 'center', inline: 'center' });
  }
  const style = window.getComputedStyle(el);
  const rect = el.getBoundingClientRect();
  const visible = style.display !== 'none'
    && style.visibility !== 'hidden'
    && rect.width > 0
    && rect.height > 0;
  return {
    count,
    visible,
    text: (el.innerText !== undefined ? el.innerText : el.textContent) || '',
    attribute: args.attribute === null ? null : el.getAttribute(args.attribute),
    x: rect.left + rect.width / 2,
    y: rect.top + rect.height / 2,
  };
}
"#;

/// Builds the `Runtime.evaluate` expression resolving `locator`.
pub fn resolver_expression(locator: &Locator, attribute: Option<&str>, scroll: bool) -> String {
    let args = json!({
        "css": locator.css,
        "text": locator.has_text,
        "nth": locator.nth,
        "attribute": attribute,
        "scroll": scroll,
    });
    format!("({})({})", RESOLVER.trim(), args)
}

/// Decodes the by-value result of the resolver expression.
pub fn decode_snapshot(locator: &Locator, value: Value) -> Result<ElementSnapshot, AdapterError> {
    let raw: RawSnapshot = serde_json::from_value(value).map_err(|err| {
        AdapterError::internal(format!("unexpected resolver result for {locator}: {err}"))
    })?;
    if let Some(message) = raw.error {
        return Err(AdapterError::new(AdapterErrorKind::InvalidSelector)
            .with_hint(format!("{locator}: {message}")));
    }
    let center = match (raw.x, raw.y) {
        (Some(x), Some(y)) => Some(Point::new(x, y)),
        _ => None,
    };
    Ok(ElementSnapshot {
        count: raw.count,
        visible: raw.visible,
        text: raw.text,
        attribute: raw.attribute,
        center,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expression_embeds_locator_as_json() {
        let locator = Locator::css(r#"button[aria-label="Zoom in"]"#)
            .with_text("In")
            .nth(2);
        let expr = resolver_expression(&locator, Some("class"), true);
        assert!(expr.contains(r#""css":"button[aria-label=\"Zoom in\"]""#));
        assert!(expr.contains(r#""text":"In""#));
        assert!(expr.contains(r#""nth":2"#));
        assert!(expr.contains(r#""attribute":"class""#));
        assert!(expr.starts_with("((args) =>"));
    }

    #[test]
    fn decodes_present_element() {
        let locator = Locator::css("#sentinel");
        let snapshot = decode_snapshot(
            &locator,
            json!({"count": 1, "visible": true, "text": "Schools", "attribute": null, "x": 10.0, "y": 20.5}),
        )
        .unwrap();
        assert_eq!(snapshot.count, 1);
        assert!(snapshot.visible);
        assert_eq!(snapshot.text.as_deref(), Some("Schools"));
        assert_eq!(snapshot.center, Some(Point::new(10.0, 20.5)));
    }

    #[test]
    fn missing_element_has_no_center() {
        let snapshot =
            decode_snapshot(&Locator::css(".gone"), json!({"count": 0, "visible": false})).unwrap();
        assert_eq!(snapshot, ElementSnapshot::default());
    }

    #[test]
    fn selector_errors_are_reported() {
        let err = decode_snapshot(&Locator::css("div[["), json!({"error": "not a valid selector"}))
            .unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::InvalidSelector);
        assert!(err.hint.unwrap().contains("css:div[["));
    }
}
