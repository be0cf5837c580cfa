//! Typed access to numbers rendered as text.

use std::time::Duration;

use mapsync_core_types::Locator;
use tracing::debug;

use crate::errors::SyncError;
use crate::session::Session;
use crate::wait::{poll_until, Polled};

/// First integer token in `text`. Thousands separators are accepted, so `"1,204 assets"` is
/// 1204.
pub fn parse_count(text: &str) -> Option<i64> {
    for token in text.split_whitespace() {
        let digits: String = token
            .trim_matches(|c: char| !(c.is_ascii_digit() || c == '-'))
            .chars()
            .filter(|c| *c != ',')
            .collect();
        if digits.is_empty() || digits == "-" {
            continue;
        }
        if let Ok(value) = digits.parse::<i64>() {
            return Some(value);
        }
    }
    None
}

/// Read the integer shown by `target`.
pub async fn read_number(session: &Session, target: &Locator) -> Result<i64, SyncError> {
    let text = session.handle().text_content(target).await?;
    text.as_deref()
        .and_then(parse_count)
        .ok_or_else(|| SyncError::NotNumeric {
            locator: target.to_string(),
            text,
        })
}

/// Read a non-negative count shown by `target`.
pub async fn read_count(session: &Session, target: &Locator) -> Result<u64, SyncError> {
    let value = read_number(session, target).await?;
    u64::try_from(value).map_err(|_| SyncError::NotNumeric {
        locator: target.to_string(),
        text: Some(value.to_string()),
    })
}

/// Read `label`, click `action` once and wait until `label` reads exactly `before + delta`,
/// with nothing else but surrounding whitespace. Returns the new value.
pub async fn step_and_confirm(
    session: &Session,
    label: &Locator,
    action: &Locator,
    delta: i64,
) -> Result<i64, SyncError> {
    let before = read_number(session, label).await?;
    let expected = before + delta;
    let wanted = expected.to_string();
    session.handle().click(action).await?;

    let handle = session.handle();
    let polled = poll_until(
        session.policy().poll_interval(),
        Duration::from_millis(session.policy().condition_ms),
        || async move { Ok::<_, SyncError>(handle.text_content(label).await?) },
        |text| text.as_deref().map(str::trim) == Some(wanted.as_str()),
    )
    .await?;
    match polled {
        Polled::Satisfied(_) => {
            debug!(%label, before, after = expected, "readback confirmed");
            Ok(expected)
        }
        Polled::Expired(observed) => Err(SyncError::UnexpectedReadback {
            what: label.to_string(),
            expected: wanted,
            observed,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::SyncPolicy;
    use crate::testing::{FakeElement, FakeInterface};

    #[test]
    fn parses_first_integer() {
        assert_eq!(parse_count("5"), Some(5));
        assert_eq!(parse_count("0 selected"), Some(0));
        assert_eq!(parse_count("Bridges: 1,204"), Some(1204));
        assert_eq!(parse_count("level -2"), Some(-2));
        assert_eq!(parse_count("(12)"), Some(12));
    }

    #[test]
    fn rejects_text_without_numbers() {
        assert_eq!(parse_count(""), None);
        assert_eq!(parse_count("loading - please wait"), None);
    }

    fn zoom_page(level: &str) -> (FakeInterface, Locator, Locator, Locator) {
        let label = Locator::css("[aria-label=\"Zoom level\"]");
        let zoom_in = Locator::css("button[aria-label=\"Zoom in\"]");
        let zoom_out = Locator::css("button[aria-label=\"Zoom out\"]");
        let fake = FakeInterface::new();
        fake.insert(&label, FakeElement::visible().with_text(level));
        fake.insert(&zoom_in, FakeElement::visible());
        fake.insert(&zoom_out, FakeElement::visible());
        for (button, delta) in [(&zoom_in, 1i64), (&zoom_out, -1)] {
            let label = label.clone();
            fake.on_click(button, move |dom| {
                let current = dom.text(&label).as_deref().and_then(parse_count).unwrap_or(0);
                dom.set_text(&label, (current + delta).to_string());
            });
        }
        (fake, label, zoom_in, zoom_out)
    }

    #[tokio::test(start_paused = true)]
    async fn zoom_in_from_five_reads_six() {
        let (fake, label, zoom_in, _) = zoom_page("5");
        let session = fake.session(SyncPolicy::default());

        let level = step_and_confirm(&session, &label, &zoom_in, 1).await.unwrap();
        assert_eq!(level, 6);
        assert_eq!(fake.clicks_on(&zoom_in), 1);
        assert_eq!(fake.edit(|dom| dom.text(&label)).as_deref(), Some("6"));
    }

    #[tokio::test(start_paused = true)]
    async fn wrong_delta_is_reported() {
        let (fake, label, zoom_in, _) = zoom_page("5");
        let session = fake.session(SyncPolicy::default());

        let err = step_and_confirm(&session, &label, &zoom_in, -1).await.unwrap_err();
        assert_eq!(
            err,
            SyncError::UnexpectedReadback {
                what: label.to_string(),
                expected: "4".to_string(),
                observed: Some("6".to_string()),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn label_with_trailing_text_is_not_an_exact_match() {
        let label = Locator::css("[aria-label=\"Zoom level\"]");
        let zoom_in = Locator::css("button[aria-label=\"Zoom in\"]");
        let fake = FakeInterface::new();
        fake.insert(&label, FakeElement::visible().with_text("5"));
        fake.insert(&zoom_in, FakeElement::visible());
        {
            let label = label.clone();
            fake.on_click(&zoom_in, move |dom| dom.set_text(&label, "6 (max)"));
        }
        let session = fake.session(SyncPolicy::default());

        let err = step_and_confirm(&session, &label, &zoom_in, 1).await.unwrap_err();
        assert_eq!(
            err,
            SyncError::UnexpectedReadback {
                what: label.to_string(),
                expected: "6".to_string(),
                observed: Some("6 (max)".to_string()),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn non_numeric_label_is_rejected() {
        let (fake, label, _, zoom_out) = zoom_page("loading");
        let session = fake.session(SyncPolicy::default());

        let err = step_and_confirm(&session, &label, &zoom_out, -1).await.unwrap_err();
        assert!(matches!(err, SyncError::NotNumeric { .. }));
        assert_eq!(fake.clicks_on(&zoom_out), 0);
        assert!(matches!(
            read_count(&session, &label).await,
            Err(SyncError::NotNumeric { text: Some(_), .. })
        ));
    }
}
