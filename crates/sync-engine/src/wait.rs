//! Bounded polling helpers.
//!
//! Every wait in the engine goes through [`poll_until`]: probe, accept or sleep, give up at the
//! deadline with the last value observed.

use std::future::Future;
use std::time::Duration;

use mapsync_core_types::Locator;
use tokio::time::{sleep, Instant};
use tracing::trace;

use crate::errors::SyncError;
use crate::probe::has_token;
use crate::session::Session;

/// Outcome of a bounded poll. Both arms carry the last probed value.
#[derive(Debug, Clone, PartialEq)]
pub enum Polled<T> {
    Satisfied(T),
    Expired(T),
}

impl<T> Polled<T> {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Polled::Satisfied(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            Polled::Satisfied(value) | Polled::Expired(value) => value,
        }
    }
}

/// Probe until `accept` holds or `budget` elapses. The probe always runs at least once.
pub async fn poll_until<T, F, Fut, P>(
    interval: Duration,
    budget: Duration,
    mut probe: F,
    accept: P,
) -> Result<Polled<T>, SyncError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SyncError>>,
    P: Fn(&T) -> bool,
{
    let deadline = Instant::now() + budget;
    loop {
        let value = probe().await?;
        if accept(&value) {
            return Ok(Polled::Satisfied(value));
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(Polled::Expired(value));
        }
        sleep(interval.min(deadline - now)).await;
    }
}

fn timeout(condition: String, budget: Duration, last_observed: impl Into<String>) -> SyncError {
    SyncError::ConditionTimeout {
        condition,
        waited_ms: budget.as_millis() as u64,
        last_observed: last_observed.into(),
    }
}

pub async fn wait_visible(
    session: &Session,
    target: &Locator,
    budget: Duration,
) -> Result<(), SyncError> {
    wait_visibility(session, target, true, budget).await
}

pub async fn wait_hidden(
    session: &Session,
    target: &Locator,
    budget: Duration,
) -> Result<(), SyncError> {
    wait_visibility(session, target, false, budget).await
}

async fn wait_visibility(
    session: &Session,
    target: &Locator,
    visible: bool,
    budget: Duration,
) -> Result<(), SyncError> {
    let handle = session.handle();
    let polled = poll_until(
        session.policy().poll_interval(),
        budget,
        || async move { Ok::<_, SyncError>(handle.is_visible(target).await?) },
        |seen| *seen == visible,
    )
    .await?;
    match polled {
        Polled::Satisfied(_) => {
            trace!(%target, visible, "visibility condition met");
            Ok(())
        }
        Polled::Expired(seen) => Err(timeout(
            format!("{} {}", target, if visible { "visible" } else { "hidden" }),
            budget,
            if seen { "visible" } else { "hidden" },
        )),
    }
}

/// Wait until the element's text contains `needle` and return the full text.
pub async fn wait_text_contains(
    session: &Session,
    target: &Locator,
    needle: &str,
    budget: Duration,
) -> Result<String, SyncError> {
    let handle = session.handle();
    let polled = poll_until(
        session.policy().poll_interval(),
        budget,
        || async move { Ok::<_, SyncError>(handle.text_content(target).await?) },
        |text| matches!(text, Some(text) if text.contains(needle)),
    )
    .await?;
    match polled {
        Polled::Satisfied(text) => Ok(text.unwrap_or_default()),
        Polled::Expired(text) => Err(timeout(
            format!("{} contains {:?}", target, needle),
            budget,
            text.map(|t| format!("{:?}", t))
                .unwrap_or_else(|| "missing".to_string()),
        )),
    }
}

/// Wait until the element shows any non-blank text and return it trimmed.
pub async fn wait_text_present(
    session: &Session,
    target: &Locator,
    budget: Duration,
) -> Result<String, SyncError> {
    let handle = session.handle();
    let polled = poll_until(
        session.policy().poll_interval(),
        budget,
        || async move { Ok::<_, SyncError>(handle.text_content(target).await?) },
        |text| matches!(text, Some(text) if !text.trim().is_empty()),
    )
    .await?;
    match polled {
        Polled::Satisfied(text) => Ok(text.unwrap_or_default().trim().to_string()),
        Polled::Expired(text) => Err(timeout(
            format!("{} has text", target),
            budget,
            text.map(|t| format!("{:?}", t))
                .unwrap_or_else(|| "missing".to_string()),
        )),
    }
}

/// Wait until exactly `expected` elements match.
pub async fn wait_count(
    session: &Session,
    target: &Locator,
    expected: usize,
    budget: Duration,
) -> Result<(), SyncError> {
    let handle = session.handle();
    let polled = poll_until(
        session.policy().poll_interval(),
        budget,
        || async move { Ok::<_, SyncError>(handle.count(target).await?) },
        |count| *count == expected,
    )
    .await?;
    match polled {
        Polled::Satisfied(_) => Ok(()),
        Polled::Expired(count) => Err(timeout(
            format!("{} count == {}", target, expected),
            budget,
            count.to_string(),
        )),
    }
}

/// Wait until the attribute's whitespace-separated tokens include (or exclude) `token`.
pub async fn wait_attribute_token(
    session: &Session,
    target: &Locator,
    attribute: &str,
    token: &str,
    present: bool,
    budget: Duration,
) -> Result<(), SyncError> {
    let handle = session.handle();
    let polled = poll_until(
        session.policy().poll_interval(),
        budget,
        || async move { Ok::<_, SyncError>(handle.attribute(target, attribute).await?) },
        |value| has_token(value.as_deref(), token) == present,
    )
    .await?;
    match polled {
        Polled::Satisfied(_) => Ok(()),
        Polled::Expired(value) => Err(timeout(
            format!(
                "{} {} {}{}",
                target,
                attribute,
                if present { "has " } else { "lacks " },
                token
            ),
            budget,
            value.unwrap_or_else(|| "missing".to_string()),
        )),
    }
}

pub async fn wait_url_contains(
    session: &Session,
    needle: &str,
    budget: Duration,
) -> Result<String, SyncError> {
    let handle = session.handle();
    let polled = poll_until(
        session.policy().poll_interval(),
        budget,
        || async move { Ok::<_, SyncError>(handle.current_url().await?) },
        |url| url.contains(needle),
    )
    .await?;
    match polled {
        Polled::Satisfied(url) => Ok(url),
        Polled::Expired(url) => Err(timeout(format!("url contains {:?}", needle), budget, url)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn poll_until_reports_last_value_on_expiry() {
        let calls = AtomicUsize::new(0);
        let polled = poll_until(
            Duration::from_millis(100),
            Duration::from_millis(450),
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok::<_, SyncError>(n) }
            },
            |n| *n > 100,
        )
        .await
        .unwrap();
        assert!(!polled.is_satisfied());
        // probes at 0, 100, 200, 300, 400 and the deadline at 450
        assert_eq!(polled.into_inner(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_until_probes_once_with_zero_budget() {
        let polled = poll_until(
            Duration::from_millis(100),
            Duration::ZERO,
            || async { Ok::<_, SyncError>(7) },
            |n| *n == 7,
        )
        .await
        .unwrap();
        assert_eq!(polled, Polled::Satisfied(7));
    }
}
