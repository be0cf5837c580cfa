//! Idempotent disclosure controller.

use std::time::Duration;

use mapsync_core_types::{Key, Locator};
use tracing::{debug, info};

use crate::errors::{DisclosureState, SyncError};
use crate::metrics;
use crate::session::{OpenDisclosure, Session};
use crate::wait::{poll_until, wait_count, wait_hidden, Polled};

/// A popup or menu whose content stays hidden until its trigger is clicked.
///
/// `sentinel` is a child of the content region; its visibility is the disclosure's state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Disclosure {
    pub id: String,
    pub trigger: Locator,
    pub sentinel: Locator,
    /// Region shared by every disclosure of this kind (e.g. the popover paper). Must be hidden
    /// after the neutral dismissal.
    pub content: Option<Locator>,
    /// Elements that must all be gone before the opened disclosure counts as usable.
    pub ready_when_absent: Option<Locator>,
}

impl Disclosure {
    pub fn new(id: impl Into<String>, trigger: Locator, sentinel: Locator) -> Self {
        Self {
            id: id.into(),
            trigger,
            sentinel,
            content: None,
            ready_when_absent: None,
        }
    }

    pub fn with_content(mut self, content: Locator) -> Self {
        self.content = Some(content);
        self
    }

    pub fn ready_when_absent(mut self, pending: Locator) -> Self {
        self.ready_when_absent = Some(pending);
        self
    }

    fn failure(&self, last_observed: DisclosureState, reason: impl Into<String>) -> SyncError {
        SyncError::Disclosure {
            disclosure: self.id.clone(),
            last_observed,
            reason: reason.into(),
        }
    }
}

/// Current state as shown by the sentinel.
pub async fn disclosure_state(
    session: &Session,
    disclosure: &Disclosure,
) -> Result<DisclosureState, SyncError> {
    let visible = session.handle().is_visible(&disclosure.sentinel).await?;
    Ok(if visible {
        DisclosureState::Open
    } else {
        DisclosureState::Closed
    })
}

/// Open `disclosure` unless the session already holds it open.
///
/// Any other disclosure is dismissed with Escape and confirmed hidden before the trigger is
/// clicked. The trigger is clicked at most once.
pub async fn ensure_open(
    session: &Session,
    disclosure: &Disclosure,
) -> Result<DisclosureState, SyncError> {
    metrics::observe("disclosure", open_inner(session, disclosure).await)
}

async fn open_inner(
    session: &Session,
    disclosure: &Disclosure,
) -> Result<DisclosureState, SyncError> {
    let handle = session.handle();
    let policy = session.policy();

    if let Some(current) = session.open_disclosure() {
        if current.id == disclosure.id && handle.is_visible(&disclosure.sentinel).await? {
            debug!(disclosure = %disclosure.id, "already open");
            return Ok(DisclosureState::Open);
        }
    }

    let previous = session.take_open();
    handle.press_key(Key::Escape).await?;

    let close_budget = Duration::from_millis(policy.disclosure_close_ms);
    let mut must_hide: Vec<&Locator> = Vec::new();
    if let Some(content) = &disclosure.content {
        must_hide.push(content);
    }
    if let Some(previous) = &previous {
        must_hide.push(&previous.sentinel);
    }
    for target in must_hide {
        if let Err(err) = wait_hidden(session, target, close_budget).await {
            return Err(match err {
                SyncError::ConditionTimeout { .. } => disclosure.failure(
                    DisclosureState::Open,
                    format!("{} still visible after dismissal", target),
                ),
                other => other,
            });
        }
    }

    if handle.is_visible(&disclosure.sentinel).await? {
        debug!(disclosure = %disclosure.id, "sentinel visible after dismissal");
    } else {
        handle.click(&disclosure.trigger).await?;
        let open_budget = Duration::from_millis(policy.disclosure_open_ms);
        let sentinel = &disclosure.sentinel;
        let polled = poll_until(
            policy.poll_interval(),
            open_budget,
            || async move { Ok::<_, SyncError>(handle.is_visible(sentinel).await?) },
            |visible| *visible,
        )
        .await?;
        if let Polled::Expired(_) = polled {
            return Err(disclosure.failure(
                DisclosureState::Closed,
                format!(
                    "sentinel {} not visible {}ms after trigger",
                    sentinel,
                    open_budget.as_millis()
                ),
            ));
        }
    }

    if let Some(pending) = &disclosure.ready_when_absent {
        let ready_budget = Duration::from_millis(policy.disclosure_ready_ms);
        if let Err(err) = wait_count(session, pending, 0, ready_budget).await {
            return Err(match err {
                SyncError::ConditionTimeout { last_observed, .. } => disclosure.failure(
                    DisclosureState::Open,
                    format!("{} {} still present, not ready", last_observed, pending),
                ),
                other => other,
            });
        }
    }

    session.mark_open(OpenDisclosure {
        id: disclosure.id.clone(),
        sentinel: disclosure.sentinel.clone(),
    });
    info!(disclosure = %disclosure.id, "disclosure open");
    Ok(DisclosureState::Open)
}

/// Dismiss `disclosure` and confirm its sentinel is hidden.
pub async fn ensure_closed(
    session: &Session,
    disclosure: &Disclosure,
) -> Result<DisclosureState, SyncError> {
    metrics::observe("disclosure", close_inner(session, disclosure).await)
}

async fn close_inner(
    session: &Session,
    disclosure: &Disclosure,
) -> Result<DisclosureState, SyncError> {
    if !session.handle().is_visible(&disclosure.sentinel).await? {
        if matches!(session.open_disclosure(), Some(open) if open.id == disclosure.id) {
            session.reset();
        }
        return Ok(DisclosureState::Closed);
    }
    session.dismiss().await?;
    let budget = Duration::from_millis(session.policy().disclosure_close_ms);
    wait_hidden(session, &disclosure.sentinel, budget)
        .await
        .map_err(|err| match err {
            SyncError::ConditionTimeout { .. } => {
                disclosure.failure(DisclosureState::Open, "still visible after dismissal")
            }
            other => other,
        })?;
    Ok(DisclosureState::Closed)
}
