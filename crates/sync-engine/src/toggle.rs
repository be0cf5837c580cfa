//! Idempotent two-state controls: switches, checkboxes and tabs.

use std::time::Duration;

use mapsync_core_types::Locator;
use tracing::{debug, info};

use crate::disclosure::{ensure_open, Disclosure};
use crate::errors::{SyncError, ToggleState};
use crate::metrics;
use crate::probe::StateProbe;
use crate::session::Session;
use crate::wait::{poll_until, Polled};

/// What must happen before the toggle's state is read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Precondition {
    /// Nothing; the control is always reachable.
    None,
    /// Press Escape first so a stray popup cannot swallow the click.
    Dismiss,
    /// The control lives inside this disclosure.
    Within(Disclosure),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Toggle {
    pub id: String,
    pub control: Locator,
    pub state: StateProbe,
    pub precondition: Precondition,
}

impl Toggle {
    /// A control whose `class` carries `token` while on (`Mui-checked`, `Mui-selected`).
    pub fn class_token(id: impl Into<String>, control: Locator, token: &str) -> Self {
        Self {
            id: id.into(),
            state: StateProbe::class_token(control.clone(), token),
            control,
            precondition: Precondition::None,
        }
    }

    pub fn within(mut self, owner: Disclosure) -> Self {
        self.precondition = Precondition::Within(owner);
        self
    }

    pub fn dismiss_first(mut self) -> Self {
        self.precondition = Precondition::Dismiss;
        self
    }
}

/// Drive `toggle` to `target`, clicking at most once.
pub async fn set_toggle(
    session: &Session,
    toggle: &Toggle,
    target: ToggleState,
) -> Result<ToggleState, SyncError> {
    metrics::observe("toggle", set_inner(session, toggle, target).await)
}

/// Select a tab-like control. Selecting is one-way; there is no "off" click.
pub async fn ensure_selected(session: &Session, toggle: &Toggle) -> Result<(), SyncError> {
    set_toggle(session, toggle, ToggleState::On).await.map(|_| ())
}

async fn set_inner(
    session: &Session,
    toggle: &Toggle,
    target: ToggleState,
) -> Result<ToggleState, SyncError> {
    match &toggle.precondition {
        Precondition::None => {}
        Precondition::Dismiss => session.dismiss().await?,
        Precondition::Within(owner) => {
            ensure_open(session, owner).await?;
        }
    }

    let handle = session.handle();
    let current = toggle.state.read_state(handle).await?;
    if current == target {
        debug!(toggle = %toggle.id, state = %current, "already in requested state");
        return Ok(current);
    }

    handle.click(&toggle.control).await?;

    let policy = session.policy();
    let probe = &toggle.state;
    let polled = poll_until(
        policy.poll_interval(),
        Duration::from_millis(policy.toggle_confirm_ms),
        || async move { Ok::<_, SyncError>(probe.read_state(handle).await?) },
        |state| *state == target,
    )
    .await?;
    match polled {
        Polled::Satisfied(state) => {
            info!(toggle = %toggle.id, state = %state, "toggle switched");
            Ok(state)
        }
        Polled::Expired(observed) => Err(SyncError::Toggle {
            toggle: toggle.id.clone(),
            expected: target,
            observed,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::SyncPolicy;
    use crate::testing::{FakeElement, FakeInterface};
    use mapsync_core_types::Key;

    fn switch() -> Toggle {
        Toggle::class_token(
            "facilities",
            Locator::css("li:first-child span.MuiIconButton-root"),
            "Mui-checked",
        )
    }

    /// A switch that flips its `Mui-checked` token on every click.
    fn page_with_switch(toggle: &Toggle, on: bool) -> FakeInterface {
        let fake = FakeInterface::new();
        let class = if on {
            "MuiIconButton-root Mui-checked"
        } else {
            "MuiIconButton-root"
        };
        fake.insert(&toggle.control, FakeElement::visible().with_class(class));
        let control = toggle.control.clone();
        fake.on_click(&toggle.control, move |dom| {
            if dom.has_class(&control, "Mui-checked") {
                dom.remove_class(&control, "Mui-checked");
            } else {
                dom.add_class(&control, "Mui-checked");
            }
        });
        fake
    }

    #[tokio::test(start_paused = true)]
    async fn already_on_needs_no_click() {
        let toggle = switch();
        let fake = page_with_switch(&toggle, true);
        let session = fake.session(SyncPolicy::default());

        let state = set_toggle(&session, &toggle, ToggleState::On).await.unwrap();
        assert_eq!(state, ToggleState::On);
        assert_eq!(fake.clicks_on(&toggle.control), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn converges_in_at_most_one_click() {
        for initial in [true, false] {
            for target in [ToggleState::On, ToggleState::Off] {
                let toggle = switch();
                let fake = page_with_switch(&toggle, initial);
                let session = fake.session(SyncPolicy::default());

                let reached = set_toggle(&session, &toggle, target).await.unwrap();
                assert_eq!(reached, target);
                let expected_clicks = usize::from(ToggleState::from_flag(initial) != target);
                assert_eq!(fake.clicks_on(&toggle.control), expected_clicks);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_calls_never_double_toggle() {
        let toggle = switch();
        let fake = page_with_switch(&toggle, false);
        let session = fake.session(SyncPolicy::default());

        for _ in 0..3 {
            set_toggle(&session, &toggle, ToggleState::On).await.unwrap();
        }
        assert_eq!(fake.clicks_on(&toggle.control), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn ignored_click_reports_observed_state() {
        let toggle = switch();
        let fake = FakeInterface::new();
        fake.insert(
            &toggle.control,
            FakeElement::visible().with_class("MuiIconButton-root"),
        );
        let session = fake.session(SyncPolicy::default());

        let err = set_toggle(&session, &toggle, ToggleState::On)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SyncError::Toggle {
                toggle: "facilities".to_string(),
                expected: ToggleState::On,
                observed: ToggleState::Off,
            }
        );
        assert_eq!(fake.clicks_on(&toggle.control), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_inside_disclosure_opens_owner_first() {
        let menu = Disclosure::new(
            "layers",
            Locator::text("More Layers"),
            Locator::css("li:first-child span.MuiIconButton-root"),
        );
        let toggle = switch().within(menu.clone());
        let fake = page_with_switch(&toggle, false);
        fake.insert(&menu.trigger, FakeElement::visible());
        fake.edit(|dom| dom.set_visible(&toggle.control, false));
        let control = toggle.control.clone();
        fake.on_click(&menu.trigger, move |dom| dom.set_visible(&control, true));
        let session = fake.session(SyncPolicy::default());

        set_toggle(&session, &toggle, ToggleState::On).await.unwrap();
        assert_eq!(fake.clicks_on(&menu.trigger), 1);
        assert_eq!(fake.clicks_on(&toggle.control), 1);
        assert_eq!(session.open_disclosure().unwrap().id, "layers");
    }

    #[tokio::test(start_paused = true)]
    async fn tab_selection_dismisses_first() {
        let tab = Toggle::class_token(
            "insights",
            Locator::css("a[aria-label=\"Insights\"]"),
            "Mui-selected",
        )
        .dismiss_first();
        let fake = FakeInterface::new();
        fake.insert(&tab.control, FakeElement::visible().with_class("MuiTab-root"));
        let control = tab.control.clone();
        fake.on_click(&tab.control, move |dom| dom.add_class(&control, "Mui-selected"));
        let session = fake.session(SyncPolicy::default());

        ensure_selected(&session, &tab).await.unwrap();
        ensure_selected(&session, &tab).await.unwrap();
        assert_eq!(fake.key_presses(Key::Escape), 2);
        assert_eq!(fake.clicks_on(&tab.control), 1);
    }
}
