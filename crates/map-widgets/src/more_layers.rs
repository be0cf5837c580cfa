//! "More Layers" popup with the Facilities and Structures overlay switch.

use std::time::Duration;

use mapsync_core_types::Locator;
use sync_engine::{
    ensure_open, set_toggle, Disclosure, QuiescenceVerdict, QuiescenceWatch, Session, Toggle,
    ToggleState, UrlPattern,
};
use tracing::{debug, info};

use crate::errors::WidgetError;
use crate::selectors::{widgets, CHECKED, POPOVER};

/// Gap without requests that counts as "network idle" after switching a layer.
const IDLE_GAP: Duration = Duration::from_millis(500);

#[derive(Clone, Debug)]
pub struct MoreLayers {
    pub disclosure: Disclosure,
    pub facilities_toggle: Toggle,
}

impl Default for MoreLayers {
    fn default() -> Self {
        Self::new()
    }
}

impl MoreLayers {
    pub fn new() -> Self {
        let popup = Locator::css(POPOVER);
        let switch = popup.descendant(widgets::FACILITIES_TOGGLE);
        let disclosure = Disclosure::new("more-layers", Locator::text("More Layers"), switch.clone())
            .with_content(popup);
        let facilities_toggle =
            Toggle::class_token("facilities-and-structures", switch, CHECKED).within(disclosure.clone());
        Self {
            disclosure,
            facilities_toggle,
        }
    }

    pub async fn expand(&self, session: &Session) -> Result<(), WidgetError> {
        ensure_open(session, &self.disclosure).await?;
        Ok(())
    }

    /// Switch the Facilities and Structures overlay, then wait for the layer's requests to
    /// die down. A layer served from cache may issue none; that is fine.
    pub async fn toggle_facilities_and_structures(
        &self,
        session: &Session,
        on: bool,
    ) -> Result<ToggleState, WidgetError> {
        let any = UrlPattern::contains("://");
        let watch = QuiescenceWatch::new(session.handle(), any.clone())?;
        let state = set_toggle(session, &self.facilities_toggle, ToggleState::from_flag(on)).await?;

        let options = session.policy().quiescence().with_per_request_timeout(IDLE_GAP);
        match watch.settle(options).await {
            QuiescenceVerdict::NeverStarted => debug!("layer switch issued no requests"),
            verdict @ QuiescenceVerdict::Loaded { .. } => {
                info!(%verdict, "layer requests settled")
            }
            verdict @ QuiescenceVerdict::TimedOut { .. } => {
                verdict.into_result(&any, &options)?;
            }
        }
        Ok(state)
    }
}
