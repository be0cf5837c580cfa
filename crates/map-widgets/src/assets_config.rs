//! "HDOT Assets" popup: per-type toggles plus an "Unselect all" action with a count caption.

use mapsync_core_types::Locator;
use sync_engine::{
    clear_selection, ensure_open, read_selection, ClearAll, Disclosure, SelectionCount,
    SelectionWidget, Session,
};

use crate::errors::WidgetError;
use crate::selectors::{widgets, POPOVER};

#[derive(Clone, Debug)]
pub struct AssetsConfig {
    pub disclosure: Disclosure,
    pub selection: SelectionWidget,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetsConfig {
    pub fn new() -> Self {
        let popup = Locator::css(POPOVER);
        let unselect_all = popup.descendant(widgets::UNSELECT_ALL);
        // Toggles render disabled until the asset catalogue has loaded.
        let disclosure = Disclosure::new(
            "hdot-assets",
            Locator::css(widgets::ASSETS_TRIGGER).with_text("HDOT Assets"),
            unselect_all.clone(),
        )
        .with_content(popup.clone())
        .ready_when_absent(popup.descendant(widgets::DISABLED_TOGGLE));
        let selection = SelectionWidget::new(
            "hdot-assets",
            popup.descendant(widgets::UNSELECT_ALL_CAPTION),
        )
        .within(disclosure.clone())
        .with_clear_all(ClearAll::new(unselect_all));
        Self {
            disclosure,
            selection,
        }
    }

    pub async fn expand(&self, session: &Session) -> Result<(), WidgetError> {
        ensure_open(session, &self.disclosure).await?;
        Ok(())
    }

    pub async fn unselect_all(&self, session: &Session) -> Result<SelectionCount, WidgetError> {
        Ok(clear_selection(session, &self.selection).await?)
    }

    pub async fn selected(&self, session: &Session) -> Result<Option<SelectionCount>, WidgetError> {
        self.expand(session).await?;
        Ok(read_selection(session, &self.selection).await?)
    }
}
