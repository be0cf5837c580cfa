//! Vertical category bar on the left edge of the map.

use mapsync_core_types::Locator;
use sync_engine::{ensure_selected, Session, Toggle};

use crate::errors::WidgetError;
use crate::selectors::{sidebar, SELECTED};

#[derive(Clone, Debug)]
pub struct CategoriesBar {
    pub thematic_indices: Toggle,
}

impl Default for CategoriesBar {
    fn default() -> Self {
        Self::new()
    }
}

impl CategoriesBar {
    pub fn new() -> Self {
        Self {
            thematic_indices: Toggle::class_token(
                "thematic-indices",
                Locator::css(sidebar::THEMATIC_INDICES),
                SELECTED,
            )
            .dismiss_first(),
        }
    }

    pub async fn open_thematic_indices(&self, session: &Session) -> Result<(), WidgetError> {
        ensure_selected(session, &self.thematic_indices).await?;
        Ok(())
    }
}
