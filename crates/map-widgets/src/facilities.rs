//! "Facilities and Structures" card in the information panel.

use mapsync_core_types::Locator;
use sync_engine::wait::wait_visible;
use sync_engine::{read_number, select_item, SelectionCount, SelectionWidget, Session};
use tracing::debug;

use crate::errors::WidgetError;
use crate::selectors::widgets;

#[derive(Clone, Debug)]
pub struct Facilities {
    pub section: Locator,
    pub selection: SelectionWidget,
}

impl Default for Facilities {
    fn default() -> Self {
        Self::new()
    }
}

impl Facilities {
    pub fn new() -> Self {
        let section = Locator::css(widgets::FACILITIES);
        let row = |position: &str| section.descendant(&format!("{}{}", widgets::TYPE_ROW, position));
        let selection = SelectionWidget::new(
            "facilities",
            section.descendant(widgets::CAPTION),
        )
        .with_items(vec![
            row(":first-child"),
            row(":nth-child(2)"),
            row(":last-child"),
        ]);
        Self { section, selection }
    }

    /// The card is rendered and every row shows a number.
    pub async fn visible_with_values(&self, session: &Session) -> Result<Vec<i64>, WidgetError> {
        wait_visible(session, &self.section, session.policy().condition_budget()).await?;
        let mut values = Vec::with_capacity(self.selection.items.len());
        for item in &self.selection.items {
            values.push(read_number(session, &item.descendant("span")).await?);
        }
        debug!(?values, "facility counts");
        Ok(values)
    }

    /// Select the first row ("Pre-School") and confirm the caption reads "1 selected".
    pub async fn select_pre_school(&self, session: &Session) -> Result<(), WidgetError> {
        select_item(session, &self.selection, 0, SelectionCount(1)).await?;
        Ok(())
    }
}
