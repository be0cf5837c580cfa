//! Sidebar of the map page: logo, Information/Insights tabs, the section text and the
//! category widgets rendered below it.

use mapsync_core_types::Locator;
use sync_engine::wait::{wait_hidden, wait_text_contains, wait_url_contains, wait_visible};
use sync_engine::{ensure_selected, Session, SyncError, Toggle};
use tracing::info;

use crate::assets_by_type::AssetsByType;
use crate::categories::CategoriesBar;
use crate::errors::WidgetError;
use crate::facilities::Facilities;
use crate::selectors::{home, sidebar, SELECTED};

#[derive(Clone, Debug)]
pub struct Sidebar {
    pub logo: Locator,
    pub information: Toggle,
    pub insights: Toggle,
    pub title: Locator,
    pub paragraphs: Locator,
    pub categories: CategoriesBar,
    pub facilities: Facilities,
    pub assets_by_type: AssetsByType,
}

impl Default for Sidebar {
    fn default() -> Self {
        Self::new()
    }
}

impl Sidebar {
    pub fn new() -> Self {
        let root = Locator::css(sidebar::ROOT);
        let tab = |id: &str, selector: &str| {
            Toggle::class_token(id, root.descendant(selector), SELECTED).dismiss_first()
        };
        Self {
            logo: root.descendant(sidebar::LOGO),
            information: tab("information", sidebar::INFORMATION_TAB),
            insights: tab("insights", sidebar::INSIGHTS_TAB),
            title: root.descendant(sidebar::TITLE),
            paragraphs: root.descendant(sidebar::PARAGRAPHS),
            categories: CategoriesBar::new(),
            facilities: Facilities::new(),
            assets_by_type: AssetsByType::new(),
        }
    }

    /// Click the logo and confirm the app went back to the landing page.
    pub async fn click_logo(&self, session: &Session) -> Result<String, WidgetError> {
        let budget = session.policy().condition_budget();
        session.handle().click(&self.logo).await?;
        wait_hidden(session, &self.information.control, budget).await?;
        let url = wait_url_contains(session, home::TOP_ANCHOR, budget).await?;
        session.reset();
        info!(%url, "returned to home page");
        Ok(url)
    }

    pub async fn go_to_information(&self, session: &Session) -> Result<(), WidgetError> {
        ensure_selected(session, &self.information).await?;
        Ok(())
    }

    pub async fn go_to_insights(&self, session: &Session) -> Result<(), WidgetError> {
        ensure_selected(session, &self.insights).await?;
        Ok(())
    }

    /// The section title reads exactly `expected`, ignoring surrounding whitespace.
    pub async fn title_is(&self, session: &Session, expected: &str) -> Result<(), WidgetError> {
        let text =
            wait_text_contains(session, &self.title, expected, session.policy().condition_budget())
                .await?;
        if text.trim() != expected {
            return Err(WidgetError::expectation("sidebar title", expected, text.trim()));
        }
        Ok(())
    }

    /// Paragraph `index` (1-based, as a reader counts them) contains `needle`.
    pub async fn paragraph_contains(
        &self,
        session: &Session,
        index: usize,
        needle: &str,
    ) -> Result<String, WidgetError> {
        if index == 0 {
            return Err(SyncError::Misconfigured("paragraph index is 1-based".to_string()).into());
        }
        let paragraph = self.paragraphs.clone().nth(index - 1);
        let budget = session.policy().condition_budget();
        wait_visible(session, &paragraph, budget).await?;
        Ok(wait_text_contains(session, &paragraph, needle, budget).await?)
    }
}
