//! Landing page: section nav bar, back-to-top button and the "Explore map" entry point.

use std::fmt;

use mapsync_core_types::Locator;
use sync_engine::wait::{wait_hidden, wait_visible};
use sync_engine::{ensure_selected, QuiescenceWatch, Session, Toggle, UrlPattern};
use tracing::info;

use crate::errors::WidgetError;
use crate::selectors::{home, SELECTED};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NavSection {
    ClimateResilience,
    ActionPlan,
    ClimateStressor,
    TheUrgency,
    HdotMap,
    MapComponents,
}

impl NavSection {
    pub const ALL: [NavSection; 6] = [
        NavSection::ClimateResilience,
        NavSection::ActionPlan,
        NavSection::ClimateStressor,
        NavSection::TheUrgency,
        NavSection::HdotMap,
        NavSection::MapComponents,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            NavSection::ClimateResilience => "Climate Resilience",
            NavSection::ActionPlan => "Action Plan",
            NavSection::ClimateStressor => "Climate Stressor",
            NavSection::TheUrgency => "The Urgency",
            NavSection::HdotMap => "HDOT Map",
            NavSection::MapComponents => "Map Components",
        }
    }

    fn tab_selector(&self) -> String {
        let position = match self {
            NavSection::ClimateResilience => ":first-child".to_string(),
            NavSection::MapComponents => ":last-child".to_string(),
            other => format!(":nth-child({})", other.index() + 1),
        };
        format!("{}{}", home::NAV_TABS, position)
    }

    fn index(&self) -> usize {
        Self::ALL
            .iter()
            .position(|section| section == self)
            .unwrap_or_default()
    }
}

impl fmt::Display for NavSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Debug)]
pub struct HomePage {
    pub logo: Locator,
    pub tabs: Vec<(NavSection, Toggle)>,
    pub explore_map: Locator,
    pub back_to_top: Locator,
}

impl Default for HomePage {
    fn default() -> Self {
        Self::new()
    }
}

impl HomePage {
    pub fn new() -> Self {
        let tabs = NavSection::ALL
            .iter()
            .map(|section| {
                let control = Locator::css(section.tab_selector());
                (*section, Toggle::class_token(section.label(), control, SELECTED))
            })
            .collect();
        Self {
            logo: Locator::css(home::LOGO),
            tabs,
            explore_map: Locator::css(home::EXPLORE_MAP),
            back_to_top: Locator::css(home::BACK_TO_TOP),
        }
    }

    pub fn tab(&self, section: NavSection) -> &Toggle {
        // `tabs` is built from `NavSection::ALL`, so every section is present.
        &self.tabs[section.index()].1
    }

    /// Scroll to `section` through its nav tab. Already-selected tabs are not clicked.
    pub async fn go_to(&self, session: &Session, section: NavSection) -> Result<(), WidgetError> {
        ensure_selected(session, self.tab(section)).await?;
        info!(%section, "home section selected");
        Ok(())
    }

    /// Click the floating back-to-top button and wait for it to retract.
    pub async fn back_to_top(&self, session: &Session) -> Result<(), WidgetError> {
        let budget = session.policy().condition_budget();
        wait_visible(session, &self.back_to_top, budget).await?;
        session.handle().click(&self.back_to_top).await?;
        wait_hidden(session, &self.back_to_top, budget).await?;
        Ok(())
    }

    /// Every nav tab and the logo are rendered.
    pub async fn nav_items_visible(&self, session: &Session) -> Result<(), WidgetError> {
        let budget = session.policy().condition_budget();
        wait_visible(session, &self.logo, budget).await?;
        for (_, tab) in &self.tabs {
            wait_visible(session, &tab.control, budget).await?;
        }
        Ok(())
    }

    /// Leave the landing page through "Explore map".
    ///
    /// The returned watch is subscribed to `map_data` before the click, so the map's first
    /// burst of requests is counted by [`MapPage::await_map_loaded`](crate::MapPage::await_map_loaded).
    pub async fn open_map(
        &self,
        session: &Session,
        map_data: &UrlPattern,
    ) -> Result<QuiescenceWatch, WidgetError> {
        let watch = QuiescenceWatch::new(session.handle(), map_data.clone())?;
        session.handle().click(&self.explore_map).await?;
        wait_hidden(session, &self.explore_map, session.policy().condition_budget()).await?;
        session.reset();
        info!("map page opened");
        Ok(watch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tab_selectors_follow_nav_order() {
        let page = HomePage::new();
        assert_eq!(
            page.tab(NavSection::ClimateResilience).control.css,
            format!("{}:first-child", home::NAV_TABS)
        );
        assert_eq!(
            page.tab(NavSection::TheUrgency).control.css,
            format!("{}:nth-child(4)", home::NAV_TABS)
        );
        assert_eq!(
            page.tab(NavSection::MapComponents).control.css,
            format!("{}:last-child", home::NAV_TABS)
        );
        assert_eq!(page.tabs.len(), 6);
    }
}
