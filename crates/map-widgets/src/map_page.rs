//! Map page: the canvas, zoom control, hover tooltip, dataset category buttons and the
//! widgets that live around the map.

use std::fmt;

use mapsync_core_types::{Locator, Point};
use serde::{Deserialize, Serialize};
use sync_engine::wait::{poll_until, wait_text_present, wait_visible, Polled};
use sync_engine::{
    step_and_confirm, QuiescenceWatch, ResponseRewrite, Session, SyncError, UrlPattern,
};
use tracing::{debug, info};

use crate::assets_config::AssetsConfig;
use crate::errors::WidgetError;
use crate::more_layers::MoreLayers;
use crate::selectors::map;
use crate::sidebar::Sidebar;

/// Top-level data categories delivered by the datasets endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    Assets,
    Hazards,
    Indices,
    Others,
}

impl Dataset {
    pub const ALL: [Dataset; 4] = [
        Dataset::Assets,
        Dataset::Hazards,
        Dataset::Indices,
        Dataset::Others,
    ];

    /// Key of this category in the datasets response body.
    pub fn response_key(&self) -> &'static str {
        match self {
            Dataset::Assets => "assets",
            Dataset::Hazards => "hazards",
            Dataset::Indices => "index",
            Dataset::Others => "others",
        }
    }

    pub fn button_text(&self) -> &'static str {
        match self {
            Dataset::Assets => "HDOT Assets",
            Dataset::Hazards => "Climate Hazards",
            Dataset::Indices => "Thematic Indices",
            Dataset::Others => "More Layers",
        }
    }

    pub fn from_response_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|dataset| dataset.response_key() == key)
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.response_key())
    }
}

/// Which dataset buttons are rendered above the map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetVisibility {
    pub assets: bool,
    pub hazards: bool,
    pub indices: bool,
    pub others: bool,
}

impl DatasetVisibility {
    pub fn all() -> Self {
        Self {
            assets: true,
            hazards: true,
            indices: true,
            others: true,
        }
    }

    /// Every button except the one for `missing`.
    pub fn without(missing: Dataset) -> Self {
        let mut visibility = Self::all();
        visibility.set(missing, false);
        visibility
    }

    pub fn get(&self, dataset: Dataset) -> bool {
        match dataset {
            Dataset::Assets => self.assets,
            Dataset::Hazards => self.hazards,
            Dataset::Indices => self.indices,
            Dataset::Others => self.others,
        }
    }

    pub fn set(&mut self, dataset: Dataset, visible: bool) {
        match dataset {
            Dataset::Assets => self.assets = visible,
            Dataset::Hazards => self.hazards = visible,
            Dataset::Indices => self.indices = visible,
            Dataset::Others => self.others = visible,
        }
    }
}

impl fmt::Display for DatasetVisibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown: Vec<&str> = Dataset::ALL
            .iter()
            .filter(|dataset| self.get(**dataset))
            .map(|dataset| dataset.response_key())
            .collect();
        write!(f, "[{}]", shown.join(", "))
    }
}

#[derive(Clone, Debug)]
pub struct MapPage {
    pub canvas: Locator,
    pub zoom_level: Locator,
    pub zoom_in: Locator,
    pub zoom_out: Locator,
    pub tooltip: Locator,
    pub datasets: UrlPattern,
    pub map_data: UrlPattern,
    pub sidebar: Sidebar,
    pub more_layers: MoreLayers,
    pub assets_config: AssetsConfig,
}

impl MapPage {
    pub fn new(datasets: UrlPattern, map_data: UrlPattern) -> Self {
        Self {
            canvas: Locator::css(map::CANVAS),
            zoom_level: Locator::css(map::ZOOM_LEVEL),
            zoom_in: Locator::css(map::ZOOM_IN),
            zoom_out: Locator::css(map::ZOOM_OUT),
            tooltip: Locator::css(map::TOOLTIP),
            datasets,
            map_data,
            sidebar: Sidebar::new(),
            more_layers: MoreLayers::new(),
            assets_config: AssetsConfig::new(),
        }
    }

    pub fn dataset_button(&self, dataset: Dataset) -> Locator {
        Locator::css(map::DATASET_BUTTON).with_text(dataset.button_text())
    }

    pub async fn map_visible(&self, session: &Session) -> Result<(), WidgetError> {
        wait_visible(session, &self.canvas, session.policy().condition_budget()).await?;
        Ok(())
    }

    /// Settle `watch` (taken before the map was opened) with the session's quiescence
    /// defaults. Returns the number of map data requests observed.
    pub async fn await_map_loaded(
        &self,
        session: &Session,
        watch: QuiescenceWatch,
    ) -> Result<u64, WidgetError> {
        let options = session.policy().quiescence();
        let pattern = watch.pattern().clone();
        let requests = watch.settle(options).await.into_result(&pattern, &options)?;
        info!(requests, "map data loaded");
        Ok(requests)
    }

    pub async fn zoom_in(&self, session: &Session) -> Result<i64, WidgetError> {
        Ok(step_and_confirm(session, &self.zoom_level, &self.zoom_in, 1).await?)
    }

    pub async fn zoom_out(&self, session: &Session) -> Result<i64, WidgetError> {
        Ok(step_and_confirm(session, &self.zoom_level, &self.zoom_out, -1).await?)
    }

    /// Move the pointer to `at` over the canvas and read the tooltip that appears.
    pub async fn inspect_at(&self, session: &Session, at: Point) -> Result<String, WidgetError> {
        session.handle().move_pointer(at).await?;
        let budget = session.policy().condition_budget();
        wait_visible(session, &self.tooltip, budget).await?;
        let text = wait_text_present(session, &self.tooltip, budget).await?;
        debug!(x = at.x, y = at.y, tooltip = %text, "map inspected");
        Ok(text)
    }

    /// Current visibility of the four dataset buttons.
    pub async fn dataset_buttons(&self, session: &Session) -> Result<DatasetVisibility, WidgetError> {
        Ok(probe_buttons(self, session).await?)
    }

    /// Wait until the dataset buttons show exactly `expected`.
    pub async fn assert_dataset_buttons(
        &self,
        session: &Session,
        expected: DatasetVisibility,
    ) -> Result<(), WidgetError> {
        let polled = poll_until(
            session.policy().poll_interval(),
            session.policy().condition_budget(),
            || probe_buttons(self, session),
            |seen| *seen == expected,
        )
        .await?;
        match polled {
            Polled::Satisfied(_) => Ok(()),
            Polled::Expired(seen) => Err(WidgetError::expectation(
                "dataset buttons",
                expected.to_string(),
                seen.to_string(),
            )),
        }
    }

    /// Drop `dataset` from every datasets response from now on. Must be called before the
    /// map is opened.
    pub async fn strip_dataset(&self, session: &Session, dataset: Dataset) -> Result<(), WidgetError> {
        let rule = ResponseRewrite::remove_key(self.datasets.clone(), dataset.response_key());
        session.handle().rewrite_responses(rule).await?;
        info!(%dataset, pattern = %self.datasets, "dataset stripped from responses");
        Ok(())
    }
}

async fn probe_buttons(page: &MapPage, session: &Session) -> Result<DatasetVisibility, SyncError> {
    let mut visibility = DatasetVisibility::all();
    for dataset in Dataset::ALL {
        let visible = session
            .handle()
            .is_visible(&page.dataset_button(dataset))
            .await?;
        visibility.set(dataset, visible);
    }
    Ok(visibility)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_keys_round_trip() {
        for dataset in Dataset::ALL {
            assert_eq!(Dataset::from_response_key(dataset.response_key()), Some(dataset));
        }
        assert_eq!(Dataset::from_response_key("indices"), None);
    }

    #[test]
    fn visibility_without_one_dataset() {
        let visibility = DatasetVisibility::without(Dataset::Indices);
        assert!(visibility.assets && visibility.hazards && visibility.others);
        assert!(!visibility.indices);
        assert_eq!(visibility.to_string(), "[assets, hazards, others]");
    }
}
