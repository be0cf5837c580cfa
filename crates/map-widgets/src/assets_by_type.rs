//! "HDOT Assets by Type" chart: one row per asset type with a count, rendered behind
//! skeleton loaders.

use std::fmt;
use std::time::Duration;

use mapsync_core_types::Locator;
use sync_engine::wait::{wait_count, wait_visible};
use sync_engine::{read_count, Session};
use tracing::info;

use crate::errors::WidgetError;
use crate::selectors::widgets;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AssetType {
    Bridge,
    Roadway,
    Culvert,
    Tunnel,
}

impl AssetType {
    pub const ALL: [AssetType; 4] = [
        AssetType::Bridge,
        AssetType::Roadway,
        AssetType::Culvert,
        AssetType::Tunnel,
    ];

    fn position(&self) -> &'static str {
        match self {
            AssetType::Bridge => ":first-child",
            AssetType::Roadway => ":nth-child(2)",
            AssetType::Culvert => ":nth-child(3)",
            AssetType::Tunnel => ":last-child",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AssetType::Bridge => "Bridge",
            AssetType::Roadway => "Roadway",
            AssetType::Culvert => "Culvert",
            AssetType::Tunnel => "Tunnel",
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Debug)]
pub struct AssetsByType {
    pub root: Locator,
    pub title: Locator,
    pub loader: Locator,
    pub rows: Vec<(AssetType, Locator)>,
}

impl Default for AssetsByType {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetsByType {
    pub fn new() -> Self {
        let root = Locator::css(widgets::ASSETS_BY_TYPE);
        let rows = AssetType::ALL
            .iter()
            .map(|kind| {
                let row = format!("{}{}", widgets::TYPE_ROW, kind.position());
                (*kind, root.descendant(&row))
            })
            .collect();
        Self {
            loader: Locator::css(widgets::SKELETON),
            title: Locator::css(widgets::ASSETS_BY_TYPE_TITLE),
            root,
            rows,
        }
    }

    /// Wait out the skeleton loaders, then read every row's count. Each type must report more
    /// than one asset.
    pub async fn wait_until_loaded(
        &self,
        session: &Session,
        budget: Duration,
    ) -> Result<Vec<(AssetType, u64)>, WidgetError> {
        if session.handle().count(&self.loader).await? > 0 {
            wait_count(session, &self.loader, 0, budget).await?;
        }
        let mut counts = Vec::with_capacity(self.rows.len());
        for (kind, row) in &self.rows {
            let value = read_count(session, &row.descendant("span")).await?;
            if value <= 1 {
                return Err(WidgetError::expectation(
                    "assets-by-type",
                    format!("more than 1 {}", kind),
                    value.to_string(),
                ));
            }
            counts.push((*kind, value));
        }
        info!(?counts, "assets by type loaded");
        Ok(counts)
    }

    pub async fn visible(&self, session: &Session) -> Result<(), WidgetError> {
        let budget = session.policy().condition_budget();
        wait_visible(session, &self.title, budget).await?;
        for (_, row) in &self.rows {
            wait_visible(session, row, budget).await?;
        }
        Ok(())
    }
}
