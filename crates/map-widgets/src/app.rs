//! Aggregate of every page object of the application.

use serde::{Deserialize, Serialize};
use sync_engine::UrlPattern;

use crate::home::HomePage;
use crate::map_page::MapPage;

/// Network endpoints the widgets synchronize on.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MapTargets {
    /// Endpoint listing the dataset categories; its body is rewritten to hide a category.
    pub datasets: UrlPattern,
    /// Requests the map issues while drawing data layers.
    pub map_data: UrlPattern,
}

#[derive(Clone, Debug)]
pub struct AppUi {
    pub home: HomePage,
    pub map: MapPage,
}

impl AppUi {
    pub fn new(targets: &MapTargets) -> Self {
        Self {
            home: HomePage::new(),
            map: MapPage::new(targets.datasets.clone(), targets.map_data.clone()),
        }
    }
}
