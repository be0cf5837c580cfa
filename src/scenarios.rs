//! Smoke scenarios for the map application.
//!
//! A scenario is a fixed sequence of widget operations. The first failing step aborts it and
//! its error becomes the report; nothing is retried or compensated.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use map_widgets::{AppUi, Dataset, DatasetVisibility, NavSection, WidgetError};
use serde::{Deserialize, Serialize};
use sync_engine::Session;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::metrics;

pub const INTRODUCTION: &str = "Introduction";

pub const INTRODUCTION_PARAGRAPHS: [(usize, &str); 3] = [
    (
        1,
        "The State Highway System provides mobility for over 1.4 million Hawai",
    ),
    (
        2,
        "The segments of the State Highway System that experience the highest",
    ),
    (
        3,
        "Various climate hazards can impact this system by rendering infrastructure",
    ),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scenario {
    OpenMap,
    MapWithout(Dataset),
    ToggleFacilities,
    HomeNavigation,
}

impl Scenario {
    pub fn all() -> Vec<Scenario> {
        let mut all = vec![Scenario::OpenMap];
        all.extend(Dataset::ALL.iter().copied().map(Scenario::MapWithout));
        all.push(Scenario::ToggleFacilities);
        all.push(Scenario::HomeNavigation);
        all
    }

    pub fn name(&self) -> String {
        match self {
            Scenario::OpenMap => "open_map".to_string(),
            Scenario::MapWithout(dataset) => format!("map_without_{}", dataset.response_key()),
            Scenario::ToggleFacilities => "toggle_facilities".to_string(),
            Scenario::HomeNavigation => "home_navigation".to_string(),
        }
    }

    pub fn description(&self) -> String {
        match self {
            Scenario::OpenMap => "open the map page from the home page".to_string(),
            Scenario::MapWithout(dataset) => {
                format!("see the map without the {} dataset", dataset.response_key())
            }
            Scenario::ToggleFacilities => "toggle the Facilities and Structures layer".to_string(),
            Scenario::HomeNavigation => "navigate to each section of the home page".to_string(),
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl FromStr for Scenario {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let name = raw.trim().to_ascii_lowercase().replace('-', "_");
        Scenario::all()
            .into_iter()
            .find(|scenario| scenario.name() == name)
            .ok_or_else(|| format!("unknown scenario '{}'", raw))
    }
}

/// Keep the scenarios whose name contains one of `filters`; all of them when empty.
pub fn select(filters: &[String]) -> Vec<Scenario> {
    Scenario::all()
        .into_iter()
        .filter(|scenario| {
            filters.is_empty() || filters.iter().any(|f| scenario.name().contains(f.as_str()))
        })
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    Failed,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub name: String,
    pub outcome: Outcome,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ScenarioReport {
    pub fn passed(&self) -> bool {
        self.outcome == Outcome::Passed
    }
}

pub struct ScenarioRunner {
    ui: AppUi,
    base_url: String,
}

impl ScenarioRunner {
    pub fn new(ui: AppUi, base_url: impl Into<String>) -> Self {
        Self {
            ui,
            base_url: base_url.into(),
        }
    }

    pub fn ui(&self) -> &AppUi {
        &self.ui
    }

    pub async fn run(&self, session: &Session, scenario: Scenario) -> ScenarioReport {
        let name = scenario.name();
        info!(scenario = %name, "scenario started");
        session.reset();
        let started = Instant::now();
        let result = self.execute(session, scenario).await;
        let duration_ms = started.elapsed().as_millis() as u64;
        self.teardown(session).await;

        let report = match result {
            Ok(()) => {
                info!(scenario = %name, duration_ms, "scenario passed");
                ScenarioReport {
                    name,
                    outcome: Outcome::Passed,
                    duration_ms,
                    failure_kind: None,
                    message: None,
                }
            }
            Err(err) => {
                warn!(scenario = %name, kind = err.kind(), error = %err, "scenario failed");
                ScenarioReport {
                    name,
                    outcome: Outcome::Failed,
                    duration_ms,
                    failure_kind: Some(err.kind().to_string()),
                    message: Some(err.to_string()),
                }
            }
        };
        metrics::record_scenario(
            &report.name,
            if report.passed() { "passed" } else { "failed" },
        );
        report
    }

    pub async fn run_all(&self, session: &Session, scenarios: &[Scenario]) -> Vec<ScenarioReport> {
        let mut reports = Vec::with_capacity(scenarios.len());
        for scenario in scenarios {
            reports.push(self.run(session, *scenario).await);
        }
        reports
    }

    async fn teardown(&self, session: &Session) {
        session.reset();
        if let Err(err) = session.handle().clear_rewrites().await {
            warn!(error = %err, "failed to clear response rewrites");
        }
    }

    async fn execute(&self, session: &Session, scenario: Scenario) -> Result<(), WidgetError> {
        session.handle().goto(&self.base_url).await?;
        match scenario {
            Scenario::OpenMap => self.open_map(session).await,
            Scenario::MapWithout(dataset) => self.map_without(session, dataset).await,
            Scenario::ToggleFacilities => self.toggle_facilities(session).await,
            Scenario::HomeNavigation => self.home_navigation(session).await,
        }
    }

    /// Open the map, wait for its data and the asset counts, then check the introduction.
    async fn open_loaded_map(&self, session: &Session) -> Result<(), WidgetError> {
        let map = &self.ui.map;
        let watch = self.ui.home.open_map(session, &map.map_data).await?;
        map.map_visible(session).await?;
        map.await_map_loaded(session, watch).await?;
        map.sidebar
            .assets_by_type
            .wait_until_loaded(session, loader_budget(session))
            .await?;
        map.sidebar.title_is(session, INTRODUCTION).await
    }

    async fn open_map(&self, session: &Session) -> Result<(), WidgetError> {
        self.open_loaded_map(session).await?;
        for (index, text) in INTRODUCTION_PARAGRAPHS {
            self.ui
                .map
                .sidebar
                .paragraph_contains(session, index, text)
                .await?;
        }
        Ok(())
    }

    async fn map_without(&self, session: &Session, dataset: Dataset) -> Result<(), WidgetError> {
        let map = &self.ui.map;
        map.strip_dataset(session, dataset).await?;
        let _watch = self.ui.home.open_map(session, &map.map_data).await?;
        map.sidebar.title_is(session, INTRODUCTION).await?;
        map.assert_dataset_buttons(session, DatasetVisibility::without(dataset))
            .await
    }

    async fn toggle_facilities(&self, session: &Session) -> Result<(), WidgetError> {
        let map = &self.ui.map;
        self.open_loaded_map(session).await?;
        map.more_layers
            .toggle_facilities_and_structures(session, true)
            .await?;
        map.assets_config.unselect_all(session).await?;
        map.sidebar.categories.open_thematic_indices(session).await?;
        map.sidebar.go_to_insights(session).await?;
        map.sidebar.facilities.visible_with_values(session).await?;
        map.sidebar.facilities.select_pre_school(session).await
    }

    async fn home_navigation(&self, session: &Session) -> Result<(), WidgetError> {
        let home = &self.ui.home;
        let map = &self.ui.map;
        home.nav_items_visible(session).await?;
        for section in NavSection::ALL {
            home.go_to(session, section).await?;
            home.back_to_top(session).await?;
        }
        for section in [
            NavSection::ClimateResilience,
            NavSection::ActionPlan,
            NavSection::HdotMap,
        ] {
            home.go_to(session, section).await?;
        }

        let _watch = home.open_map(session, &map.map_data).await?;
        map.sidebar.click_logo(session).await?;
        home.nav_items_visible(session).await?;

        let _watch = home.open_map(session, &map.map_data).await?;
        map.map_visible(session).await?;
        map.zoom_in(session).await?;
        map.zoom_out(session).await?;
        Ok(())
    }
}

fn loader_budget(session: &Session) -> Duration {
    Duration::from_millis(session.policy().disclosure_ready_ms)
}
