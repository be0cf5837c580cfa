use std::time::Duration;

use map_widgets::{AppUi, Dataset, MapTargets};
use mapsync_cli::{Outcome, Scenario, ScenarioRunner};
use sync_engine::testing::{FakeAction, FakeElement, FakeInterface};
use sync_engine::{SyncPolicy, UrlPattern};

const BASE_URL: &str = "https://maps.example.org/";

fn app() -> AppUi {
    AppUi::new(&MapTargets {
        datasets: UrlPattern::glob("**/api/datasets*").unwrap(),
        map_data: UrlPattern::glob("**/geoserver/**").unwrap(),
    })
}

/// Landing page whose "Explore map" button reveals a map with `title` and the dataset
/// buttons other than `missing`.
fn landing_page(ui: &AppUi, title: &'static str, missing: Option<Dataset>) -> FakeInterface {
    let fake = FakeInterface::new();
    fake.insert(&ui.home.explore_map, FakeElement::visible());
    fake.insert(&ui.map.canvas, FakeElement::hidden());

    let explore = ui.home.explore_map.clone();
    let canvas = ui.map.canvas.clone();
    let heading = ui.map.sidebar.title.clone();
    let buttons: Vec<_> = Dataset::ALL
        .iter()
        .filter(|dataset| Some(**dataset) != missing)
        .map(|dataset| ui.map.dataset_button(*dataset))
        .collect();
    fake.on_click(&ui.home.explore_map, move |dom| {
        dom.set_visible(&explore, false);
        dom.set_visible(&canvas, true);
        dom.insert(&heading, FakeElement::visible().with_text(title));
        for button in &buttons {
            dom.insert(button, FakeElement::visible());
        }
    });
    fake
}

#[tokio::test(start_paused = true)]
async fn map_without_a_dataset_passes_and_clears_its_rewrite() {
    let ui = app();
    let fake = landing_page(&ui, "Introduction", Some(Dataset::Hazards));
    let session = fake.session(SyncPolicy::default());
    let runner = ScenarioRunner::new(ui, BASE_URL);

    let report = runner
        .run(&session, Scenario::MapWithout(Dataset::Hazards))
        .await;

    assert_eq!(report.outcome, Outcome::Passed, "{:?}", report.message);
    assert_eq!(report.name, "map_without_hazards");
    assert_eq!(fake.actions().first(), Some(&FakeAction::Goto(BASE_URL.to_string())));
    assert!(fake.rewrites().is_empty());
    assert!(session.open_disclosure().is_none());
}

#[tokio::test(start_paused = true)]
async fn silent_map_fails_the_scenario_as_never_started() {
    let ui = app();
    let fake = landing_page(&ui, "Introduction", None);
    let session = fake.session(SyncPolicy::default());
    let runner = ScenarioRunner::new(ui, BASE_URL);

    let report = runner.run(&session, Scenario::OpenMap).await;

    assert_eq!(report.outcome, Outcome::Failed);
    assert_eq!(report.failure_kind.as_deref(), Some("never_started"));
    assert!(report.message.unwrap_or_default().contains("**/geoserver/**"));
    assert!(report.duration_ms >= Duration::from_secs(10).as_millis() as u64);
}

#[tokio::test(start_paused = true)]
async fn failing_step_aborts_the_rest_of_the_scenario() {
    let ui = app();
    let fake = landing_page(&ui, "Overview", Some(Dataset::Others));
    let buttons: Vec<String> = Dataset::ALL
        .iter()
        .map(|dataset| ui.map.dataset_button(*dataset).to_string())
        .collect();
    let session = fake.session(SyncPolicy::default());
    let runner = ScenarioRunner::new(ui, BASE_URL);

    let report = runner
        .run(&session, Scenario::MapWithout(Dataset::Others))
        .await;

    assert_eq!(report.outcome, Outcome::Failed);
    assert_eq!(report.failure_kind.as_deref(), Some("condition_timeout"));
    let probed_buttons = fake.actions().iter().any(|action| {
        matches!(action, FakeAction::Visible { target, .. } if buttons.contains(target))
    });
    assert!(!probed_buttons);
    assert!(fake.rewrites().is_empty());
}

#[tokio::test(start_paused = true)]
async fn reports_serialize_for_the_summary() {
    let ui = app();
    let fake = landing_page(&ui, "Introduction", Some(Dataset::Assets));
    let session = fake.session(SyncPolicy::default());
    let runner = ScenarioRunner::new(ui, BASE_URL);

    let reports = runner
        .run_all(&session, &[Scenario::MapWithout(Dataset::Assets)])
        .await;
    let json = serde_json::to_value(&reports).unwrap();
    assert_eq!(json[0]["name"], "map_without_assets");
    assert_eq!(json[0]["outcome"], "passed");
}
