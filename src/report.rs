//! Summary of one `mapsync run`.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scenarios::ScenarioReport;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub base_url: String,
    pub browser_mode: String,
    pub passed: usize,
    pub failed: usize,
    pub scenarios: Vec<ScenarioReport>,
}

impl RunSummary {
    pub fn new(
        started_at: DateTime<Utc>,
        base_url: impl Into<String>,
        browser_mode: impl Into<String>,
        scenarios: Vec<ScenarioReport>,
    ) -> Self {
        let passed = scenarios.iter().filter(|report| report.passed()).count();
        Self {
            started_at,
            base_url: base_url.into(),
            browser_mode: browser_mode.into(),
            passed,
            failed: scenarios.len() - passed,
            scenarios,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    pub fn render_human(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "mapsync run against {} ({} browser, started {})",
            self.base_url,
            self.browser_mode,
            self.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        for report in &self.scenarios {
            let mark = if report.passed() { "PASS" } else { "FAIL" };
            let _ = writeln!(
                out,
                "  {} {:<22} {:>7}ms",
                mark, report.name, report.duration_ms
            );
            if let (Some(kind), Some(message)) = (&report.failure_kind, &report.message) {
                let _ = writeln!(out, "       [{}] {}", kind, message);
            }
        }
        let _ = write!(out, "{} passed, {} failed", self.passed, self.failed);
        out
    }

    pub async fn write_json(&self, path: &Path) -> Result<()> {
        let body = serde_json::to_string_pretty(self).context("serializing run summary")?;
        tokio::fs::write(path, body)
            .await
            .with_context(|| format!("writing {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios::Outcome;
    use chrono::TimeZone;

    fn report(name: &str, failure: Option<(&str, &str)>) -> ScenarioReport {
        ScenarioReport {
            name: name.to_string(),
            outcome: if failure.is_some() {
                Outcome::Failed
            } else {
                Outcome::Passed
            },
            duration_ms: 42,
            failure_kind: failure.map(|(kind, _)| kind.to_string()),
            message: failure.map(|(_, message)| message.to_string()),
        }
    }

    #[test]
    fn counts_and_renders_failures() {
        let started = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
        let summary = RunSummary::new(
            started,
            "http://localhost:3000/",
            "stub",
            vec![
                report("open_map", None),
                report(
                    "toggle_facilities",
                    Some(("never_started", "no request matching '**/geoserver/**'")),
                ),
            ],
        );
        assert_eq!((summary.passed, summary.failed), (1, 1));
        assert!(!summary.all_passed());

        let text = summary.render_human();
        assert!(text.contains("PASS open_map"));
        assert!(text.contains("[never_started]"));
        assert!(text.contains("2026-03-01 09:30:00 UTC"));
        assert!(text.ends_with("1 passed, 1 failed"));
    }

    #[tokio::test]
    async fn json_summary_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let summary = RunSummary::new(Utc::now(), "http://x/", "real", vec![report("open_map", None)]);
        summary.write_json(&path).await.unwrap();

        let raw = tokio::fs::read_to_string(&path).await.unwrap();
        let back: RunSummary = serde_json::from_str(&raw).unwrap();
        assert_eq!(back.passed, 1);
        assert_eq!(back.scenarios[0].name, "open_map");
    }
}
