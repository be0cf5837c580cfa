use anyhow::Result;
use serde::Serialize;

use crate::cli::output::{render_structured, OutputFormat};
use crate::scenarios::Scenario;

#[derive(Serialize)]
struct ScenarioEntry {
    name: String,
    description: String,
}

pub fn cmd_list(output: OutputFormat) -> Result<()> {
    let entries: Vec<ScenarioEntry> = Scenario::all()
        .into_iter()
        .map(|scenario| ScenarioEntry {
            name: scenario.name(),
            description: scenario.description(),
        })
        .collect();
    match render_structured(&entries, output)? {
        Some(rendered) => println!("{}", rendered),
        None => {
            for entry in &entries {
                println!("{:<22} {}", entry.name, entry.description);
            }
        }
    }
    Ok(())
}
