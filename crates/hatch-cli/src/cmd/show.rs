use crate::output::{print_json, print_table};
use anyhow::Context;
use hatch_core::provenance::ProvenanceRecord;
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let record = ProvenanceRecord::load(root).context("no provenance recorded for this project")?;

    if json {
        return print_json(&record);
    }

    let template = &record.origin.template;
    println!("{}: {}", record.name, record.description);
    println!(
        "generated {} from {} ({})",
        record.origin.timestamp.to_rfc3339(),
        template.location,
        template.to_origin().kind
    );
    let dirty = if template.dirty { " (dirty)" } else { "" };
    println!("branch {} at {}{dirty}", template.branch, template.commit_hash);

    if !template.parameters.is_empty() {
        println!();
        let rows = template
            .parameters
            .iter()
            .map(|(key, value)| {
                let value = match value {
                    serde_yaml::Value::String(s) => s.clone(),
                    other => serde_yaml::to_string(other)
                        .unwrap_or_default()
                        .trim_end()
                        .to_string(),
                };
                vec![key.clone(), value]
            })
            .collect();
        print_table(&["PARAMETER", "VALUE"], rows);
    }

    Ok(())
}
