use crate::output::print_json;
use hatch_core::validate::{validate_project_name, validate_project_slug};
use tracing::error;

pub fn run(name: &str, slug: &str, json: bool) -> anyhow::Result<()> {
    let checks = [
        ("project_name", validate_project_name(name)),
        ("project_slug", validate_project_slug(slug)),
    ];

    let mut failed = 0;
    for (field, result) in &checks {
        if let Err(e) = result {
            error!(field = *field, "{e}");
            failed += 1;
        }
    }

    if json {
        let report: Vec<_> = checks
            .iter()
            .map(|(field, result)| {
                serde_json::json!({
                    "field": field,
                    "valid": result.is_ok(),
                    "error": result.as_ref().err().map(|e| e.to_string()),
                })
            })
            .collect();
        print_json(&report)?;
    }

    if failed > 0 {
        anyhow::bail!("{failed} check(s) failed");
    }
    if !json {
        println!("'{name}' / '{slug}' ok");
    }
    Ok(())
}
