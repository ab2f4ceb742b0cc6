//! Operator notices for integrations that need manually provisioned secrets.

use crate::provenance::ProvenanceRecord;

pub const REGISTRY_ANSWER: &str = "dockerhub";

/// Secrets the release workflow needs to publish container images.
pub const REGISTRY_SECRETS: [(&str, &str); 2] = [
    ("DOCKERHUB_USERNAME", "Your Docker Hub username"),
    ("DOCKERHUB_PAT", "Your Docker Hub Personal Access Token"),
];

pub fn registry_publishing_enabled(record: &ProvenanceRecord) -> bool {
    record.parameter_str(REGISTRY_ANSWER) == Some("yes")
}

pub fn registry_notice() -> String {
    let rule = "=".repeat(70);
    let mut out = String::new();
    out.push('\n');
    out.push_str(&format!("{rule}\nIMPORTANT: Docker Hub Publishing Enabled\n{rule}\n"));
    out.push_str("\nYou have enabled Docker Hub publishing for releases.\n");
    out.push_str("Please ensure the following GitHub secrets are configured:\n\n");
    for (name, what) in REGISTRY_SECRETS {
        out.push_str(&format!("  • {name} - {what}\n"));
    }
    out.push_str("\nWithout these secrets, your releases will fail during the\n");
    out.push_str("Docker image publishing step.\n");
    out.push_str("\nTo add these secrets:\n");
    out.push_str("1. Go to your GitHub repository settings\n");
    out.push_str("2. Navigate to Settings → Secrets and variables → Actions\n");
    out.push_str("3. Add the required secrets\n");
    out.push_str(&format!("{rule}\n"));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notice_lists_every_secret() {
        let notice = registry_notice();
        for (name, _) in REGISTRY_SECRETS {
            assert!(notice.contains(name), "missing {name}");
        }
        assert!(notice.contains("Settings → Secrets and variables → Actions"));
    }
}
