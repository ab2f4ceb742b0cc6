//! The provenance record written to `.github/project.yml`.
//!
//! ```yaml
//! name: demo_service
//! description: A demo
//! origin:
//!   timestamp: 2026-01-01T12:00:00+00:00
//!   generated: true
//!   template:
//!     branch: main
//!     commit hash: 0123...4567
//!     dirty: false
//!     location: https://github.com/acme/template.git
//!     parameters: { ... }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::context::GenerationContext;
use crate::error::{HatchError, Result};
use crate::origin::{classify, CommitHash, TemplateOrigin};
use crate::paths;

pub const NAME_KEY: &str = "project_slug";
pub const DESCRIPTION_KEY: &str = "project_short_description";

// Field order is the serialized key order; every level is kept alphabetical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    pub description: String,
    pub name: String,
    pub origin: OriginSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginSection {
    pub generated: bool,
    pub template: TemplateSection,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateSection {
    pub branch: String,
    #[serde(rename = "commit hash")]
    pub commit_hash: CommitHash,
    pub dirty: bool,
    pub location: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
}

impl TemplateSection {
    /// Rebuild the origin facts. The kind is not persisted; it is re-derived
    /// from the recorded location.
    pub fn to_origin(&self) -> TemplateOrigin {
        TemplateOrigin {
            kind: classify(&self.location),
            location: self.location.clone(),
            branch: self.branch.clone(),
            commit_hash: self.commit_hash.clone(),
            dirty: self.dirty,
        }
    }
}

impl ProvenanceRecord {
    /// Assemble a record from the generation context and resolved origin.
    /// Build-only answers are stripped; `now` is truncated to whole seconds.
    pub fn from_context(
        ctx: &GenerationContext,
        origin: TemplateOrigin,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        Ok(Self {
            name: ctx.require_str(NAME_KEY)?.to_string(),
            description: ctx.require_str(DESCRIPTION_KEY)?.to_string(),
            origin: OriginSection {
                generated: true,
                template: TemplateSection {
                    branch: origin.branch,
                    commit_hash: origin.commit_hash,
                    dirty: origin.dirty,
                    location: origin.location,
                    parameters: ctx.persistable(),
                },
                timestamp: now.trunc_subsecs(0),
            },
        })
    }

    /// A recorded answer, if present and a string.
    pub fn parameter_str(&self, key: &str) -> Option<&str> {
        self.origin
            .template
            .parameters
            .get(key)
            .and_then(Value::as_str)
    }

    pub fn require_parameter(&self, key: &str) -> Result<&str> {
        self.parameter_str(key)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| HatchError::MissingAnswer(key.to_string()))
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn write(&self, root: &Path) -> Result<()> {
        let data = self.to_yaml()?;
        crate::io::atomic_write(&paths::provenance_path(root), data.as_bytes())
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::provenance_path(root);
        if !path.exists() {
            return Err(HatchError::ProvenanceNotFound(path));
        }
        let data = std::fs::read_to_string(&path)?;
        Ok(serde_yaml::from_str(&data)?)
    }
}

/// RFC 3339 at second precision with an explicit `+00:00` offset.
mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Secs, false))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
