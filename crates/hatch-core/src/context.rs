//! The rendered generation context.
//!
//! The templating engine renders a seed file holding every answer plus the
//! derived `_template`, `_output_dir` and `_checkout` keys. It is read here as
//! plain YAML (JSON is valid input too).

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::error::{HatchError, Result};

pub const TEMPLATE_KEY: &str = "_template";
pub const OUTPUT_DIR_KEY: &str = "_output_dir";
pub const CHECKOUT_KEY: &str = "_checkout";

/// Keys produced by the generation run itself, never persisted.
pub const BUILD_ONLY_KEYS: [&str; 1] = [OUTPUT_DIR_KEY];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenerationContext {
    answers: BTreeMap<String, Value>,
}

impl GenerationContext {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(HatchError::ContextNotFound(path.to_path_buf()));
        }
        let data = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&data)
    }

    pub fn from_yaml_str(data: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(data)?)
    }

    pub fn from_answers<I, K, V>(answers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self {
            answers: answers
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.answers.get(key)
    }

    /// String answer, if present and a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.answers.get(key).and_then(Value::as_str)
    }

    /// Non-empty string answer, or `MissingAnswer`.
    pub fn require_str(&self, key: &str) -> Result<&str> {
        self.get_str(key)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| HatchError::MissingAnswer(key.to_string()))
    }

    pub fn template(&self) -> Result<&str> {
        self.require_str(TEMPLATE_KEY)
    }

    pub fn output_dir(&self) -> Result<&str> {
        self.require_str(OUTPUT_DIR_KEY)
    }

    /// The ref requested with `--checkout`; empty or null means none.
    pub fn checkout(&self) -> Option<&str> {
        self.get_str(CHECKOUT_KEY).filter(|c| !c.is_empty())
    }

    /// Every answer except the build-only keys.
    pub fn persistable(&self) -> BTreeMap<String, Value> {
        self.answers
            .iter()
            .filter(|(k, _)| !BUILD_ONLY_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
