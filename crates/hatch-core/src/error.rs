use std::path::PathBuf;
use thiserror::Error;

use crate::runner::ProcessFailure;

#[derive(Debug, Error)]
pub enum HatchError {
    #[error("generation context not found: {0}")]
    ContextNotFound(PathBuf),

    #[error("missing required answer '{0}' in generation context")]
    MissingAnswer(String),

    #[error("normalization target not found: {0}")]
    NormalizeTargetMissing(PathBuf),

    #[error("invalid commit hash '{0}': expected 40 hex characters or 'unknown'")]
    InvalidCommitHash(String),

    #[error("template repository at {0} has a detached HEAD")]
    DetachedHead(PathBuf),

    #[error("invalid project name '{0}': must start with an alphabetical character (a-z or A-Z)")]
    InvalidProjectName(String),

    #[error("invalid project slug '{0}': must be a valid identifier")]
    InvalidProjectSlug(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("provenance record not found: {0}")]
    ProvenanceNotFound(PathBuf),

    #[error(transparent)]
    Process(#[from] ProcessFailure),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, HatchError>;
