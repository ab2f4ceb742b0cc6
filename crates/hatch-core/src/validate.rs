//! Checks run on answers before a template is rendered.

use crate::error::{HatchError, Result};
use regex::Regex;
use std::sync::OnceLock;

static NAME_RE: OnceLock<Regex> = OnceLock::new();
static SLUG_RE: OnceLock<Regex> = OnceLock::new();

fn name_re() -> &'static Regex {
    NAME_RE.get_or_init(|| Regex::new(r"^[a-zA-Z]").unwrap())
}

// Unicode identifier: letter-like or underscore start, then letters, marks,
// digits and connector punctuation.
fn slug_re() -> &'static Regex {
    SLUG_RE.get_or_init(|| {
        Regex::new(r"^[\p{L}\p{Nl}_][\p{L}\p{Nl}\p{Mn}\p{Mc}\p{Nd}\p{Pc}]*$").unwrap()
    })
}

pub fn validate_project_name(name: &str) -> Result<()> {
    if !name_re().is_match(name) {
        return Err(HatchError::InvalidProjectName(name.to_string()));
    }
    Ok(())
}

pub fn validate_project_slug(slug: &str) -> Result<()> {
    if !slug_re().is_match(slug) {
        return Err(HatchError::InvalidProjectSlug(slug.to_string()));
    }
    Ok(())
}
