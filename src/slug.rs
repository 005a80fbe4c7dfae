//! Slug generation and validation.
//!
//! Slugs become filesystem paths (`recipes_dir/<slug>.md`), so every
//! slug arriving from a request path must pass the allowlist here before
//! it touches the filesystem — otherwise a value like `../../etc/passwd`
//! reads or overwrites arbitrary files (CWE-22). The allowlist accepts
//! exactly the character set [`slugify`] produces, so legitimate slugs
//! always pass.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::ApiError;

// Lowercase alphanumerics and hyphens, no leading/trailing hyphen.
static SLUG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?$").unwrap());
static NON_SLUG_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9-]").unwrap());
static HYPHEN_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"-{2,}").unwrap());

// Slugs derived from recipe titles are never this long.
const SLUG_MAX_LEN: usize = 200;

/// Convert a title to a URL-friendly slug: lowercase, spaces to hyphens,
/// special characters stripped, hyphen runs collapsed, no leading or
/// trailing hyphens. Returns an empty string when nothing survives.
pub fn slugify(title: &str) -> String {
    let slug = title.to_lowercase().replace(' ', "-");
    let slug = NON_SLUG_CHARS.replace_all(&slug, "");
    let slug = HYPHEN_RUNS.replace_all(&slug, "-");
    slug.trim_matches('-').to_string()
}

/// Validate a slug received from a request path and return it unchanged.
///
/// Rejects anything outside `[a-z0-9-]`, leading/trailing hyphens, empty
/// values, and over-long values. `field_name` labels the error message
/// (e.g. `"slug"`, `"fork"`).
pub fn validate_slug<'a>(slug: &'a str, field_name: &str) -> Result<&'a str, ApiError> {
    if slug.is_empty() || slug.len() > SLUG_MAX_LEN {
        return Err(ApiError::BadRequest(format!(
            "Invalid {field_name}: must be 1-{SLUG_MAX_LEN} characters"
        )));
    }
    if !SLUG_RE.is_match(slug) {
        return Err(ApiError::BadRequest(format!(
            "Invalid {field_name}: only lowercase letters, digits, and hyphens \
             are allowed (no leading/trailing hyphens)"
        )));
    }
    Ok(slug)
}
