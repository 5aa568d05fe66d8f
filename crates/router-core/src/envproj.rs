//! Environment projection for started builds.
//!
//! Turns a caller-supplied list of environment-variable names into the
//! ordered override list injected into each child build. Order is
//! significant: it determines override precedence downstream.

use router_api::Environment;

/// Resolve a CRLF/LF-delimited list of variable names against `lookup`.
///
/// Dollar-sign prefixes are stripped, blank lines are skipped, input order
/// is preserved. A name `lookup` cannot resolve projects to an empty value.
pub fn project_environments<F>(key_list: &str, lookup: F) -> Vec<Environment>
where
    F: Fn(&str) -> Option<String>,
{
    let stripped = key_list.replace('$', "");
    stripped
        .lines()
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(|key| Environment {
            mapped_to: key.to_string(),
            value: lookup(key).unwrap_or_default(),
        })
        .collect()
}

/// Project against the current process environment.
pub fn from_process_env(key_list: &str) -> Vec<Environment> {
    project_environments(key_list, |key| std::env::var(key).ok())
}
