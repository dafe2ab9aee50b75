//! Per-platform length limits.

use crate::model::platform::{self, Platform};
use std::collections::BTreeMap;

/// Violation messages keyed by platform. Empty when everything fits.
pub type Violations = BTreeMap<Platform, Vec<String>>;

/// Checks the effective content of every selected platform against its limit.
#[must_use]
pub fn validate(
    content: &str,
    overrides: &BTreeMap<Platform, String>,
    selected: impl IntoIterator<Item = Platform>,
) -> Violations {
    selected
        .into_iter()
        .filter_map(|platform| {
            let effective = overrides.get(&platform).map_or(content, String::as_str);
            let spec = platform.spec();
            over_limit_message(effective, spec.display_name, spec.max_length)
                .map(|message| (platform, vec![message]))
        })
        .collect()
}

/// Like [`validate`], for raw platform identifiers.
///
/// Identifiers that are not known platforms have no limit and never produce
/// a violation.
#[must_use]
pub fn validate_ids(
    content: &str,
    overrides: &BTreeMap<String, String>,
    selected: &[String],
) -> BTreeMap<String, Vec<String>> {
    selected
        .iter()
        .filter_map(|id| {
            let spec = platform::lookup(id)?;
            let effective = overrides.get(id).map_or(content, String::as_str);
            over_limit_message(effective, spec.display_name, spec.max_length)
                .map(|message| (id.clone(), vec![message]))
        })
        .collect()
}

fn over_limit_message(content: &str, display_name: &str, max_length: usize) -> Option<String> {
    let length = content.chars().count();
    (length > max_length).then(|| {
        format!(
            "{display_name} allows at most {max_length} characters, but the content has {length}."
        )
    })
}
