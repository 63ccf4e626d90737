//! Failure categorisation by marker substrings

use crate::config::Markers;
use crate::models::FailureCategory;

/// First marker (in list order) found anywhere in `text`, else UNKNOWN.
///
/// Order is the priority: a message containing both the compilation and the
/// build marker is COMPILATION because that marker is listed first.
pub fn categorize(markers: &Markers, text: &str) -> FailureCategory {
    markers
        .0
        .iter()
        .find(|marker| text.contains(marker.text.as_str()))
        .map(|marker| marker.category)
        .unwrap_or(FailureCategory::Unknown)
}
