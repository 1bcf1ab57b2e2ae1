//! Non-blocking checks surfaced as admission warnings

use eskube_common::crd::Elasticsearch;

use crate::create::{format_violations, settings_violations};
use crate::messages::Reason;
use crate::tables::UNSUPPORTED_SETTINGS;

/// Settings that are accepted but reserved for the controller
pub fn unsupported_settings(es: &Elasticsearch) -> Option<String> {
    let violations = settings_violations(es, UNSUPPORTED_SETTINGS);
    if violations.is_empty() {
        return None;
    }
    Some(format!(
        "spec.nodeSets[].config: {}: {}",
        format_violations(&violations),
        Reason::UnsupportedConfig.message()
    ))
}
