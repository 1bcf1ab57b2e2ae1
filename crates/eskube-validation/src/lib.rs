//! Admission validation for Elasticsearch clusters
//!
//! Validation is a gate: every predicate of a pipeline runs, and the caller
//! gets all violations at once as an [`ErrorList`]. An empty list admits the
//! resource.
//!
//! - [`validate_create`] runs the create predicates on a new resource
//! - [`validate_update`] runs the create predicates on the proposed resource,
//!   then the predicates comparing it with the current one
//! - [`check_warnings`] reports discouraged configuration without rejecting

#![deny(missing_docs)]

pub mod create;
pub mod field;
pub mod messages;
pub mod tables;
pub mod update;
pub mod warnings;

pub use field::{ErrorKind, ErrorList, FieldError, FieldPath};
pub use messages::Reason;

use eskube_common::crd::Elasticsearch;

use crate::create::VALIDATIONS;
use crate::update::UPDATE_VALIDATIONS;

fn cluster_name(es: &Elasticsearch) -> &str {
    es.metadata.name.as_deref().unwrap_or_default()
}

fn run_create(es: &Elasticsearch, errs: &mut ErrorList) {
    for (name, validation) in VALIDATIONS {
        let found = validation(es);
        if !found.is_empty() {
            tracing::debug!(cluster = %cluster_name(es), validation = *name, errors = found.len(), "validation failed");
        }
        errs.extend(found);
    }
}

/// Validate a resource being created
pub fn validate_create(es: &Elasticsearch) -> ErrorList {
    let mut errs = ErrorList::new();
    run_create(es, &mut errs);
    if !errs.is_empty() {
        tracing::info!(cluster = %cluster_name(es), errors = errs.len(), "rejecting Elasticsearch create");
    }
    errs
}

/// Validate an update from `current` to `proposed`
pub fn validate_update(current: &Elasticsearch, proposed: &Elasticsearch) -> ErrorList {
    let mut errs = ErrorList::new();
    run_create(proposed, &mut errs);
    for (name, validation) in UPDATE_VALIDATIONS {
        let found = validation(current, proposed);
        if !found.is_empty() {
            tracing::debug!(cluster = %cluster_name(proposed), validation = *name, errors = found.len(), "update validation failed");
        }
        errs.extend(found);
    }
    if !errs.is_empty() {
        tracing::info!(cluster = %cluster_name(proposed), errors = errs.len(), "rejecting Elasticsearch update");
    }
    errs
}

/// Warnings for configuration that is accepted but discouraged
pub fn check_warnings(es: &Elasticsearch) -> Vec<String> {
    warnings::unsupported_settings(es).into_iter().collect()
}
