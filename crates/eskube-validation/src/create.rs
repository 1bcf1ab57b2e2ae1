//! Predicates run on every create and update
//!
//! Each predicate inspects the proposed resource on its own and returns every
//! violation it finds.

use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;

use eskube_common::crd::{Elasticsearch, NodeSet};
use eskube_common::{names, version};
use eskube_settings::{unpack, CanonicalConfig, NodeRole};

use crate::field::{ErrorList, FieldError, FieldPath};
use crate::messages::Reason;
use crate::tables::{supported_versions, DENYLISTED_SETTINGS, NODE_ROLES_MIN_VERSION};

/// A predicate over a proposed resource
pub type Validation = fn(&Elasticsearch) -> ErrorList;

/// Predicates of the create path, in evaluation order
pub const VALIDATIONS: &[(&str, Validation)] = &[
    ("valid_name", valid_name),
    ("has_correct_node_roles", has_correct_node_roles),
    ("supported_version", supported_version),
    ("no_denylisted_settings", no_denylisted_settings),
    ("valid_san_ip", valid_san_ip),
    ("unique_node_set_names", unique_node_set_names),
];

fn node_sets_path() -> FieldPath {
    FieldPath::new("spec").child("nodeSets")
}

fn config_path(i: usize) -> FieldPath {
    node_sets_path().index(i).child("config")
}

fn version_path() -> FieldPath {
    FieldPath::new("spec").child("version")
}

fn cluster_name(es: &Elasticsearch) -> &str {
    es.metadata.name.as_deref().unwrap_or_default()
}

fn config_repr(ns: &NodeSet) -> String {
    ns.config_value().to_string()
}

fn is_valid_node_set_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Generated resource names must fit the Kubernetes name length limit
pub fn valid_name(es: &Elasticsearch) -> ErrorList {
    let mut errs = ErrorList::new();
    let cluster = cluster_name(es);

    if cluster.len() > names::MAX_ELASTICSEARCH_NAME_LENGTH {
        errs.push(
            FieldError::invalid(FieldPath::new("metadata").child("name"), cluster, Reason::InvalidNames)
                .with_detail(format!(
                    "name exceeds maximum allowed length of {}",
                    names::MAX_ELASTICSEARCH_NAME_LENGTH
                )),
        );
    }

    for (i, ns) in es.spec.node_sets.iter().enumerate() {
        let field = node_sets_path().index(i).child("name");
        if !is_valid_node_set_name(&ns.name) {
            errs.push(
                FieldError::invalid(field, &ns.name, Reason::InvalidNames).with_detail(format!(
                    "invalid nodeSet name '{}': must consist of alphanumeric characters or '-'",
                    ns.name
                )),
            );
            continue;
        }
        if ns.name.len() > names::MAX_NODE_SET_NAME_LENGTH {
            errs.push(
                FieldError::invalid(field, &ns.name, Reason::InvalidNames).with_detail(format!(
                    "nodeSet name '{}' exceeds maximum allowed length of {}",
                    ns.name,
                    names::MAX_NODE_SET_NAME_LENGTH
                )),
            );
            continue;
        }
        let sts = names::statefulset(cluster, &ns.name);
        let longest_pod = sts.len() + names::pod_ordinal_suffix_len(ns.count);
        if longest_pod > names::MAX_NAME_LENGTH {
            errs.push(
                FieldError::invalid(field, &ns.name, Reason::InvalidNames).with_detail(format!(
                    "cannot generate valid pod names from nodeSet name '{}': {} characters exceed {}",
                    ns.name,
                    longest_pod,
                    names::MAX_NAME_LENGTH
                )),
            );
        }
    }
    errs
}

/// At least one master-eligible node set with a positive count; roles used correctly
pub fn has_correct_node_roles(es: &Elasticsearch) -> ErrorList {
    let mut errs = ErrorList::new();
    let Ok(ver) = version::parse(&es.spec.version) else {
        errs.push(FieldError::invalid(
            version_path(),
            &es.spec.version,
            Reason::ParseVersion,
        ));
        return errs;
    };

    let mut seen_master = false;
    for (i, ns) in es.spec.node_sets.iter().enumerate() {
        let settings = CanonicalConfig::from_value(&ns.config_value())
            .and_then(|cfg| unpack(&cfg, &ver));
        let settings = match settings {
            Ok(settings) => settings,
            Err(e) => {
                tracing::debug!(node_set = %ns.name, error = %e, "node set config does not unpack");
                errs.push(FieldError::invalid(config_path(i), config_repr(ns), Reason::ConfigInvalid));
                continue;
            }
        };
        let node = &settings.node;

        let (major, minor, patch) = NODE_ROLES_MIN_VERSION;
        if node.roles.is_some() && !version::at_least(&ver, major, minor, patch) {
            errs.push(FieldError::invalid(
                config_path(i),
                config_repr(ns),
                Reason::NodeRolesInOldVersion,
            ));
            continue;
        }

        let legacy = node.legacy_role_settings();
        if node.roles.as_ref().is_some_and(|r| !r.is_empty()) && !legacy.is_empty() {
            errs.push(
                FieldError::forbidden(config_path(i), Reason::MixedRoleConfig)
                    .with_detail(legacy.join(",")),
            );
        }

        seen_master = seen_master
            || (node.is_configured_with_role(NodeRole::Master)
                && !node.is_configured_with_role(NodeRole::VotingOnly)
                && ns.count > 0);
    }

    if !seen_master {
        errs.push(FieldError::required(node_sets_path(), Reason::MasterRequired));
    }
    errs
}

/// The version parses and lies within the range of its major line
pub fn supported_version(es: &Elasticsearch) -> ErrorList {
    let mut errs = ErrorList::new();
    let ver = match version::parse(&es.spec.version) {
        Ok(ver) => ver,
        Err(_) => {
            errs.push(FieldError::invalid(version_path(), &es.spec.version, Reason::ParseVersion));
            return errs;
        }
    };
    let supported = supported_versions(&ver).is_some_and(|range| range.within_range(&ver).is_ok());
    if !supported {
        errs.push(FieldError::invalid(
            version_path(),
            &es.spec.version,
            Reason::UnsupportedVersion,
        ));
    }
    errs
}

/// Offending keys of `table` per node set index, sorted and deduplicated
///
/// A config that cannot be canonicalized is reported as invalid.
pub(crate) fn settings_violations(es: &Elasticsearch, table: &[&str]) -> BTreeMap<usize, BTreeSet<String>> {
    let mut violations = BTreeMap::new();
    for (i, ns) in es.spec.node_sets.iter().enumerate() {
        if ns.config.is_none() {
            continue;
        }
        let found: BTreeSet<String> = match CanonicalConfig::from_value(&ns.config_value()) {
            Ok(cfg) => cfg.has_keys(table).into_iter().collect(),
            Err(_) => BTreeSet::from([Reason::ConfigInvalid.message().to_string()]),
        };
        if !found.is_empty() {
            violations.insert(i, found);
        }
    }
    violations
}

/// Render violations as `node[0]: a, b; node[2]: c`
pub(crate) fn format_violations(violations: &BTreeMap<usize, BTreeSet<String>>) -> String {
    violations
        .iter()
        .map(|(i, keys)| {
            let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
            format!("node[{i}]: {}", keys.join(", "))
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// No node set configures a controller-owned setting
pub fn no_denylisted_settings(es: &Elasticsearch) -> ErrorList {
    let violations = settings_violations(es, DENYLISTED_SETTINGS);
    if violations.is_empty() {
        return ErrorList::new();
    }
    ErrorList::from(vec![FieldError::forbidden(
        node_sets_path().child("config"),
        Reason::DenylistedConfig,
    )
    .with_detail(format!("{} is not user configurable", format_violations(&violations)))])
}

/// Every SAN IP of the self-signed HTTP certificate is an IPv4 or IPv6 address
pub fn valid_san_ip(es: &Elasticsearch) -> ErrorList {
    let Some(cert) = &es.spec.http.tls.self_signed_certificate else {
        return ErrorList::new();
    };
    let field = FieldPath::new("spec")
        .child("http")
        .child("tls")
        .child("selfSignedCertificate")
        .child("subjectAltNames");
    cert.subject_alt_names
        .iter()
        .filter_map(|san| san.ip.as_deref())
        .filter(|ip| !ip.is_empty() && ip.parse::<IpAddr>().is_err())
        .map(|ip| FieldError::invalid(field.clone(), ip, Reason::InvalidSanIp))
        .collect()
}

/// Node set names are unique
pub fn unique_node_set_names(es: &Elasticsearch) -> ErrorList {
    let mut seen = BTreeSet::new();
    let mut duplicates = BTreeSet::new();
    for ns in &es.spec.node_sets {
        if !seen.insert(ns.name.as_str()) {
            duplicates.insert(ns.name.as_str());
        }
    }
    duplicates
        .into_iter()
        .map(|name| FieldError::invalid(node_sets_path(), name, Reason::DuplicateNodeSets))
        .collect()
}
