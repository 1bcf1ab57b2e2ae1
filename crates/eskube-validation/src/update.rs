//! Predicates comparing the current resource with the proposed one

use semver::Version;

use eskube_common::crd::Elasticsearch;
use eskube_common::version::{self, RangeViolation};

use crate::field::{ErrorList, FieldError, FieldPath};
use crate::messages::Reason;
use crate::tables::supported_versions;

/// A predicate over a `(current, proposed)` pair
pub type UpdateValidation = fn(&Elasticsearch, &Elasticsearch) -> ErrorList;

/// Predicates of the update path, in evaluation order
pub const UPDATE_VALIDATIONS: &[(&str, UpdateValidation)] = &[
    ("no_downgrades", no_downgrades),
    ("valid_upgrade_path", valid_upgrade_path),
    ("no_pvc_modification", no_pvc_modification),
];

fn version_path() -> FieldPath {
    FieldPath::new("spec").child("version")
}

fn parse_proposed(proposed: &Elasticsearch) -> Result<Version, FieldError> {
    version::parse(&proposed.spec.version).map_err(|_| {
        FieldError::invalid(version_path(), &proposed.spec.version, Reason::ParseVersion)
    })
}

/// Version currently running: the status version when reported, else the persisted spec version
fn current_version(current: &Elasticsearch) -> Result<Version, FieldError> {
    match current.status_version() {
        Some(status) => version::parse(status).map_err(|_| {
            FieldError::invalid(
                FieldPath::new("status").child("version"),
                status,
                Reason::ParseStoredVersion,
            )
        }),
        None => version::parse(&current.spec.version).map_err(|_| {
            FieldError::invalid(version_path(), &current.spec.version, Reason::ParseStoredVersion)
        }),
    }
}

/// The proposed version is not lower than the persisted one
///
/// Skipped when the proposed resource carries the downgrade-validation opt-out annotation.
pub fn no_downgrades(current: &Elasticsearch, proposed: &Elasticsearch) -> ErrorList {
    let mut errs = ErrorList::new();
    if proposed.is_configured_to_allow_downgrades() {
        tracing::info!(
            cluster = %proposed.metadata.name.as_deref().unwrap_or_default(),
            "downgrade validation disabled by annotation"
        );
        return errs;
    }

    let current_ver = version::parse(&current.spec.version).map_err(|_| {
        FieldError::invalid(version_path(), &current.spec.version, Reason::ParseStoredVersion)
    });
    let proposed_ver = parse_proposed(proposed);
    match (current_ver, proposed_ver) {
        (Ok(current_ver), Ok(proposed_ver)) => {
            if proposed_ver < current_ver {
                errs.push(FieldError::invalid(
                    version_path(),
                    &proposed.spec.version,
                    Reason::NoDowngrades,
                ));
            }
        }
        (current_ver, proposed_ver) => {
            errs.extend(
                [current_ver.err(), proposed_ver.err()]
                    .into_iter()
                    .flatten()
                    .collect(),
            );
        }
    }
    errs
}

/// The running version can be upgraded to the proposed version directly
pub fn valid_upgrade_path(current: &Elasticsearch, proposed: &Elasticsearch) -> ErrorList {
    let current_ver = current_version(current);
    let proposed_ver = parse_proposed(proposed);
    let (current_ver, proposed_ver) = match (current_ver, proposed_ver) {
        (Ok(c), Ok(p)) => (c, p),
        (c, p) => return [c.err(), p.err()].into_iter().flatten().collect(),
    };

    let Some(range) = supported_versions(&proposed_ver) else {
        return ErrorList::from(vec![FieldError::invalid(
            version_path(),
            &proposed.spec.version,
            Reason::UnsupportedVersion,
        )]);
    };

    match range.within_range(&current_ver) {
        Ok(()) => ErrorList::new(),
        Err(violation) => {
            let reason = match violation {
                RangeViolation::BelowMin { .. } => Reason::UpgradeSpanTooLargeBackward,
                RangeViolation::AboveMax { .. } => Reason::UpgradeSpanTooLargeForward,
            };
            ErrorList::from(vec![FieldError::invalid(
                version_path(),
                &proposed.spec.version,
                reason,
            )
            .with_detail(format!("from {current_ver}"))])
        }
    }
}

/// Claim templates of node sets that already exist are unchanged
///
/// Node sets are matched by name; new node sets may declare any claim.
pub fn no_pvc_modification(current: &Elasticsearch, proposed: &Elasticsearch) -> ErrorList {
    proposed
        .spec
        .node_sets
        .iter()
        .enumerate()
        .filter_map(|(i, ns)| {
            let existing = current.spec.node_sets.iter().find(|c| c.name == ns.name)?;
            if existing.volume_claim_templates == ns.volume_claim_templates {
                return None;
            }
            let claims: Vec<&str> = ns
                .volume_claim_templates
                .iter()
                .filter_map(|c| c.metadata.name.as_deref())
                .collect();
            Some(FieldError::invalid(
                FieldPath::new("spec")
                    .child("nodeSets")
                    .index(i)
                    .child("volumeClaimTemplates"),
                claims.join(","),
                Reason::PvcImmutable,
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn es(version: &str) -> Elasticsearch {
        serde_json::from_value(json!({
            "apiVersion": "elasticsearch.k8s.elastic.co/v1",
            "kind": "Elasticsearch",
            "metadata": {"name": "quickstart", "namespace": "default"},
            "spec": {"version": version, "nodeSets": [{"name": "default", "count": 3}]}
        }))
        .expect("fixture should deserialize")
    }

    fn with_claim(mut es: Elasticsearch, node_set: usize, storage: &str) -> Elasticsearch {
        es.spec.node_sets[node_set].volume_claim_templates = vec![serde_json::from_value(json!({
            "metadata": {"name": "elasticsearch-data"},
            "spec": {
                "accessModes": ["ReadWriteOnce"],
                "resources": {"requests": {"storage": storage}}
            }
        }))
        .expect("claim should deserialize")];
        es
    }

    fn check(current: &str, proposed: &str) -> Vec<Reason> {
        let (current, proposed) = (es(current), es(proposed));
        let mut errs = no_downgrades(&current, &proposed);
        errs.extend(valid_upgrade_path(&current, &proposed));
        errs.reasons()
    }

    /// Story: upgrades are accepted only along supported paths
    #[test]
    fn story_upgrade_paths() {
        // Scenario: jump to a major line that does not exist
        assert_eq!(check("1.0.0", "2.0.0"), vec![Reason::UnsupportedVersion]);

        // Scenario: base version older than the floor of the target line
        assert_eq!(
            check("6.5.0", "7.0.0"),
            vec![Reason::UpgradeSpanTooLargeBackward]
        );

        // Scenario: supported rolling upgrade
        assert!(check("6.8.0", "7.1.0").is_empty());

        // Scenario: downgrade
        assert!(check("2.0.0", "1.0.0").contains(&Reason::NoDowngrades));
    }

    #[test]
    fn test_status_version_takes_precedence() {
        let mut current = es("8.1.0");
        current.status = Some(serde_json::from_value(json!({"version": "7.10.0"})).expect("status"));
        let proposed = es("8.2.0");
        assert_eq!(
            valid_upgrade_path(&current, &proposed).reasons(),
            vec![Reason::UpgradeSpanTooLargeBackward]
        );

        current.status = Some(serde_json::from_value(json!({"version": "7.17.9"})).expect("status"));
        assert!(valid_upgrade_path(&current, &proposed).is_empty());
    }

    #[test]
    fn test_current_above_target_line() {
        let mut current = es("9.0.0");
        current.status = Some(serde_json::from_value(json!({"version": "9.1.0"})).expect("status"));
        let mut proposed = es("8.18.0");
        proposed.metadata.annotations = Some(
            [(
                "eck.k8s.elastic.co/disable-downgrade-validation".to_string(),
                "true".to_string(),
            )]
            .into(),
        );
        assert!(no_downgrades(&current, &proposed).is_empty());
        assert_eq!(
            valid_upgrade_path(&current, &proposed).reasons(),
            vec![Reason::UpgradeSpanTooLargeForward]
        );
    }

    #[test]
    fn test_unparsable_versions() {
        assert_eq!(
            no_downgrades(&es("garbage"), &es("8.0.0")).reasons(),
            vec![Reason::ParseStoredVersion]
        );
        assert_eq!(
            valid_upgrade_path(&es("8.0.0"), &es("eight")).reasons(),
            vec![Reason::ParseVersion]
        );
    }

    /// Story: claim templates of an existing node set are immutable
    #[test]
    fn story_pvc_immutability() {
        let current = with_claim(es("8.12.0"), 0, "10Gi");

        // Scenario: identical claims
        let same = with_claim(es("8.12.0"), 0, "10Gi");
        assert!(no_pvc_modification(&current, &same).is_empty());

        // Scenario: storage request resized
        let resized = with_claim(es("8.12.0"), 0, "20Gi");
        let errs = no_pvc_modification(&current, &resized);
        assert_eq!(errs.reasons(), vec![Reason::PvcImmutable]);
        assert_eq!(
            errs.iter().next().map(|e| e.field.to_string()),
            Some("spec.nodeSets[0].volumeClaimTemplates".to_string())
        );

        // Scenario: a brand-new node set may declare anything
        let mut grown = es("8.12.0");
        grown.spec.node_sets = current.spec.node_sets.clone();
        grown.spec.node_sets.push(serde_json::from_value(json!({"name": "hot", "count": 2})).expect("node set"));
        let grown = with_claim(grown, 1, "500Gi");
        assert!(no_pvc_modification(&current, &grown).is_empty());
    }
}
