//! Volume claim templates and their ownership
//!
//! When a node set is rebuilt, templates already present on the live
//! StatefulSet keep the owner references they were created with, even when
//! those point at an older API version. Their declared spec passes through
//! as is: rejecting a changed template is left to admission and the API
//! server. New templates get the controller's owner reference.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, PersistentVolumeClaimSpec, VolumeResourceRequirements};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::ObjectMeta;
use kube::ResourceExt;

use eskube_common::crd::{Elasticsearch, API_VERSION, KIND};

use crate::volumes::DATA_VOLUME_NAME;

const DEFAULT_STORAGE: &str = "1Gi";
const READ_WRITE_ONCE: &str = "ReadWriteOnce";

/// The claim template used when a node set declares none
pub fn default_data_claim() -> PersistentVolumeClaim {
    PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(DATA_VOLUME_NAME.to_string()),
            ..Default::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec![READ_WRITE_ONCE.to_string()]),
            resources: Some(VolumeResourceRequirements {
                requests: Some(BTreeMap::from([(
                    "storage".to_string(),
                    Quantity(DEFAULT_STORAGE.to_string()),
                )])),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Claim templates of a node set, falling back to the default data claim
pub fn claim_templates(declared: &[PersistentVolumeClaim]) -> Vec<PersistentVolumeClaim> {
    if declared.is_empty() {
        vec![default_data_claim()]
    } else {
        declared.to_vec()
    }
}

/// Owner reference pointing at the Elasticsearch resource
///
/// The controller owns the claims, but deleting a claim must not wait for
/// the cluster.
pub fn owner_reference(es: &Elasticsearch) -> OwnerReference {
    OwnerReference {
        api_version: API_VERSION.to_string(),
        kind: KIND.to_string(),
        name: es.name_any(),
        uid: es.metadata.uid.clone().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(false),
    }
}

/// Reconcile proposed claim templates with those of the live StatefulSet
///
/// Templates already on `existing` take over its owner references and keep
/// the declared spec. Other templates get an owner reference to `es` unless
/// they already carry one. Neither input is modified.
pub fn preserve_claim_templates(
    es: &Elasticsearch,
    proposed: &[PersistentVolumeClaim],
    existing: Option<&StatefulSet>,
) -> Vec<PersistentVolumeClaim> {
    let live: &[PersistentVolumeClaim] = existing
        .and_then(|sts| sts.spec.as_ref())
        .and_then(|spec| spec.volume_claim_templates.as_deref())
        .unwrap_or_default();

    proposed
        .iter()
        .map(|claim| {
            let mut claim = claim.clone();
            let live_owners = live
                .iter()
                .find(|l| l.metadata.name == claim.metadata.name)
                .and_then(|l| l.metadata.owner_references.as_ref())
                .filter(|owners| !owners.is_empty());
            if let Some(owners) = live_owners {
                claim.metadata.owner_references = Some(owners.clone());
                return claim;
            }
            let owners = claim.metadata.owner_references.get_or_insert_with(Vec::new);
            let owned = owners
                .iter()
                .any(|o| o.kind == KIND && o.name == es.name_any());
            if !owned {
                owners.push(owner_reference(es));
            }
            claim
        })
        .collect()
}
