//! End-to-end tests of the build pipeline
//!
//! A manifest goes through validation, settings merge, node set build and
//! the desired-nodes compiler, with live objects served from an in-memory
//! store.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{PersistentVolumeClaim, PersistentVolumeClaimStatus};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::api::ObjectMeta;
use serde_json::json;

use eskube::render::{render_cluster, RenderOptions};
use eskube_common::crd::Elasticsearch;
use eskube_nodeset::InMemoryStore;
use eskube_settings::PolicyConfig;
use eskube_validation::{validate_update, Reason};

const MANIFEST: &str = r#"
apiVersion: elasticsearch.k8s.elastic.co/v1
kind: Elasticsearch
metadata:
  name: quickstart
  namespace: search
spec:
  version: 8.12.0
  nodeSets:
    - name: default
      count: 2
      config:
        node.attr.pod: ${POD_NAME}
      podTemplate:
        spec:
          containers:
            - name: elasticsearch
              resources:
                requests:
                  cpu: 500m
                  memory: 4Gi
                limits:
                  cpu: "2"
                  memory: 4Gi
      volumeClaimTemplates:
        - metadata:
            name: elasticsearch-data
          spec:
            accessModes: [ReadWriteOnce]
            resources:
              requests:
                storage: 50Gi
"#;

fn manifest() -> Elasticsearch {
    serde_yaml::from_str(MANIFEST).unwrap()
}

fn bound_claim(name: &str, capacity: &str) -> PersistentVolumeClaim {
    PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("search".to_string()),
            ..Default::default()
        },
        status: Some(PersistentVolumeClaimStatus {
            capacity: Some(BTreeMap::from([(
                "storage".to_string(),
                Quantity(capacity.to_string()),
            )])),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Story: a cluster with bound claims gets exact desired nodes
#[tokio::test]
async fn story_manifest_to_desired_nodes() {
    let es = manifest();
    let store = InMemoryStore::new();
    store.insert_pvc(bound_claim("elasticsearch-data-quickstart-es-default-0", "64Gi"));
    store.insert_pvc(bound_claim("elasticsearch-data-quickstart-es-default-1", "64Gi"));

    let rendered = render_cluster(&es, &store, &RenderOptions::default())
        .await
        .unwrap();
    let desired = rendered.desired_nodes(&store, "8.12.0").await.unwrap();

    // Scenario: storage comes from the bound capacity, not the request
    assert!(!desired.requeue);
    assert_eq!(desired.nodes.len(), 2);
    assert_eq!(desired.nodes[0].storage, format!("{}b", 64_i64 << 30));
    assert_eq!(desired.nodes[0].memory, format!("{}b", 4_i64 << 30));

    // Scenario: per-pod placeholders are resolved in the node settings
    assert_eq!(
        desired.nodes[1].settings["node"]["attr"]["pod"],
        json!("quickstart-es-default-1")
    );
    let serialized = serde_json::to_value(&desired.nodes[0]).unwrap();
    assert_eq!(serialized["processors_range"], json!({"min": 0.5, "max": 2.0}));
    assert!(serialized.get("processors").is_none());
}

/// Story: a storage change is denied at admission but passed through by the build
#[tokio::test]
async fn story_storage_change_on_update() {
    let current = manifest();
    let store = InMemoryStore::new();
    let first = render_cluster(&current, &store, &RenderOptions::default())
        .await
        .unwrap();
    store.insert_statefulset(first.node_sets[0].artifact.statefulset.clone());

    let mut proposed = current.clone();
    let mut claim = proposed.spec.node_sets[0].volume_claim_templates[0].clone();
    if let Some(requests) = claim
        .spec
        .as_mut()
        .and_then(|s| s.resources.as_mut())
        .and_then(|r| r.requests.as_mut())
    {
        requests.insert("storage".to_string(), Quantity("100Gi".to_string()));
    }
    proposed.spec.node_sets[0].volume_claim_templates = vec![claim];

    // Scenario: admission rejects the claim change
    assert!(validate_update(&current, &proposed)
        .reasons()
        .contains(&Reason::PvcImmutable));

    // Scenario: the build keeps the declared claim and the live ownership
    let second = render_cluster(&proposed, &store, &RenderOptions::default())
        .await
        .unwrap();
    let claims = |artifact: &eskube_nodeset::BuildArtifact| {
        artifact
            .statefulset
            .spec
            .as_ref()
            .and_then(|s| s.volume_claim_templates.clone())
            .unwrap_or_default()
    };
    let before = claims(&first.node_sets[0].artifact);
    let after = claims(&second.node_sets[0].artifact);
    assert_eq!(after[0].spec, proposed.spec.node_sets[0].volume_claim_templates[0].spec);
    assert_eq!(after[0].metadata.owner_references, before[0].metadata.owner_references);
    assert_ne!(
        first.node_sets[0].artifact.content_hash,
        second.node_sets[0].artifact.content_hash
    );
}

/// Story: operator policy flows into the merged config and the pods
#[tokio::test]
async fn story_policy_applied() {
    let es = manifest();
    let policy = PolicyConfig::from_yaml(
        r#"
elasticsearch:
  indices.recovery.max_bytes_per_sec: 100mb
secretMounts:
  - secretName: repository-credentials
    mountPath: /mnt/repository
annotations:
  policy.k8s.elastic.co/name: baseline
"#,
    )
    .unwrap();
    let options = RenderOptions {
        policy,
        set_default_security_context: true,
    };
    let rendered = render_cluster(&es, &InMemoryStore::new(), &options)
        .await
        .unwrap();
    let artifact = &rendered.node_sets[0].artifact;

    assert!(artifact
        .config
        .contains("indices.recovery.max_bytes_per_sec"));
    let template = &artifact.statefulset.spec.as_ref().unwrap().template;
    assert_eq!(
        template
            .metadata
            .as_ref()
            .and_then(|m| m.annotations.as_ref())
            .and_then(|a| a.get("policy.k8s.elastic.co/name"))
            .map(String::as_str),
        Some("baseline")
    );
    let pod = template.spec.as_ref().unwrap();
    assert!(pod
        .volumes
        .iter()
        .flatten()
        .any(|v| v.name == "repository-credentials"));
    assert_eq!(
        pod.security_context.as_ref().and_then(|s| s.fs_group),
        Some(1000)
    );
}
