//! Operator-level policy applied to every node set
//!
//! A policy adds settings between the controller defaults and the user
//! configuration, mounts extra secrets and stamps annotations on pods.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::canonical::CanonicalConfig;
use crate::error::SettingsError;

/// Secret mounted into every Elasticsearch container
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SecretMount {
    /// Name of the secret
    pub secret_name: String,
    /// Absolute mount path in the container
    pub mount_path: String,
}

/// Resolved policy for a cluster
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PolicyConfig {
    /// Settings merged between defaults and user configuration
    pub elasticsearch_config: Option<CanonicalConfig>,
    /// Secrets mounted as additional volumes
    pub additional_volumes: Vec<SecretMount>,
    /// Annotations added to the pod template
    pub policy_annotations: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PolicyDocument {
    #[serde(default)]
    elasticsearch: Option<serde_json::Value>,
    #[serde(default)]
    secret_mounts: Vec<SecretMount>,
    #[serde(default)]
    annotations: BTreeMap<String, String>,
}

impl PolicyConfig {
    /// Parse a policy from its YAML document
    ///
    /// ```yaml
    /// elasticsearch:
    ///   indices.recovery.max_bytes_per_sec: 100mb
    /// secretMounts:
    ///   - secretName: repository-credentials
    ///     mountPath: /mnt/repository
    /// annotations:
    ///   policy.k8s.elastic.co/name: baseline
    /// ```
    pub fn from_yaml(yaml: &str) -> Result<Self, SettingsError> {
        let doc: PolicyDocument = serde_yaml::from_str(yaml)
            .map_err(|e| SettingsError::invalid(format!("policy: {e}")))?;

        let elasticsearch_config = doc
            .elasticsearch
            .as_ref()
            .map(CanonicalConfig::from_value)
            .transpose()?
            .filter(|cfg| !cfg.is_empty());

        for mount in &doc.secret_mounts {
            if !mount.mount_path.starts_with('/') {
                return Err(SettingsError::invalid(format!(
                    "policy: mount path {:?} of secret {} is not absolute",
                    mount.mount_path, mount.secret_name
                )));
            }
        }

        Ok(Self {
            elasticsearch_config,
            additional_volumes: doc.secret_mounts,
            policy_annotations: doc.annotations,
        })
    }
}
