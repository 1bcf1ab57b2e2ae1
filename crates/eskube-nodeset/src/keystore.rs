//! Elasticsearch keystore populated from secure settings
//!
//! User secure settings are aggregated into one secret per cluster. An init
//! container loads every entry of that secret into the keystore before
//! Elasticsearch starts.

use k8s_openapi::api::core::v1::{Container, SecretVolumeSource, Volume, VolumeMount};
use minijinja::{context, Environment};

use eskube_common::crd::Elasticsearch;
use eskube_common::{names, Result};
use eskube_settings::defaults::CONFIG_DIR;

use crate::hash::hash_object;
use crate::scripts::TemplateError;
use crate::volumes::CONFIG_LOCAL_VOLUME_NAME;

/// Volume holding the aggregated secure settings
pub const KEYSTORE_VOLUME_NAME: &str = "elastic-internal-secure-settings";
/// Name of the keystore init container
pub const KEYSTORE_INIT_CONTAINER_NAME: &str = "elastic-internal-init-keystore";
/// Mount path of the secure settings in the init container
pub const SECURE_SETTINGS_MOUNT_PATH: &str = "/mnt/elastic-internal/secure-settings";

const INIT_KEYSTORE_SCRIPT: &str = "init-keystore.sh";
const INIT_KEYSTORE_TEMPLATE: &str = include_str!("../templates/init-keystore.sh");
const KEYSTORE_BIN: &str = "/usr/share/elasticsearch/bin/elasticsearch-keystore";

/// Keystore material handed to the node set builder
#[derive(Clone, Debug, PartialEq)]
pub struct KeystoreResources {
    /// Volume exposing the secure settings
    pub volume: Volume,
    /// Init container creating the keystore
    pub init_container: Container,
    /// Changes whenever the secure settings change
    pub hash: String,
}

fn init_script() -> std::result::Result<String, TemplateError> {
    let mut env = Environment::new();
    let render_err = |source: minijinja::Error| TemplateError::Render {
        name: INIT_KEYSTORE_SCRIPT,
        source,
    };
    env.add_template(INIT_KEYSTORE_SCRIPT, INIT_KEYSTORE_TEMPLATE)
        .map_err(render_err)?;
    env.get_template(INIT_KEYSTORE_SCRIPT)
        .and_then(|t| {
            t.render(context! {
                config_dir => CONFIG_DIR,
                keystore_bin => KEYSTORE_BIN,
                secure_settings_dir => SECURE_SETTINGS_MOUNT_PATH,
            })
        })
        .map_err(render_err)
}

impl KeystoreResources {
    /// Keystore resources of a cluster, `None` without secure settings
    pub fn for_cluster(es: &Elasticsearch) -> Result<Option<Self>> {
        if es.spec.secure_settings.is_empty() {
            return Ok(None);
        }
        let cluster = es.metadata.name.as_deref().unwrap_or_default();

        let volume = Volume {
            name: KEYSTORE_VOLUME_NAME.to_string(),
            secret: Some(SecretVolumeSource {
                secret_name: Some(names::secure_settings_secret(cluster)),
                ..Default::default()
            }),
            ..Default::default()
        };

        let init_container = Container {
            name: KEYSTORE_INIT_CONTAINER_NAME.to_string(),
            command: Some(vec![
                "/usr/bin/env".to_string(),
                "bash".to_string(),
                "-c".to_string(),
                init_script()?,
            ]),
            volume_mounts: Some(vec![
                VolumeMount {
                    name: KEYSTORE_VOLUME_NAME.to_string(),
                    mount_path: SECURE_SETTINGS_MOUNT_PATH.to_string(),
                    read_only: Some(true),
                    ..Default::default()
                },
                VolumeMount {
                    name: CONFIG_LOCAL_VOLUME_NAME.to_string(),
                    mount_path: CONFIG_DIR.to_string(),
                    ..Default::default()
                },
            ]),
            ..Default::default()
        };

        let hash = hash_object(&es.spec.secure_settings)?;
        tracing::debug!(cluster = %cluster, sources = es.spec.secure_settings.len(), "built keystore resources");

        Ok(Some(Self {
            volume,
            init_container,
            hash,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cluster(secure_settings: serde_json::Value) -> Elasticsearch {
        serde_json::from_value(json!({
            "apiVersion": "elasticsearch.k8s.elastic.co/v1",
            "kind": "Elasticsearch",
            "metadata": {"name": "quickstart", "namespace": "search"},
            "spec": {"version": "8.12.0", "secureSettings": secure_settings}
        }))
        .expect("fixture should deserialize")
    }

    #[test]
    fn test_no_secure_settings() {
        assert!(KeystoreResources::for_cluster(&cluster(json!([])))
            .expect("build")
            .is_none());
    }

    /// Story: secure settings produce a keystore init container whose hash tracks the sources
    #[test]
    fn story_keystore_resources() {
        let ks = KeystoreResources::for_cluster(&cluster(json!([{"secretName": "s3-creds"}])))
            .expect("build")
            .expect("keystore resources");
        assert_eq!(ks.volume.name, KEYSTORE_VOLUME_NAME);
        assert_eq!(
            ks.volume.secret.as_ref().and_then(|s| s.secret_name.as_deref()),
            Some("quickstart-es-secure-settings")
        );
        assert_eq!(ks.init_container.name, "elastic-internal-init-keystore");
        let script = ks
            .init_container
            .command
            .as_ref()
            .and_then(|c| c.last())
            .expect("script");
        assert!(script.contains("for filename in /mnt/elastic-internal/secure-settings/*; do"));
        assert!(script.contains("/usr/share/elasticsearch/bin/elasticsearch-keystore add-file"));

        // Scenario: another source changes the hash
        let other = KeystoreResources::for_cluster(&cluster(json!([{"secretName": "gcs-creds"}])))
            .expect("build")
            .expect("keystore resources");
        assert_ne!(ks.hash, other.hash);
    }
}
