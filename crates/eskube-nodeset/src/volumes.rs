//! Volumes and mounts of node set pods
//!
//! Volumes come in a fixed order so that identical inputs always produce the
//! same pod template. The init container sees the same volumes as the
//! Elasticsearch container, except that the copy-through directories and the
//! transport certificates are mounted under `/mnt/elastic-internal`.

use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, DownwardAPIVolumeFile, DownwardAPIVolumeSource, EmptyDirVolumeSource,
    KeyToPath, ObjectFieldSelector, PersistentVolumeClaim, PersistentVolumeClaimVolumeSource,
    SecretVolumeSource, Volume, VolumeMount,
};
use semver::Version;

use eskube_common::{names, version};
use eskube_settings::defaults::{DATA_PATH, LOGS_PATH};
use eskube_settings::SecretMount;

/// Claim template and volume holding the Elasticsearch data
pub const DATA_VOLUME_NAME: &str = "elasticsearch-data";
/// Volume holding the logs
pub const LOGS_VOLUME_NAME: &str = "elasticsearch-logs";

/// Copy of the plugins directory
pub const PLUGINS_VOLUME_NAME: &str = "elastic-internal-elasticsearch-plugins-local";
/// Copy of the bin directory
pub const BIN_VOLUME_NAME: &str = "elastic-internal-elasticsearch-bin-local";
/// Copy of the config directory
pub const CONFIG_LOCAL_VOLUME_NAME: &str = "elastic-internal-elasticsearch-config-local";
/// Generated scripts
pub const SCRIPTS_VOLUME_NAME: &str = "elastic-internal-scripts";
/// Probe user credentials
pub const PROBE_USER_VOLUME_NAME: &str = "elastic-internal-probe-user";
/// File realm users and roles
pub const FILE_REALM_VOLUME_NAME: &str = "elastic-internal-xpack-file-realm";
/// HTTP certificates
pub const HTTP_CERTS_VOLUME_NAME: &str = "elastic-internal-http-certificates";
/// Transport certificates of the StatefulSet
pub const TRANSPORT_CERTS_VOLUME_NAME: &str = "elastic-internal-transport-certificates";
/// Remote cluster certificate authorities
pub const REMOTE_CA_VOLUME_NAME: &str = "elastic-internal-remote-certificate-authorities";
/// Rendered elasticsearch.yml
pub const CONFIG_VOLUME_NAME: &str = "elastic-internal-elasticsearch-config";
/// Pod labels and annotations
pub const DOWNWARD_API_VOLUME_NAME: &str = "elastic-internal-downward-api";
/// Writable /tmp
pub const TEMP_VOLUME_NAME: &str = "elastic-internal-temp";
/// File-based settings
pub const FILE_SETTINGS_VOLUME_NAME: &str = "elastic-internal-elasticsearch-file-settings";

/// Mount path of the scripts
pub const SCRIPTS_MOUNT_PATH: &str = "/mnt/elastic-internal/scripts";
/// Mount path of the probe user credentials
pub const PROBE_USER_MOUNT_PATH: &str = "/mnt/elastic-internal/probe-user";
/// Name of the probe user, and of its password file
pub const PROBE_USER_NAME: &str = "elastic-internal-probe";
/// Mount path of the file realm
pub const FILE_REALM_MOUNT_PATH: &str = "/mnt/elastic-internal/xpack-file-realm";
/// Mount path of the rendered configuration
pub const CONFIG_MOUNT_PATH: &str = "/mnt/elastic-internal/elasticsearch-config";
/// Mount path of the downward API files
pub const DOWNWARD_API_MOUNT_PATH: &str = "/mnt/elastic-internal/downward-api";
/// Transport certificates as seen by the init container
pub const INIT_TRANSPORT_CERTS_MOUNT_PATH: &str = "/mnt/elastic-internal/transport-certificates";
/// Marker present in the transport certificates secret when self-signed certificates are disabled
pub const TRANSPORT_CERTS_DISABLED_MARKER: &str = "transport.certs.disabled";

const ES_HOME: &str = "/usr/share/elasticsearch";
const HTTP_CERTS_MOUNT_PATH: &str = "/usr/share/elasticsearch/config/http-certs";
const TRANSPORT_CERTS_MOUNT_PATH: &str = "/usr/share/elasticsearch/config/transport-certs";
const REMOTE_CA_MOUNT_PATH: &str = "/usr/share/elasticsearch/config/transport-remote-certs";
const FILE_SETTINGS_MOUNT_PATH: &str = "/usr/share/elasticsearch/config/operator";
const TEMP_MOUNT_PATH: &str = "/tmp";
const SCRIPTS_MODE: i32 = 0o755;

/// Path of the probe user password
pub fn probe_password_path() -> String {
    format!("{PROBE_USER_MOUNT_PATH}/{PROBE_USER_NAME}")
}

/// Path of the pod labels file
pub fn downward_labels_path() -> String {
    format!("{DOWNWARD_API_MOUNT_PATH}/labels")
}

/// Path of the pod annotations file
pub fn downward_annotations_path() -> String {
    format!("{DOWNWARD_API_MOUNT_PATH}/annotations")
}

/// Directory of a copy-through volume as mounted by the init container
pub fn init_local_path(dir: &str) -> String {
    format!("/mnt/elastic-internal/elasticsearch-{dir}-local")
}

/// Inputs to the volume layout of a node set
pub struct VolumeInputs<'a> {
    /// Cluster name
    pub cluster: &'a str,
    /// StatefulSet name
    pub statefulset: &'a str,
    /// Elasticsearch version
    pub version: &'a Version,
    /// Claim templates of the node set
    pub claims: &'a [PersistentVolumeClaim],
    /// Keystore volume, when secure settings exist
    pub keystore: Option<&'a Volume>,
    /// Expose pod annotations through the downward API
    pub downward_annotations: bool,
    /// Secrets mounted by policy
    pub policy_mounts: &'a [SecretMount],
}

/// Volumes of a pod and the mounts of each container
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VolumeLayout {
    /// Pod volumes, in order
    pub volumes: Vec<Volume>,
    /// Mounts of the Elasticsearch container
    pub mounts: Vec<VolumeMount>,
    /// Mounts of the filesystem init container
    pub init_mounts: Vec<VolumeMount>,
}

impl VolumeLayout {
    fn push(&mut self, volume: Volume, mount_path: Option<&str>, init_path: Option<&str>, read_only: bool) {
        let mount = |path: &str| VolumeMount {
            name: volume.name.clone(),
            mount_path: path.to_string(),
            read_only: read_only.then_some(true),
            ..Default::default()
        };
        if let Some(path) = mount_path {
            self.mounts.push(mount(path));
        }
        if let Some(path) = init_path.or(mount_path) {
            self.init_mounts.push(mount(path));
        }
        self.volumes.push(volume);
    }

    /// Replace a volume of the same name in place, or append it
    fn upsert(&mut self, volume: Volume) {
        match self.volumes.iter_mut().find(|v| v.name == volume.name) {
            Some(existing) => *existing = volume,
            None => self.volumes.push(volume),
        }
    }
}

fn empty_dir(name: &str) -> Volume {
    Volume {
        name: name.to_string(),
        empty_dir: Some(EmptyDirVolumeSource::default()),
        ..Default::default()
    }
}

fn secret(name: &str, secret_name: String, optional: bool) -> Volume {
    Volume {
        name: name.to_string(),
        secret: Some(SecretVolumeSource {
            secret_name: Some(secret_name),
            optional: optional.then_some(true),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn downward_api(with_annotations: bool) -> Volume {
    let field = |path: &str, field_path: &str| DownwardAPIVolumeFile {
        path: path.to_string(),
        field_ref: Some(ObjectFieldSelector {
            field_path: field_path.to_string(),
            ..Default::default()
        }),
        ..Default::default()
    };
    let mut items = vec![field("labels", "metadata.labels")];
    if with_annotations {
        items.push(field("annotations", "metadata.annotations"));
    }
    Volume {
        name: DOWNWARD_API_VOLUME_NAME.to_string(),
        downward_api: Some(DownwardAPIVolumeSource {
            items: Some(items),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Build the volumes of a node set pod
///
/// The data mount is not part of the layout: it depends on the final volume
/// set once user volumes are merged, see [`data_mount`].
pub fn build_volumes(inputs: &VolumeInputs<'_>) -> VolumeLayout {
    let mut layout = VolumeLayout::default();

    for dir in ["plugins", "bin", "config"] {
        let name = match dir {
            "plugins" => PLUGINS_VOLUME_NAME,
            "bin" => BIN_VOLUME_NAME,
            _ => CONFIG_LOCAL_VOLUME_NAME,
        };
        layout.push(
            empty_dir(name),
            Some(&format!("{ES_HOME}/{dir}")),
            Some(&init_local_path(dir)),
            false,
        );
    }
    layout.push(empty_dir(LOGS_VOLUME_NAME), Some(LOGS_PATH), None, false);

    layout.push(
        Volume {
            name: SCRIPTS_VOLUME_NAME.to_string(),
            config_map: Some(ConfigMapVolumeSource {
                name: names::scripts_config_map(inputs.cluster),
                default_mode: Some(SCRIPTS_MODE),
                ..Default::default()
            }),
            ..Default::default()
        },
        Some(SCRIPTS_MOUNT_PATH),
        None,
        true,
    );

    let mut probe_user = secret(
        PROBE_USER_VOLUME_NAME,
        names::internal_users_secret(inputs.cluster),
        false,
    );
    if let Some(source) = probe_user.secret.as_mut() {
        source.items = Some(vec![KeyToPath {
            key: PROBE_USER_NAME.to_string(),
            path: PROBE_USER_NAME.to_string(),
            ..Default::default()
        }]);
    }
    layout.push(probe_user, Some(PROBE_USER_MOUNT_PATH), None, true);

    layout.push(
        secret(FILE_REALM_VOLUME_NAME, names::xpack_file_realm_secret(inputs.cluster), false),
        Some(FILE_REALM_MOUNT_PATH),
        None,
        true,
    );
    layout.push(
        secret(HTTP_CERTS_VOLUME_NAME, names::http_certificates_secret(inputs.cluster), false),
        Some(HTTP_CERTS_MOUNT_PATH),
        None,
        true,
    );
    layout.push(
        secret(
            TRANSPORT_CERTS_VOLUME_NAME,
            names::transport_certificates_secret(inputs.statefulset),
            false,
        ),
        Some(TRANSPORT_CERTS_MOUNT_PATH),
        Some(INIT_TRANSPORT_CERTS_MOUNT_PATH),
        true,
    );
    layout.push(
        secret(REMOTE_CA_VOLUME_NAME, names::remote_ca_secret(inputs.cluster), true),
        Some(REMOTE_CA_MOUNT_PATH),
        None,
        true,
    );
    layout.push(
        secret(CONFIG_VOLUME_NAME, names::config_secret(inputs.statefulset), false),
        Some(CONFIG_MOUNT_PATH),
        None,
        true,
    );
    layout.push(
        downward_api(inputs.downward_annotations),
        Some(DOWNWARD_API_MOUNT_PATH),
        None,
        true,
    );
    layout.push(empty_dir(TEMP_VOLUME_NAME), Some(TEMP_MOUNT_PATH), None, false);

    for claim in inputs.claims {
        let Some(name) = claim.metadata.name.as_deref() else {
            continue;
        };
        layout.upsert(Volume {
            name: name.to_string(),
            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                claim_name: name.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        });
    }

    if let Some(keystore) = inputs.keystore {
        layout.volumes.push(keystore.clone());
    }

    if version::at_least(inputs.version, 8, 6, 0) {
        layout.push(
            secret(FILE_SETTINGS_VOLUME_NAME, names::file_settings_secret(inputs.cluster), true),
            Some(FILE_SETTINGS_MOUNT_PATH),
            None,
            true,
        );
    }

    for mount in inputs.policy_mounts {
        layout.push(
            secret(&mount.secret_name, mount.secret_name.clone(), false),
            Some(&mount.mount_path),
            None,
            true,
        );
    }

    layout
}

/// Mount of the data volume, when the final volume set has one
pub fn data_mount(volumes: &[Volume]) -> Option<VolumeMount> {
    volumes
        .iter()
        .any(|v| v.name == DATA_VOLUME_NAME)
        .then(|| VolumeMount {
            name: DATA_VOLUME_NAME.to_string(),
            mount_path: DATA_PATH.to_string(),
            ..Default::default()
        })
}
