//! Typed view of the settings the controller itself reads
//!
//! Only node roles, the initial master nodes and the data path are extracted.
//! The version is needed because role defaults and the role representation
//! changed across Elasticsearch releases.

use semver::Version;

use eskube_common::version;

use crate::canonical::{CanonicalConfig, Value};
use crate::error::SettingsError;

/// `node.master`
pub const NODE_MASTER: &str = "node.master";
/// `node.data`
pub const NODE_DATA: &str = "node.data";
/// `node.ingest`
pub const NODE_INGEST: &str = "node.ingest";
/// `node.ml`
pub const NODE_ML: &str = "node.ml";
/// `node.transform`
pub const NODE_TRANSFORM: &str = "node.transform";
/// `node.remote_cluster_client`
pub const NODE_REMOTE_CLUSTER_CLIENT: &str = "node.remote_cluster_client";
/// `node.voting_only`
pub const NODE_VOTING_ONLY: &str = "node.voting_only";
/// `node.roles`
pub const NODE_ROLES: &str = "node.roles";
/// `cluster.initial_master_nodes`
pub const CLUSTER_INITIAL_MASTER_NODES: &str = "cluster.initial_master_nodes";
/// `path.data`
pub const PATH_DATA: &str = "path.data";

/// An Elasticsearch node role
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeRole {
    /// Master-eligible
    Master,
    /// Generic data role, implies every tier
    Data,
    /// Content tier
    DataContent,
    /// Hot tier
    DataHot,
    /// Warm tier
    DataWarm,
    /// Cold tier
    DataCold,
    /// Frozen tier
    DataFrozen,
    /// Ingest pipelines
    Ingest,
    /// Machine learning
    Ml,
    /// Cross-cluster client
    RemoteClusterClient,
    /// Transforms
    Transform,
    /// Voting-only master
    VotingOnly,
}

impl NodeRole {
    /// Every role, in label order
    pub const ALL: [NodeRole; 12] = [
        NodeRole::Master,
        NodeRole::Data,
        NodeRole::DataContent,
        NodeRole::DataHot,
        NodeRole::DataWarm,
        NodeRole::DataCold,
        NodeRole::DataFrozen,
        NodeRole::Ingest,
        NodeRole::Ml,
        NodeRole::RemoteClusterClient,
        NodeRole::Transform,
        NodeRole::VotingOnly,
    ];

    /// Name of the role in `node.roles`
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeRole::Master => "master",
            NodeRole::Data => "data",
            NodeRole::DataContent => "data_content",
            NodeRole::DataHot => "data_hot",
            NodeRole::DataWarm => "data_warm",
            NodeRole::DataCold => "data_cold",
            NodeRole::DataFrozen => "data_frozen",
            NodeRole::Ingest => "ingest",
            NodeRole::Ml => "ml",
            NodeRole::RemoteClusterClient => "remote_cluster_client",
            NodeRole::Transform => "transform",
            NodeRole::VotingOnly => "voting_only",
        }
    }

    /// True for the data tiers implied by the generic data role
    pub fn is_data_tier(&self) -> bool {
        matches!(
            self,
            NodeRole::DataContent
                | NodeRole::DataHot
                | NodeRole::DataWarm
                | NodeRole::DataCold
                | NodeRole::DataFrozen
        )
    }
}

/// Role settings of a node
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Node {
    /// `node.master`
    pub master: Option<bool>,
    /// `node.data`
    pub data: Option<bool>,
    /// `node.ingest`
    pub ingest: Option<bool>,
    /// `node.ml`
    pub ml: Option<bool>,
    /// `node.transform`
    pub transform: Option<bool>,
    /// `node.remote_cluster_client`
    pub remote_cluster_client: Option<bool>,
    /// `node.voting_only`
    pub voting_only: Option<bool>,
    /// `node.roles`, authoritative when present
    pub roles: Option<Vec<String>>,
}

impl Node {
    /// Role as literally configured
    ///
    /// With `node.roles` only the listed roles count. With the legacy flags,
    /// every role but voting-only and frozen defaults to enabled and the data
    /// tiers follow `node.data`.
    pub fn is_configured_with_role(&self, role: NodeRole) -> bool {
        if let Some(roles) = &self.roles {
            return roles.iter().any(|r| r == role.as_str());
        }
        match role {
            NodeRole::Master => self.master.unwrap_or(true),
            NodeRole::Data
            | NodeRole::DataContent
            | NodeRole::DataHot
            | NodeRole::DataWarm
            | NodeRole::DataCold => self.data.unwrap_or(true),
            NodeRole::DataFrozen => false,
            NodeRole::Ingest => self.ingest.unwrap_or(true),
            NodeRole::Ml => self.ml.unwrap_or(true),
            NodeRole::RemoteClusterClient => self.remote_cluster_client.unwrap_or(true),
            NodeRole::Transform => self.transform.unwrap_or(true),
            NodeRole::VotingOnly => self.voting_only.unwrap_or(false),
        }
    }

    /// Effective role: like [`Self::is_configured_with_role`], except the
    /// generic `data` role in `node.roles` implies every data tier
    pub fn has_role(&self, role: NodeRole) -> bool {
        if role.is_data_tier() {
            if let Some(roles) = &self.roles {
                if roles.iter().any(|r| r == NodeRole::Data.as_str()) {
                    return true;
                }
            }
        }
        self.is_configured_with_role(role)
    }

    /// True if the node is master-eligible and may win an election
    pub fn is_electable_master(&self) -> bool {
        self.has_role(NodeRole::Master) && !self.has_role(NodeRole::VotingOnly)
    }

    /// Legacy role flags set alongside `node.roles`, in a fixed order
    pub fn legacy_role_settings(&self) -> Vec<&'static str> {
        [
            (NODE_DATA, self.data),
            (NODE_INGEST, self.ingest),
            (NODE_MASTER, self.master),
            (NODE_ML, self.ml),
            (NODE_REMOTE_CLUSTER_CLIENT, self.remote_cluster_client),
            (NODE_TRANSFORM, self.transform),
            (NODE_VOTING_ONLY, self.voting_only),
        ]
        .into_iter()
        .filter(|(_, v)| v.is_some())
        .map(|(k, _)| k)
        .collect()
    }
}

/// Settings of a node set read by the controller
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ElasticsearchSettings {
    /// Role settings
    pub node: Node,
    /// `cluster.initial_master_nodes`
    pub initial_master_nodes: Vec<String>,
    /// `path.data`, kept untyped since a list of paths is possible
    pub path_data: Option<Value>,
}

/// Extract the controller-relevant settings of a configuration
pub fn unpack(
    config: &CanonicalConfig,
    version: &Version,
) -> Result<ElasticsearchSettings, SettingsError> {
    let mut node = Node {
        master: bool_setting(config, NODE_MASTER)?,
        data: bool_setting(config, NODE_DATA)?,
        ingest: bool_setting(config, NODE_INGEST)?,
        ml: bool_setting(config, NODE_ML)?,
        transform: bool_setting(config, NODE_TRANSFORM)?,
        remote_cluster_client: bool_setting(config, NODE_REMOTE_CLUSTER_CLIENT)?,
        voting_only: bool_setting(config, NODE_VOTING_ONLY)?,
        roles: match config.get(NODE_ROLES) {
            None => None,
            Some(value) => Some(string_list(NODE_ROLES, value)?),
        },
    };

    // transform did not exist before 7.7.0
    if node.roles.is_none() && node.transform.is_none() && !version::at_least(version, 7, 7, 0)
    {
        node.transform = Some(false);
    }

    let initial_master_nodes = match config.get(CLUSTER_INITIAL_MASTER_NODES) {
        None => Vec::new(),
        Some(value) => string_list(CLUSTER_INITIAL_MASTER_NODES, value)?,
    };

    Ok(ElasticsearchSettings {
        node,
        initial_master_nodes,
        path_data: config.get(PATH_DATA).cloned(),
    })
}

fn bool_setting(config: &CanonicalConfig, key: &str) -> Result<Option<bool>, SettingsError> {
    match config.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_bool()
            .map(Some)
            .ok_or_else(|| SettingsError::unpack(key, "expected a boolean")),
    }
}

fn string_list(key: &str, value: &Value) -> Result<Vec<String>, SettingsError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(s) => Ok(s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()),
        Value::List(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| SettingsError::unpack(key, "expected a list of strings"))
            })
            .collect(),
        _ => Err(SettingsError::unpack(key, "expected a list of strings")),
    }
}
