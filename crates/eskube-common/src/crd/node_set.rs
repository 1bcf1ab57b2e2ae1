//! Node sets: homogeneous groups of Elasticsearch nodes

use k8s_openapi::api::core::v1::{PersistentVolumeClaim, PodTemplateSpec};
use schemars::gen::SchemaGenerator;
use schemars::schema::{InstanceType, Schema, SchemaObject};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Free-form Elasticsearch configuration (`elasticsearch.yml` content)
///
/// Accepts nested maps as well as dotted keys.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(transparent)]
pub struct Config(pub serde_json::Value);

impl JsonSchema for Config {
    fn schema_name() -> String {
        "Config".to_string()
    }

    fn json_schema(_gen: &mut SchemaGenerator) -> Schema {
        let mut schema = SchemaObject {
            instance_type: Some(InstanceType::Object.into()),
            ..Default::default()
        };
        schema.extensions.insert(
            "x-kubernetes-preserve-unknown-fields".to_string(),
            serde_json::Value::Bool(true),
        );
        Schema::Object(schema)
    }
}

/// A group of Elasticsearch nodes sharing the same configuration
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodeSet {
    /// Logical name, used in the names of the generated resources
    pub name: String,

    /// Elasticsearch configuration of the nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Config>,

    /// Number of nodes
    #[serde(default)]
    pub count: i32,

    /// Overrides merged into the generated pod template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_template: Option<PodTemplateSpec>,

    /// Persistent volume claims created for every node
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volume_claim_templates: Vec<PersistentVolumeClaim>,
}

impl NodeSet {
    /// Raw configuration document, `null` when none is set
    pub fn config_value(&self) -> serde_json::Value {
        self.config
            .as_ref()
            .map(|c| c.0.clone())
            .unwrap_or(serde_json::Value::Null)
    }
}
