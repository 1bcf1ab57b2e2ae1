//! Update strategy and change budget of an Elasticsearch cluster

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default number of pods that may be unavailable during a change
pub const DEFAULT_MAX_UNAVAILABLE: i32 = 1;

/// How changes to the cluster are rolled out
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStrategy {
    /// Bounds on pods created above or removed below the target count
    #[serde(default)]
    pub change_budget: ChangeBudget,
}

/// Bounds applied while pods are added, removed or replaced
///
/// A missing or negative value means unlimited, not zero.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChangeBudget {
    /// Pods that can be created above the target count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_surge: Option<i32>,

    /// Pods that can be unavailable below the target count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_unavailable: Option<i32>,
}

impl ChangeBudget {
    /// Effective max surge, `None` meaning unlimited
    pub fn max_surge_or_default(&self) -> Option<i32> {
        match self.max_surge {
            Some(v) if v >= 0 => Some(v),
            _ => None,
        }
    }

    /// Effective max unavailable, `None` meaning unlimited
    ///
    /// Defaults to one pod when unset.
    pub fn max_unavailable_or_default(&self) -> Option<i32> {
        match self.max_unavailable {
            None => Some(DEFAULT_MAX_UNAVAILABLE),
            Some(v) if v < 0 => None,
            Some(v) => Some(v),
        }
    }
}
