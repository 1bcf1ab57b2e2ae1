//! Error types for the eskube reconciliation core
//!
//! Errors are structured with fields to aid debugging in production. Each
//! variant carries the context a reconciler needs to decide whether to
//! requeue, surface the problem to the user, or give up.

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for eskube operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Validation error for an Elasticsearch spec
    #[error("validation error for {cluster}: {message}")]
    Validation {
        /// Name of the cluster with invalid configuration
        cluster: String,
        /// Description of what's invalid
        message: String,
        /// The invalid field path (e.g., "spec.nodeSets[0].config")
        field: Option<String>,
    },

    /// Compute or storage resources of a node set cannot be determined
    ///
    /// Raised when the user or the platform has not supplied enough
    /// information yet. Retrying without a spec change will not help.
    #[error("cannot compute resources for NodeSet \"{node_set}\": {}", reasons.join(", "))]
    ResourceNotAvailable {
        /// Name of the node set
        node_set: String,
        /// Every reason collected while inspecting the node set
        reasons: Vec<String>,
    },

    /// Elasticsearch configuration could not be merged or unpacked
    #[error("configuration error: {message}")]
    Settings {
        /// Description of what failed
        message: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The resource kind being serialized (if known)
        kind: Option<String>,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "desired-nodes", "builder")
        context: String,
    },
}

impl Error {
    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            cluster: UNKNOWN_CONTEXT.to_string(),
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error with cluster context and field path
    pub fn validation_for_field(
        cluster: impl Into<String>,
        field: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Validation {
            cluster: cluster.into(),
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Create a resource-not-available error for a node set
    pub fn resource_not_available(node_set: impl Into<String>, reasons: Vec<String>) -> Self {
        Self::ResourceNotAvailable {
            node_set: node_set.into(),
            reasons,
        }
    }

    /// Create a settings error with the given message
    pub fn settings(msg: impl Into<String>) -> Self {
        Self::Settings {
            message: msg.into(),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error with resource kind context
    pub fn serialization_for_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: UNKNOWN_CONTEXT.to_string(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Check if this error is retryable
    ///
    /// Validation, settings and resource errors need a spec or platform change.
    /// Kubernetes errors depend on the status code.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => !matches!(
                source,
                kube::Error::Api(ae) if (400..500).contains(&ae.code)
            ),
            Error::Validation { .. } => false,
            Error::ResourceNotAvailable { .. } => false,
            Error::Settings { .. } => false,
            Error::Serialization { .. } => false,
            Error::Internal { .. } => true,
        }
    }

    /// Get the cluster name if this error is associated with a specific cluster
    pub fn cluster(&self) -> Option<&str> {
        match self {
            Error::Validation { cluster, .. } => Some(cluster),
            _ => None,
        }
    }

    /// Get the context if this error has one
    pub fn context(&self) -> Option<&str> {
        match self {
            Error::Internal { context, .. } => Some(context),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Story: missing resources are reported with every reason at once
    ///
    /// The resource compiler inspects CPU, memory and storage before giving up
    /// so the user can fix the node set in one edit.
    #[test]
    fn story_resource_not_available_lists_all_reasons() {
        let err = Error::resource_not_available(
            "hot",
            vec![
                "no CPU request or limit set".to_string(),
                "memory limit is not set".to_string(),
            ],
        );
        assert_eq!(
            err.to_string(),
            "cannot compute resources for NodeSet \"hot\": no CPU request or limit set, memory limit is not set"
        );
        assert!(!err.is_retryable());
    }

    /// Story: validation errors carry the field that needs fixing
    #[test]
    fn story_validation_errors_include_field_path() {
        let err = Error::validation_for_field(
            "quickstart",
            "spec.nodeSets[0].config",
            "Configuration invalid",
        );
        assert!(err.to_string().contains("quickstart"));
        assert_eq!(err.cluster(), Some("quickstart"));
        match &err {
            Error::Validation { field, .. } => {
                assert_eq!(field.as_deref(), Some("spec.nodeSets[0].config"));
            }
            _ => panic!("Expected Validation variant"),
        }
        assert!(!err.is_retryable());
    }

    /// Story: programmer errors are plain internal errors that may clear up
    #[test]
    fn story_internal_errors_are_retryable() {
        let err = Error::internal_with_context(
            "desired-nodes",
            "cannot find Elasticsearch container in StatefulSet ns/sts",
        );
        assert!(err.is_retryable());
        assert_eq!(err.context(), Some("desired-nodes"));
        assert_eq!(Error::internal("boom").context(), Some(UNKNOWN_CONTEXT));
    }

    #[test]
    fn test_serde_json_errors_convert_to_serialization() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: Error = parse_err.into();
        assert!(matches!(err, Error::Serialization { kind: None, .. }));
        assert!(!err.is_retryable());
    }
}
