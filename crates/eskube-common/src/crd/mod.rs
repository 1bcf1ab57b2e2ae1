//! Custom Resource Definitions for eskube
//!
//! This module contains the Elasticsearch CRD and the types it embeds.

mod change_budget;
mod elasticsearch;
mod node_set;

pub use change_budget::{ChangeBudget, UpdateStrategy, DEFAULT_MAX_UNAVAILABLE};
pub use elasticsearch::{
    Elasticsearch, ElasticsearchSpec, ElasticsearchStatus, HttpConfig, KeyToPath, SecretRef,
    SecretSource, SelfSignedCertificate, SelfSignedTransportCertificates, SubjectAlternativeName,
    TlsOptions, TransportConfig, TransportTlsOptions, API_VERSION,
    DEFAULT_IMAGE_REPOSITORY, DISABLE_DOWNGRADE_VALIDATION_ANNOTATION,
    DOWNWARD_NODE_LABELS_ANNOTATION, GROUP, KIND,
};
pub use node_set::{Config, NodeSet};
