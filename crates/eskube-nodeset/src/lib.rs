//! Node set build pipeline and desired-nodes compiler
//!
//! [`NodeSetBuilder`] turns a node set and its merged configuration into a
//! StatefulSet, its headless service and a content hash. The resources
//! module then reads the built StatefulSets, plus the live claims, to
//! declare the compute and storage each Elasticsearch node should get.

#![deny(missing_docs)]

pub mod builder;
pub mod claims;
pub mod hash;
pub mod keystore;
pub mod labels;
pub mod pod_template;
pub mod quantity;
pub mod resources;
pub mod scripts;
pub mod service;
pub mod store;
pub mod volumes;

pub use builder::{BuildArtifact, NodeSetBuilder, STATEFULSET_HASH_ANNOTATION};
pub use keystore::KeystoreResources;
pub use resources::{
    compute_node_resources, to_desired_nodes, DesiredNode, DesiredNodes, NodeResource,
    NodeSetResources, ProcessorsRange,
};
pub use scripts::Scripts;
pub use store::{ClusterStateStore, InMemoryStore, KubeStore};
