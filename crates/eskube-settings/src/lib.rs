//! Canonical Elasticsearch configuration
//!
//! Node set configurations are flattened into dotted keys so settings written
//! as nested maps and as dotted paths compare equal. This crate merges them
//! with controller defaults and operator policy, reads the role settings the
//! controller depends on, and substitutes per-pod placeholders.

#![deny(missing_docs)]

pub mod canonical;
pub mod defaults;
pub mod error;
pub mod policy;
pub mod unpack;
pub mod visit;

pub use canonical::{merge, CanonicalConfig, Value};
pub use defaults::{default_config, node_set_config, user_config};
pub use error::SettingsError;
pub use policy::{PolicyConfig, SecretMount};
pub use unpack::{unpack, ElasticsearchSettings, Node, NodeRole};
pub use visit::{visit, VariableReplacer};
