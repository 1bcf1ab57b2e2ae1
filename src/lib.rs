//! eskube - validation, settings and node set build core for Elasticsearch on Kubernetes
//!
//! The library crates do the work:
//! - `eskube-validation` admits or denies `Elasticsearch` resources
//! - `eskube-settings` merges node set configuration with defaults and policy
//! - `eskube-nodeset` builds StatefulSets and derives the desired nodes
//!
//! This crate wires them into the binary.
//!
//! # Modules
//!
//! - [`webhook`] - Validating admission webhook (axum)
//! - [`render`] - Offline rendering of every node set of a cluster

#![deny(missing_docs)]

pub mod render;
pub mod webhook;

pub use eskube_common::{Error, Result};
