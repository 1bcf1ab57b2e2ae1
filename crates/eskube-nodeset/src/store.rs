//! Read access to live cluster state
//!
//! The resource compiler reads claims and StatefulSets that may not exist yet.
//! A missing object is a normal outcome and comes back as `Ok(None)`.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use kube::{Api, Client, ResourceExt};

#[cfg(test)]
use mockall::automock;

use eskube_common::{Error, Result};

/// Lookups against the orchestration runtime
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterStateStore: Send + Sync {
    /// Get a PersistentVolumeClaim by namespace and name
    async fn get_pvc(&self, namespace: &str, name: &str) -> Result<Option<PersistentVolumeClaim>>;

    /// Get a StatefulSet by namespace and name
    async fn get_statefulset(&self, namespace: &str, name: &str) -> Result<Option<StatefulSet>>;
}

/// Store backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    /// Create a store using the given client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterStateStore for KubeStore {
    async fn get_pvc(&self, namespace: &str, name: &str) -> Result<Option<PersistentVolumeClaim>> {
        let api: Api<PersistentVolumeClaim> = Api::namespaced(self.client.clone(), namespace);
        api.get_opt(name).await.map_err(Error::from)
    }

    async fn get_statefulset(&self, namespace: &str, name: &str) -> Result<Option<StatefulSet>> {
        let api: Api<StatefulSet> = Api::namespaced(self.client.clone(), namespace);
        api.get_opt(name).await.map_err(Error::from)
    }
}

type Key = (String, String);

fn key_of<K: ResourceExt>(obj: &K) -> Key {
    (obj.namespace().unwrap_or_default(), obj.name_any())
}

/// Store holding a fixed snapshot of objects
///
/// Used to render manifests offline and in tests.
#[derive(Default)]
pub struct InMemoryStore {
    pvcs: RwLock<BTreeMap<Key, PersistentVolumeClaim>>,
    statefulsets: RwLock<BTreeMap<Key, StatefulSet>>,
}

impl InMemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a claim
    pub fn insert_pvc(&self, pvc: PersistentVolumeClaim) {
        self.pvcs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key_of(&pvc), pvc);
    }

    /// Add or replace a StatefulSet
    pub fn insert_statefulset(&self, sts: StatefulSet) {
        self.statefulsets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key_of(&sts), sts);
    }
}

fn lookup<T: Clone>(map: &RwLock<BTreeMap<Key, T>>, namespace: &str, name: &str) -> Result<Option<T>> {
    let map = map
        .read()
        .map_err(|_| Error::internal_with_context("store", "in-memory store lock poisoned"))?;
    Ok(map.get(&(namespace.to_string(), name.to_string())).cloned())
}

#[async_trait]
impl ClusterStateStore for InMemoryStore {
    async fn get_pvc(&self, namespace: &str, name: &str) -> Result<Option<PersistentVolumeClaim>> {
        lookup(&self.pvcs, namespace, name)
    }

    async fn get_statefulset(&self, namespace: &str, name: &str) -> Result<Option<StatefulSet>> {
        lookup(&self.statefulsets, namespace, name)
    }
}
