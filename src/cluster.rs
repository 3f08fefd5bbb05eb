//! Reads against the cluster API needed by discovery and status checks.

use std::future::Future;

use serde_json::Value;
use thiserror::Error;

use crate::descriptor::{Annotations, Identity};

pub mod client;
pub use client::KubeClusterApi;

/// A ThirdPartyResource as listed by the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyDefinition {
    /// The definition name, `<kind>.<group>`.
    pub name: String,
    pub annotations: Annotations,
    /// Every version the definition declares.
    pub versions: Vec<String>,
}

/// A CustomResourceDefinition as listed by the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentDefinition {
    pub group: String,
    pub kind: String,
    pub version: String,
    pub annotations: Annotations,
}

/// Cluster API operations consumed by this crate.
pub trait ClusterApi: Send + Sync + 'static {
    /// Lists ThirdPartyResources, or `Ok(None)` if the cluster does not serve that API.
    fn list_legacy_definitions(
        &self,
    ) -> impl Future<Output = Result<Option<Vec<LegacyDefinition>>, ClusterError>> + Send;

    /// Lists CustomResourceDefinitions.
    ///
    /// Returns [`ClusterError::Unsupported`] if the cluster does not serve that API.
    fn list_current_definitions(
        &self,
    ) -> impl Future<Output = Result<Vec<CurrentDefinition>, ClusterError>> + Send;

    /// Fetches the raw JSON representation of one object.
    fn get_raw(
        &self,
        identity: &Identity,
        name: &str,
        namespace: &str,
    ) -> impl Future<Output = Result<Value, ClusterError>> + Send;
}

/// The error type returned by [`ClusterApi`] operations.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("API not supported by the cluster: {0}")]
    Unsupported(String),
    #[error("definition {name} is malformed: {reason}")]
    Malformed { name: String, reason: String },
    #[error("no resource for {identity} is served by the cluster")]
    UnknownResource { identity: Identity },
    #[error("cannot load kubeconfig: {0}")]
    Kubeconfig(#[from] kube_client::config::KubeconfigError),
    #[error(transparent)]
    Kube(#[from] kube_client::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
