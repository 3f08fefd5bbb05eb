use thiserror::Error;

use crate::cluster::ClusterError;

/// Errors surfaced by discovery and dispatch.
#[derive(Debug, Error)]
pub enum Error {
    /// A type definition carries a timeout annotation that is not an ISO-8601 duration.
    ///
    /// This is a configuration error and aborts the deploy.
    #[error("Resource {kind} specified invalid timeout value '{value}', must use ISO8601 duration.")]
    InvalidTimeout { kind: String, value: String },

    /// No built-in handler, discovered descriptor or generic fallback can manage this kind.
    #[error("don't know how to manage resources of kind {kind}")]
    UnknownKind { kind: String },

    /// The manifest lacks a field required for dispatch.
    #[error("manifest is missing {0}")]
    InvalidManifest(&'static str),

    #[error(transparent)]
    Cluster(#[from] ClusterError),
}
