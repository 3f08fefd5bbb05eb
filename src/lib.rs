//! kube-discoverable lets a deploy tool manage resource kinds it does not know at build time.
//!
//! Custom resource kinds are discovered from the cluster at runtime,
//! through either ThirdPartyResources or CustomResourceDefinitions.
//! Each discovered kind gets a [`ResourceDescriptor`] synthesized from
//! annotations on its definition, which decide whether objects of that kind
//! are prunable, deployed before everything else, how long a deploy may take,
//! and which status field signals success.
//!
//! A [`Dispatcher`] routes each manifest of a deploy to its handler:
//! built-in kinds first, then discovered kinds, then a generic existence check.
//! Discovery runs at most once per dispatcher unless requested explicitly.
//!
//! ```ignore
//! let api = KubeClusterApi::for_context("production").await?;
//! let dispatcher = config::on(api, Kubectl::default()).build();
//!
//! let mut widget = dispatcher.build("default", "production", manifest).await?;
//! widget.sync().await;
//! if widget.deploy_succeeded().await { /* ... */ }
//! ```

pub mod cluster;
pub mod config;
pub mod descriptor;
pub mod discovery;
pub mod dispatch;
mod error;
pub mod field_path;
pub mod kubectl;
pub mod registry;
pub mod resource;

pub use cluster::{ClusterApi, ClusterError, KubeClusterApi};
pub use config::{on, Builtin};
pub use descriptor::{Identity, ResourceDescriptor, SuccessPredicate};
pub use discovery::Discovery;
pub use dispatch::Dispatcher;
pub use error::Error;
pub use kubectl::{Kubectl, Runner};
pub use registry::Registry;
pub use resource::{Behavior, DeployMethod, ResourceInstance, Status};
