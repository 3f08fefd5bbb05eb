//! Runtime instances of resources being deployed, and their status checks.
//!
//! An instance is polled by the deploy loop: [`ResourceInstance::sync`]
//! refreshes the cached state with one read, then
//! [`deploy_succeeded`](ResourceInstance::deploy_succeeded) and
//! [`deploy_failed`](ResourceInstance::deploy_failed) are consulted until one
//! holds or [`deploy_timed_out`](ResourceInstance::deploy_timed_out) does.

use std::{
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use kube_core::DynamicObject;
use serde_json::Value;

use crate::{
    cluster::ClusterApi,
    config::Builtin,
    descriptor::ResourceDescriptor,
    kubectl::{Output, Runner},
};

pub const UNUSUAL_FAILURE_MESSAGE: &str = "It is very unusual for this resource type to fail to deploy. \
    Please try the deploy again. If that new deploy also fails, contact your cluster administrator.";

/// Observed state after the last [`ResourceInstance::sync`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Status {
    #[default]
    Unknown,
    Available,
}

/// How an instance is sent to the cluster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeployMethod {
    #[default]
    Apply,
    /// Delete and recreate, for kinds whose updates the API server rejects.
    ReplaceForce,
}

/// Success detection of a built-in kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Succeeds once the object exists.
    Generic,
    /// Succeeds once `status.hard` has caught up with `spec.hard`.
    ResourceQuota,
    /// A ThirdPartyResource definition. Existence is re-checked with a direct read
    /// since the new type takes a while to be served after creation.
    LegacyDefinition,
}

#[derive(Debug, Clone)]
pub(crate) enum Handler {
    Builtin(Builtin),
    Discovered(Arc<ResourceDescriptor>),
}

/// One manifest being deployed.
pub struct ResourceInstance<A, R> {
    name: String,
    namespace: String,
    context: String,
    kind: String,
    definition: DynamicObject,
    handler: Handler,
    api: Arc<A>,
    runner: Arc<R>,
    status: Status,
    found: bool,
    rollout_data: Option<Value>,
}

impl<A, R> fmt::Debug for ResourceInstance<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceInstance")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("namespace", &self.namespace)
            .field("context", &self.context)
            .field("handler", &self.handler)
            .field("status", &self.status)
            .field("found", &self.found)
            .finish_non_exhaustive()
    }
}

impl<A: ClusterApi, R: Runner> ResourceInstance<A, R> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        namespace: &str,
        context: &str,
        name: String,
        kind: String,
        definition: DynamicObject,
        handler: Handler,
        api: Arc<A>,
        runner: Arc<R>,
    ) -> Self {
        Self {
            name,
            namespace: namespace.to_owned(),
            context: context.to_owned(),
            kind,
            definition,
            handler,
            api,
            runner,
            status: Status::Unknown,
            found: false,
            rollout_data: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// `Kind/name`, as shown in deploy output.
    pub fn id(&self) -> String {
        format!("{}/{}", self.kind, self.name)
    }

    pub fn definition(&self) -> &DynamicObject {
        &self.definition
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// The descriptor of a discovered kind, `None` for built-in kinds.
    pub fn descriptor(&self) -> Option<&Arc<ResourceDescriptor>> {
        match &self.handler {
            Handler::Discovered(descriptor) => Some(descriptor),
            Handler::Builtin(_) => None,
        }
    }

    pub fn prunable(&self) -> bool {
        self.descriptor().is_some_and(|d| d.prunable())
    }

    pub fn predeploy(&self) -> bool {
        self.descriptor().is_some_and(|d| d.predeploy())
    }

    pub fn timeout(&self) -> Duration {
        match &self.handler {
            Handler::Builtin(builtin) => builtin.timeout(),
            Handler::Discovered(descriptor) => descriptor
                .timeout()
                .unwrap_or(Builtin::DEFAULT_TIMEOUT),
        }
    }

    pub fn deploy_method(&self) -> DeployMethod {
        match &self.handler {
            Handler::Builtin(builtin) => builtin.deploy_method(),
            Handler::Discovered(_) => DeployMethod::Apply,
        }
    }

    fn behavior(&self) -> Behavior {
        match &self.handler {
            Handler::Builtin(builtin) => builtin.behavior(),
            Handler::Discovered(_) => Behavior::Generic,
        }
    }

    /// The resource type argument passed to `kubectl get`.
    fn resource_type(&self) -> String {
        match &self.handler {
            Handler::Discovered(descriptor) if !descriptor.group().is_empty() => format!(
                "{}.{}.{}",
                descriptor.kind().to_lowercase(),
                descriptor.version(),
                descriptor.group()
            ),
            _ => self.kind.to_lowercase(),
        }
    }

    async fn kubectl(&self, args: &[&str]) -> Output {
        self.runner.run(&self.namespace, &self.context, args).await
    }

    /// Refreshes the observed state with a single read.
    ///
    /// A failed read is not an error: the instance simply reports not found
    /// until a later sync succeeds or the caller gives up.
    pub async fn sync(&mut self) {
        let resource_type = self.resource_type();
        let output = match self.behavior() {
            Behavior::ResourceQuota => {
                self.kubectl(&["get", resource_type.as_str(), self.name.as_str(), "--output=json"])
                    .await
            }
            Behavior::Generic | Behavior::LegacyDefinition => {
                self.kubectl(&["get", resource_type.as_str(), self.name.as_str()])
                    .await
            }
        };

        if !output.success {
            log::debug!("Could not read {}: {}", self.id(), output.stderr.trim());
        }
        self.found = output.success;
        self.status = if output.success {
            Status::Available
        } else {
            Status::Unknown
        };

        self.rollout_data = None;
        if self.found && self.behavior() == Behavior::ResourceQuota {
            match serde_json::from_str(&output.stdout) {
                Ok(data) => self.rollout_data = Some(data),
                Err(err) => log::debug!("Unparseable output for {}: {err}", self.id()),
            }
        }
    }

    pub async fn exists(&self) -> bool {
        match self.behavior() {
            Behavior::LegacyDefinition => self.kubectl(&["get", self.name.as_str()]).await.success,
            Behavior::Generic | Behavior::ResourceQuota => self.found,
        }
    }

    pub async fn deploy_succeeded(&self) -> bool {
        if let Handler::Discovered(descriptor) = &self.handler {
            if let Some(predicate) = descriptor.success_predicate() {
                return match self
                    .api
                    .get_raw(descriptor.identity(), &self.name, &self.namespace)
                    .await
                {
                    Ok(document) => predicate.evaluate(&document),
                    Err(err) => {
                        log::debug!("Could not fetch {}: {err}", self.id());
                        false
                    }
                };
            }
        }

        match self.behavior() {
            Behavior::ResourceQuota => self
                .rollout_data
                .as_ref()
                .is_some_and(quota_satisfied),
            Behavior::Generic | Behavior::LegacyDefinition => self.exists().await,
        }
    }

    /// Without a specific failure signal a deploy is never reported as failed,
    /// only as succeeded or timed out.
    pub fn deploy_failed(&self) -> bool {
        false
    }

    pub fn timeout_message(&self) -> &'static str {
        UNUSUAL_FAILURE_MESSAGE
    }

    pub fn deploy_timed_out(&self, started: Instant) -> bool {
        started.elapsed() >= self.timeout()
    }
}

fn quota_satisfied(data: &Value) -> bool {
    data.pointer("/spec/hard") == data.pointer("/status/hard")
}
