use std::{collections::HashMap, sync::Arc};

use kube_core::DynamicObject;

use crate::{
    cluster::ClusterApi,
    config::Builtin,
    discovery::Discovery,
    kubectl::Runner,
    resource::{Handler, ResourceInstance},
    Error,
};

/// Routes manifests to the handler of their kind.
///
/// Built-in kinds are checked first. Other kinds are looked up among the
/// custom resources discovered in the cluster, running discovery on first
/// need. Created with [`config::on`](crate::config::on).
pub struct Dispatcher<A, R> {
    discovery: Arc<Discovery<A>>,
    runner: Arc<R>,
    builtins: HashMap<String, Builtin>,
    fallback: Option<Builtin>,
}

impl<A: ClusterApi, R: Runner> Dispatcher<A, R> {
    pub(crate) fn new(
        discovery: Arc<Discovery<A>>,
        runner: Arc<R>,
        builtins: HashMap<String, Builtin>,
        fallback: Option<Builtin>,
    ) -> Self {
        Self {
            discovery,
            runner,
            builtins,
            fallback,
        }
    }

    pub fn discovery(&self) -> &Arc<Discovery<A>> {
        &self.discovery
    }

    pub fn runner(&self) -> &Arc<R> {
        &self.runner
    }

    pub fn is_builtin(&self, kind: &str) -> bool {
        self.builtins.contains_key(kind)
    }

    /// Creates the runtime instance of one manifest.
    ///
    /// Discovery is never triggered for built-in kinds. Fails if discovery
    /// fails, or if the kind is unknown and generic fallback is disabled.
    pub async fn build(
        &self,
        namespace: &str,
        context: &str,
        definition: DynamicObject,
    ) -> Result<ResourceInstance<A, R>, Error> {
        let types = definition
            .types
            .as_ref()
            .ok_or(Error::InvalidManifest("kind and apiVersion"))?;
        if types.kind.is_empty() {
            return Err(Error::InvalidManifest("kind"));
        }
        let kind = types.kind.clone();
        let api_version = types.api_version.clone();
        let name = definition
            .metadata
            .name
            .clone()
            .ok_or(Error::InvalidManifest("metadata.name"))?;

        if let Some(builtin) = self.builtins.get(&kind) {
            let handler = Handler::Builtin(*builtin);
            return Ok(self.instantiate(namespace, context, name, kind, definition, handler));
        }

        self.discovery.ensure_discovered().await?;

        let (group, version) = split_api_version(&api_version);
        if let Some(descriptor) = self.discovery.lookup(group, &kind, version).await {
            let handler = Handler::Discovered(descriptor);
            return Ok(self.instantiate(namespace, context, name, kind, definition, handler));
        }

        match self.fallback {
            Some(fallback) => {
                log::debug!("No handler for {kind}/{name}, checking existence only");
                let handler = Handler::Builtin(fallback);
                Ok(self.instantiate(namespace, context, name, kind, definition, handler))
            }
            None => Err(Error::UnknownKind { kind }),
        }
    }

    fn instantiate(
        &self,
        namespace: &str,
        context: &str,
        name: String,
        kind: String,
        definition: DynamicObject,
        handler: Handler,
    ) -> ResourceInstance<A, R> {
        ResourceInstance::new(
            namespace,
            context,
            name,
            kind,
            definition,
            handler,
            Arc::clone(self.discovery.api()),
            Arc::clone(&self.runner),
        )
    }
}

/// Splits an `apiVersion` into group and version. The core group is empty.
pub fn split_api_version(api_version: &str) -> (&str, &str) {
    api_version.rsplit_once('/').unwrap_or(("", api_version))
}
